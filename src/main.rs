use clap::Parser;
use tracing_subscriber::EnvFilter;
use workerpool::js::cli::Commands;

/// Run JavaScript on a pool of worker threads
#[derive(Parser, Debug)]
#[command(name = "workerpool", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("workerpool=info,quickjs=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.command.run()
}
