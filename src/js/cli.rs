// CLI commands for running scripts on a worker pool

use crate::js::config::PoolConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Worker pool subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script as worker 0 and deliver its messages for a while
    Run {
        /// Script to evaluate in the owning worker
        script: PathBuf,

        /// URL of the owning page (overrides the config file)
        #[arg(long)]
        page_url: Option<String>,

        /// Configuration file (default: <config dir>/workerpool/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How long to keep delivering messages to worker 0
        #[arg(long, default_value = "1000")]
        duration_ms: u64,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (default: <config dir>/workerpool/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the command
    pub fn run(self) -> Result<()> {
        match self {
            Commands::Run {
                script,
                page_url,
                config,
                duration_ms,
            } => Self::run_cmd(script, page_url, config, duration_ms),
            Commands::Config { config } => Self::config_cmd(config),
        }
    }

    #[cfg(feature = "js-runtime")]
    fn run_cmd(
        script: PathBuf,
        page_url: Option<String>,
        config: Option<PathBuf>,
        duration_ms: u64,
    ) -> Result<()> {
        use crate::js::quickjs::QuickJsFactory;
        use crate::js::runtime::WorkerPool;
        use std::sync::Arc;
        use std::time::Duration;

        let mut config = load_config(config.as_deref())?;
        if let Some(page_url) = page_url {
            config = config.with_page_url(page_url);
        }

        let source = std::fs::read_to_string(&script)
            .with_context(|| format!("failed to read {}", script.display()))?;

        let factory = Arc::new(QuickJsFactory::from_config(&config));
        let root = factory.create().context("failed to create root interpreter")?;
        let mut pool = WorkerPool::new(config, factory, Box::new(root))?;

        let filename = script.display().to_string();
        if let Err(err) = pool.evaluate(&source, &filename) {
            pool.shutdown();
            pool.wait_for_termination(Duration::from_secs(5));
            anyhow::bail!("{}: {}", filename, err);
        }

        let delivered = pool.pump_for(Duration::from_millis(duration_ms));
        let unhandled = pool.take_unhandled_errors();

        pool.shutdown();
        if !pool.wait_for_termination(Duration::from_secs(5)) {
            tracing::warn!(target: "workerpool", "some workers did not terminate in time");
        }

        println!(
            "Delivered {} message(s) to worker 0; {} worker(s) created",
            delivered,
            pool.worker_count().saturating_sub(1)
        );
        for error in &unhandled {
            println!("  unhandled: {}", error);
        }

        Ok(())
    }

    #[cfg(not(feature = "js-runtime"))]
    fn run_cmd(
        _script: PathBuf,
        _page_url: Option<String>,
        _config: Option<PathBuf>,
        _duration_ms: u64,
    ) -> Result<()> {
        anyhow::bail!("built without the js-runtime feature; no interpreter available")
    }

    fn config_cmd(config: Option<PathBuf>) -> Result<()> {
        let source = config.clone().or_else(default_config_path);
        let effective = load_config(config.as_deref())?;

        match source {
            Some(path) if path.exists() => println!("# {}", path.display()),
            _ => println!("# defaults"),
        }
        print!("{}", effective.to_toml_string()?);

        Ok(())
    }
}

/// `config.toml` in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "workerpool").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load an explicit config file, else the default one if it exists, else defaults
pub fn load_config(path: Option<&Path>) -> Result<PoolConfig> {
    if let Some(path) = path {
        return PoolConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => PoolConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        _ => Ok(PoolConfig::default()),
    }
}
