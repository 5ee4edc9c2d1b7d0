// JS runtime module - worker pool, worker threads and messaging

pub mod current;
pub mod message;
pub mod notifier;
pub mod pool;
mod record;
mod worker;

// Re-export commonly used types
pub use current::current_worker_id;
pub use message::{Message, MessageKind, WorkerId};
pub use notifier::{CondvarNotifier, Notifier, Signal};
pub use pool::{format_error_message, WorkerPool, WorkerPoolBuilder, WorkerScope, WorkerSource};
pub use record::ThreadState;
