// JS worker pool: threads, messaging and the QuickJS interpreter

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod interpreter;
pub mod origin;
#[cfg(feature = "js-runtime")]
pub mod quickjs;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PoolConfig;
pub use error::{FetchError, ScriptError, WorkerPoolError};
pub use fetch::{FetchedScript, HttpScriptFetcher, ScriptFetcher};
pub use interpreter::{CallbackId, Interpreter, InterpreterFactory, ObjectHandle, ScriptValue};
pub use origin::SecurityOrigin;
#[cfg(feature = "js-runtime")]
pub use quickjs::{QuickJsFactory, QuickJsInterpreter};
pub use runtime::{
    Message, MessageKind, ThreadState, WorkerId, WorkerPool, WorkerPoolBuilder, WorkerScope,
    WorkerSource,
};
