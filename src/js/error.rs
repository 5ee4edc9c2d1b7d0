// Error types for the worker pool

use crate::js::runtime::WorkerId;
use std::fmt;
use thiserror::Error;

/// Unified error type for worker pool operations
///
/// Only synchronous API misuse and setup failures surface through this type.
/// Anything that goes wrong asynchronously on a worker thread is turned into an
/// error event and queued for the pool owner instead.
#[derive(Debug, Error)]
pub enum WorkerPoolError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Worker {0} does not exist.")]
    NotFound(WorkerId),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Invalid worker URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exception raised while evaluating script or invoking a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<u32>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {})", self.message, line),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Errors while loading a worker's script from a URL
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Failed to load script. Status: {status_line} URL: {url}")]
    Status { status_line: String, url: String },

    #[error("Failed to load script. {reason} URL: {url}")]
    Network { url: String, reason: String },

    #[error("Failed to load script. Body is not valid text. URL: {url}")]
    Decode { url: String },

    #[error("Script fetch cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            WorkerPoolError::NotFound(WorkerId(9999)).to_string(),
            "Worker 9999 does not exist."
        );

        assert_eq!(
            WorkerPoolError::Internal("caller not initialized".to_string()).to_string(),
            "Internal error: caller not initialized"
        );

        assert_eq!(
            FetchError::Status {
                status_line: "404 Not Found".to_string(),
                url: "http://example.com/w.js".to_string(),
            }
            .to_string(),
            "Failed to load script. Status: 404 Not Found URL: http://example.com/w.js"
        );
    }

    #[test]
    fn script_error_display_includes_line_when_known() {
        assert_eq!(ScriptError::new("boom").to_string(), "boom");
        assert_eq!(ScriptError::at_line("boom", 3).to_string(), "boom (line 3)");
    }

    #[test]
    fn from_conversions_work() {
        let script_err: WorkerPoolError = ScriptError::new("x").into();
        assert!(matches!(script_err, WorkerPoolError::Script(_)));

        let fetch_err: WorkerPoolError = FetchError::Cancelled.into();
        assert!(matches!(fetch_err, WorkerPoolError::Fetch(_)));

        let io_err: WorkerPoolError =
            std::io::Error::new(std::io::ErrorKind::Other, "spawn failed").into();
        assert!(matches!(io_err, WorkerPoolError::Io(_)));
    }
}
