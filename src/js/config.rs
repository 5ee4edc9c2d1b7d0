// Configuration types for the worker pool

use crate::js::error::WorkerPoolError;
use crate::js::origin::SecurityOrigin;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Worker pool configuration
///
/// Every field has a default, so a TOML file only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// URL of the page that owns the pool; its origin is the pool's origin
    pub page_url: String,

    /// Worker threads are named `<prefix>-<id>`
    pub thread_name_prefix: String,

    /// Stack size for spawned worker threads, in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_stack_size: Option<usize>,

    /// Timeout for fetching a worker's script from a URL
    pub fetch_timeout_secs: u64,

    /// Memory limit per QuickJS runtime in bytes
    pub memory_limit: usize,

    /// Stack limit per QuickJS runtime in bytes
    pub max_stack_size: usize,

    /// Maximum promise jobs drained after a single evaluation or callback
    pub max_pending_jobs: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            page_url: "http://localhost/".to_string(),
            thread_name_prefix: "workerpool".to_string(),
            thread_stack_size: None,
            fetch_timeout_secs: 30,
            memory_limit: 64 * 1024 * 1024, // 64MB
            max_stack_size: 1024 * 1024,    // 1MB
            max_pending_jobs: 1000,
        }
    }
}

impl PoolConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, WorkerPoolError> {
        let config: PoolConfig =
            toml::from_str(text).map_err(|e| WorkerPoolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, WorkerPoolError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn validate(&self) -> Result<(), WorkerPoolError> {
        if self.thread_name_prefix.is_empty() {
            return Err(WorkerPoolError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        self.page_origin().map(|_| ())
    }

    /// Origin of the owning page
    pub fn page_origin(&self) -> Result<SecurityOrigin, WorkerPoolError> {
        SecurityOrigin::from_url(&self.page_url)
            .map_err(|e| WorkerPoolError::Config(format!("invalid page_url: {}", e)))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, WorkerPoolError> {
        toml::to_string_pretty(self).map_err(|e| WorkerPoolError::Config(e.to_string()))
    }
}
