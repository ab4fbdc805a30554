//! Download worker
//!
//! Fetches candidate links over a shared [`http::HttpSession`], writes them to
//! the destination directory and unpacks archives. [`pool::WorkerPool`] bounds
//! how many links are in flight.

pub mod extract;
pub mod http;
pub mod pool;
pub mod retry;
pub mod runner;

pub use http::{DownloadError, HttpConfig, HttpSession};
pub use pool::WorkerPool;
pub use retry::Backoff;
pub use runner::{DownloadOutcome, FetchError};

use crate::config::DownloadConfig;

/// Worker configuration
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub max_inflight_tasks: usize,
    pub backoff: Backoff,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for WorkerConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            max_inflight_tasks: config.max_concurrent_requests,
            backoff: Backoff::from(config),
        }
    }
}
