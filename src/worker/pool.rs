//! Bounded pool of fetch-and-extract tasks

use super::http::HttpSession;
use super::runner::{self, DownloadOutcome, FetchError};
use crate::observability::Metrics;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::WorkerConfig;

pub struct WorkerPool {
    session: Arc<HttpSession>,
    metrics: Arc<Metrics>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(session: Arc<HttpSession>, metrics: Arc<Metrics>, config: WorkerConfig) -> Self {
        Self {
            session,
            metrics,
            config,
        }
    }

    /// Run every link to completion and return outcomes in completion order.
    ///
    /// At most `max_inflight_tasks` links hold a slot at once; a link keeps its
    /// slot while sleeping between retries.
    pub async fn run(&self, links: Vec<String>, dest: &Path) -> Vec<DownloadOutcome> {
        let total = links.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_inflight_tasks));
        let dest: Arc<PathBuf> = Arc::new(dest.to_path_buf());
        let mut tasks = JoinSet::new();
        let mut by_task = HashMap::with_capacity(total);

        for link in links {
            let session = Arc::clone(&self.session);
            let metrics = Arc::clone(&self.metrics);
            let semaphore = Arc::clone(&semaphore);
            let dest = Arc::clone(&dest);
            let backoff = self.config.backoff;
            let task_link = link.clone();

            let handle = tasks.spawn(async move {
                // never closed, so acquire only fails if the pool is torn down
                let _permit = semaphore.acquire_owned().await;
                runner::fetch_and_extract(&session, &task_link, &dest, &backoff, &metrics).await
            });
            by_task.insert(handle.id(), link);
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let link = by_task.remove(&e.id()).unwrap_or_default();
                    error!(link, error = %e, "Download task did not complete");
                    self.metrics.download_failed();
                    DownloadOutcome {
                        link,
                        attempts: 0,
                        bytes: 0,
                        error: Some(FetchError::Aborted(e.to_string())),
                    }
                }
            };
            outcomes.push(outcome);
            info!(completed = outcomes.len(), total, "Download progress");
        }

        outcomes
    }
}
