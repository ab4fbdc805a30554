//! Fetch-and-extract for a single candidate link

use super::extract::{self, ExtractError};
use super::http::{DownloadError, HttpSession};
use super::retry::Backoff;
use crate::observability::Metrics;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Download failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: DownloadError },

    #[error("Link has no file name: {0}")]
    NoFileName(String),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Extraction task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Result of one worker invocation; always produced, never an error
#[derive(Debug)]
pub struct DownloadOutcome {
    pub link: String,
    pub attempts: u32,
    pub bytes: u64,
    pub error: Option<FetchError>,
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Last path segment of the link, without query or fragment
pub fn file_name(link: &str) -> Option<&str> {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Download `link` into `dest`, extracting it if it is an archive.
///
/// Every non-200 answer and every transport error is retried until `backoff`
/// runs out; write and extraction failures end the link immediately.
pub async fn fetch_and_extract(
    session: &HttpSession,
    link: &str,
    dest: &Path,
    backoff: &Backoff,
    metrics: &Metrics,
) -> DownloadOutcome {
    let mut outcome = DownloadOutcome {
        link: link.to_string(),
        attempts: 0,
        bytes: 0,
        error: None,
    };

    let Some(name) = file_name(link) else {
        outcome.error = Some(FetchError::NoFileName(link.to_string()));
        metrics.download_failed();
        return outcome;
    };
    let path = dest.join(name);

    let body = loop {
        outcome.attempts += 1;
        let attempt = outcome.attempts;

        debug!(link, attempt, "Attempting download");

        match session.fetch_bytes(link).await {
            Ok(body) => {
                if attempt > 1 {
                    debug!(link, attempt, "Download succeeded after retry");
                }
                break body;
            }
            Err(e) => {
                match e.status() {
                    Some(403) => debug!(link, attempt, "403 Forbidden"),
                    Some(status) => warn!(link, attempt, status, "Unexpected HTTP status"),
                    None => warn!(link, attempt, error = %e, "Request failed"),
                }

                if !backoff.allows_retry(attempt) {
                    error!(link, attempts = attempt, error = %e, "Download failed after retries");
                    outcome.error = Some(FetchError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                    metrics.download_failed();
                    return outcome;
                }

                metrics.retry();
                tokio::time::sleep(backoff.delay_for(attempt)).await;
            }
        }
    };

    outcome.bytes = body.len() as u64;

    match persist(&path, body, dest).await {
        Ok(members) => {
            metrics.download_succeeded(outcome.bytes);
            if let Some(members) = members {
                metrics.archive_extracted();
                info!(link, members, "Downloaded and extracted");
            } else {
                info!(link, path = %path.display(), "Downloaded");
            }
        }
        Err(e) => {
            error!(link, error = %e, "Failed to store download");
            outcome.error = Some(e);
            metrics.download_failed();
        }
    }

    outcome
}

/// Stage the body in a unique file inside `dest`, then either rename it to
/// `path` or, for archives, extract from the staged copy and delete it.
///
/// Links sharing a file name never touch each other's staged bytes.
async fn persist(path: &Path, body: Bytes, dest: &Path) -> Result<Option<usize>> {
    let path = path.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || persist_blocking(&path, &body, &dest))
        .await
        .map_err(|e| FetchError::Aborted(e.to_string()))?
}

fn persist_blocking(path: &Path, body: &[u8], dest: &Path) -> Result<Option<usize>> {
    let write_error = |source| FetchError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".nemfetch-")
        .suffix(".part")
        .tempfile_in(dest)
        .map_err(write_error)?;
    staged.write_all(body).map_err(write_error)?;

    if !extract::is_archive(path) {
        staged.persist(path).map_err(|e| write_error(e.error))?;
        return Ok(None);
    }

    // extract_and_remove owns deletion of the staged archive from here on
    let staged = staged
        .into_temp_path()
        .keep()
        .map_err(|e| write_error(e.error))?;
    let members = extract::extract_and_remove(&staged, dest)?;

    Ok(Some(members.len()))
}
