//! Pipeline driver: listing URLs -> discovery -> bounded download pool -> report

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discovery::{DiscoveryError, LinkDiscoverer};
use crate::listing::{self, MonthRange};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::worker::runner::file_name;
use crate::worker::{DownloadError, DownloadOutcome, HttpConfig, HttpSession, WorkerConfig, WorkerPool};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to set up HTTP session: {0}")]
    Session(#[from] DownloadError),

    #[error("Failed to set up link discovery: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to create destination directory {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write failure report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode failure report: {0}")]
    ReportEncoding(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Links found across a month range, plus the listing pages that could not be read
#[derive(Debug, Default)]
pub struct Discovered {
    pub listing_urls: Vec<String>,
    pub links: Vec<String>,
    pub failed_listings: Vec<String>,
}

/// Summary of one `run`
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub listing_urls: usize,
    pub links: usize,
    pub succeeded: usize,
    pub failed_links: Vec<String>,
    pub failed_listings: Vec<String>,
    pub collisions: Vec<String>,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed_links.is_empty() && self.failed_listings.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct FailureReport<'a> {
    generated_at: String,
    failed_links: &'a [String],
    failed_listings: &'a [String],
}

/// Owns the HTTP session for exactly one run; dropping it releases the client
pub struct Pipeline {
    config: Config,
    discoverer: LinkDiscoverer,
    pool: WorkerPool,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let session = Arc::new(HttpSession::new(&HttpConfig::from(&config.download))?);
        let metrics = Arc::new(Metrics::new());

        let discoverer =
            LinkDiscoverer::new(Arc::clone(&session), &config.source, &config.discovery)?;
        let pool = WorkerPool::new(
            session,
            Arc::clone(&metrics),
            WorkerConfig::from(&config.download),
        );

        Ok(Self {
            config,
            discoverer,
            pool,
            metrics,
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn listing_urls(&self, range: MonthRange) -> Vec<String> {
        listing::generate_urls(&self.config.source.archive_root, range)
    }

    /// Visit every listing page in order and concatenate their candidate links.
    ///
    /// A listing that cannot be read contributes no links and is recorded.
    pub async fn discover(&self, range: MonthRange) -> Discovered {
        let mut discovered = Discovered {
            listing_urls: self.listing_urls(range),
            ..Discovered::default()
        };

        for url in &discovered.listing_urls {
            match self.discoverer.discover(url).await {
                Ok(links) => {
                    self.metrics.links_discovered(links.len());
                    discovered.links.extend(links);
                }
                Err(e) => {
                    error!(url, error = %e, "Listing page yielded no links");
                    self.metrics.listing_failed();
                    discovered.failed_listings.push(url.clone());
                }
            }
        }

        discovered
    }

    /// Download every link into the configured output directory
    pub async fn download(&self, links: Vec<String>) -> Result<Vec<DownloadOutcome>> {
        let dest = &self.config.download.output_path;
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|source| PipelineError::Destination {
                path: dest.clone(),
                source,
            })?;

        Ok(self.pool.run(links, dest).await)
    }

    /// Discover, download and report on the whole range
    pub async fn run(&self, range: MonthRange) -> Result<RunReport> {
        info!(%range, "Starting download pipeline");

        let discovered = self.discover(range).await;

        let collisions = find_collisions(&discovered.links);
        if !collisions.is_empty() {
            warn!(
                ?collisions,
                "Several links share a destination file name; the last one to finish wins"
            );
        }

        let links = discovered.links.len();
        let outcomes = self.download(discovered.links).await?;

        let mut failed_links = Vec::new();
        let mut succeeded = 0;
        for outcome in outcomes {
            if outcome.is_success() {
                succeeded += 1;
            } else {
                failed_links.push(outcome.link);
            }
        }

        let report = RunReport {
            listing_urls: discovered.listing_urls.len(),
            links,
            succeeded,
            failed_links,
            failed_listings: discovered.failed_listings,
            collisions,
            metrics: self.metrics.snapshot(),
        };

        if report.failed_links.is_empty() {
            info!(succeeded = report.succeeded, "All files downloaded successfully");
        } else {
            error!(
                failed = ?report.failed_links,
                "Failed to download the following files"
            );
        }
        info!(metrics = ?report.metrics, "Run finished");

        if let Some(path) = &self.config.download.failure_report {
            write_failure_report(path, &report).await?;
        }

        Ok(report)
    }
}

/// File names that more than one link would write to, in first-seen order
pub fn find_collisions(links: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();

    for name in links.iter().filter_map(|link| file_name(link)) {
        let count = counts.entry(name).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(name.to_string());
        }
    }

    order
}

async fn write_failure_report(path: &Path, report: &RunReport) -> Result<()> {
    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| PipelineError::ReportEncoding(e.to_string()))?;

    let body = serde_json::to_vec_pretty(&FailureReport {
        generated_at,
        failed_links: &report.failed_links,
        failed_listings: &report.failed_listings,
    })
    .map_err(|e| PipelineError::ReportEncoding(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PipelineError::Report {
                path: path.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::write(path, body)
        .await
        .map_err(|source| PipelineError::Report {
            path: path.to_path_buf(),
            source,
        })?;

    info!(path = %path.display(), "Wrote failure report");
    Ok(())
}
