//! Candidate link discovery on listing pages

use regex::RegexSet;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{DiscoveryConfig, SourceConfig};
use crate::worker::{DownloadError, HttpSession};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid target file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Failed to access {url}: {source}")]
    Unavailable {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("Failed to access {url} after {attempts} attempts: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: DownloadError,
    },
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Fetches listing pages and keeps the hrefs matching the target patterns
pub struct LinkDiscoverer {
    session: Arc<HttpSession>,
    base: Url,
    patterns: RegexSet,
    anchors: Selector,
    max_attempts: u32,
    retry_statuses: Vec<u16>,
    retry_backoff: Duration,
}

impl LinkDiscoverer {
    pub fn new(
        session: Arc<HttpSession>,
        source: &SourceConfig,
        discovery: &DiscoveryConfig,
    ) -> Result<Self> {
        // patterns match from the start of the href, like a prefix match
        let patterns = RegexSet::new(
            source
                .target_file_patterns
                .iter()
                .map(|pattern| format!("^(?:{pattern})")),
        )?;

        let anchors = Selector::parse("a[href]")
            .map_err(|e| DiscoveryError::Selector(format!("{e:?}")))?;

        Ok(Self {
            session,
            base: Url::parse(&source.base_url)?,
            patterns,
            anchors,
            max_attempts: discovery.max_attempts.max(1),
            retry_statuses: discovery.retry_statuses.clone(),
            retry_backoff: Duration::from_millis(discovery.retry_backoff_ms),
        })
    }

    /// Fetch one listing page and return its candidate links in document order
    pub async fn discover(&self, url: &str) -> Result<Vec<String>> {
        let html = self.fetch_page(url).await?;
        let links = self.extract_links(&html);

        info!(url, count = links.len(), "Discovered candidate links");

        Ok(links)
    }

    /// Anchor hrefs that match a pattern, resolved against the base URL
    pub fn extract_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut links = Vec::new();

        for anchor in document.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let href = href.trim();

            if !self.patterns.is_match(href) {
                debug!(href, "No match");
                continue;
            }

            match self.base.join(href) {
                Ok(resolved) => {
                    debug!(href, url = %resolved, "Matched");
                    links.push(resolved.to_string());
                }
                Err(e) => warn!(href, error = %e, "Matched href does not resolve"),
            }
        }

        links
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.session.fetch_text(url).await {
                Ok(html) => return Ok(html),
                Err(e) => e,
            };

            let retryable = match err.status() {
                Some(status) => self.retry_statuses.contains(&status),
                None => true,
            };

            if !retryable {
                error!(url, error = %err, "Failed to access listing page");
                return Err(DiscoveryError::Unavailable {
                    url: url.to_string(),
                    source: err,
                });
            }

            if attempt >= self.max_attempts {
                error!(url, attempts = attempt, error = %err, "Failed to access listing page");
                return Err(DiscoveryError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            info!(url, attempt, max_attempts = self.max_attempts, error = %err, "Retrying listing page");
            tokio::time::sleep(self.retry_backoff).await;
        }
    }
}
