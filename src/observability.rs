//! Tracing setup and run counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. "info", "debug")
/// applies to every target.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Subscriber used while configuration is still loading.
///
/// Scope it with `tracing::subscriber::with_default`; [`init_tracing`]
/// installs the real one once the configured level is known.
pub fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).finish()
}

/// Counters for one pipeline run
#[derive(Debug, Default)]
pub struct Metrics {
    links_discovered: AtomicU64,
    listings_failed: AtomicU64,
    downloads_succeeded: AtomicU64,
    downloads_failed: AtomicU64,
    retries: AtomicU64,
    bytes_downloaded: AtomicU64,
    archives_extracted: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links_discovered(&self, count: usize) {
        self.links_discovered
            .fetch_add(count as u64, Ordering::Relaxed);
        tracing::debug!(counter = "links_discovered", count, "Metric incremented");
    }

    pub fn listing_failed(&self) {
        self.listings_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "listings_failed", "Metric incremented");
    }

    pub fn download_succeeded(&self, bytes: u64) {
        self.downloads_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_succeeded", bytes, "Metric incremented");
    }

    pub fn download_failed(&self) {
        self.downloads_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "downloads_failed", "Metric incremented");
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn archive_extracted(&self) {
        self.archives_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            links_discovered: self.links_discovered.load(Ordering::Relaxed),
            listings_failed: self.listings_failed.load(Ordering::Relaxed),
            downloads_succeeded: self.downloads_succeeded.load(Ordering::Relaxed),
            downloads_failed: self.downloads_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            archives_extracted: self.archives_extracted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub links_discovered: u64,
    pub listings_failed: u64,
    pub downloads_succeeded: u64,
    pub downloads_failed: u64,
    pub retries: u64,
    pub bytes_downloaded: u64,
    pub archives_extracted: u64,
}
