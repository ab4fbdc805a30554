use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::listing::{MonthRange, YearMonth};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub range: RangeConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            download: DownloadConfig::default(),
            discovery: DiscoveryConfig::default(),
            range: RangeConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where listing pages live and which files on them are wanted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Origin that relative hrefs are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prefix of every monthly listing URL
    #[serde(default = "default_archive_root")]
    pub archive_root: String,
    /// A link is downloaded iff it matches at least one of these
    #[serde(default = "default_target_file_patterns")]
    pub target_file_patterns: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            archive_root: default_archive_root(),
            target_file_patterns: default_target_file_patterns(),
        }
    }
}

fn default_base_url() -> String {
    "https://nemweb.com.au".to_string()
}

fn default_archive_root() -> String {
    "https://nemweb.com.au/Data_Archive/Wholesale_Electricity/MMSDM/".to_string()
}

fn default_target_file_patterns() -> Vec<String> {
    vec![r".*PUBLIC_DVD_P5MIN_REGIONSOLUTION_ALL_.*\.zip$".to_string()]
}

/// Fetch-and-extract worker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Backoff ceiling per link
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Duration multiplied by `backoff_factor ^ attempt`
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    /// Shared across discovery and downloads; unlimited when unset
    pub max_requests_per_second: Option<u32>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// JSON report of failed links, written after each batch when set
    pub failure_report: Option<PathBuf>,
}

impl DownloadConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_attempts: default_max_attempts(),
            backoff_factor: default_backoff_factor(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_requests_per_second: None,
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            failure_report: None,
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    concat!(
        "nemfetch/",
        env!("CARGO_PKG_VERSION"),
        " (MMSDM archive downloader)"
    )
    .to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Listing page retry budget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_attempts")]
    pub max_attempts: u32,
    /// Statuses worth another try; anything else non-200 fails immediately
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_discovery_attempts(),
            retry_statuses: default_retry_statuses(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_discovery_attempts() -> u32 {
    3
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// Closed month range to fetch
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RangeConfig {
    #[serde(default = "default_year")]
    pub start_year: i32,
    #[serde(default = "default_month")]
    pub start_month: u32,
    #[serde(default = "default_year")]
    pub end_year: i32,
    #[serde(default = "default_month")]
    pub end_month: u32,
}

impl RangeConfig {
    /// Build the month range; fails on out-of-range months
    pub fn to_range(&self) -> Result<MonthRange, crate::listing::ListingError> {
        let start = YearMonth::new(self.start_year, self.start_month)?;
        let end = YearMonth::new(self.end_year, self.end_month)?;
        Ok(MonthRange::new(start, end))
    }
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start_year: default_year(),
            start_month: default_month(),
            end_year: default_year(),
            end_month: default_month(),
        }
    }
}

fn default_year() -> i32 {
    2024
}

fn default_month() -> u32 {
    1
}
