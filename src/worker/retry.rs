//! Exponential backoff with a fixed attempt ceiling

use std::time::Duration;

use crate::config::DownloadConfig;

/// Sleep after failed attempt `n` is `unit * factor^n`; attempts are 1-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub max_attempts: u32,
    pub factor: f64,
    pub unit: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, factor: f64, unit: Duration) -> Self {
        Self {
            max_attempts,
            factor,
            unit,
        }
    }

    /// Delay to wait after `attempt` failed, before the next one.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.unit.as_secs_f64() * self.factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Whether another attempt is allowed after `attempt` failed
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for Backoff {
    fn from(config: &DownloadConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.backoff_factor,
            config.backoff_unit(),
        )
    }
}
