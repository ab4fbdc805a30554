//! Configuration management for nemfetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. Configuration file (TOML by default; YAML/JSON picked by extension)
//! 3. Environment variables (highest priority)
//!
//! Command-line flags are applied on top through [`Config::load_with`],
//! before validation.
//!
//! # Usage
//!
//! ```no_run
//! use nemfetch::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Downloading into: {}", config.download.output_path.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `NEMFETCH__<section>__<key>`
//!
//! Examples:
//! - `NEMFETCH__DOWNLOAD__MAX_CONCURRENT_REQUESTS=8`
//! - `NEMFETCH__RANGE__START_YEAR=2023`
//! - `NEMFETCH__LOG_LEVEL=debug`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/nemfetch.toml`.
//! This can be overridden using the `NEMFETCH_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use models::{Config, DiscoveryConfig, DownloadConfig, RangeConfig, SourceConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// `explicit` takes precedence over `NEMFETCH_CONFIG` when choosing the file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (bad months, inverted range, invalid patterns, etc.)
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |_| {})
    }

    /// Load configuration, apply `overrides` (e.g. command-line flags), then validate
    ///
    /// Validation sees the final values, so an override can repair a bad
    /// setting coming from the file or environment.
    pub fn load_with(
        explicit: Option<PathBuf>,
        overrides: impl FnOnce(&mut Config),
    ) -> Result<Self, ConfigError> {
        let mut config = sources::load(explicit)?;
        overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
