use super::models::Config;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {value} (expected 1-12)")]
    InvalidMonth { field: &'static str, value: u32 },

    #[error("Start of range ({start}) is after its end ({end})")]
    InvertedRange { start: String, end: String },

    #[error("No target file patterns configured")]
    NoTargetPatterns,

    #[error("Target file pattern '{pattern}' does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    #[error("backoff_factor must be at least 1.0, got {0}")]
    InvalidBackoffFactor(f64),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_range(config)?;
    validate_source(config)?;
    validate_download(config)?;
    validate_discovery(config)?;
    Ok(())
}

/// Months must be real months and the range must not run backwards
fn validate_range(config: &Config) -> Result<(), ValidationError> {
    let range = &config.range;

    for (field, value) in [
        ("start_month", range.start_month),
        ("end_month", range.end_month),
    ] {
        if !(1..=12).contains(&value) {
            return Err(ValidationError::InvalidMonth { field, value });
        }
    }

    if (range.start_year, range.start_month) > (range.end_year, range.end_month) {
        return Err(ValidationError::InvertedRange {
            start: format!("{}-{:02}", range.start_year, range.start_month),
            end: format!("{}-{:02}", range.end_year, range.end_month),
        });
    }

    Ok(())
}

fn validate_source(config: &Config) -> Result<(), ValidationError> {
    let source = &config.source;

    url::Url::parse(&source.base_url).map_err(|e| ValidationError::InvalidBaseUrl {
        url: source.base_url.clone(),
        reason: e.to_string(),
    })?;

    if source.target_file_patterns.is_empty() {
        return Err(ValidationError::NoTargetPatterns);
    }

    for pattern in &source.target_file_patterns {
        Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

fn validate_download(config: &Config) -> Result<(), ValidationError> {
    let download = &config.download;

    if download.max_concurrent_requests == 0 {
        return Err(ValidationError::MustBePositive {
            field: "max_concurrent_requests",
        });
    }

    if download.max_attempts == 0 {
        return Err(ValidationError::MustBePositive {
            field: "download.max_attempts",
        });
    }

    if download.max_requests_per_second == Some(0) {
        return Err(ValidationError::MustBePositive {
            field: "max_requests_per_second",
        });
    }

    if !download.backoff_factor.is_finite() || download.backoff_factor < 1.0 {
        return Err(ValidationError::InvalidBackoffFactor(download.backoff_factor));
    }

    Ok(())
}

fn validate_discovery(config: &Config) -> Result<(), ValidationError> {
    if config.discovery.max_attempts == 0 {
        return Err(ValidationError::MustBePositive {
            field: "discovery.max_attempts",
        });
    }

    Ok(())
}
