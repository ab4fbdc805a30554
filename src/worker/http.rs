//! HTTP session shared by discovery and downloads for one pipeline run

use bytes::Bytes;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::DownloadConfig;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl DownloadError {
    fn from_status(status: StatusCode) -> Self {
        DownloadError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// HTTP status carried by this error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadError::Timeout
        } else if e.is_redirect() {
            DownloadError::TooManyRedirects
        } else {
            DownloadError::RequestFailed(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub max_requests_per_second: Option<u32>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for HttpConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
            max_requests_per_second: config.max_requests_per_second,
        }
    }
}

/// One reqwest client plus the optional request rate limit
///
/// Built once at the start of a run and handed to every component behind an `Arc`.
pub struct HttpSession {
    client: Client,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl HttpSession {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        let limiter = config
            .max_requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        Ok(Self { client, limiter })
    }

    /// GET returning the body only on HTTP 200
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self.send(url).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::from_status(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Body(e.to_string()))?;

        debug!(url, size = bytes.len(), "Download completed");

        Ok(bytes)
    }

    /// GET returning the decoded body only on HTTP 200
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.send(url).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::from_status(status));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadError::Body(e.to_string()))
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        debug!(url, "Sending request");

        let response = self.client.get(url).send().await?;

        debug!(url, status = response.status().as_u16(), "HTTP response");

        Ok(response)
    }
}
