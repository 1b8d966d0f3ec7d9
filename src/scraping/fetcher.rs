//! Fetch engine for listing pages
//!
//! A thin wrapper over a shared reqwest client that classifies responses:
//! 429 is reported as `RateLimited`, any other non-2xx as `Status`. Nothing is
//! retried; callers decide whether to rerun.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("requests are rate limited")]
    RateLimited,
    #[error("bad response from server: {0}")]
    Status(u16),
}

/// Source of listing page bodies
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body
    async fn fetch_page(&self, url: &Url) -> Result<String, FetchError>;
}

/// Configuration for the fetch engine
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            max_redirects: 10,
        }
    }
}

impl From<&crate::config::ScrapingConfig> for FetchConfig {
    fn from(config: &crate::config::ScrapingConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout_secs.map(Duration::from_secs),
            ..Self::default()
        }
    }
}

/// HTTP fetch engine
pub struct FetchEngine {
    http_client: reqwest::Client,
}

impl FetchEngine {
    /// Create a new fetch engine
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }

    /// Shared client, reused for export downloads
    pub fn client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

#[async_trait]
impl PageFetcher for FetchEngine {
    async fn fetch_page(&self, url: &Url) -> Result<String, FetchError> {
        let start = Instant::now();
        let response = self.http_client.get(url.as_str()).send().await?;

        classify_status(response.status().as_u16())?;

        let body = response.text().await?;
        tracing::debug!(
            "Fetched {} ({} bytes in {:?})",
            url,
            body.len(),
            start.elapsed()
        );
        Ok(body)
    }
}

/// Map a status code onto the fetch error taxonomy
pub fn classify_status(status: u16) -> Result<(), FetchError> {
    match status {
        200..=299 => Ok(()),
        429 => Err(FetchError::RateLimited),
        other => Err(FetchError::Status(other)),
    }
}
