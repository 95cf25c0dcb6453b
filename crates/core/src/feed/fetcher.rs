//! HTTP feed source.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{validate_category, FetchedFeed, DEFAULT_CONTENT_TYPE};
use crate::config::FeedConfig;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Errors from fetching a feed.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out after {0}s")]
    Timeout(u32),

    #[error("feed server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("{0}")]
    InvalidCategory(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Timeout(_) | FetchError::Status { .. } => true,
            FetchError::TooLarge { .. } | FetchError::InvalidCategory(_) | FetchError::Client(_) => {
                false
            }
        }
    }
}

/// Source of raw feed documents.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Source identifier for logging.
    fn name(&self) -> &str;

    /// Fetch the raw feed for a category.
    async fn fetch(&self, category: &str) -> Result<FetchedFeed, FetchError>;
}

/// Fetches feeds over HTTP from `{base_url}/{category}`.
pub struct HttpFeedSource {
    client: Client,
    config: FeedConfig,
}

impl HttpFeedSource {
    pub fn new(config: FeedConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn request_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.timeout_secs)
        } else {
            FetchError::Http(e.to_string())
        }
    }

    /// URL the feed for `category` is fetched from.
    pub fn feed_url(&self, category: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(category)
        )
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, category: &str) -> Result<FetchedFeed, FetchError> {
        validate_category(category).map_err(FetchError::InvalidCategory)?;

        let url = self.feed_url(category);
        let max = self.config.max_body_bytes;
        debug!(url = %url, "Fetching feed");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        if let Some(len) = response.content_length() {
            if len > max {
                return Err(FetchError::TooLarge { size: len, max });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.request_error(e))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > max {
                return Err(FetchError::TooLarge { size, max });
            }
            body.extend_from_slice(&chunk);
        }

        info!(
            category = %category,
            url = %url,
            bytes = body.len(),
            "Fetched feed"
        );

        Ok(FetchedFeed {
            category: category.to_string(),
            source_url: url,
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }
}
