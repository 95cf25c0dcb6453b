//! Mock feed source for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::feed::{FeedSource, FetchError, FetchedFeed, DEFAULT_CONTENT_TYPE};

/// Mock implementation of the FeedSource trait.
///
/// Provides controllable behavior for testing:
/// - Canned feed bodies per category
/// - Permanent failure, or failure for the next N calls
/// - Call counting
/// - Simulated latency
///
/// # Example
///
/// ```rust,ignore
/// use feedline_core::testing::{fixtures, MockFeedSource};
///
/// let source = MockFeedSource::new();
/// source.set_feed("cs", fixtures::sample_feed(3, 0)).await;
///
/// let feed = source.fetch("cs").await?;
/// assert_eq!(source.fetch_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockFeedSource {
    /// Feed bodies by category.
    feeds: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// If set, every fetch fails with this error.
    failure: Arc<RwLock<Option<FetchError>>>,
    /// Remaining fetches that fail before responses are served normally.
    failures_remaining: Arc<RwLock<Option<(usize, FetchError)>>>,
    /// Simulated fetch latency.
    delay: Arc<RwLock<Option<Duration>>>,
    /// Number of fetch calls, including failed ones.
    calls: AtomicUsize,
}

impl MockFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `category`.
    pub async fn set_feed(&self, category: &str, body: impl Into<Vec<u8>>) {
        self.feeds
            .write()
            .await
            .insert(category.to_string(), body.into());
    }

    /// Fail every fetch with `error`.
    pub async fn set_failure(&self, error: FetchError) {
        *self.failure.write().await = Some(error);
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Fail the next `count` fetches with `error`.
    pub async fn fail_next(&self, count: usize, error: FetchError) {
        *self.failures_remaining.write().await = Some((count, error));
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, category: &str) -> Result<FetchedFeed, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }

        {
            let mut remaining = self.failures_remaining.write().await;
            if let Some((count, error)) = remaining.as_mut() {
                if *count > 0 {
                    *count -= 1;
                    return Err(error.clone());
                }
            }
        }

        let source_url = format!("mock://feeds/{}", category);
        match self.feeds.read().await.get(category) {
            Some(body) => Ok(FetchedFeed {
                category: category.to_string(),
                source_url,
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                body: body.clone(),
                fetched_at: Utc::now(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: source_url,
            }),
        }
    }
}
