//! Bounded concurrent article upload.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::types::ArticleWriteOutcome;
use crate::feed::ArticleRecord;
use crate::storage::{keys, StoreGateway};

/// Content type of stored article objects.
pub const ARTICLE_CONTENT_TYPE: &str = "application/json";

/// Write every article as its own object with at most `max_concurrent`
/// writes in flight.
///
/// Returns exactly one outcome per input article. A failed or panicked write
/// becomes a failed outcome; siblings keep going. Order is not preserved.
pub async fn upload_articles(
    gateway: &StoreGateway,
    category: &str,
    process_date: NaiveDate,
    articles: Vec<ArticleRecord>,
    max_concurrent: usize,
) -> Vec<ArticleWriteOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();
    // (identifier, key) per spawned task; cleared when the task reports.
    let mut pending: Vec<Option<(String, String)>> = Vec::with_capacity(articles.len());
    let mut outcomes = Vec::with_capacity(articles.len());

    for (index, article) in articles.into_iter().enumerate() {
        let key = keys::article_key(category, process_date, &article);
        pending.push(Some((article.identifier.clone(), key.clone())));

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                pending[index] = None;
                outcomes.push(ArticleWriteOutcome {
                    identifier: article.identifier,
                    success: false,
                    key,
                    error: Some(format!("upload slot unavailable: {}", e)),
                });
                continue;
            }
        };

        let gateway = gateway.clone();
        tasks.spawn(async move {
            let _permit = permit;
            (index, write_article(&gateway, key, article).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                pending[index] = None;
                outcomes.push(outcome);
            }
            Err(e) => {
                error!(error = %e, "Article write task did not complete");
            }
        }
    }

    // Anything still pending belonged to a task that panicked or was cancelled.
    for (identifier, key) in pending.into_iter().flatten() {
        outcomes.push(ArticleWriteOutcome {
            identifier,
            success: false,
            key,
            error: Some("write task did not complete".to_string()),
        });
    }

    outcomes
}

async fn write_article(
    gateway: &StoreGateway,
    key: String,
    article: ArticleRecord,
) -> ArticleWriteOutcome {
    let result = match serde_json::to_vec_pretty(&article) {
        Ok(bytes) => gateway
            .write(&key, ARTICLE_CONTENT_TYPE, &bytes)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(_) => {
            debug!(identifier = %article.identifier, key = %key, "Stored article");
            ArticleWriteOutcome {
                identifier: article.identifier,
                success: true,
                key,
                error: None,
            }
        }
        Err(error) => {
            warn!(identifier = %article.identifier, key = %key, error = %error, "Article write failed");
            ArticleWriteOutcome {
                identifier: article.identifier,
                success: false,
                key,
                error: Some(error),
            }
        }
    }
}
