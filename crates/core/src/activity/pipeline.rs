//! The four pipeline activities.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use super::config::PipelineConfig;
use super::types::{
    ActivityError, ActivityInput, ActivityOutput, ParseStoreOutput, ProcessingMetadata,
    StoreMetadataOutput, StoreRawOutput,
};
use super::upload::upload_articles;
use crate::feed::{parse_feed, validate_category, FeedSource, FetchedFeed};
use crate::storage::{keys, StoreGateway};

/// Content type of the metadata object.
const METADATA_CONTENT_TYPE: &str = "application/json";

/// Pipeline activities.
///
/// Each activity is a function from its input to an output or an error, with
/// no state shared between invocations beyond the object store. All of them
/// are safe to re-run: writes overwrite the same keys with the same bytes.
#[derive(Clone)]
pub struct Activities {
    feed: Arc<dyn FeedSource>,
    gateway: StoreGateway,
    config: PipelineConfig,
}

impl Activities {
    pub fn new(feed: Arc<dyn FeedSource>, gateway: StoreGateway, config: PipelineConfig) -> Self {
        Self {
            feed,
            gateway,
            config,
        }
    }

    pub fn gateway(&self) -> &StoreGateway {
        &self.gateway
    }

    /// Run the activity described by `input`.
    pub async fn invoke(&self, input: ActivityInput) -> Result<ActivityOutput, ActivityError> {
        match input {
            ActivityInput::Fetch { category } => self.fetch(&category).await.map(ActivityOutput::Fetch),
            ActivityInput::StoreRaw {
                category,
                process_date,
                feed,
            } => self
                .store_raw(&category, process_date, &feed)
                .await
                .map(ActivityOutput::StoreRaw),
            ActivityInput::ParseAndStore {
                category,
                process_date,
                raw_key,
            } => self
                .parse_and_store(&category, process_date, &raw_key)
                .await
                .map(ActivityOutput::ParseAndStore),
            ActivityInput::StoreMetadata { metadata } => self
                .store_metadata(&metadata)
                .await
                .map(ActivityOutput::StoreMetadata),
        }
    }

    /// Fetch the raw feed for a category.
    pub async fn fetch(&self, category: &str) -> Result<FetchedFeed, ActivityError> {
        validate_category(category).map_err(ActivityError::InvalidInput)?;
        Ok(self.feed.fetch(category).await?)
    }

    /// Store the raw feed payload under `{category}/ProcessDate={date}/raw.xml`.
    pub async fn store_raw(
        &self,
        category: &str,
        process_date: NaiveDate,
        feed: &FetchedFeed,
    ) -> Result<StoreRawOutput, ActivityError> {
        let key = keys::raw_key(category, process_date);
        let bytes = feed.body.as_slice();
        let location = self
            .gateway
            .write(&key, &feed.content_type, bytes)
            .await?;

        let sha256 = format!("{:x}", Sha256::digest(bytes));
        info!(key = %key, bytes = bytes.len(), "Stored raw feed");

        Ok(StoreRawOutput {
            key,
            location,
            bytes: bytes.len() as u64,
            sha256,
        })
    }

    /// Read the raw payload back, parse it and write one object per article.
    ///
    /// Individual write failures are reported in the outcomes; only a parse
    /// failure or an unreadable raw payload fails the activity.
    pub async fn parse_and_store(
        &self,
        category: &str,
        process_date: NaiveDate,
        raw_key: &str,
    ) -> Result<ParseStoreOutput, ActivityError> {
        let raw = self.gateway.read(raw_key).await?;
        let parsed = parse_feed(&raw)?;

        let total_entries = parsed.total_entries;
        let parsed_articles = parsed.articles.len();
        let skipped_entries = parsed.skipped.len();

        let outcomes = upload_articles(
            &self.gateway,
            category,
            process_date,
            parsed.articles,
            self.config.max_concurrent_writes,
        )
        .await;

        let successful_writes = outcomes.iter().filter(|o| o.success).count();
        let failed_writes = outcomes.len() - successful_writes;

        info!(
            category = %category,
            process_date = %process_date,
            total_entries,
            parsed_articles,
            skipped_entries,
            successful_writes,
            failed_writes,
            "Stored parsed articles"
        );

        Ok(ParseStoreOutput {
            total_entries,
            parsed_articles,
            skipped_entries,
            successful_writes,
            failed_writes,
            outcomes,
        })
    }

    /// Write the processing summary.
    pub async fn store_metadata(
        &self,
        metadata: &ProcessingMetadata,
    ) -> Result<StoreMetadataOutput, ActivityError> {
        let key = keys::metadata_key(&metadata.category, metadata.process_date);
        let bytes = serde_json::to_vec_pretty(metadata)?;
        let location = self
            .gateway
            .write(&key, METADATA_CONTENT_TYPE, &bytes)
            .await?;

        info!(key = %key, "Stored processing metadata");
        Ok(StoreMetadataOutput { key, location })
    }
}
