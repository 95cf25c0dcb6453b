//! Activity inputs, outputs and errors.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::{FetchError, FetchedFeed, ParseError};
use crate::storage::StorageError;

/// The pipeline's steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Fetch,
    StoreRaw,
    ParseAndStore,
    StoreMetadata,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 4] = [
        PipelineStep::Fetch,
        PipelineStep::StoreRaw,
        PipelineStep::ParseAndStore,
        PipelineStep::StoreMetadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Fetch => "fetch",
            PipelineStep::StoreRaw => "store_raw",
            PipelineStep::ParseAndStore => "parse_and_store",
            PipelineStep::StoreMetadata => "store_metadata",
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for one activity invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ActivityInput {
    Fetch {
        category: String,
    },
    StoreRaw {
        category: String,
        process_date: NaiveDate,
        feed: FetchedFeed,
    },
    ParseAndStore {
        category: String,
        process_date: NaiveDate,
        raw_key: String,
    },
    StoreMetadata {
        metadata: ProcessingMetadata,
    },
}

impl ActivityInput {
    pub fn step(&self) -> PipelineStep {
        match self {
            ActivityInput::Fetch { .. } => PipelineStep::Fetch,
            ActivityInput::StoreRaw { .. } => PipelineStep::StoreRaw,
            ActivityInput::ParseAndStore { .. } => PipelineStep::ParseAndStore,
            ActivityInput::StoreMetadata { .. } => PipelineStep::StoreMetadata,
        }
    }
}

/// Output of a successful activity invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ActivityOutput {
    Fetch(FetchedFeed),
    StoreRaw(StoreRawOutput),
    ParseAndStore(ParseStoreOutput),
    StoreMetadata(StoreMetadataOutput),
}

impl ActivityOutput {
    pub fn step(&self) -> PipelineStep {
        match self {
            ActivityOutput::Fetch(_) => PipelineStep::Fetch,
            ActivityOutput::StoreRaw(_) => PipelineStep::StoreRaw,
            ActivityOutput::ParseAndStore(_) => PipelineStep::ParseAndStore,
            ActivityOutput::StoreMetadata(_) => PipelineStep::StoreMetadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRawOutput {
    pub key: String,
    pub location: String,
    pub bytes: u64,
    /// Hex SHA-256 of the stored payload.
    pub sha256: String,
}

/// Result of writing one article object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleWriteOutcome {
    pub identifier: String,
    pub success: bool,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStoreOutput {
    pub total_entries: usize,
    pub parsed_articles: usize,
    pub skipped_entries: usize,
    pub successful_writes: usize,
    pub failed_writes: usize,
    pub outcomes: Vec<ArticleWriteOutcome>,
}

impl ParseStoreOutput {
    pub fn failed_identifiers(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.identifier.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadataOutput {
    pub key: String,
    pub location: String,
}

/// Summary object written last for each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub category: String,
    pub process_date: NaiveDate,
    pub total_entries: usize,
    pub parsed_articles: usize,
    pub skipped_entries: usize,
    pub successful_writes: usize,
    pub failed_writes: usize,
    pub raw_key: String,
    pub source_url: String,
    pub processed_at: DateTime<Utc>,
}

/// Activity failures.
#[derive(Debug, Clone, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize object: {0}")]
    Serialization(String),

    #[error("Invalid activity input: {0}")]
    InvalidInput(String),
}

impl ActivityError {
    /// Whether the orchestrator may schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivityError::Fetch(e) => e.is_retryable(),
            ActivityError::Parse(_) => false,
            ActivityError::Storage(StorageError::InvalidKey(_)) => false,
            ActivityError::Storage(_) => true,
            ActivityError::Serialization(_) | ActivityError::InvalidInput(_) => false,
        }
    }
}

impl From<serde_json::Error> for ActivityError {
    fn from(e: serde_json::Error) -> Self {
        ActivityError::Serialization(e.to_string())
    }
}
