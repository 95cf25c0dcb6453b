//! Pipeline activities.
//!
//! Activities are the independently retriable units the orchestrator
//! schedules: fetch, store-raw, parse-and-store and store-metadata.

mod config;
mod pipeline;
mod types;
mod upload;

pub use config::PipelineConfig;
pub use pipeline::Activities;
pub use types::{
    ActivityError, ActivityInput, ActivityOutput, ArticleWriteOutcome, ParseStoreOutput,
    PipelineStep, ProcessingMetadata, StoreMetadataOutput, StoreRawOutput,
};
pub use upload::{upload_articles, ARTICLE_CONTENT_TYPE};
