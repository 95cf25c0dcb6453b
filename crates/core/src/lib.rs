pub mod activity;
pub mod config;
pub mod feed;
pub mod history;
pub mod orchestrator;
pub mod simplify;
pub mod storage;
pub mod testing;

pub use activity::{
    Activities, ActivityError, ActivityInput, ActivityOutput, ArticleWriteOutcome,
    PipelineConfig, PipelineStep, ProcessingMetadata,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use feed::{
    parse_feed, ArticleRecord, FeedSource, FetchError, FetchedFeed, HttpFeedSource, ParseError,
};
pub use history::{
    HistoryEntry, HistoryEvent, JobFilter, JobInput, JobRecord, JobResult, JobStore,
    JobStoreError, OrchestrationState, RuntimeStatus, SqliteJobStore,
};
pub use orchestrator::{JobOrchestrator, OrchestratorError, RetryConfig};
pub use simplify::{LlmClient, LlmConfig, OpenAiCompatClient, Simplifier, SimplifyError};
pub use storage::{FsObjectStore, ObjectInfo, ObjectStore, StorageError, StoreGateway};
