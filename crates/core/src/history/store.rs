//! Job store trait and types.

use thiserror::Error;

use super::types::{HistoryEntry, HistoryEvent, JobInput, JobRecord, RuntimeStatus};

/// Error type for job store operations.
#[derive(Debug, Clone, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Only `EventRaised` may be appended after a terminal event.
    #[error("Job {id} is already {status}")]
    AlreadyTerminal { id: String, status: RuntimeStatus },

    /// No activity may be scheduled once termination has been requested.
    #[error("Job {0} has a pending termination request")]
    TerminationPending(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for JobStoreError {
    fn from(e: rusqlite::Error) -> Self {
        JobStoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for JobStoreError {
    fn from(e: serde_json::Error) -> Self {
        JobStoreError::Serialization(e.to_string())
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Only jobs in one of these statuses. Empty means any.
    pub statuses: Vec<RuntimeStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            statuses: Vec::new(),
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: RuntimeStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Jobs that have not reached a terminal status.
    pub fn incomplete() -> Self {
        Self::new()
            .with_status(RuntimeStatus::Pending)
            .with_status(RuntimeStatus::Running)
            .with_limit(i64::MAX)
    }
}

/// Durable storage for jobs and their history.
///
/// `append` is the only way a job changes: it adds the event to the history
/// and updates the job projection atomically.
pub trait JobStore: Send + Sync {
    /// Create a new pending job with an empty history.
    fn create(&self, input: &JobInput) -> Result<JobRecord, JobStoreError>;

    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobStoreError>;

    /// List jobs, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, JobStoreError>;

    /// Append an event and return the updated job.
    fn append(&self, id: &str, event: &HistoryEvent) -> Result<JobRecord, JobStoreError>;

    /// Full history in sequence order.
    fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, JobStoreError>;

    /// Delete a job and its history. Returns false if it did not exist.
    fn purge(&self, id: &str) -> Result<bool, JobStoreError>;
}
