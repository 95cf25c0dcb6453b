//! Durable job history.
//!
//! Every job is an append-only sequence of [`HistoryEvent`]s in SQLite. The
//! [`JobRecord`] projection is updated in the same transaction, so status
//! queries never see a half-applied event.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteJobStore;
pub use store::{JobFilter, JobStore, JobStoreError};
pub use types::{
    HistoryEntry, HistoryEvent, JobInput, JobRecord, JobResult, OrchestrationState, RuntimeStatus,
    DEFAULT_CATEGORY,
};
