//! Types for the job orchestrator.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::activity::{ActivityInput, PipelineStep};
use crate::history::{JobResult, JobStoreError, RuntimeStatus};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Operation requires a job that is still running.
    #[error("job {id} is already {status}")]
    AlreadyTerminal { id: String, status: RuntimeStatus },

    /// Operation requires a job that has finished.
    #[error("job {id} is still {status}")]
    NotTerminal { id: String, status: RuntimeStatus },

    /// Job input rejected.
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    /// Job store error.
    #[error("job store error: {0}")]
    Store(JobStoreError),

    /// Timed out waiting for a job.
    #[error("timed out waiting for job {0}")]
    Timeout(String),
}

impl From<JobStoreError> for OrchestratorError {
    fn from(e: JobStoreError) -> Self {
        match e {
            JobStoreError::NotFound(id) => OrchestratorError::NotFound(id),
            JobStoreError::AlreadyTerminal { id, status } => {
                OrchestratorError::AlreadyTerminal { id, status }
            }
            other => OrchestratorError::Store(other),
        }
    }
}

/// What the runner should do next, derived from a job's history.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run `step` as attempt `attempt`, after waiting `backoff`.
    Schedule {
        step: PipelineStep,
        attempt: u32,
        input: ActivityInput,
        backoff: Duration,
    },
    /// All steps done.
    Complete(JobResult),
    /// An activity failed for good, or history is inconsistent.
    Fail(String),
    /// Termination was requested.
    Terminate(String),
    /// History already ends in a terminal event.
    Finished,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Jobs with an attached runner in this process.
    pub live_jobs: usize,
}
