//! Job history events and the job projection built from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityOutput, PipelineStep};

/// Default feed category when a job does not name one.
pub const DEFAULT_CATEGORY: &str = "cs";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// What a job ingests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "ProcessDate", alias = "process_date")]
    pub process_date: NaiveDate,
}

impl JobInput {
    pub fn new(category: impl Into<String>, process_date: NaiveDate) -> Self {
        Self {
            category: category.into(),
            process_date,
        }
    }
}

/// Final output of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub category: String,
    pub process_date: NaiveDate,
    pub raw_key: String,
    pub metadata_key: String,
    pub total_entries: usize,
    pub parsed_articles: usize,
    pub skipped_entries: usize,
    pub successful_writes: usize,
    pub failed_writes: usize,
    #[serde(default)]
    pub failed_identifiers: Vec<String>,
}

/// Coarse lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Terminated,
}

impl RuntimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeStatus::Pending => "Pending",
            RuntimeStatus::Running => "Running",
            RuntimeStatus::Completed => "Completed",
            RuntimeStatus::Failed => "Failed",
            RuntimeStatus::Terminated => "Terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(RuntimeStatus::Pending),
            "running" => Some(RuntimeStatus::Running),
            "completed" => Some(RuntimeStatus::Completed),
            "failed" => Some(RuntimeStatus::Failed),
            "terminated" => Some(RuntimeStatus::Terminated),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RuntimeStatus::Completed | RuntimeStatus::Failed | RuntimeStatus::Terminated
        )
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained position of a job in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrchestrationState {
    Started,
    FetchPending,
    FetchDone,
    StorePending,
    StoreDone,
    ParseStorePending,
    ParseStoreDone,
    MetadataPending,
    Completed,
    Failed,
    Terminated,
}

impl OrchestrationState {
    pub fn pending_for(step: PipelineStep) -> Self {
        match step {
            PipelineStep::Fetch => OrchestrationState::FetchPending,
            PipelineStep::StoreRaw => OrchestrationState::StorePending,
            PipelineStep::ParseAndStore => OrchestrationState::ParseStorePending,
            PipelineStep::StoreMetadata => OrchestrationState::MetadataPending,
        }
    }

    /// State after `step` completes. Metadata has no "done" state: the job
    /// completes right after it.
    pub fn done_for(step: PipelineStep) -> Self {
        match step {
            PipelineStep::Fetch => OrchestrationState::FetchDone,
            PipelineStep::StoreRaw => OrchestrationState::StoreDone,
            PipelineStep::ParseAndStore => OrchestrationState::ParseStoreDone,
            PipelineStep::StoreMetadata => OrchestrationState::MetadataPending,
        }
    }
}

/// One entry in a job's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    OrchestratorStarted {
        input: JobInput,
    },
    ActivityScheduled {
        step: PipelineStep,
        attempt: u32,
    },
    ActivityCompleted {
        step: PipelineStep,
        output: ActivityOutput,
    },
    ActivityFailed {
        step: PipelineStep,
        attempt: u32,
        error: String,
        retryable: bool,
    },
    EventRaised {
        name: String,
        payload: serde_json::Value,
    },
    TerminationRequested {
        reason: String,
    },
    OrchestratorCompleted {
        result: JobResult,
    },
    OrchestratorFailed {
        reason: String,
    },
    OrchestratorTerminated {
        reason: String,
    },
}

impl HistoryEvent {
    /// Event type name as stored.
    pub fn event_type(&self) -> &'static str {
        match self {
            HistoryEvent::OrchestratorStarted { .. } => "orchestrator_started",
            HistoryEvent::ActivityScheduled { .. } => "activity_scheduled",
            HistoryEvent::ActivityCompleted { .. } => "activity_completed",
            HistoryEvent::ActivityFailed { .. } => "activity_failed",
            HistoryEvent::EventRaised { .. } => "event_raised",
            HistoryEvent::TerminationRequested { .. } => "termination_requested",
            HistoryEvent::OrchestratorCompleted { .. } => "orchestrator_completed",
            HistoryEvent::OrchestratorFailed { .. } => "orchestrator_failed",
            HistoryEvent::OrchestratorTerminated { .. } => "orchestrator_terminated",
        }
    }

    /// Whether this event ends the job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HistoryEvent::OrchestratorCompleted { .. }
                | HistoryEvent::OrchestratorFailed { .. }
                | HistoryEvent::OrchestratorTerminated { .. }
        )
    }
}

/// A persisted history event with its position and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sequence: i64,
    pub recorded_at: DateTime<Utc>,
    pub event: HistoryEvent,
}

/// Materialised view of a job, kept in step with its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub input: JobInput,
    pub runtime_status: RuntimeStatus,
    pub state: OrchestrationState,
    pub output: Option<JobResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: String, input: JobInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            input,
            runtime_status: RuntimeStatus::Pending,
            state: OrchestrationState::Started,
            output: None,
            error: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.runtime_status.is_terminal()
    }

    /// Fold one history event into the projection.
    pub fn apply(&mut self, event: &HistoryEvent, at: DateTime<Utc>) {
        match event {
            HistoryEvent::OrchestratorStarted { .. } => {
                self.runtime_status = RuntimeStatus::Running;
                self.state = OrchestrationState::Started;
            }
            HistoryEvent::ActivityScheduled { step, .. } => {
                self.runtime_status = RuntimeStatus::Running;
                self.state = OrchestrationState::pending_for(*step);
            }
            HistoryEvent::ActivityCompleted { step, .. } => {
                self.state = OrchestrationState::done_for(*step);
            }
            HistoryEvent::ActivityFailed { .. }
            | HistoryEvent::EventRaised { .. }
            | HistoryEvent::TerminationRequested { .. } => {}
            HistoryEvent::OrchestratorCompleted { result } => {
                self.runtime_status = RuntimeStatus::Completed;
                self.state = OrchestrationState::Completed;
                self.output = Some(result.clone());
                self.error = None;
            }
            HistoryEvent::OrchestratorFailed { reason } => {
                self.runtime_status = RuntimeStatus::Failed;
                self.state = OrchestrationState::Failed;
                self.error = Some(reason.clone());
            }
            HistoryEvent::OrchestratorTerminated { reason } => {
                self.runtime_status = RuntimeStatus::Terminated;
                self.state = OrchestrationState::Terminated;
                self.error = Some(reason.clone());
            }
        }
        self.updated_at = at;
    }
}
