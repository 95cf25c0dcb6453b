//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header::HOST, HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use feedline_core::{
    history::DEFAULT_CATEGORY, HistoryEntry, JobFilter, JobInput, JobRecord, JobResult,
    OrchestrationState, OrchestratorError, RuntimeStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

/// Reason recorded when a terminate request names none.
const DEFAULT_TERMINATE_REASON: &str = "terminated via API";

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a job
#[derive(Debug, Deserialize)]
pub struct StartJobBody {
    pub category: Option<String>,
    #[serde(rename = "ProcessDate", alias = "process_date")]
    pub process_date: Option<String>,
}

/// Management URIs returned when a job is accepted
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedResponse {
    pub id: String,
    pub status_query_get_uri: String,
    pub send_event_post_uri: String,
    pub terminate_post_uri: String,
    pub purge_history_delete_uri: String,
}

/// Job status as seen by clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub runtime_status: RuntimeStatus,
    pub state: OrchestrationState,
    pub input: JobInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub last_updated_at: String,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(job: JobRecord) -> Self {
        Self {
            id: job.id,
            runtime_status: job.runtime_status,
            state: job.state,
            input: job.input,
            output: job.output,
            error: job.error,
            created_at: job.created_at.to_rfc3339(),
            last_updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Comma-separated runtime statuses, e.g. `Running,Pending`
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobStatusResponse>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub id: String,
    pub events: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TerminateParams {
    pub reason: Option<String>,
}

/// Acknowledgement for terminate, event and purge requests
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub id: String,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a job for a category and process date
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<StartJobBody>,
) -> Result<(StatusCode, Json<JobStartedResponse>), ApiError> {
    let raw_date = body
        .process_date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| bad_request("ProcessDate is required (YYYY-MM-DD)"))?;
    let process_date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
        .map_err(|_| bad_request(format!("Invalid ProcessDate '{}', expected YYYY-MM-DD", raw_date)))?;
    let category = body
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let job = state
        .orchestrator()
        .start_job(JobInput::new(category, process_date))
        .await
        .map_err(orchestrator_error)?;

    let base = format!("{}/api/v1/jobs/{}", origin(&headers), job.id);
    Ok((
        StatusCode::ACCEPTED,
        Json(JobStartedResponse {
            id: job.id,
            status_query_get_uri: base.clone(),
            send_event_post_uri: format!("{}/events/{{eventName}}", base),
            terminate_post_uri: format!("{}/terminate?reason={{text}}", base),
            purge_history_delete_uri: base,
        }),
    ))
}

/// Get a job's status
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state.orchestrator().status(&id).map_err(orchestrator_error)?;
    Ok(Json(JobStatusResponse::from(job)))
}

/// List jobs, optionally filtered by runtime status
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref statuses) = params.status {
        for name in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let status = RuntimeStatus::parse(name)
                .ok_or_else(|| bad_request(format!("Unknown runtime status: {}", name)))?;
            filter = filter.with_status(status);
        }
    }

    let jobs = state.orchestrator().list(&filter).map_err(orchestrator_error)?;
    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobStatusResponse::from).collect(),
        limit,
        offset,
    }))
}

/// Full event history of a job
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let events = state.orchestrator().history(&id).map_err(orchestrator_error)?;
    Ok(Json(HistoryResponse { id, events }))
}

/// Record an external event against a job
pub async fn raise_event(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    body: Option<Json<Value>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let payload = body.map(|Json(v)| v).unwrap_or(Value::Null);
    state
        .orchestrator()
        .raise_event(&id, &name, payload)
        .await
        .map_err(orchestrator_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            id,
            message: format!("Event '{}' recorded", name),
        }),
    ))
}

/// Request termination of a running job
pub async fn terminate_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<TerminateParams>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let reason = params
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TERMINATE_REASON.to_string());

    state
        .orchestrator()
        .terminate(&id, &reason)
        .await
        .map_err(orchestrator_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            id,
            message: "Termination requested".to_string(),
        }),
    ))
}

/// Delete a finished job and its history
pub async fn purge_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AcceptedResponse>, ApiError> {
    state
        .orchestrator()
        .purge(&id)
        .await
        .map_err(orchestrator_error)?;

    Ok(Json(AcceptedResponse {
        id,
        message: "Job history purged".to_string(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

fn orchestrator_error(e: OrchestratorError) -> ApiError {
    let status = match &e {
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::AlreadyTerminal { .. } | OrchestratorError::NotTerminal { .. } => {
            StatusCode::CONFLICT
        }
        OrchestratorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        OrchestratorError::Store(_) => {
            warn!(error = %e, "Job store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(e.to_string())))
}

/// `http://host` from the request, or empty for relative URIs.
fn origin(headers: &HeaderMap) -> String {
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_default()
}
