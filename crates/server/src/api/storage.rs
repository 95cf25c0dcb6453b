//! Stored object inspection.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use feedline_core::{ObjectInfo, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListObjectsParams {
    /// Key prefix, e.g. `cs/ProcessDate=2024-01-01/`
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Serialize)]
pub struct ListObjectsResponse {
    pub container: String,
    pub prefix: String,
    pub count: usize,
    pub objects: Vec<ObjectInfo>,
}

/// List objects under a prefix
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListObjectsParams>,
) -> Result<Json<ListObjectsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let gateway = state.gateway();
    let objects = gateway
        .list(&params.prefix)
        .await
        .map_err(storage_error)?;

    Ok(Json(ListObjectsResponse {
        container: gateway.container().to_string(),
        prefix: params.prefix,
        count: objects.len(),
        objects,
    }))
}

/// Fetch one object's bytes
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let bytes = state.gateway().read(&key).await.map_err(storage_error)?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], bytes).into_response())
}

fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".json") {
        "application/json"
    } else if key.ends_with(".xml") {
        "application/rss+xml"
    } else {
        "application/octet-stream"
    }
}

fn storage_error(e: StorageError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        StorageError::NotFound { .. } | StorageError::ContainerNotFound(_) => StatusCode::NOT_FOUND,
        StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(e.to_string())))
}
