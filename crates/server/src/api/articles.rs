//! Article simplification handler.

use axum::{extract::State, http::StatusCode, Json};
use feedline_core::{simplify::SimplifiedArticle, SimplifyError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SimplifyBody {
    /// Object key of a stored article, e.g. `cs/ProcessDate=2024-01-01/2401.00001v1.json`
    pub key: String,
}

/// Rewrite a stored article's description in plain language
pub async fn simplify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SimplifyBody>,
) -> Result<Json<SimplifiedArticle>, (StatusCode, Json<ErrorResponse>)> {
    let Some(simplifier) = state.simplifier() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Text simplification is not configured")),
        ));
    };

    if body.key.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("key is required")),
        ));
    }

    simplifier.simplify(body.key.trim()).await.map(Json).map_err(|e| {
        let status = match &e {
            SimplifyError::NotFound(_) => StatusCode::NOT_FOUND,
            SimplifyError::EmptyDescription(_) | SimplifyError::InvalidArticle(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SimplifyError::Llm(_) | SimplifyError::EmptyResponse => StatusCode::BAD_GATEWAY,
            SimplifyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(key = %body.key, error = %e, "Simplification failed");
        (status, Json(ErrorResponse::new(e.to_string())))
    })
}
