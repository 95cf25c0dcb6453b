use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{articles, handlers, jobs, storage};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/orchestrator/status", get(handlers::orchestrator_status))
        // Jobs
        .route("/jobs", post(jobs::start_job))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}", delete(jobs::purge_job))
        .route("/jobs/{id}/history", get(jobs::get_history))
        .route("/jobs/{id}/events/{name}", post(jobs::raise_event))
        .route("/jobs/{id}/terminate", post(jobs::terminate_job))
        // Stored objects
        .route("/storage/objects", get(storage::list_objects))
        .route("/storage/objects/{*key}", get(storage::get_object))
        // Articles
        .route("/articles/simplify", post(articles::simplify))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
