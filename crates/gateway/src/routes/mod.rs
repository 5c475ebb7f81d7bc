//! HTTP routes

pub mod chat;
pub mod documents;
pub mod jobs;
pub mod models;
pub mod sessions;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_models))
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:id", delete(sessions::delete_session))
        .route("/v1/documents/ingest", post(documents::ingest_document))
        .route("/v1/codebase/ingest", post(documents::ingest_codebase))
        .route("/v1/documents/:id/download", get(documents::download_document))
        .route("/v1/jobs", get(jobs::list_jobs))
        .route("/v1/jobs/:id", get(jobs::get_job))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
