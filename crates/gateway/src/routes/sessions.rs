//! Session listing and deletion

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use mnemo_core::SessionInfo;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub workspace: Option<String>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = state.sessions.list_sessions(query.workspace.as_deref()).await?;
    let sessions: Vec<SessionInfo> = rows
        .into_iter()
        .map(|row| SessionInfo {
            id: row.id,
            workspace: row.workspace,
            model: row.model,
            turn_count: row.turn_count.unwrap_or(0),
            created_at: row.created_at.to_rfc3339(),
            updated_at: row.updated_at.to_rfc3339(),
            summary: row.summary,
        })
        .collect();
    Ok(Json(json!({ "sessions": sessions })))
}

/// Delete a session from both the short-term buffer and the persistent
/// store
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.sessions.session_info(&session_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Session {session_id}")));
    }

    if let Err(e) = state.short_term.delete(&session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "Short-term delete failed");
    }
    state.sessions.delete_session(&session_id).await?;

    Ok(Json(json!({ "deleted": session_id })))
}
