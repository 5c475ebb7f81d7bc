//! Job status API

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use mnemo_core::JobStatusResponse;
use mnemo_persistence::JobRow;

use crate::error::ApiError;
use crate::state::AppState;

const MAX_LIST_LIMIT: i64 = 200;

fn to_response(row: JobRow) -> JobStatusResponse {
    JobStatusResponse {
        job_id: row.id,
        doc_id: row.doc_id,
        workspace: row.workspace,
        job_type: row.job_type,
        status: row.status,
        created_at: row.created_at.to_rfc3339(),
        started_at: row.started_at.map(|t| t.to_rfc3339()),
        completed_at: row.completed_at.map(|t| t.to_rfc3339()),
        error: row.error,
        result: row.result,
        attempts: row.attempts,
    }
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let Some(row) = state.jobs.get(&job_id).await? else {
        return Err(ApiError::NotFound(format!("Job {job_id}")));
    };
    Ok(Json(to_response(row)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);
    let rows = state
        .jobs
        .list(query.workspace.as_deref(), query.status.as_deref(), limit)
        .await?;

    let jobs: Vec<JobStatusResponse> = rows.into_iter().map(to_response).collect();
    let count = jobs.len();
    Ok(Json(json!({ "jobs": jobs, "count": count })))
}
