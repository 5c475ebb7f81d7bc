//! Document and codebase ingestion
//!
//! Uploads are compressed into the blob store, a job row is created in
//! `queued`, and the job is published to the ingest stream. The endpoints
//! accept and return immediately; outcomes are read via the job API.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use mnemo_core::workspace::sanitize_workspace;
use mnemo_core::{CodebaseIngestResponse, DocumentIngestResponse, JobStatus, JobType};

use crate::error::ApiError;
use crate::state::AppState;

struct Upload {
    file_name: String,
    content_type: Option<String>,
    content: Vec<u8>,
}

fn workspace_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-workspace")
        .and_then(|value| value.to_str().ok())
        .map(sanitize_workspace)
        .unwrap_or_else(|| "default".to_string())
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?
            .to_vec();
        return Ok(Upload {
            file_name,
            content_type,
            content,
        });
    }
    Err(ApiError::BadRequest("Missing `file` field".to_string()))
}

pub async fn ingest_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DocumentIngestResponse>, ApiError> {
    let workspace = workspace_from_headers(&headers);
    let upload = read_file_field(&mut multipart).await?;

    let doc_id = Uuid::new_v4().to_string();
    let job_id = Uuid::new_v4().to_string();

    let stored = state
        .documents
        .store(
            &doc_id,
            &workspace,
            &upload.file_name,
            upload.content_type.as_deref(),
            &upload.content,
            None,
        )
        .await?;

    state
        .jobs
        .create(&job_id, &doc_id, &workspace, JobType::Document.as_str())
        .await?;
    state.queue.publish(&job_id, JobType::Document).await?;

    Ok(Json(DocumentIngestResponse {
        doc_id,
        job_id,
        file_name: upload.file_name,
        workspace,
        original_size: stored.original_size,
        compressed_size: stored.compressed_size,
        status: JobStatus::Queued.to_string(),
    }))
}

/// Ingest an entire codebase from a tar or zip archive
pub async fn ingest_codebase(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<CodebaseIngestResponse>, ApiError> {
    let workspace = workspace_from_headers(&headers);
    let upload = read_file_field(&mut multipart).await?;
    let archive_name = if upload.file_name == "unknown" {
        "codebase.tar.gz".to_string()
    } else {
        upload.file_name
    };

    let doc_id = Uuid::new_v4().to_string();
    let job_id = Uuid::new_v4().to_string();

    let stored = state
        .documents
        .store(
            &doc_id,
            &workspace,
            &archive_name,
            upload.content_type.as_deref().or(Some("application/gzip")),
            &upload.content,
            Some(json!({"type": "codebase"})),
        )
        .await?;

    state
        .jobs
        .create(&job_id, &doc_id, &workspace, JobType::Codebase.as_str())
        .await?;
    state.queue.publish(&job_id, JobType::Codebase).await?;

    Ok(Json(CodebaseIngestResponse {
        doc_id,
        job_id,
        workspace,
        archive_name,
        original_size: stored.original_size,
        compressed_size: stored.compressed_size,
        status: JobStatus::Queued.to_string(),
    }))
}

/// Download the original (gunzipped) bytes of a stored document
pub async fn download_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let Some((blob, content)) = state.documents.fetch_decompressed(&doc_id).await? else {
        return Err(ApiError::NotFound(format!("Document {doc_id}")));
    };

    Response::builder()
        .header(
            CONTENT_TYPE,
            blob.content_type.as_deref().unwrap_or("application/octet-stream"),
        )
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", blob.file_name),
        )
        .header(CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
