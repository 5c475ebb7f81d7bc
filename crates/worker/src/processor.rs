//! Job processing
//!
//! One message at a time: look up the job row, move it through the state
//! machine, and dispatch by type. Documents go to the preprocessor as a
//! single multipart call; codebases are unpacked and streamed in batches.
//! Per-batch errors accumulate in the job result without failing the job.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _};
use reqwest::multipart::{Form, Part};
use serde_json::json;

use mnemo_core::{IngestResponse, JobType};
use mnemo_extract::extract_archive;
use mnemo_persistence::{DocumentStore, JobStore};
use mnemo_queue::{ack, nak, term, JobPayload, Message};

/// Preprocessor call timeout
const PREPROCESSOR_TIMEOUT: Duration = Duration::from_secs(300);

pub struct WorkerContext {
    pub jobs: JobStore,
    pub documents: DocumentStore,
    pub http: reqwest::Client,
    pub preprocessor_url: String,
    pub batch_size: usize,
    pub max_redeliveries: i64,
}

/// Process a single queue message through the job state machine
pub async fn handle_message(ctx: &WorkerContext, message: &Message) {
    let payload = match serde_json::from_slice::<JobPayload>(&message.payload) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Invalid message payload, terminating");
            let _ = term(message).await;
            return;
        }
    };

    let job_id = payload.job_id.as_str();
    tracing::info!(job_id, job_type = %payload.job_type, "Processing job");

    let job = match ctx.jobs.get(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::error!(job_id, "Job not found in database, terminating");
            let _ = term(message).await;
            return;
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Job lookup failed, requeueing");
            let _ = nak(message).await;
            return;
        }
    };

    if job.is_completed() {
        tracing::info!(job_id, "Job already completed, skipping");
        let _ = ack(message).await;
        return;
    }

    if let Err(e) = ctx.jobs.mark_started(job_id).await {
        tracing::error!(job_id, error = %e, "Failed to mark job started, requeueing");
        let _ = nak(message).await;
        return;
    }

    let outcome = match effective_job_type(&job.job_type, payload.job_type) {
        JobType::Codebase => process_codebase(ctx, job_id, &job.doc_id).await,
        JobType::Document => process_document(ctx, job_id, &job.doc_id).await,
    };

    match outcome {
        Ok(result) => {
            if let Err(e) = ctx.jobs.mark_completed(job_id, &result).await {
                tracing::error!(job_id, error = %e, "Failed to record completion");
            }
            let _ = ack(message).await;
            tracing::info!(job_id, %result, "Job completed");
        }
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(job_id, error = %error, "Job failed");
            if let Err(db_err) = ctx.jobs.mark_failed(job_id, &error).await {
                tracing::error!(job_id, error = %db_err, "Failed to record job error");
            }

            let attempts = i64::from(job.attempts) + 1;
            if attempts >= ctx.max_redeliveries {
                let _ = term(message).await;
                tracing::error!(job_id, attempts, "Job permanently failed");
            } else {
                if let Err(db_err) = ctx.jobs.reset_queued(job_id).await {
                    tracing::error!(job_id, error = %db_err, "Failed to requeue job");
                }
                let _ = nak(message).await;
            }
        }
    }
}

/// Send one stored document through the preprocessor
pub async fn process_document(
    ctx: &WorkerContext,
    job_id: &str,
    doc_id: &str,
) -> anyhow::Result<serde_json::Value> {
    let (blob, content) = ctx
        .documents
        .fetch_decompressed(doc_id)
        .await?
        .ok_or_else(|| anyhow!("Document {doc_id} not found in database"))?;

    let form = Form::new().part(
        "files",
        Part::bytes(content)
            .file_name(blob.file_name.clone())
            .mime_str("application/octet-stream")?,
    );

    let result = send_batch(ctx, form, &blob.workspace)
        .await
        .with_context(|| format!("job {job_id}: preprocessor call failed"))?;

    Ok(json!({
        "documents_sent": result.documents_sent,
        "errors": result.errors,
    }))
}

/// Unpack a stored archive and stream its files to the preprocessor in
/// batches
pub async fn process_codebase(
    ctx: &WorkerContext,
    job_id: &str,
    doc_id: &str,
) -> anyhow::Result<serde_json::Value> {
    let (blob, archive_bytes) = ctx
        .documents
        .fetch_decompressed(doc_id)
        .await?
        .ok_or_else(|| anyhow!("Document {doc_id} not found in database"))?;

    let extracted = extract_archive(&archive_bytes, &blob.file_name);
    if extracted.is_empty() {
        bail!("Could not extract files from {}", blob.file_name);
    }

    let mut errors: Vec<String> = Vec::new();
    let mut documents_sent: usize = 0;

    for (batch_index, batch) in extracted.chunks(ctx.batch_size.max(1)).enumerate() {
        let mut form = Form::new();
        for (path, content) in batch {
            form = form.part(
                "files",
                Part::bytes(content.clone())
                    .file_name(path.clone())
                    .mime_str("application/octet-stream")?,
            );
        }

        match send_batch(ctx, form, &blob.workspace).await {
            Ok(result) => {
                documents_sent += result.documents_sent;
                errors.extend(result.errors);
            }
            Err(e) => {
                tracing::warn!(job_id, batch_index, error = %e, "Batch failed");
                errors.push(format!("batch {batch_index}: {e:#}"));
            }
        }
    }

    Ok(json!({
        "files_found": extracted.len(),
        "documents_sent": documents_sent,
        "errors": errors,
    }))
}

async fn send_batch(
    ctx: &WorkerContext,
    form: Form,
    workspace: &str,
) -> anyhow::Result<IngestResponse> {
    let response = ctx
        .http
        .post(format!("{}/ingest", ctx.preprocessor_url))
        .multipart(form)
        .header("X-Workspace", workspace)
        .timeout(PREPROCESSOR_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("preprocessor returned {status}: {body}");
    }

    Ok(response.json::<IngestResponse>().await?)
}

/// Job type recorded on the row wins over the payload when they disagree
pub fn effective_job_type(row_type: &str, payload_type: JobType) -> JobType {
    JobType::from_str(row_type).unwrap_or(payload_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_job_type_prefers_row() {
        assert_eq!(
            effective_job_type("codebase", JobType::Document),
            JobType::Codebase
        );
        assert_eq!(
            effective_job_type("bogus", JobType::Document),
            JobType::Document
        );
    }

    #[test]
    fn test_batch_partitioning() {
        let files: Vec<(String, Vec<u8>)> =
            (0..45).map(|i| (format!("f{i}.py"), vec![b'x'])).collect();
        let batches: Vec<_> = files.chunks(20).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 5);
    }
}
