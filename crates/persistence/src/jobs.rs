//! Ingest job rows
//!
//! The gateway creates jobs in `queued`; only the worker moves them after
//! that. `attempts` is incremented on every `processing` transition, so a
//! redelivered job that exceeded its ack-wait counts the extra attempt.

use chrono::{DateTime, Utc};

use mnemo_core::JobStatus;

use crate::client::PgClient;
use crate::error::PersistenceError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub doc_id: String,
    pub workspace: String,
    pub job_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub attempts: i32,
}

impl JobRow {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed.as_str()
    }
}

#[derive(Clone)]
pub struct JobStore {
    client: PgClient,
}

impl JobStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        job_id: &str,
        doc_id: &str,
        workspace: &str,
        job_type: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"INSERT INTO orchestrator_ingest_jobs (id, doc_id, workspace, job_type, status)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(job_id)
        .bind(doc_id)
        .bind(workspace)
        .bind(job_type)
        .bind(JobStatus::Queued.as_str())
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<JobRow>, PersistenceError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"SELECT id, doc_id, workspace, job_type, status, created_at,
                      started_at, completed_at, error, result, attempts
               FROM orchestrator_ingest_jobs WHERE id = $1"#,
        )
        .bind(job_id)
        .fetch_optional(self.client.pool())
        .await?;
        Ok(row)
    }

    pub async fn mark_started(&self, job_id: &str) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"UPDATE orchestrator_ingest_jobs
               SET status = 'processing', started_at = now(), attempts = attempts + 1
               WHERE id = $1"#,
        )
        .bind(job_id)
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    pub async fn mark_completed(
        &self,
        job_id: &str,
        result: &serde_json::Value,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"UPDATE orchestrator_ingest_jobs
               SET status = 'completed', completed_at = now(), result = $2
               WHERE id = $1"#,
        )
        .bind(job_id)
        .bind(result)
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, job_id: &str, error: &str) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"UPDATE orchestrator_ingest_jobs
               SET status = 'failed', completed_at = now(), error = $2
               WHERE id = $1"#,
        )
        .bind(job_id)
        .bind(error)
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    /// Return a transiently failed job to the queue for redelivery
    pub async fn reset_queued(&self, job_id: &str) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE orchestrator_ingest_jobs SET status = 'queued' WHERE id = $1")
            .bind(job_id)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    pub async fn list(
        &self,
        workspace: Option<&str>,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<JobRow>, PersistenceError> {
        let mut conditions = Vec::new();
        if workspace.is_some() {
            conditions.push(format!("workspace = ${}", conditions.len() + 1));
        }
        if status.is_some() {
            conditions.push(format!("status = ${}", conditions.len() + 1));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            r#"SELECT id, doc_id, workspace, job_type, status, created_at,
                      started_at, completed_at, error, result, attempts
               FROM orchestrator_ingest_jobs
               {where_clause}
               ORDER BY created_at DESC
               LIMIT ${}"#,
            conditions.len() + 1
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);
        if let Some(ws) = workspace {
            q = q.bind(ws.to_string());
        }
        if let Some(st) = status {
            q = q.bind(st.to_string());
        }
        q = q.bind(limit);

        Ok(q.fetch_all(self.client.pool()).await?)
    }
}
