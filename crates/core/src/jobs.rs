//! Ingest job and document DTOs

use serde::{Deserialize, Serialize};

/// Kind of ingest job, doubling as the queue subject suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Document,
    Codebase,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Document => "document",
            JobType::Codebase => "codebase",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(JobType::Document),
            "codebase" => Ok(JobType::Codebase),
            other => Err(format!("unknown job type: {other}")),
        }
    }
}

/// Job lifecycle state
///
/// `queued -> processing -> completed`, with `processing -> queued` on a
/// transient failure and `processing -> failed` once redeliveries are
/// exhausted. `completed` is terminal and idempotent to redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted-document response for `POST /v1/documents/ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIngestResponse {
    pub doc_id: String,
    pub job_id: String,
    pub file_name: String,
    pub workspace: String,
    pub original_size: usize,
    pub compressed_size: usize,
    pub status: String,
}

/// Accepted-archive response for `POST /v1/codebase/ingest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebaseIngestResponse {
    pub doc_id: String,
    pub job_id: String,
    pub workspace: String,
    pub archive_name: String,
    pub original_size: usize,
    pub compressed_size: usize,
    pub status: String,
}

/// Job row as exposed by the job API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub doc_id: String,
    pub workspace: String,
    pub job_type: String,
    pub status: String,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub attempts: i32,
}

/// Session row as exposed by the sessions API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub workspace: String,
    pub model: String,
    pub turn_count: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_job_type_round_trip() {
        assert_eq!(JobType::from_str("codebase").unwrap(), JobType::Codebase);
        assert_eq!(JobType::Document.to_string(), "document");
        assert!(JobType::from_str("archive").is_err());
    }

    #[test]
    fn test_status_serde_matches_db_strings() {
        assert_eq!(serde_json::to_string(&JobStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
    }
}
