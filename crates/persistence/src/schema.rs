//! Table definitions
//!
//! The summary vector dimension is fixed by the embedding model; altering it
//! requires recreating `orchestrator_sessions`.

use sqlx::PgPool;

use crate::error::PersistenceError;

/// Summary embedding dimension
pub const VECTOR_DIM: usize = 1024;

const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS orchestrator_sessions (
    id TEXT PRIMARY KEY,
    workspace TEXT NOT NULL DEFAULT 'default',
    model TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    summary TEXT,
    summary_vector vector(1024)
);

CREATE TABLE IF NOT EXISTS orchestrator_messages (
    id BIGSERIAL PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES orchestrator_sessions(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS orchestrator_documents (
    id TEXT PRIMARY KEY,
    workspace TEXT NOT NULL DEFAULT 'default',
    file_name TEXT NOT NULL,
    content_type TEXT,
    compressed_blob BYTEA NOT NULL,
    original_size BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    metadata JSONB DEFAULT '{}'::jsonb
);

CREATE TABLE IF NOT EXISTS orchestrator_ingest_jobs (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL REFERENCES orchestrator_documents(id),
    workspace TEXT NOT NULL DEFAULT 'default',
    job_type TEXT NOT NULL DEFAULT 'document',
    status TEXT NOT NULL DEFAULT 'queued',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    error TEXT,
    result JSONB DEFAULT '{}'::jsonb,
    attempts INT NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_orchestrator_sessions_workspace
    ON orchestrator_sessions(workspace);
CREATE INDEX IF NOT EXISTS idx_orchestrator_messages_session
    ON orchestrator_messages(session_id);
CREATE INDEX IF NOT EXISTS idx_orchestrator_documents_workspace
    ON orchestrator_documents(workspace);
CREATE INDEX IF NOT EXISTS idx_orchestrator_sessions_summary_vector
    ON orchestrator_sessions
    USING hnsw (summary_vector vector_cosine_ops);
CREATE INDEX IF NOT EXISTS idx_ingest_jobs_status
    ON orchestrator_ingest_jobs(status);
CREATE INDEX IF NOT EXISTS idx_ingest_jobs_workspace
    ON orchestrator_ingest_jobs(workspace);
CREATE INDEX IF NOT EXISTS idx_ingest_jobs_doc_id
    ON orchestrator_ingest_jobs(doc_id);
"#;

/// Create the extension, tables, and indexes if missing
pub async fn ensure(pool: &PgPool) -> Result<(), PersistenceError> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_vector_dimension_matches_constant() {
        assert!(SCHEMA_SQL.contains(&format!("vector({VECTOR_DIM})")));
    }

    #[test]
    fn test_schema_covers_all_tables() {
        for table in [
            "orchestrator_sessions",
            "orchestrator_messages",
            "orchestrator_documents",
            "orchestrator_ingest_jobs",
        ] {
            assert!(SCHEMA_SQL.contains(table), "missing table {table}");
        }
    }
}
