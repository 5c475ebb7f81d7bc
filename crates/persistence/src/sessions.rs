//! Session and message storage
//!
//! Sessions carry an optional summary plus its embedding; the summary and
//! vector are always written together so `(summary IS NULL)` and
//! `(summary_vector IS NULL)` stay equivalent.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::Row;

use crate::client::PgClient;
use crate::error::PersistenceError;

/// A session row as read back from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub workspace: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: Option<String>,
    #[sqlx(default)]
    pub turn_count: Option<i64>,
}

/// One recall-search hit
#[derive(Debug, Clone)]
pub struct SimilarSession {
    pub session_id: String,
    pub summary: String,
    pub similarity: f64,
}

/// A persisted chat turn
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredMessage {
    pub role: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    client: PgClient,
}

impl SessionStore {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    /// Create the session row if missing, bump `updated_at` otherwise
    pub async fn ensure_session(
        &self,
        session_id: &str,
        workspace: &str,
        model: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"INSERT INTO orchestrator_sessions (id, workspace, model)
               VALUES ($1, $2, $3)
               ON CONFLICT (id) DO UPDATE SET updated_at = now()"#,
        )
        .bind(session_id)
        .bind(workspace)
        .bind(model)
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    pub async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"INSERT INTO orchestrator_messages (session_id, role, content)
               VALUES ($1, $2, $3)"#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    /// All persisted turns for a session, in insertion order
    pub async fn messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, PersistenceError> {
        let rows = sqlx::query_as::<_, StoredMessage>(
            r#"SELECT role, content, created_at
               FROM orchestrator_messages
               WHERE session_id = $1
               ORDER BY id"#,
        )
        .bind(session_id)
        .fetch_all(self.client.pool())
        .await?;
        Ok(rows)
    }

    /// Persistent turn count, the promotion trigger input
    pub async fn message_count(&self, session_id: &str) -> Result<i64, PersistenceError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM orchestrator_messages WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(self.client.pool())
        .await?;
        Ok(count)
    }

    /// Write summary and vector together
    pub async fn update_summary(
        &self,
        session_id: &str,
        summary: &str,
        summary_vector: Vec<f32>,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"UPDATE orchestrator_sessions
               SET summary = $2, summary_vector = $3, updated_at = now()
               WHERE id = $1"#,
        )
        .bind(session_id)
        .bind(summary)
        .bind(Vector::from(summary_vector))
        .execute(self.client.pool())
        .await?;
        Ok(())
    }

    pub async fn session_info(&self, session_id: &str) -> Result<Option<SessionRow>, PersistenceError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"SELECT id, workspace, model, created_at, updated_at, summary, NULL::bigint AS turn_count
               FROM orchestrator_sessions WHERE id = $1"#,
        )
        .bind(session_id)
        .fetch_optional(self.client.pool())
        .await?;
        Ok(row)
    }

    /// Recent sessions with their turn counts, most recently updated first
    pub async fn list_sessions(
        &self,
        workspace: Option<&str>,
    ) -> Result<Vec<SessionRow>, PersistenceError> {
        let base = r#"SELECT s.id, s.workspace, s.model, s.created_at, s.updated_at, s.summary,
                      (SELECT count(*) FROM orchestrator_messages m WHERE m.session_id = s.id) AS turn_count
               FROM orchestrator_sessions s"#;

        let rows = match workspace {
            Some(ws) => {
                let query = format!("{base} WHERE s.workspace = $1 ORDER BY s.updated_at DESC LIMIT 50");
                sqlx::query_as::<_, SessionRow>(&query)
                    .bind(ws)
                    .fetch_all(self.client.pool())
                    .await?
            }
            None => {
                let query = format!("{base} ORDER BY s.updated_at DESC LIMIT 50");
                sqlx::query_as::<_, SessionRow>(&query)
                    .fetch_all(self.client.pool())
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM orchestrator_sessions WHERE id = $1")
            .bind(session_id)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    /// Cosine search over session summaries within one workspace.
    ///
    /// The current session is excluded so a conversation never recalls
    /// itself.
    pub async fn search_similar(
        &self,
        workspace: &str,
        query_vector: Vec<f32>,
        top_k: i64,
        exclude_session_id: Option<&str>,
    ) -> Result<Vec<SimilarSession>, PersistenceError> {
        let vector = Vector::from(query_vector);
        let rows = match exclude_session_id {
            Some(exclude) => {
                sqlx::query(
                    r#"SELECT id, summary, 1 - (summary_vector <=> $1) AS similarity
                       FROM orchestrator_sessions
                       WHERE workspace = $2
                         AND summary IS NOT NULL
                         AND summary_vector IS NOT NULL
                         AND id <> $3
                       ORDER BY summary_vector <=> $1
                       LIMIT $4"#,
                )
                .bind(&vector)
                .bind(workspace)
                .bind(exclude)
                .bind(top_k)
                .fetch_all(self.client.pool())
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT id, summary, 1 - (summary_vector <=> $1) AS similarity
                       FROM orchestrator_sessions
                       WHERE workspace = $2
                         AND summary IS NOT NULL
                         AND summary_vector IS NOT NULL
                       ORDER BY summary_vector <=> $1
                       LIMIT $3"#,
                )
                .bind(&vector)
                .bind(workspace)
                .bind(top_k)
                .fetch_all(self.client.pool())
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|row| SimilarSession {
                session_id: row.get("id"),
                summary: row.get("summary"),
                similarity: row.get("similarity"),
            })
            .collect())
    }
}
