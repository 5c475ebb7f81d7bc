//! PostgreSQL persistence layer for mnemo
//!
//! Provides durable storage for:
//! - Sessions and per-turn messages (with pgvector summary search)
//! - Uploaded document blobs (gzip-compressed)
//! - Ingest job rows and their state transitions
//!
//! Ownership is split by process: only the chat gateway mutates session
//! rows, only the ingest worker mutates job rows.

pub mod client;
pub mod documents;
pub mod error;
pub mod jobs;
pub mod schema;
pub mod sessions;

pub use client::PgClient;
pub use documents::{DocumentBlob, DocumentStore, StoredDocument};
pub use error::PersistenceError;
pub use jobs::{JobRow, JobStore};
pub use sessions::{SessionRow, SessionStore, SimilarSession, StoredMessage};

use mnemo_config::DatabaseConfig;

/// Combined persistence layer with all stores
pub struct PersistenceLayer {
    pub sessions: SessionStore,
    pub documents: DocumentStore,
    pub jobs: JobStore,
}

/// Connect to PostgreSQL, ensure the schema, and build all stores.
///
/// `max_connections` overrides the configured pool cap so the worker can
/// run with a smaller pool than the gateway.
pub async fn init(
    config: &DatabaseConfig,
    max_connections: Option<u32>,
) -> Result<PersistenceLayer, PersistenceError> {
    let client = PgClient::connect(config, max_connections).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        sessions: SessionStore::new(client.clone()),
        documents: DocumentStore::new(client.clone()),
        jobs: JobStore::new(client),
    })
}
