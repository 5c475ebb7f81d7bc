//! Three-tier memory for the chat gateway
//!
//! - Short-term: a TTL-bounded Redis log of recent turns per session
//! - Recall: per-session summaries with embeddings, searched across
//!   sessions in the same workspace
//! - Archival: the external knowledge-graph store
//!
//! The composer assembles the three tiers into the prompt; the promoter
//! moves conversations up the tiers in the background.

pub mod archival;
pub mod composer;
pub mod embedding;
pub mod promoter;
pub mod short_term;

pub use archival::{ArchivalClient, ArchivalData};
pub use composer::{build_augmented, format_recall, FetchedTiers, MemoryComposer};
pub use embedding::EmbeddingClient;
pub use promoter::Promoter;
pub use short_term::ShortTermMemory;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Archival error: {0}")]
    Archival(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error(transparent)]
    Persistence(#[from] mnemo_persistence::PersistenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
