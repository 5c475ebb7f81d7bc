//! Core types for the mnemo gateway and ingestion pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - OpenAI-compatible chat schema (requests, responses, stream chunks)
//! - Ingest job and document DTOs
//! - Code parse results (entities, relationships, recovered code blocks)
//! - Workspace derivation and sanitization

pub mod chat;
pub mod jobs;
pub mod parse;
pub mod workspace;

pub use chat::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice,
    DeltaMessage, ModelInfo, ModelListResponse, Role, StreamChoice, Usage,
};
pub use jobs::{
    CodebaseIngestResponse, DocumentIngestResponse, JobStatus, JobStatusResponse, JobType,
    SessionInfo,
};
pub use parse::{CodeBlock, Entity, EntityKind, IngestResponse, ParseResult, RelationKind, Relationship};
pub use workspace::{derive_workspace, sanitize_workspace, DEFAULT_WORKSPACE};
