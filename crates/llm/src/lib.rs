//! LLM routing and proxying
//!
//! Features:
//! - Model alias routing to Ollama-schema backends
//! - OpenAI chat-completion translation (unary and streaming)
//! - SSE chunk assembly with a final `data: [DONE]` sentinel

pub mod proxy;
pub mod router;

pub use proxy::{chat_completion, chat_completion_stream, SamplingParams, BACKEND_TIMEOUT};
pub use router::{ModelRouter, Route};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Backend returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}
