//! Embedder client
//!
//! Converts text into a fixed-dimension vector via the Ollama embedding
//! API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use mnemo_config::EmbeddingConfig;

use crate::MemoryError;

/// Embedder call timeout
pub const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(client: Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.config.url))
            .json(&request)
            .timeout(EMBED_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoryError::Embedding(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Embedding(format!("{status}: {body}")));
        }

        let data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Embedding(format!("unreadable response: {e}")))?;

        data.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("no embedding returned".to_string()))
    }

    /// Configured embedding dimension
    pub fn dim(&self) -> usize {
        self.config.dim
    }
}
