//! Background promotion between memory tiers
//!
//! After every assistant response the persistent turn count is checked
//! against the promote and archive thresholds. Promotion runs off the
//! request path; every failure here is logged and swallowed so the chat
//! response is never affected.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use mnemo_config::{MemoryConfig, SummarizerConfig};
use mnemo_persistence::SessionStore;

use crate::archival::ArchivalClient;
use crate::embedding::EmbeddingClient;
use crate::MemoryError;

/// Summarizer call timeout
pub const SUMMARIZER_TIMEOUT: Duration = Duration::from_secs(120);

/// Transcript cap fed to the summarizer
const MAX_TRANSCRIPT_CHARS: usize = 12_000;
const TRUNCATION_MARKER: &str = "\n... (truncated)";

#[derive(Debug, Serialize)]
struct SummarizerRequest {
    model: String,
    messages: Vec<SummarizerMessage>,
    stream: bool,
    options: SummarizerOptions,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct SummarizerMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct SummarizerOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Deserialize)]
struct SummarizerResponse {
    #[serde(default)]
    message: SummarizerMessage,
}

pub struct Promoter {
    sessions: SessionStore,
    embedder: EmbeddingClient,
    archival: ArchivalClient,
    http: Client,
    summarizer: SummarizerConfig,
    memory: MemoryConfig,
}

impl Promoter {
    pub fn new(
        sessions: SessionStore,
        embedder: EmbeddingClient,
        archival: ArchivalClient,
        http: Client,
        summarizer: SummarizerConfig,
        memory: MemoryConfig,
    ) -> Self {
        Self {
            sessions,
            embedder,
            archival,
            http,
            summarizer,
            memory,
        }
    }

    /// Check thresholds and promote as needed; never raises
    pub async fn maybe_promote(&self, session_id: &str, workspace: &str, turn_count: i64) {
        if crosses_threshold(turn_count, self.memory.promote_after_turns) {
            if let Err(e) = self.summarize_and_store(session_id).await {
                tracing::error!(session_id, error = %e, "Summarization failed");
                return;
            }
        }

        if crosses_threshold(turn_count, self.memory.archival_after_turns) {
            if let Err(e) = self.promote_to_archival(session_id, workspace).await {
                tracing::error!(session_id, error = %e, "Archival promotion failed");
            }
        }
    }

    /// Summarize the full persisted conversation and upsert the summary
    /// with its embedding
    pub async fn summarize_and_store(&self, session_id: &str) -> Result<(), MemoryError> {
        tracing::info!(session_id, "Summarizing session");

        let messages = self.sessions.messages(session_id).await?;
        if messages.is_empty() {
            return Ok(());
        }

        let transcript = build_transcript(
            messages
                .iter()
                .map(|m| (m.role.as_str(), m.content.as_deref().unwrap_or(""))),
        );

        let summary = self.call_summarizer(&transcript).await?;
        if summary.is_empty() {
            return Ok(());
        }

        let vector = self.embedder.embed(&summary).await?;
        self.sessions.update_summary(session_id, &summary, vector).await?;
        tracing::info!(session_id, chars = summary.len(), "Session summarized");
        Ok(())
    }

    /// Push the session summary into the knowledge graph, summarizing first
    /// if no summary exists yet
    pub async fn promote_to_archival(
        &self,
        session_id: &str,
        workspace: &str,
    ) -> Result<(), MemoryError> {
        tracing::info!(session_id, workspace, "Promoting session to archival");

        let Some(info) = self.sessions.session_info(session_id).await? else {
            return Ok(());
        };

        let summary = match info.summary {
            Some(s) => s,
            None => {
                self.summarize_and_store(session_id).await?;
                match self.sessions.session_info(session_id).await?.and_then(|i| i.summary) {
                    Some(s) => s,
                    None => return Ok(()),
                }
            }
        };

        let archival_text = format!(
            "Conversation Summary (session: {session_id}, workspace: {workspace})\n\n{summary}"
        );
        self.archival.ingest_text(&archival_text, workspace).await?;
        tracing::info!(session_id, workspace, "Session promoted to archival");
        Ok(())
    }

    async fn call_summarizer(&self, transcript: &str) -> Result<String, MemoryError> {
        let prompt = format!(
            "Summarize the following conversation concisely. \
             Focus on key decisions, facts, technical details, and action items. \
             Write in third person. Keep it under 500 words.\n\n\
             CONVERSATION:\n{transcript}\n\nSUMMARY:"
        );

        let request = SummarizerRequest {
            model: self.summarizer.model.clone(),
            messages: vec![SummarizerMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            stream: false,
            options: SummarizerOptions {
                temperature: 0.3,
                num_predict: 1024,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.summarizer.url))
            .json(&request)
            .timeout(SUMMARIZER_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoryError::Summarizer(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Summarizer(format!("{status}: {body}")));
        }

        let data: SummarizerResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::Summarizer(format!("unreadable response: {e}")))?;
        Ok(data.message.content)
    }
}

/// A turn count crosses a threshold when it reaches a whole multiple of it
pub fn crosses_threshold(turn_count: i64, threshold: i64) -> bool {
    threshold > 0 && turn_count >= threshold && turn_count % threshold == 0
}

/// Join turns as `role: content` lines, capping the transcript length
pub fn build_transcript<'a>(turns: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let lines: Vec<String> = turns
        .filter(|(_, content)| !content.is_empty())
        .map(|(role, content)| format!("{role}: {content}"))
        .collect();
    let transcript = lines.join("\n");

    if transcript.chars().count() > MAX_TRANSCRIPT_CHARS {
        let capped: String = transcript.chars().take(MAX_TRANSCRIPT_CHARS).collect();
        format!("{capped}{TRUNCATION_MARKER}")
    } else {
        transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_crossing() {
        assert!(!crosses_threshold(5, 10));
        assert!(crosses_threshold(10, 10));
        assert!(!crosses_threshold(15, 10));
        assert!(crosses_threshold(20, 10));
        assert!(!crosses_threshold(0, 10));
        assert!(!crosses_threshold(4, 0));
    }

    #[test]
    fn test_transcript_layout() {
        let turns = vec![("user", "hello"), ("assistant", "hi there"), ("user", "")];
        let transcript = build_transcript(turns.into_iter());
        assert_eq!(transcript, "user: hello\nassistant: hi there");
    }

    #[test]
    fn test_transcript_truncation() {
        let long = "x".repeat(13_000);
        let turns = vec![("user", long.as_str())];
        let transcript = build_transcript(turns.into_iter());
        assert!(transcript.ends_with("\n... (truncated)"));
        assert_eq!(
            transcript.chars().count(),
            MAX_TRANSCRIPT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }
}
