//! Memory composer
//!
//! Builds the message list presented to the backend from the original
//! request plus the three memory tiers. Tier fetches run concurrently and
//! fail independently; a missing tier degrades to an empty block and never
//! fails the request.

use mnemo_core::chat::{ChatMessage, Role};
use mnemo_persistence::{SessionStore, SimilarSession};

use crate::archival::{format_context, ArchivalClient};
use crate::embedding::EmbeddingClient;
use crate::short_term::ShortTermMemory;

/// Minimum cosine similarity for a recall hit to be shown
const RECALL_SIMILARITY_FLOOR: f64 = 0.30;

const MEMORY_HEADER: &str = "--- Relevant Memory ---";

/// The three fetched tiers, empty where unavailable
#[derive(Debug, Clone, Default)]
pub struct FetchedTiers {
    pub short_term: Vec<ChatMessage>,
    pub recall: String,
    pub archival: String,
}

pub struct MemoryComposer {
    short_term: ShortTermMemory,
    sessions: SessionStore,
    embedder: EmbeddingClient,
    archival: ArchivalClient,
    recall_top_k: i64,
}

impl MemoryComposer {
    pub fn new(
        short_term: ShortTermMemory,
        sessions: SessionStore,
        embedder: EmbeddingClient,
        archival: ArchivalClient,
        recall_top_k: i64,
    ) -> Self {
        Self {
            short_term,
            sessions,
            embedder,
            archival,
            recall_top_k,
        }
    }

    /// Build the augmented message list for one request.
    ///
    /// Without a non-empty user query the input is returned unchanged.
    pub async fn compose(
        &self,
        messages: &[ChatMessage],
        session_id: &str,
        workspace: &str,
    ) -> Vec<ChatMessage> {
        let (system, non_system) = split_system(messages);

        let query = non_system
            .iter()
            .rev()
            .find(|m| m.role == Role::User && !m.text().is_empty())
            .map(|m| m.text().to_string());

        let Some(query) = query else {
            return messages.to_vec();
        };

        let tiers = self.fetch_tiers(&query, session_id, workspace).await;
        build_augmented(system, non_system, tiers)
    }

    /// Fetch all three tiers concurrently with per-tier failure isolation
    async fn fetch_tiers(&self, query: &str, session_id: &str, workspace: &str) -> FetchedTiers {
        let (short_term, recall, archival) = tokio::join!(
            self.short_term.turns(session_id),
            self.fetch_recall(query, workspace, session_id),
            self.fetch_archival(query, workspace),
        );

        let short_term = short_term.unwrap_or_else(|e| {
            tracing::warn!(session_id, error = %e, "Short-term fetch failed");
            Vec::new()
        });
        let recall = recall.unwrap_or_else(|e| {
            tracing::warn!(session_id, error = %e, "Recall fetch failed");
            String::new()
        });

        FetchedTiers {
            short_term,
            recall,
            archival,
        }
    }

    async fn fetch_recall(
        &self,
        query: &str,
        workspace: &str,
        session_id: &str,
    ) -> Result<String, crate::MemoryError> {
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .sessions
            .search_similar(workspace, vector, self.recall_top_k, Some(session_id))
            .await?;
        Ok(format_recall(&hits))
    }

    async fn fetch_archival(&self, query: &str, workspace: &str) -> String {
        let data = self.archival.query(query, workspace, "hybrid").await;
        if data.is_empty() {
            String::new()
        } else {
            format_context(&data)
        }
    }
}

/// Split off the system message; when several are present the last wins
fn split_system(messages: &[ChatMessage]) -> (Option<ChatMessage>, Vec<ChatMessage>) {
    let mut system = None;
    let mut rest = Vec::with_capacity(messages.len());
    for msg in messages {
        if msg.role == Role::System {
            system = Some(msg.clone());
        } else {
            rest.push(msg.clone());
        }
    }
    (system, rest)
}

/// Format recall hits, dropping entries under the similarity floor
pub fn format_recall(hits: &[SimilarSession]) -> String {
    let parts: Vec<String> = hits
        .iter()
        .filter(|h| h.similarity >= RECALL_SIMILARITY_FLOOR)
        .map(|h| {
            format!(
                "[Past conversation (relevance: {:.2})]\n{}",
                h.similarity, h.summary
            )
        })
        .collect();
    parts.join("\n\n")
}

/// Assemble the output message list from the split input and fetched tiers.
///
/// At most one system message is emitted; the original non-system messages
/// keep their order at the tail. The last short-term turn is dropped, as it
/// is the current user message appended just before composition.
pub fn build_augmented(
    system: Option<ChatMessage>,
    non_system: Vec<ChatMessage>,
    tiers: FetchedTiers,
) -> Vec<ChatMessage> {
    let mut context_parts = Vec::new();
    if !tiers.archival.is_empty() {
        context_parts.push(format!("<archival_memory>\n{}\n</archival_memory>", tiers.archival));
    }
    if !tiers.recall.is_empty() {
        context_parts.push(format!("<recall_memory>\n{}\n</recall_memory>", tiers.recall));
    }

    let mut augmented = Vec::new();

    if !context_parts.is_empty() {
        let memory_block = context_parts.join("\n\n");
        let content = match &system {
            Some(sys) => format!("{}\n\n{MEMORY_HEADER}\n{memory_block}", sys.text()),
            None => format!("{MEMORY_HEADER}\n{memory_block}"),
        };
        augmented.push(ChatMessage::system(content));
    } else if let Some(sys) = system {
        augmented.push(sys);
    }

    if !tiers.short_term.is_empty() {
        let history = &tiers.short_term[..tiers.short_term.len() - 1];
        augmented.extend_from_slice(history);
    }

    augmented.extend(non_system);
    augmented
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(session_id: &str, summary: &str, similarity: f64) -> SimilarSession {
        SimilarSession {
            session_id: session_id.to_string(),
            summary: summary.to_string(),
            similarity,
        }
    }

    fn system_count(messages: &[ChatMessage]) -> usize {
        messages.iter().filter(|m| m.role == Role::System).count()
    }

    #[test]
    fn test_format_recall_applies_similarity_floor() {
        let hits = vec![
            hit("a", "relevant summary", 0.82),
            hit("b", "noise", 0.12),
            hit("c", "borderline", 0.30),
        ];
        let out = format_recall(&hits);
        assert!(out.contains("relevance: 0.82"));
        assert!(out.contains("borderline"));
        assert!(!out.contains("noise"));
    }

    #[test]
    fn test_format_recall_empty_when_all_below_floor() {
        assert_eq!(format_recall(&[hit("a", "x", 0.1)]), "");
    }

    #[test]
    fn test_no_memory_keeps_original_system() {
        let out = build_augmented(
            Some(ChatMessage::system("be terse")),
            vec![ChatMessage::user("hi")],
            FetchedTiers::default(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text(), "be terse");
        assert_eq!(system_count(&out), 1);
    }

    #[test]
    fn test_memory_block_merged_into_system() {
        let tiers = FetchedTiers {
            recall: "[Past conversation (relevance: 0.80)]\nbuilt a broker".to_string(),
            archival: "Entities:\n- [class] Broker".to_string(),
            ..Default::default()
        };
        let out = build_augmented(
            Some(ChatMessage::system("be terse")),
            vec![ChatMessage::user("hi")],
            tiers,
        );
        assert_eq!(system_count(&out), 1);
        let sys = out[0].text();
        assert!(sys.starts_with("be terse\n\n--- Relevant Memory ---\n"));
        // Archival block precedes recall
        let arch = sys.find("<archival_memory>").unwrap();
        let recall = sys.find("<recall_memory>").unwrap();
        assert!(arch < recall);
    }

    #[test]
    fn test_memory_block_without_system_message() {
        let tiers = FetchedTiers {
            recall: "summary".to_string(),
            ..Default::default()
        };
        let out = build_augmented(None, vec![ChatMessage::user("hi")], tiers);
        assert_eq!(system_count(&out), 1);
        assert!(out[0].text().starts_with("--- Relevant Memory ---"));
        assert!(!out[0].text().contains("archival_memory"));
    }

    #[test]
    fn test_short_term_history_drops_current_turn() {
        let tiers = FetchedTiers {
            short_term: vec![
                ChatMessage::user("first question"),
                ChatMessage::assistant("first answer"),
                ChatMessage::user("current question"),
            ],
            ..Default::default()
        };
        let out = build_augmented(None, vec![ChatMessage::user("current question")], tiers);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].text(), "first question");
        assert_eq!(out[1].text(), "first answer");
        assert_eq!(out[2].text(), "current question");
    }

    #[test]
    fn test_non_system_messages_keep_order_at_tail() {
        let non_system = vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
        ];
        let out = build_augmented(None, non_system.clone(), FetchedTiers::default());
        let tail: Vec<&str> = out.iter().map(|m| m.text()).collect();
        assert_eq!(tail, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_system_keeps_last_of_many() {
        let messages = vec![
            ChatMessage::system("one"),
            ChatMessage::user("hi"),
            ChatMessage::system("two"),
        ];
        let (system, rest) = split_system(&messages);
        assert_eq!(system.unwrap().text(), "two");
        assert_eq!(rest.len(), 1);
    }
}
