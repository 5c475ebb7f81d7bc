//! Archival memory client
//!
//! Talks to the external knowledge-graph store. Queries are best-effort:
//! any failure yields an empty result so the chat path never depends on the
//! store being up. Ingestion failures do propagate; the promoter logs them.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::MemoryError;

/// KG query timeout
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(15);
/// KG ingest timeout
pub const INGEST_TIMEOUT: Duration = Duration::from_secs(300);

const WORKSPACE_HEADER: &str = "LIGHTRAG-WORKSPACE";

const MAX_ENTITIES: usize = 30;
const MAX_RELATIONS: usize = 20;
const MAX_CHUNKS: usize = 5;
const MAX_CHUNK_CHARS: usize = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchivalEntity {
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchivalRelation {
    #[serde(default)]
    pub src_id: String,
    #[serde(default)]
    pub tgt_id: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchivalChunk {
    #[serde(default)]
    pub content: String,
}

/// Structured graph data returned by a KG query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchivalData {
    #[serde(default)]
    pub entities: Vec<ArchivalEntity>,
    #[serde(default)]
    pub relations: Vec<ArchivalRelation>,
    #[serde(default)]
    pub chunks: Vec<ArchivalChunk>,
}

impl ArchivalData {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty() && self.chunks.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    mode: &'a str,
}

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    text: &'a str,
}

#[derive(Clone)]
pub struct ArchivalClient {
    client: Client,
    base_url: String,
}

impl ArchivalClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Query the knowledge graph; returns empty data on any failure
    pub async fn query(&self, text: &str, workspace: &str, mode: &str) -> ArchivalData {
        let result = self
            .client
            .post(format!("{}/query/data", self.base_url))
            .json(&QueryRequest { query: text, mode })
            .header(WORKSPACE_HEADER, workspace)
            .timeout(QUERY_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "Archival query rejected");
                return ArchivalData::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Archival query failed");
                return ArchivalData::default();
            }
        };

        let payload: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable archival response");
                return ArchivalData::default();
            }
        };

        // Replies are either wrapped in `data` or bare
        let data = payload.get("data").cloned().unwrap_or(payload);
        serde_json::from_value(data).unwrap_or_default()
    }

    /// Push a text document into the knowledge graph
    pub async fn ingest_text(&self, text: &str, workspace: &str) -> Result<(), MemoryError> {
        let response = self
            .client
            .post(format!("{}/documents/text", self.base_url))
            .json(&IngestRequest { text })
            .header(WORKSPACE_HEADER, workspace)
            .timeout(INGEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoryError::Archival(format!("ingest request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Archival(format!("ingest rejected: {status}: {body}")));
        }
        Ok(())
    }
}

/// Format graph data into a context block for the prompt.
///
/// Sections appear in entities/relations/chunks order and are omitted when
/// empty; oversized chunk content is truncated.
pub fn format_context(data: &ArchivalData) -> String {
    let mut parts = Vec::new();

    if !data.entities.is_empty() {
        let lines: Vec<String> = data
            .entities
            .iter()
            .take(MAX_ENTITIES)
            .map(|e| {
                let name = or_unknown(&e.entity_name);
                let etype = or_unknown(&e.entity_type);
                if e.description.is_empty() {
                    format!("- [{etype}] {name}")
                } else {
                    format!("- [{etype}] {name}: {}", e.description)
                }
            })
            .collect();
        parts.push(format!("Entities:\n{}", lines.join("\n")));
    }

    if !data.relations.is_empty() {
        let lines: Vec<String> = data
            .relations
            .iter()
            .take(MAX_RELATIONS)
            .map(|r| {
                let desc = if r.description.is_empty() {
                    "relates to"
                } else {
                    r.description.as_str()
                };
                format!("- {} -> {}: {desc}", or_unknown(&r.src_id), or_unknown(&r.tgt_id))
            })
            .collect();
        parts.push(format!("Relations:\n{}", lines.join("\n")));
    }

    let chunk_lines: Vec<String> = data
        .chunks
        .iter()
        .take(MAX_CHUNKS)
        .filter(|c| !c.content.is_empty())
        .map(|c| {
            if c.content.chars().count() > MAX_CHUNK_CHARS {
                let truncated: String = c.content.chars().take(MAX_CHUNK_CHARS).collect();
                format!("{truncated}...")
            } else {
                c.content.clone()
            }
        })
        .collect();
    if !chunk_lines.is_empty() {
        parts.push(format!("Source context:\n{}", chunk_lines.join("\n---\n")));
    }

    parts.join("\n\n")
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() {
        "?"
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, etype: &str, desc: &str) -> ArchivalEntity {
        ArchivalEntity {
            entity_name: name.to_string(),
            entity_type: etype.to_string(),
            description: desc.to_string(),
        }
    }

    #[test]
    fn test_format_empty_data() {
        assert_eq!(format_context(&ArchivalData::default()), "");
    }

    #[test]
    fn test_format_entity_lines() {
        let data = ArchivalData {
            entities: vec![
                entity("Broker", "class", "message broker core"),
                entity("send", "function", ""),
            ],
            ..Default::default()
        };
        let out = format_context(&data);
        assert!(out.starts_with("Entities:\n"));
        assert!(out.contains("- [class] Broker: message broker core"));
        assert!(out.contains("- [function] send"));
        assert!(!out.contains("send:"));
    }

    #[test]
    fn test_format_caps_entities() {
        let data = ArchivalData {
            entities: (0..40).map(|i| entity(&format!("e{i}"), "t", "d")).collect(),
            ..Default::default()
        };
        let out = format_context(&data);
        assert_eq!(out.lines().count(), 1 + 30);
    }

    #[test]
    fn test_format_truncates_long_chunks() {
        let data = ArchivalData {
            chunks: vec![ArchivalChunk {
                content: "x".repeat(600),
            }],
            ..Default::default()
        };
        let out = format_context(&data);
        assert!(out.contains(&format!("{}...", "x".repeat(500))));
        assert!(!out.contains(&"x".repeat(501)));
    }

    #[test]
    fn test_format_relation_default_description() {
        let data = ArchivalData {
            relations: vec![ArchivalRelation {
                src_id: "A".to_string(),
                tgt_id: "B".to_string(),
                description: String::new(),
            }],
            ..Default::default()
        };
        assert!(format_context(&data).contains("- A -> B: relates to"));
    }

    #[test]
    fn test_archival_data_parses_wrapped_reply() {
        let payload: serde_json::Value = serde_json::from_str(
            r#"{"data":{"entities":[{"entity_name":"X","entity_type":"class"}],"relations":[],"chunks":[]}}"#,
        )
        .unwrap();
        let data = payload.get("data").cloned().unwrap_or(payload);
        let parsed: ArchivalData = serde_json::from_value(data).unwrap();
        assert_eq!(parsed.entities.len(), 1);
        assert_eq!(parsed.entities[0].entity_name, "X");
    }
}
