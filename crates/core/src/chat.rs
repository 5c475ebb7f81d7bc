//! OpenAI-compatible chat completion schema
//!
//! The gateway speaks the OpenAI chat schema on its public surface and the
//! Ollama schema towards backends; these are the public-surface types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat turn role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Message text, empty when content is absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Inbound chat completion request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: Option<String>,
}

fn default_finish_reason() -> Option<String> {
    Some("stop".to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatCompletionResponse {
    pub fn new(model: impl Into<String>, choices: Vec<Choice>, usage: Usage) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created: Utc::now().timestamp(),
            model: model.into(),
            choices,
            usage,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    pub delta: DeltaMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<StreamChoice>,
}

impl ChatCompletionChunk {
    pub fn new(id: impl Into<String>, created: i64, model: impl Into<String>, choice: StreamChoice) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.into(),
            choices: vec![choice],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: 0,
            owned_by: "local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

impl ModelListResponse {
    pub fn new(data: Vec<ModelInfo>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}

/// Completion id in the `chatcmpl-<12 hex>` form shared by responses and
/// stream chunks
pub fn completion_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("chatcmpl-{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, Role::Tool);
    }

    #[test]
    fn test_message_text_defaults_empty() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user"}"#).unwrap();
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_request_deserializes_minimal_body() {
        let req: ChatCompletionRequest =
            serde_json::from_str(r#"{"model":"qwen3-coder","messages":[{"role":"user","content":"hi"}]}"#)
                .unwrap();
        assert!(!req.stream);
        assert!(req.session_id.is_none());
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn test_completion_id_shape() {
        let id = completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 12);
    }

    #[test]
    fn test_chunk_serializes_object_tag() {
        let chunk = ChatCompletionChunk::new(
            "chatcmpl-abc",
            0,
            "m",
            StreamChoice {
                index: 0,
                delta: DeltaMessage {
                    role: Some("assistant".into()),
                    content: None,
                },
                finish_reason: None,
            },
        );
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"chat.completion.chunk\""));
        assert!(!json.contains("\"content\""));
    }
}
