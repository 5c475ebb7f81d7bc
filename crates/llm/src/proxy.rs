//! OpenAI <-> Ollama chat proxy
//!
//! Translates the OpenAI chat-completion schema to the backend's
//! `/api/chat` schema and back. The streaming side reads the backend's
//! newline-delimited JSON and re-frames it as SSE chunks; chunk ids are
//! stable within one response and `created` is fixed at stream start.

use std::time::Duration;

use async_stream::try_stream;
use chrono::Utc;
use futures::Stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use mnemo_core::chat::{
    completion_id, ChatCompletionChunk, ChatCompletionResponse, ChatMessage, Choice, DeltaMessage,
    Role, StreamChoice, Usage,
};

use crate::router::Route;
use crate::LlmError;

/// Backend LLM call timeout
pub const BACKEND_TIMEOUT: Duration = Duration::from_secs(300);

/// Optional sampling parameters forwarded to the backend
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct OllamaMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
}

fn to_backend_request(
    backend_model: &str,
    messages: &[ChatMessage],
    stream: bool,
    params: SamplingParams,
) -> OllamaChatRequest {
    let options = if params.temperature.is_some() || params.top_p.is_some() || params.max_tokens.is_some() {
        Some(OllamaOptions {
            temperature: params.temperature,
            top_p: params.top_p,
            num_predict: params.max_tokens,
        })
    } else {
        None
    };

    OllamaChatRequest {
        model: backend_model.to_string(),
        messages: messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.to_string(),
                content: m.text().to_string(),
            })
            .collect(),
        stream,
        options,
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::UpstreamStatus {
        status: status.as_u16(),
        body,
    })
}

/// Unary chat completion
pub async fn chat_completion(
    client: &Client,
    route: &Route,
    messages: &[ChatMessage],
    params: SamplingParams,
    request_model_name: &str,
) -> Result<ChatCompletionResponse, LlmError> {
    let body = to_backend_request(&route.model, messages, false, params);

    let response = client
        .post(format!("{}/api/chat", route.base_url))
        .json(&body)
        .timeout(BACKEND_TIMEOUT)
        .send()
        .await?;
    let response = check_status(response).await?;

    let data: OllamaChatResponse = response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let model_name = if request_model_name.is_empty() {
        route.model.as_str()
    } else {
        request_model_name
    };

    Ok(ChatCompletionResponse::new(
        model_name,
        vec![Choice {
            index: 0,
            message: ChatMessage::new(Role::Assistant, data.message.content),
            finish_reason: Some("stop".to_string()),
        }],
        Usage {
            prompt_tokens: data.prompt_eval_count,
            completion_tokens: data.eval_count,
            total_tokens: data.prompt_eval_count + data.eval_count,
        },
    ))
}

fn sse_frame(chunk: &ChatCompletionChunk) -> String {
    // Serialization of these chunk types cannot fail
    let json = serde_json::to_string(chunk).unwrap_or_default();
    format!("data: {json}\n\n")
}

/// Streaming chat completion.
///
/// Yields fully framed SSE strings: an initial role announcement, one chunk
/// per non-empty backend delta, a final `finish_reason: "stop"` chunk, and
/// the `data: [DONE]` sentinel.
pub fn chat_completion_stream(
    client: Client,
    route: Route,
    messages: Vec<ChatMessage>,
    params: SamplingParams,
    request_model_name: String,
) -> impl Stream<Item = Result<String, LlmError>> {
    try_stream! {
        let body = to_backend_request(&route.model, &messages, true, params);

        let chunk_id = completion_id();
        let created = Utc::now().timestamp();
        let model_name = if request_model_name.is_empty() {
            route.model.clone()
        } else {
            request_model_name
        };

        let first = ChatCompletionChunk::new(
            chunk_id.clone(),
            created,
            model_name.clone(),
            StreamChoice {
                index: 0,
                delta: DeltaMessage {
                    role: Some("assistant".to_string()),
                    content: None,
                },
                finish_reason: None,
            },
        );
        yield sse_frame(&first);

        let response = client
            .post(format!("{}/api/chat", route.base_url))
            .json(&body)
            .timeout(BACKEND_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        'outer: while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|e| LlmError::Network(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);
                if line.is_empty() {
                    continue;
                }

                let parsed: OllamaStreamChunk = serde_json::from_str(&line)
                    .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

                if !parsed.message.content.is_empty() {
                    let chunk = ChatCompletionChunk::new(
                        chunk_id.clone(),
                        created,
                        model_name.clone(),
                        StreamChoice {
                            index: 0,
                            delta: DeltaMessage {
                                role: None,
                                content: Some(parsed.message.content),
                            },
                            finish_reason: None,
                        },
                    );
                    yield sse_frame(&chunk);
                }

                if parsed.done {
                    break 'outer;
                }
            }
        }

        let final_chunk = ChatCompletionChunk::new(
            chunk_id,
            created,
            model_name,
            StreamChoice {
                index: 0,
                delta: DeltaMessage::default(),
                finish_reason: Some("stop".to_string()),
            },
        );
        yield sse_frame(&final_chunk);
        yield "data: [DONE]\n\n".to_string();
    }
}

/// Extract the content delta from an already framed SSE chunk, if any.
///
/// The gateway uses this to collect the assistant text it forwards, without
/// re-implementing the frame layout.
pub fn delta_content(frame: &str) -> Option<String> {
    let payload = frame.strip_prefix("data: ")?.trim();
    if payload == "[DONE]" {
        return None;
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(payload).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_request_includes_options_only_when_set() {
        let messages = vec![ChatMessage::user("hi")];
        let without = to_backend_request("m", &messages, false, SamplingParams::default());
        assert!(serde_json::to_string(&without).unwrap().contains("\"stream\":false"));
        assert!(!serde_json::to_string(&without).unwrap().contains("options"));

        let with = to_backend_request(
            "m",
            &messages,
            true,
            SamplingParams {
                temperature: Some(0.2),
                top_p: None,
                max_tokens: Some(64),
            },
        );
        let json = serde_json::to_string(&with).unwrap();
        assert!(json.contains("\"num_predict\":64"));
        assert!(json.contains("\"temperature\":0.2"));
        assert!(!json.contains("top_p"));
    }

    #[test]
    fn test_backend_request_empty_content_becomes_empty_string() {
        let messages = vec![ChatMessage {
            role: Role::User,
            content: None,
            name: None,
        }];
        let req = to_backend_request("m", &messages, false, SamplingParams::default());
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"content\":\"\""));
    }

    #[test]
    fn test_usage_totals_from_backend_counts() {
        let data: OllamaChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"ok"},"prompt_eval_count":12,"eval_count":30}"#)
                .unwrap();
        assert_eq!(data.prompt_eval_count + data.eval_count, 42);

        // Missing counts default to zero
        let sparse: OllamaChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"ok"}}"#).unwrap();
        assert_eq!(sparse.prompt_eval_count, 0);
        assert_eq!(sparse.eval_count, 0);
    }

    #[test]
    fn test_sse_frame_layout() {
        let chunk = ChatCompletionChunk::new(
            "chatcmpl-abc",
            7,
            "m",
            StreamChoice {
                index: 0,
                delta: DeltaMessage {
                    role: None,
                    content: Some("hello".to_string()),
                },
                finish_reason: None,
            },
        );
        let frame = sse_frame(&chunk);
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_delta_content_extraction() {
        let chunk = ChatCompletionChunk::new(
            "chatcmpl-abc",
            7,
            "m",
            StreamChoice {
                index: 0,
                delta: DeltaMessage {
                    role: None,
                    content: Some("hello".to_string()),
                },
                finish_reason: None,
            },
        );
        assert_eq!(delta_content(&sse_frame(&chunk)).as_deref(), Some("hello"));
        assert_eq!(delta_content("data: [DONE]\n\n"), None);
        assert_eq!(delta_content("not a frame"), None);
    }

    #[tokio::test]
    async fn test_stream_surfaces_connection_errors_after_first_chunk() {
        // Port 9 is discard; connection should fail fast
        let client = Client::new();
        let route = Route {
            base_url: "http://127.0.0.1:9".to_string(),
            model: "m".to_string(),
        };
        let stream = chat_completion_stream(
            client,
            route,
            vec![ChatMessage::user("hi")],
            SamplingParams::default(),
            "m".to_string(),
        );
        futures::pin_mut!(stream);

        // Role announcement is emitted before the backend is contacted
        let first = stream.next().await.unwrap().unwrap();
        assert!(first.contains("\"role\":\"assistant\""));

        let second = stream.next().await.unwrap();
        assert!(second.is_err());
    }
}
