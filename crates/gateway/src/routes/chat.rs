//! Chat completions
//!
//! The request path: resolve the model, derive the workspace, persist the
//! incoming user turn, compose the memory-augmented prompt, then proxy to
//! the backend. The assistant turn is persisted after the response and the
//! promoter is dispatched off the request path — via the background queue
//! for unary calls, via the producer task's tail for streaming.

use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Response};
use axum::response::IntoResponse;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use mnemo_core::chat::{ChatCompletionRequest, ChatMessage, Role};
use mnemo_core::workspace::derive_workspace;
use mnemo_llm::proxy::{chat_completion, chat_completion_stream, delta_content, SamplingParams};
use mnemo_llm::Route;

use crate::error::ApiError;
use crate::state::AppState;

const SESSION_HEADER: &str = "x-session-id";

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response<Body>, ApiError> {
    let route = state.model_router.resolve(&request.model)?.clone();

    let header_workspace = headers
        .get("x-workspace")
        .and_then(|value| value.to_str().ok());
    let workspace = derive_workspace(request.workspace.as_deref(), header_workspace, &request.messages);

    let session_id = request
        .session_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    state
        .sessions
        .ensure_session(&session_id, &workspace, &request.model)
        .await?;

    // Persist the latest user turn in both stores before composing, so the
    // short-term log already holds the current message
    let user_message = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .cloned();
    if let Some(user_message) = &user_message {
        if let Err(e) = state.short_term.append_turn(&session_id, user_message).await {
            tracing::warn!(session_id = %session_id, error = %e, "Short-term append failed");
        }
        state
            .sessions
            .append_message(&session_id, "user", user_message.text())
            .await?;
    }

    let augmented = state
        .composer
        .compose(&request.messages, &session_id, &workspace)
        .await;

    let params = SamplingParams {
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
    };

    if request.stream {
        Ok(stream_chat(state, route, augmented, params, request.model, session_id, workspace))
    } else {
        unary_chat(state, route, augmented, params, request.model, session_id, workspace).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn unary_chat(
    state: AppState,
    route: Route,
    messages: Vec<ChatMessage>,
    params: SamplingParams,
    model: String,
    session_id: String,
    workspace: String,
) -> Result<Response<Body>, ApiError> {
    let response = chat_completion(&state.http, &route, &messages, params, &model).await?;

    if let Some(choice) = response.choices.first() {
        let text = choice.message.text().to_string();
        let assistant = ChatMessage::assistant(text.as_str());
        if let Err(e) = state.short_term.append_turn(&session_id, &assistant).await {
            tracing::warn!(session_id = %session_id, error = %e, "Short-term append failed");
        }
        state
            .sessions
            .append_message(&session_id, "assistant", &text)
            .await?;
    }

    let turn_count = state.sessions.message_count(&session_id).await.unwrap_or(0);
    let promoter = state.promoter.clone();
    let promote_session = session_id.clone();
    let promote_workspace = workspace;
    state.background.dispatch(async move {
        promoter
            .maybe_promote(&promote_session, &promote_workspace, turn_count)
            .await;
    });

    let mut response = Json(response).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    Ok(response)
}

/// Streaming response: a producer task forwards SSE frames into a channel
/// and, after the upstream is drained, runs the persistence tail. Client
/// disconnects stop the forwarding but not the tail.
#[allow(clippy::too_many_arguments)]
fn stream_chat(
    state: AppState,
    route: Route,
    messages: Vec<ChatMessage>,
    params: SamplingParams,
    model: String,
    session_id: String,
    workspace: String,
) -> Response<Body> {
    let (tx, rx) = mpsc::channel::<String>(64);
    let producer_session = session_id.clone();

    tokio::spawn(async move {
        let stream = chat_completion_stream(state.http.clone(), route, messages, params, model);
        futures::pin_mut!(stream);

        let mut collected = String::new();
        let mut client_gone = false;

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(frame) => {
                    if let Some(delta) = delta_content(&frame) {
                        collected.push_str(&delta);
                    }
                    if !client_gone && tx.send(frame).await.is_err() {
                        client_gone = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %producer_session, error = %e, "Backend stream failed");
                    if !client_gone {
                        let error_frame = format!(
                            "data: {}\n\n",
                            serde_json::json!({"error": {"message": e.to_string(), "type": "upstream_error"}})
                        );
                        let _ = tx.send(error_frame).await;
                    }
                    break;
                }
            }
        }
        drop(tx);

        // Persistence tail: best-effort, runs even when the client is gone
        if !collected.is_empty() {
            let assistant = ChatMessage::assistant(collected.as_str());
            if let Err(e) = state.short_term.append_turn(&producer_session, &assistant).await {
                tracing::warn!(session_id = %producer_session, error = %e, "Short-term append failed");
            }
            if let Err(e) = state
                .sessions
                .append_message(&producer_session, "assistant", &collected)
                .await
            {
                tracing::warn!(session_id = %producer_session, error = %e, "Message persistence failed");
            }
            let turn_count = state
                .sessions
                .message_count(&producer_session)
                .await
                .unwrap_or(0);
            state
                .promoter
                .maybe_promote(&producer_session, &workspace, turn_count)
                .await;
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>));
    let mut response = Response::builder()
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_default();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}
