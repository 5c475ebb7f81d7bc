//! API error mapping
//!
//! Every handler error is rendered as an OpenAI-style JSON error body.
//! Upstream backend failures keep their original status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use mnemo_llm::LlmError;
use mnemo_memory::MemoryError;
use mnemo_persistence::PersistenceError;
use mnemo_queue::QueueError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Upstream { status: u16, body: String },
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", msg.clone())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found_error", msg.clone()),
            ApiError::Upstream { status, body } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "upstream_error",
                body.clone(),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(%status, error_type, message = %message, "Request failed");
        }
        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::UnknownModel(model) => ApiError::BadRequest(format!("Unknown model: {model}")),
            LlmError::UpstreamStatus { status, body } => ApiError::Upstream { status, body },
            LlmError::Network(msg) => ApiError::Upstream {
                status: 502,
                body: msg,
            },
            LlmError::InvalidResponse(msg) => ApiError::Upstream {
                status: 502,
                body: msg,
            },
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_maps_to_bad_request() {
        let err: ApiError = LlmError::UnknownModel("gpt-9".to_string()).into();
        let (status, error_type, _) = err.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_type, "invalid_request_error");
    }

    #[test]
    fn test_upstream_status_preserved() {
        let err: ApiError = LlmError::UpstreamStatus {
            status: 503,
            body: "overloaded".to_string(),
        }
        .into();
        let (status, _, message) = err.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(message, "overloaded");
    }

    #[test]
    fn test_invalid_upstream_status_falls_back() {
        let err = ApiError::Upstream {
            status: 42,
            body: "weird".to_string(),
        };
        assert_eq!(err.parts().0, StatusCode::BAD_GATEWAY);
    }
}
