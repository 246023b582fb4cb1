use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use capstan_core::QueueError;

/// Error surface of the control API: a status code plus a stable,
/// machine-readable code in the `{ok: false, error}` envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    InvalidJson,
    InvalidBody,
    MissingField(&'static str),
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    Conflict,
    Internal(&'static str),
}

impl ApiError {
    /// Map an engine error onto the API surface. `internal_code` names the
    /// operation, so a store failure during enqueue reads `enqueue_failed`
    /// rather than a generic 500.
    pub fn from_queue(error: QueueError, internal_code: &'static str) -> Self {
        match error {
            QueueError::InvalidPayload(_) => ApiError::InvalidBody,
            QueueError::Conflict(_) => ApiError::Conflict,
            QueueError::NotFound(_) => ApiError::NotFound,
            other => {
                error!("queue operation failed: {}", other);
                ApiError::Internal(internal_code)
            }
        }
    }

    fn parts(&self) -> (StatusCode, String) {
        match self {
            ApiError::InvalidJson => (StatusCode::BAD_REQUEST, "invalid_json".to_owned()),
            ApiError::InvalidBody => (StatusCode::BAD_REQUEST, "invalid_body".to_owned()),
            ApiError::MissingField(field) => {
                (StatusCode::BAD_REQUEST, format!("missing {field}"))
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found".to_owned()),
            ApiError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed".to_owned())
            }
            ApiError::Conflict => (StatusCode::CONFLICT, "conflict".to_owned()),
            ApiError::Internal(code) => (StatusCode::INTERNAL_SERVER_ERROR, (*code).to_owned()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        (status, Json(json!({"ok": false, "error": code}))).into_response()
    }
}
