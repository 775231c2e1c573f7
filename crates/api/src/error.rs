//! API error handling
//!
//! Consistent JSON error responses for the delivery endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use processor::{PathError, ProcessError, SyncError};
use serde::Serialize;

/// Structured JSON error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error type that converts to JSON responses
#[derive(Debug)]
pub enum ApiError {
    /// No signature header at all
    MissingSignature,
    /// Any signature problem. Deliberately carries no reason.
    Unauthorized,
    /// Signed body that is not a usable delivery
    InvalidPayload(String),
    /// Repository name could not be resolved
    Path(PathError),
    /// The pull itself failed or was refused
    Sync(SyncError),
}

impl From<ProcessError> for ApiError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::Path(e) => ApiError::Path(e),
            ProcessError::Sync(e) => ApiError::Sync(e),
        }
    }
}

fn body(error: impl Into<String>, code: &str) -> ErrorResponse {
    ErrorResponse {
        error: error.into(),
        code: Some(code.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, response) = match self {
            ApiError::MissingSignature => (
                StatusCode::BAD_REQUEST,
                body("Missing signature header", "missing_signature"),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, body("Unauthorized", "unauthorized")),
            ApiError::InvalidPayload(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                body(msg, "invalid_payload"),
            ),
            // The attempted name is logged, not echoed back
            ApiError::Path(PathError::Traversal { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                body("Invalid repository name", "invalid_repository"),
            ),
            ApiError::Path(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                body(e.to_string(), "repository_not_found"),
            ),
            ApiError::Sync(e @ SyncError::Busy { .. }) => {
                (StatusCode::CONFLICT, body(e.to_string(), "busy"))
            }
            ApiError::Sync(e @ SyncError::Timeout { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                body(e.to_string(), "sync_timeout"),
            ),
            ApiError::Sync(e @ SyncError::ExternalToolFailed { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                body(e.to_string(), "sync_failed"),
            ),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
