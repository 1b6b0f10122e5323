//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use vault_chat::ChatError;

/// Message returned to callers when the provider call fails. Detail stays in
/// the server log.
pub const ASSISTANT_UNAVAILABLE: &str =
    "The assistant is unavailable right now. Please try again later.";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "unauthorized").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - missing or unusable credentials.
    Unauthorized(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - upstream dependency failed.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<vault_core::error::VaultError> for ApiError {
    fn from(err: vault_core::error::VaultError) -> Self {
        match &err {
            vault_core::error::VaultError::Config(msg) => ApiError::BadRequest(msg.clone()),
            vault_core::error::VaultError::Storage(msg) => ApiError::Internal(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            // Missing credential is an authorization-style failure; it never
            // reaches the network.
            ChatError::MissingCredential => ApiError::Unauthorized(err.to_string()),
            ChatError::MessageTooLong(_) => ApiError::BadRequest(err.to_string()),
            // Upstream detail was already logged; callers get one generic
            // message.
            ChatError::Provider(_) => {
                ApiError::ServiceUnavailable(ASSISTANT_UNAVAILABLE.to_string())
            }
            ChatError::StorageError(msg) => ApiError::Internal(msg),
        }
    }
}
