//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Rule violations answer 400, credential problems 401. Upstream failures
//! answer 500 with a fixed message; their detail only reaches the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use huddle_types::error::{AccountError, ChatError};

/// Message returned for every unexpected failure.
pub const SERVER_ERROR: &str = "Server error";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Chat(ChatError),
    Account(AccountError),
    /// Missing or unusable bearer token.
    Unauthorized(String),
    /// Malformed request body.
    Validation(String),
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        AppError::Account(e)
    }
}

impl AppError {
    /// Status, machine-readable code and client-facing message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        let bad = StatusCode::BAD_REQUEST;
        match self {
            AppError::Chat(e) => match e {
                ChatError::Validation(msg) => (bad, "VALIDATION_ERROR", msg.clone()),
                ChatError::PayloadTooLarge { .. } => (bad, "PAYLOAD_TOO_LARGE", e.to_string()),
                ChatError::NotFound(msg) => (bad, "NOT_FOUND", msg.clone()),
                ChatError::Forbidden(msg) => (bad, "FORBIDDEN", msg.clone()),
                ChatError::DuplicateGroup => (bad, "DUPLICATE_GROUP", e.to_string()),
                ChatError::AlreadyMember => (bad, "ALREADY_MEMBER", e.to_string()),
                ChatError::NotMember(msg) => (bad, "NOT_MEMBER", msg.clone()),
                ChatError::Upstream(_) => server_error(),
            },
            AppError::Account(e) => match e {
                AccountError::Validation(msg) => (bad, "VALIDATION_ERROR", msg.clone()),
                AccountError::PayloadTooLarge { .. } => (bad, "PAYLOAD_TOO_LARGE", e.to_string()),
                AccountError::NotFound(msg) => (bad, "NOT_FOUND", msg.clone()),
                AccountError::EmailTaken => (bad, "EMAIL_TAKEN", e.to_string()),
                AccountError::UsernameTaken(_) => (bad, "USERNAME_TAKEN", e.to_string()),
                AccountError::InvalidCredentials => (bad, "INVALID_CREDENTIALS", e.to_string()),
                AccountError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                AccountError::Upstream(_) => server_error(),
            },
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (bad, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(_) => server_error(),
        }
    }
}

fn server_error() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "SERVER_ERROR",
        SERVER_ERROR.to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
