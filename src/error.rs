//! Engine error taxonomy and its HTTP mapping.
//!
//! Business-rule violations (wrong state, wrong actor) are terminal for the
//! request and are never retried. Only `RateLimited` and `Persistence` are
//! retryable by the caller, after the indicated backoff.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("not allowed: {0}")]
    AuthorizationDenied(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("content rejected by moderation")]
    ModerationRejected { terms: Vec<String> },

    #[error("persistence failure")]
    Persistence(#[from] rusqlite::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::AuthorizationDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            Error::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "authentication required" })),
            )
                .into_response(),
            Error::AuthorizationDenied(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
            }
            Error::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{} not found", what) })),
            )
                .into_response(),
            Error::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
            }
            Error::RateLimited { retry_after_ms } => {
                let retry_after_secs = retry_after_ms.div_ceil(1000);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    Json(json!({
                        "error": "rate limited",
                        "remaining": 0,
                        "retry_after_ms": retry_after_ms,
                    })),
                )
                    .into_response()
            }
            Error::ModerationRejected { terms } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "content rejected by moderation",
                    "prohibited_terms": terms,
                })),
            )
                .into_response(),
            Error::Persistence(e) => {
                // Logged server-side; the caller only sees a generic failure.
                tracing::error!("persistence failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
