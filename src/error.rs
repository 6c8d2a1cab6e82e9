//! Error types for kvblog
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

/// Application-wide error type
///
/// Repositories, services and handlers all return this type. Variants map
/// one-to-one onto the HTTP status a presentation layer should answer with.
#[derive(Debug, Error)]
pub enum AppError {
    /// Entity id, name or email has no record (404)
    #[error("Resource not found")]
    NotFound,

    /// Uniqueness violation on a lookup map (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Page number outside `[1, pages]` (400)
    #[error("Page {page} is outside the valid range 1..={pages}")]
    InvalidRange { page: u64, pages: u64 },

    /// Key-value backend failed or is unreachable (503)
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// Stored field could not be decoded into its typed form (500)
    #[error("Malformed field `{field}` in `{key}`: {reason}")]
    Decode {
        key: String,
        field: &'static str,
        reason: String,
    },

    /// Caller lacks the required permission (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a decode error for a hash field.
    pub fn decode(key: &str, field: &'static str, reason: impl ToString) -> Self {
        AppError::Decode {
            key: key.to_string(),
            field,
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::from(err))
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "conflict"),
            AppError::InvalidRange { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string(), "invalid_range")
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string(), "forbidden"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Store(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Store unavailable".to_string(),
                "store",
            ),
            AppError::Decode { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Stored record is malformed".to_string(),
                "decode",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, kind = error_type, "Request failed");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
