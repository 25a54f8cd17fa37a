/// Error types for Content Service
///
/// Errors are converted to JSON HTTP responses `{ "error", "status" }`.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use resilience::TransientError;
use std::fmt;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Database operation failed (after retries, when retried)
    DatabaseError(String),

    /// Write conflict or connection hiccup; retried by the transaction layer
    TransientDatabaseError(String),

    ValidationError(String),

    NotFound(String),

    BadRequest(String),

    /// A sibling service call failed or timed out
    Dependency(String),

    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) | AppError::TransientDatabaseError(msg) => {
                write!(f, "Database error: {}", msg)
            }
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Dependency(msg) => write!(f, "Dependency error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_)
            | AppError::TransientDatabaseError(_)
            | AppError::Dependency(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

impl TransientError for AppError {
    fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientDatabaseError(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if err.is_transient() {
            AppError::TransientDatabaseError(err.to_string())
        } else {
            AppError::DatabaseError(err.to_string())
        }
    }
}

impl From<transactional_outbox::OutboxError> for AppError {
    fn from(err: transactional_outbox::OutboxError) -> Self {
        match err {
            transactional_outbox::OutboxError::DatabaseError(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<event_schema::SchemaError> for AppError {
    fn from(err: event_schema::SchemaError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
