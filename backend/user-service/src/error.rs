/// Error types for User Service
///
/// Errors are converted to JSON HTTP responses `{ "error", "status" }`.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use resilience::TransientError;
use std::fmt;

pub type Result<T> = std::result::Result<T, AppError>;

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),

    /// Serialization failure or connection hiccup; retried by the transaction layer
    TransientDatabaseError(String),

    ValidationError(String),

    NotFound(String),

    /// Username or email already taken
    Conflict(String),

    Forbidden(String),

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
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
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
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
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
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == UNIQUE_VIOLATION);
        if unique_violation {
            AppError::Conflict("username or email already in use".to_string())
        } else if err.is_transient() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Conflict("alice".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert!(AppError::TransientDatabaseError("40001".into()).is_transient());
        assert!(!AppError::Conflict("alice".into()).is_transient());
    }
}
