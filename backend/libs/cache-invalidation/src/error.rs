//! Error types for cache operations

use thiserror::Error;

/// Cache store and invalidation errors
#[derive(Error, Debug)]
pub enum InvalidationError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Value serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store is unreachable
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    /// Some targets could not be invalidated
    #[error("Failed to invalidate {failed} target(s): {first_error}")]
    Partial { failed: usize, first_error: String },
}

pub type Result<T> = std::result::Result<T, InvalidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InvalidationError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Cache store unavailable: connection refused");

        let err = InvalidationError::Partial {
            failed: 2,
            first_error: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to invalidate 2 target(s): timeout");
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let err: InvalidationError = json_err.into();
        assert!(matches!(err, InvalidationError::Serialization(_)));
    }
}
