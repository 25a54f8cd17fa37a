//! Error types for the transactional outbox library.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

#[derive(Error, Debug)]
pub enum OutboxError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    /// The bus refused or failed the publish
    #[error("Publish failed: {0}")]
    PublishFailed(#[from] event_bus::EventBusError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Event encoding error: {0}")]
    Schema(#[from] event_schema::SchemaError),

    #[error("Outbox error: {0}")]
    Other(#[from] anyhow::Error),
}
