use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventBusError {
    /// No broker connection; the operation was not attempted
    #[error("event bus not connected: {0}")]
    NotConnected(String),

    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("publish to {routing_key} failed: {reason}")]
    Publish { routing_key: String, reason: String },

    #[error("subscribe to {binding} failed: {reason}")]
    Subscribe { binding: String, reason: String },

    #[error("ack failed: {0}")]
    Ack(String),

    #[error("invalid binding pattern: {0}")]
    InvalidBinding(String),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("schema error: {0}")]
    Schema(#[from] event_schema::SchemaError),
}

pub type Result<T> = std::result::Result<T, EventBusError>;
