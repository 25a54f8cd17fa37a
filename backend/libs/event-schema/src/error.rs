use thiserror::Error;

/// Errors raised while encoding or decoding broker payloads.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The routing key does not name any known event variant
    #[error("Unknown routing key: {0}")]
    UnknownRoutingKey(String),

    /// The body is not valid JSON or does not match the variant's fields
    #[error("Malformed payload for {routing_key}: {source}")]
    MalformedPayload {
        routing_key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The body is JSON but not an object
    #[error("Payload for {0} is not a JSON object")]
    NotAnObject(String),

    /// Encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
