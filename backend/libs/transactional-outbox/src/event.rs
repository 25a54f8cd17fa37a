use chrono::{DateTime, Utc};
use event_schema::EventMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::OutboxResult;

/// One row of the `outbox_events` table.
///
/// The row id doubles as the event id carried in the payload, so a
/// republished row is recognised by idempotent consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,

    /// "post" or "user"
    pub aggregate_type: String,

    pub aggregate_id: Uuid,

    /// Routing key the relay publishes under (e.g. "post.created")
    pub event_type: String,

    /// Encoded event body, `event_id` included
    pub payload: serde_json::Value,

    /// Optional metadata (correlation id, originating service, ...)
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// None while unpublished
    pub published_at: Option<DateTime<Utc>>,

    /// Number of failed publish attempts
    pub retry_count: i32,

    pub last_error: Option<String>,

    /// Earliest time the relay may try this row again
    pub next_attempt_at: DateTime<Utc>,
}

impl OutboxEvent {
    /// Build an unpublished row from a domain event message.
    pub fn from_message(message: &EventMessage) -> OutboxResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: message.event_id,
            aggregate_type: message.event.aggregate_type().to_string(),
            aggregate_id: message.event.aggregate_id(),
            event_type: message.routing_key().to_string(),
            payload: message.to_value()?,
            metadata: None,
            created_at: now,
            published_at: None,
            retry_count: 0,
            last_error: None,
            next_attempt_at: now,
        })
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Wire body published to the bus
    pub fn body(&self) -> OutboxResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload)?)
    }
}

/// Upper bound on the delay between publish attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Delay before the next attempt of a row that has failed `retry_count`
/// times before the current failure: 2^retry_count seconds, capped.
pub fn backoff_for(retry_count: i32) -> Duration {
    let exponent = retry_count.clamp(0, 16) as u32;
    Duration::from_secs(2u64.pow(exponent)).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_schema::{DomainEvent, PostDeleted};

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(backoff_for(0).as_secs(), 1);
        assert_eq!(backoff_for(1).as_secs(), 2);
        assert_eq!(backoff_for(2).as_secs(), 4);
        assert_eq!(backoff_for(4).as_secs(), 16);
        assert_eq!(backoff_for(8).as_secs(), 256);
        assert_eq!(backoff_for(9).as_secs(), 300);
        assert_eq!(backoff_for(40).as_secs(), 300);
    }

    #[test]
    fn test_from_message_keeps_event_id() {
        let post_id = Uuid::new_v4();
        let message = EventMessage::new(DomainEvent::PostDeleted(PostDeleted {
            post_id,
            user_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        }));

        let row = OutboxEvent::from_message(&message).unwrap();
        assert_eq!(row.id, message.event_id);
        assert_eq!(row.aggregate_type, "post");
        assert_eq!(row.aggregate_id, post_id);
        assert_eq!(row.event_type, "post.deleted");
        assert_eq!(row.retry_count, 0);
        assert!(row.published_at.is_none());

        let decoded = EventMessage::decode(&row.event_type, &row.body().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }
}
