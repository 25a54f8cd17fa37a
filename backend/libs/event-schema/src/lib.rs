//! Domain event contract shared by every Nova service.
//!
//! Producers and consumers agree on a closed set of event variants, one per
//! routing key, each with a fixed field set. The broker body is the JSON
//! payload object of the variant plus an `event_id` used for consumer-side
//! deduplication; the routing key travels as broker metadata.
//!
//! ```
//! use event_schema::{DomainEvent, EventMessage, PostDeleted};
//! use uuid::Uuid;
//!
//! let event = DomainEvent::PostDeleted(PostDeleted {
//!     post_id: Uuid::new_v4(),
//!     user_id: Uuid::new_v4(),
//!     deleted_at: chrono::Utc::now(),
//! });
//! let message = EventMessage::new(event);
//! let bytes = message.encode().unwrap();
//!
//! let decoded = EventMessage::decode("post.deleted", &bytes).unwrap();
//! assert_eq!(decoded.event_id, message.event_id);
//! ```

mod error;
mod events;
mod message;

pub use error::SchemaError;
pub use events::{
    routing_keys, DomainEvent, PostCreated, PostDeleted, PostDiscarded, PostLiked, PostUnliked,
    PostUpdated, UserCreated, UserDeleted, UserUpdated,
};
pub use message::EventMessage;
