//! # Idempotent consumers
//!
//! The event bus delivers at least once: the outbox relay may republish a
//! row and `AckOnSuccess` redelivers after a handler failure. Handlers that
//! must not apply an event twice are wrapped in [`IdempotentHandler`], which
//! records `<handler>:<event_id>` in a [`ProcessedEventStore`] after the
//! handler succeeds and skips later copies.
//!
//! ```text
//! EventBus → IdempotentHandler → (seen?) → inner handler → mark processed
//!                                    ↓
//!                             processed_events
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use idempotent_consumer::{IdempotencyGuard, IdempotentHandler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let guard = IdempotencyGuard::postgres(pool, Duration::from_secs(7 * 86400));
//! bus.subscribe("post.liked", Arc::new(IdempotentHandler::new(handler, guard.clone())))
//!     .await?;
//!
//! // Hourly retention sweep
//! tokio::spawn(async move {
//!     loop {
//!         tokio::time::sleep(Duration::from_secs(3600)).await;
//!         let _ = guard.cleanup_old_events().await;
//!     }
//! });
//! ```
//!
//! The guard can also be used directly:
//!
//! ```ignore
//! match guard.process_if_new("event-123", || async { Ok(()) }).await? {
//!     ProcessingResult::Success => {}
//!     ProcessingResult::AlreadyProcessed => {}
//!     ProcessingResult::Failed(err) => eprintln!("Processing failed: {}", err),
//! }
//! ```
//!
//! The table (`processed_events`) is created by each consuming service's
//! migrations: `event_id VARCHAR(255) UNIQUE`, `metadata JSONB`,
//! `processed_at TIMESTAMPTZ` with an index on `processed_at`.

mod error;
mod guard;
mod handler;
mod store;

pub use error::{IdempotencyError, IdempotencyResult};
pub use guard::{IdempotencyGuard, ProcessingResult, MAX_EVENT_ID_LEN};
pub use handler::IdempotentHandler;
pub use store::{
    InMemoryProcessedEventStore, PgProcessedEventStore, ProcessedEvent, ProcessedEventStore,
};
