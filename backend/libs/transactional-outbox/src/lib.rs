//! # Transactional Outbox
//!
//! Entity mutations and the events describing them are committed together:
//! the event row is written to `outbox_events` inside the business
//! transaction, and a background [`OutboxRelay`] publishes committed rows
//! through the [`event_bus::EventBus`]. A crash between commit and publish
//! delays the event instead of losing it.
//!
//! Delivery is at-least-once. A row that reached the broker but could not be
//! marked published goes out again, so consumers dedupe on `event_id`
//! (see the `idempotent-consumer` crate).
//!
//! ## Writing an event
//!
//! ```rust,no_run
//! use event_schema::{DomainEvent, EventMessage, UserDeleted};
//! use transactional_outbox::{OutboxEvent, SqlxOutboxRepository};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//! use chrono::Utc;
//!
//! async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!
//!     sqlx::query("DELETE FROM users WHERE id = $1")
//!         .bind(user_id)
//!         .execute(&mut *tx)
//!         .await?;
//!
//!     let message = EventMessage::new(DomainEvent::UserDeleted(UserDeleted {
//!         user_id,
//!         deleted_at: Utc::now(),
//!     }));
//!     SqlxOutboxRepository::insert(&mut tx, &OutboxEvent::from_message(&message)?).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Running the relay
//!
//! ```rust,no_run
//! use event_bus::{EventBus, EventBusConfig, KafkaConnector};
//! use transactional_outbox::{OutboxMetrics, OutboxRelay, OutboxRelayConfig, SqlxOutboxRepository};
//! use std::sync::Arc;
//!
//! # async fn run(pool: sqlx::PgPool) {
//! let bus = Arc::new(EventBus::new(
//!     EventBusConfig::from_env("user-service"),
//!     Arc::new(KafkaConnector),
//! ));
//! let relay = OutboxRelay::new(
//!     Arc::new(SqlxOutboxRepository::new(pool)),
//!     bus,
//!     OutboxRelayConfig::from_env(),
//! )
//! .with_metrics(OutboxMetrics::new("user-service"));
//!
//! tokio::spawn(async move { relay.start().await });
//! # }
//! ```
//!
//! Services own the `outbox_events` table in their migrations; the relay
//! only needs the columns of [`OutboxEvent`].

mod error;
mod event;
mod memory;
mod metrics;
mod relay;
mod repository;

pub use error::{OutboxError, OutboxResult};
pub use event::{backoff_for, OutboxEvent, MAX_BACKOFF};
pub use memory::InMemoryOutbox;
pub use metrics::OutboxMetrics;
pub use relay::{OutboxRelay, OutboxRelayConfig};
pub use repository::{OutboxStore, PendingStats, SqlxOutboxRepository};
