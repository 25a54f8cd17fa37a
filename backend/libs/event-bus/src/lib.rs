//! Event bus client for Nova services
//!
//! One shared topic exchange carries every domain event, addressed by its
//! routing key (`post.created`, `user.deleted`, ...). Producers publish
//! through an [`EventBus`]; consumers subscribe a handler under a binding
//! pattern and receive a private copy of every matching event.
//!
//! ```text
//! content-service ──publish(post.deleted)──▶ exchange ──▶ [queue: post.deleted] media-service
//!                                                     └─▶ [queue: post.*]      search-service
//! ```
//!
//! The bus is an explicit object: build it once at startup, share it as
//! `Arc<EventBus>`, and close it on shutdown. The connection is opened by
//! [`EventBus::connect`] or lazily on first use; when the broker is
//! unreachable, operations fail with [`EventBusError::NotConnected`] and the
//! caller decides whether to degrade.
//!
//! # Example
//!
//! ```no_run
//! use event_bus::{EventBus, EventBusConfig, KafkaConnector};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), event_bus::EventBusError> {
//! let bus = Arc::new(EventBus::new(
//!     EventBusConfig::from_env("content-service"),
//!     Arc::new(KafkaConnector),
//! ));
//! bus.connect().await?;
//! // ... publish / subscribe ...
//! bus.close().await?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod dispatch;
mod error;
mod handler;
mod kafka;
mod memory;
mod metrics;
mod pattern;
mod transport;

pub use bus::EventBus;
pub use config::{dead_letter_key, AckPolicy, EventBusConfig};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{EventBusError, Result};
pub use handler::EventHandler;
pub use kafka::{KafkaConnector, KafkaTransport};
pub use memory::{InMemoryBroker, InMemoryConnector, PublishedMessage};
pub use pattern::TopicPattern;
pub use transport::{Connector, Delivery, DeliveryTag, Subscription, Transport};
