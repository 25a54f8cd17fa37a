//! Broker abstraction behind the event bus

use crate::config::EventBusConfig;
use crate::error::Result;
use crate::pattern::TopicPattern;
use async_trait::async_trait;
use std::sync::Arc;

/// Where a delivery sits in the broker, used to ack it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTag {
    Memory(u64),
    Kafka {
        topic: String,
        partition: i32,
        offset: i64,
    },
}

/// One message taken off a subscription's queue
#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub tag: DeliveryTag,
}

/// An exclusive queue bound to the exchange
#[async_trait]
pub trait Subscription: Send {
    /// Next delivery; `None` once the transport is closed
    async fn next(&mut self) -> Option<Result<Delivery>>;

    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;
}

/// A live broker connection shared by every publisher and consumer of the
/// process.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` to the exchange under `routing_key`
    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<()>;

    /// Declare a fresh exclusive queue bound under `binding`
    async fn subscribe(&self, binding: &TopicPattern) -> Result<Box<dyn Subscription>>;

    async fn close(&self) -> Result<()>;
}

/// Opens transports; the bus calls this lazily.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &EventBusConfig) -> Result<Arc<dyn Transport>>;
}
