use crate::config::EventBusConfig;
use crate::dispatch::{run_consumer, Dispatcher};
use crate::error::{EventBusError, Result};
use crate::handler::EventHandler;
use crate::metrics;
use crate::pattern::TopicPattern;
use crate::transport::{Connector, Transport};
use event_schema::{DomainEvent, EventMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long `close` waits for consumers to drain
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Broker client for one process.
///
/// Holds at most one transport, opened by [`connect`](Self::connect) or
/// lazily by the first publish/subscribe. Share it behind an `Arc`.
pub struct EventBus {
    config: EventBusConfig,
    connector: Arc<dyn Connector>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    consumers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new(config: EventBusConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            transport: Mutex::new(None),
            consumers: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    /// Open the broker connection. A no-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        self.transport().await.map(|_| ())
    }

    /// Stop consumers and release the connection.
    pub async fn close(&self) -> Result<()> {
        let transport = self.transport.lock().await.take();
        let Some(transport) = transport else {
            return Ok(());
        };

        let result = transport.close().await;

        let consumers = std::mem::take(&mut *self.consumers.lock());
        for handle in consumers {
            if tokio::time::timeout(CLOSE_GRACE, handle).await.is_err() {
                warn!("Event consumer did not stop within grace period");
            }
        }

        info!(client_id = %self.config.client_id, "Event bus closed");
        result
    }

    async fn transport(&self) -> Result<Arc<dyn Transport>> {
        let mut slot = self.transport.lock().await;
        if let Some(transport) = slot.as_ref() {
            return Ok(transport.clone());
        }

        let transport = self.connector.connect(&self.config).await?;
        info!(
            client_id = %self.config.client_id,
            exchange = %self.config.exchange,
            "Event bus connected"
        );
        *slot = Some(transport.clone());
        Ok(transport)
    }

    /// Current transport, connecting once if needed. Failure is logged and
    /// reported as `NotConnected`.
    async fn connected_transport(&self, operation: &str) -> Result<Arc<dyn Transport>> {
        match self.transport().await {
            Ok(transport) => Ok(transport),
            Err(e) => {
                error!(
                    operation,
                    error = %e,
                    "Event bus unavailable, skipping {}", operation
                );
                Err(EventBusError::NotConnected(e.to_string()))
            }
        }
    }

    /// Publish an event under its own routing key.
    pub async fn publish(&self, message: &EventMessage) -> Result<()> {
        let body = message.encode()?;
        self.publish_raw(message.routing_key(), &body).await
    }

    /// Publish a fresh event with a new event id.
    pub async fn publish_event(&self, event: DomainEvent) -> Result<()> {
        self.publish(&EventMessage::new(event)).await
    }

    /// Publish pre-encoded JSON. No confirmation beyond the transport's own
    /// and no retry; failures are logged and returned.
    pub async fn publish_raw(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        let transport = self.connected_transport("publish").await?;

        match transport.publish(routing_key, body).await {
            Ok(()) => {
                metrics::record_published(routing_key);
                debug!(routing_key = %routing_key, bytes = body.len(), "Event published");
                Ok(())
            }
            Err(e) => {
                metrics::record_publish_failure(routing_key);
                error!(routing_key = %routing_key, error = %e, "Event publish failed");
                Err(e)
            }
        }
    }

    /// Publish and swallow any failure after logging it.
    pub async fn publish_best_effort(&self, message: &EventMessage) {
        if let Err(e) = self.publish(message).await {
            warn!(
                routing_key = %message.routing_key(),
                event_id = %message.event_id,
                error = %e,
                "Dropping event after publish failure"
            );
        }
    }

    /// Bind a fresh exclusive queue under `binding` and consume it with
    /// `handler` on a background task.
    pub async fn subscribe(&self, binding: &str, handler: Arc<dyn EventHandler>) -> Result<()> {
        let pattern = TopicPattern::parse(binding)?;
        let transport = self.connected_transport("subscribe").await?;
        let subscription = transport.subscribe(&pattern).await?;

        let dispatcher = Dispatcher::new(handler.clone(), self.config.ack_policy.clone(), transport);
        let handle = tokio::spawn(run_consumer(subscription, dispatcher, binding.to_string()));
        self.consumers.lock().push(handle);

        info!(binding = %binding, handler = %handler.name(), "Subscribed");
        Ok(())
    }
}
