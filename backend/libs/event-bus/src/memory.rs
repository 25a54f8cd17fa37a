//! Process-local topic exchange for tests and local development
//!
//! Queues are exclusive to the subscription that declared them and vanish
//! when its transport closes. Nothing survives a restart.

use crate::config::EventBusConfig;
use crate::error::{EventBusError, Result};
use crate::pattern::TopicPattern;
use crate::transport::{Connector, Delivery, DeliveryTag, Subscription, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub body: Vec<u8>,
}

struct QueueBinding {
    id: u64,
    pattern: TopicPattern,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct BrokerState {
    queues: Vec<QueueBinding>,
    published: Vec<PublishedMessage>,
    delivered: usize,
    acked: Vec<String>,
    connections: usize,
}

#[derive(Default)]
struct BrokerInner {
    state: Mutex<BrokerState>,
    refuse_connections: AtomicBool,
    fail_publishes: AtomicBool,
    next_id: AtomicU64,
}

/// Shared handle to one in-memory exchange
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector {
            broker: self.clone(),
        }
    }

    /// Make subsequent connection attempts fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Make subsequent publishes fail on every open transport
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.state.lock().published.clone()
    }

    pub fn published_with_key(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.inner
            .state
            .lock()
            .published
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    pub fn ack_count(&self) -> usize {
        self.inner.state.lock().acked.len()
    }

    pub fn acked_with_key(&self, routing_key: &str) -> usize {
        self.inner
            .state
            .lock()
            .acked
            .iter()
            .filter(|k| *k == routing_key)
            .count()
    }

    /// Deliveries handed to a queue and not acked yet
    pub fn unacked_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.delivered.saturating_sub(state.acked.len())
    }

    pub fn queue_count(&self) -> usize {
        self.inner.state.lock().queues.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.state.lock().connections
    }

    /// Poll until `expected` acks were recorded or `timeout` passes.
    pub async fn wait_for_acks(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.ack_count() >= expected {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn route(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        if self.inner.fail_publishes.load(Ordering::SeqCst) {
            return Err(EventBusError::Publish {
                routing_key: routing_key.to_string(),
                reason: "broker rejected publish".to_string(),
            });
        }

        let mut state = self.inner.state.lock();
        state.published.push(PublishedMessage {
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
        });

        let mut delivered = 0;
        let mut closed = Vec::new();
        for queue in state.queues.iter().filter(|q| q.pattern.matches(routing_key)) {
            let delivery = Delivery {
                routing_key: routing_key.to_string(),
                body: body.to_vec(),
                tag: DeliveryTag::Memory(self.next_id()),
            };
            if queue.sender.send(delivery).is_ok() {
                delivered += 1;
            } else {
                closed.push(queue.id);
            }
        }
        state.delivered += delivered;
        state.queues.retain(|q| !closed.contains(&q.id));

        debug!(routing_key = %routing_key, queues = delivered, "Routed message");
        Ok(())
    }
}

/// Connects to an [`InMemoryBroker`]
#[derive(Clone)]
pub struct InMemoryConnector {
    broker: InMemoryBroker,
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, _config: &EventBusConfig) -> Result<Arc<dyn Transport>> {
        if self.broker.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(EventBusError::Connection(
                "in-memory broker refused connection".to_string(),
            ));
        }
        self.broker.inner.state.lock().connections += 1;
        Ok(Arc::new(InMemoryTransport {
            broker: self.broker.clone(),
            closed: AtomicBool::new(false),
            queue_ids: Mutex::new(Vec::new()),
        }))
    }
}

struct InMemoryTransport {
    broker: InMemoryBroker,
    closed: AtomicBool,
    queue_ids: Mutex<Vec<u64>>,
}

impl InMemoryTransport {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(EventBusError::NotConnected("transport closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.broker.route(routing_key, body)
    }

    async fn subscribe(&self, binding: &TopicPattern) -> Result<Box<dyn Subscription>> {
        self.ensure_open()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.broker.next_id();

        self.broker.inner.state.lock().queues.push(QueueBinding {
            id,
            pattern: binding.clone(),
            sender,
        });
        self.queue_ids.lock().push(id);

        Ok(Box::new(InMemorySubscription {
            receiver,
            broker: self.broker.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let ids = std::mem::take(&mut *self.queue_ids.lock());
        let mut state = self.broker.inner.state.lock();
        // Dropping the senders ends every subscription of this transport
        state.queues.retain(|q| !ids.contains(&q.id));
        state.connections = state.connections.saturating_sub(1);
        Ok(())
    }
}

struct InMemorySubscription {
    receiver: mpsc::UnboundedReceiver<Delivery>,
    broker: InMemoryBroker,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Option<Result<Delivery>> {
        self.receiver.recv().await.map(Ok)
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        self.broker
            .inner
            .state
            .lock()
            .acked
            .push(delivery.routing_key.clone());
        Ok(())
    }
}
