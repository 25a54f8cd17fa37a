//! Event bus behaviour over the in-memory broker

use async_trait::async_trait;
use chrono::Utc;
use event_bus::{
    AckPolicy, Delivery, DeliveryTag, DispatchOutcome, Dispatcher, EventBus, EventBusConfig,
    EventBusError, EventHandler, InMemoryBroker,
};
use event_schema::{DomainEvent, EventMessage, PostDeleted, UserCreated};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

struct RecordingHandler {
    failures_before_success: u32,
    calls: AtomicU32,
    received: Mutex<Vec<EventMessage>>,
}

impl RecordingHandler {
    fn new(failures_before_success: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_before_success,
            calls: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            anyhow::bail!("simulated failure {}", call);
        }
        self.received.lock().push(message.clone());
        Ok(())
    }
}

fn post_deleted() -> EventMessage {
    EventMessage::new(DomainEvent::PostDeleted(PostDeleted {
        post_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        deleted_at: Utc::now(),
    }))
}

fn bus_with(broker: &InMemoryBroker, policy: AckPolicy) -> EventBus {
    EventBus::new(
        EventBusConfig::new("bus-test").with_ack_policy(policy),
        Arc::new(broker.connector()),
    )
}

fn retrying(max_attempts: u32) -> AckPolicy {
    AckPolicy::AckOnSuccess {
        max_attempts,
        retry_delay: Duration::from_millis(5),
        dead_letter: true,
    }
}

#[tokio::test]
async fn test_publish_connects_lazily_once() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, AckPolicy::default());
    assert!(!bus.is_connected().await);

    bus.publish(&post_deleted()).await.unwrap();
    bus.publish(&post_deleted()).await.unwrap();

    assert!(bus.is_connected().await);
    assert_eq!(broker.connection_count(), 1);
    assert_eq!(broker.published_with_key("post.deleted").len(), 2);
}

#[tokio::test]
async fn test_unreachable_broker_reports_not_connected() {
    let broker = InMemoryBroker::new();
    broker.refuse_connections(true);
    let bus = bus_with(&broker, AckPolicy::default());

    let err = bus.publish(&post_deleted()).await.unwrap_err();
    assert!(matches!(err, EventBusError::NotConnected(_)));

    let err = bus
        .subscribe("post.*", RecordingHandler::new(0))
        .await
        .unwrap_err();
    assert!(matches!(err, EventBusError::NotConnected(_)));

    // best-effort variant swallows the failure
    bus.publish_best_effort(&post_deleted()).await;
    assert!(broker.published().is_empty());

    broker.refuse_connections(false);
    bus.publish(&post_deleted()).await.unwrap();
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn test_subscriber_receives_matching_events_only() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, AckPolicy::default());
    let handler = RecordingHandler::new(0);
    bus.subscribe("post.*", handler.clone()).await.unwrap();

    let message = post_deleted();
    bus.publish(&message).await.unwrap();
    bus.publish_event(DomainEvent::UserCreated(UserCreated {
        user_id: Uuid::new_v4(),
        username: "alice".to_string(),
        display_name: None,
        created_at: Utc::now(),
    }))
    .await
    .unwrap();

    assert!(broker.wait_for_acks(1, WAIT).await);
    assert_eq!(handler.received.lock().as_slice(), &[message]);
    assert_eq!(broker.unacked_count(), 0);
}

#[tokio::test]
async fn test_always_ack_loses_failed_message() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, AckPolicy::AlwaysAck);
    let handler = RecordingHandler::new(u32::MAX);
    bus.subscribe("post.deleted", handler.clone()).await.unwrap();

    bus.publish(&post_deleted()).await.unwrap();

    assert!(broker.wait_for_acks(1, WAIT).await);
    assert_eq!(handler.calls(), 1);
    assert!(broker.published_with_key("dlq.post.deleted").is_empty());
}

#[tokio::test]
async fn test_ack_on_success_retries_transient_failure() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, retrying(3));
    let handler = RecordingHandler::new(1);
    bus.subscribe("post.deleted", handler.clone()).await.unwrap();

    bus.publish(&post_deleted()).await.unwrap();

    assert!(broker.wait_for_acks(1, WAIT).await);
    assert_eq!(handler.calls(), 2);
    assert_eq!(handler.received.lock().len(), 1);
    assert!(broker.published_with_key("dlq.post.deleted").is_empty());
}

#[tokio::test]
async fn test_ack_on_success_dead_letters_after_budget() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, retrying(3));
    let handler = RecordingHandler::new(u32::MAX);
    bus.subscribe("post.deleted", handler.clone()).await.unwrap();

    let message = post_deleted();
    bus.publish(&message).await.unwrap();

    assert!(broker.wait_for_acks(1, WAIT).await);
    assert_eq!(handler.calls(), 3);

    let dead = broker.published_with_key("dlq.post.deleted");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].body, message.encode().unwrap());
}

#[tokio::test]
async fn test_undecodable_body_skips_handler() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, retrying(3));
    let handler = RecordingHandler::new(0);
    bus.subscribe("post.*", handler.clone()).await.unwrap();

    bus.publish_raw("post.created", br#"{"post_id": 42}"#).await.unwrap();

    assert!(broker.wait_for_acks(1, WAIT).await);
    assert_eq!(handler.calls(), 0);
    assert_eq!(broker.published_with_key("dlq.post.created").len(), 1);
}

#[tokio::test]
async fn test_close_stops_consumers() {
    let broker = InMemoryBroker::new();
    let bus = bus_with(&broker, AckPolicy::default());
    let handler = RecordingHandler::new(0);
    bus.subscribe("post.*", handler.clone()).await.unwrap();
    assert_eq!(broker.queue_count(), 1);

    bus.close().await.unwrap();

    assert!(!bus.is_connected().await);
    assert_eq!(broker.queue_count(), 0);
    assert_eq!(broker.connection_count(), 0);
}

#[tokio::test]
async fn test_failed_dead_letter_leaves_delivery_unacked() {
    let broker = InMemoryBroker::new();
    let transport = {
        use event_bus::Connector;
        broker
            .connector()
            .connect(&EventBusConfig::new("dispatch-test"))
            .await
            .unwrap()
    };
    let dispatcher = Dispatcher::new(RecordingHandler::new(u32::MAX), retrying(2), transport);
    broker.fail_publishes(true);

    let message = post_deleted();
    let delivery = Delivery {
        routing_key: "post.deleted".to_string(),
        body: message.encode().unwrap(),
        tag: DeliveryTag::Memory(1),
    };

    let outcome = dispatcher.dispatch(&delivery).await;
    assert!(matches!(outcome, DispatchOutcome::Unresolved { .. }));
    assert!(!outcome.should_ack());
}
