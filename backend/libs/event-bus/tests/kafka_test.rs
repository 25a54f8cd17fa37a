//! Kafka transport tests
//!
//! These tests require a running Kafka broker with topic auto-creation.
//! Run with: KAFKA_BROKERS=localhost:9092 cargo test --test kafka_test -- --ignored

use async_trait::async_trait;
use chrono::Utc;
use event_bus::{AckPolicy, EventBus, EventBusConfig, EventHandler, KafkaConnector};
use event_schema::{DomainEvent, EventMessage, PostDeleted};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct ForwardingHandler(mpsc::UnboundedSender<EventMessage>);

#[async_trait]
impl EventHandler for ForwardingHandler {
    fn name(&self) -> &str {
        "forwarding"
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        self.0.send(message.clone())?;
        Ok(())
    }
}

fn config() -> EventBusConfig {
    let mut config = EventBusConfig::new("kafka-test").with_ack_policy(AckPolicy::default());
    config.brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".into());
    config.exchange = format!("nova.test.{}", Uuid::new_v4().simple());
    config
}

#[tokio::test]
#[ignore] // Requires Kafka
async fn test_publish_reaches_pattern_subscriber() {
    let bus = EventBus::new(config(), Arc::new(KafkaConnector));
    bus.connect().await.expect("Failed to connect to Kafka");

    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.subscribe("post.*", Arc::new(ForwardingHandler(tx)))
        .await
        .expect("subscribe");

    // Give the consumer group time to join before publishing
    tokio::time::sleep(Duration::from_secs(5)).await;

    let message = EventMessage::new(DomainEvent::PostDeleted(PostDeleted {
        post_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        deleted_at: Utc::now(),
    }));
    bus.publish(&message).await.expect("publish");

    let received = tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("channel closed");
    assert_eq!(received.event_id, message.event_id);

    bus.close().await.expect("close");
}
