//! Kafka transport
//!
//! The exchange maps to a topic prefix: routing key `post.created` on
//! exchange `nova.events` is topic `nova.events.post.created`. Every
//! subscription gets its own consumer group, so each process (and each
//! subscription within it) receives its own copy of every matching message.
//! Acking commits the offset.

use crate::config::EventBusConfig;
use crate::error::{EventBusError, Result};
use crate::pattern::TopicPattern;
use crate::transport::{Connector, Delivery, DeliveryTag, Subscription, Transport};
use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// Opens [`KafkaTransport`]s
#[derive(Debug, Clone, Default)]
pub struct KafkaConnector;

#[async_trait]
impl Connector for KafkaConnector {
    async fn connect(&self, config: &EventBusConfig) -> Result<Arc<dyn Transport>> {
        let transport = KafkaTransport::connect(config)?;
        Ok(Arc::new(transport))
    }
}

pub struct KafkaTransport {
    producer: FutureProducer,
    config: EventBusConfig,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl KafkaTransport {
    pub fn connect(config: &EventBusConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", config.publish_timeout.as_millis().to_string())
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()?;

        // Fail fast when no broker is reachable instead of on first publish
        producer
            .client()
            .fetch_metadata(None, config.publish_timeout)
            .map_err(|e| EventBusError::Connection(e.to_string()))?;

        let (shutdown, _) = watch::channel(false);
        info!(brokers = %config.brokers, exchange = %config.exchange, "Connected to Kafka");

        Ok(Self {
            producer,
            config: config.clone(),
            closed: AtomicBool::new(false),
            shutdown,
        })
    }

    fn topic_for(&self, routing_key: &str) -> String {
        format!("{}.{}", self.config.exchange, routing_key)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(EventBusError::NotConnected("kafka transport closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let topic = self.topic_for(routing_key);
        let record = FutureRecord::<(), [u8]>::to(&topic).payload(body);

        match self.producer.send(record, self.config.publish_timeout).await {
            Ok((partition, offset)) => {
                debug!(topic = %topic, partition, offset, "Published to Kafka");
                Ok(())
            }
            Err((e, _)) => Err(EventBusError::Publish {
                routing_key: routing_key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn subscribe(&self, binding: &TopicPattern) -> Result<Box<dyn Subscription>> {
        self.ensure_open()?;
        let group_id = format!(
            "{}.{}.{}",
            self.config.exchange,
            self.config.client_id,
            Uuid::new_v4()
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &group_id)
            .set("bootstrap.servers", &self.config.brokers)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            // A new queue only sees messages published after it was declared
            .set("auto.offset.reset", "latest")
            .set("queued.min.messages", self.config.prefetch.max(1).to_string())
            .set("topic.metadata.refresh.interval.ms", "10000")
            .create()?;

        let subscription = if binding.is_exact() {
            self.topic_for(binding.as_str())
        } else {
            binding.to_topic_regex(&self.config.exchange)
        };
        consumer
            .subscribe(&[subscription.as_str()])
            .map_err(|e| EventBusError::Subscribe {
                binding: binding.to_string(),
                reason: e.to_string(),
            })?;

        info!(binding = %binding, group_id = %group_id, "Kafka subscription declared");

        Ok(Box::new(KafkaSubscription {
            consumer,
            topic_prefix: format!("{}.", self.config.exchange),
            shutdown: self.shutdown.subscribe(),
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown.send(true);
        self.producer
            .flush(self.config.publish_timeout)
            .map_err(|e| EventBusError::Connection(e.to_string()))?;
        info!("Kafka transport closed");
        Ok(())
    }
}

struct KafkaSubscription {
    consumer: StreamConsumer,
    topic_prefix: String,
    shutdown: watch::Receiver<bool>,
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn next(&mut self) -> Option<Result<Delivery>> {
        if *self.shutdown.borrow() {
            return None;
        }

        tokio::select! {
            _ = self.shutdown.changed() => None,
            received = self.consumer.recv() => Some(match received {
                Ok(msg) => {
                    let topic = msg.topic().to_string();
                    let routing_key = topic
                        .strip_prefix(&self.topic_prefix)
                        .unwrap_or(&topic)
                        .to_string();
                    Ok(Delivery {
                        routing_key,
                        body: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                        tag: DeliveryTag::Kafka {
                            topic,
                            partition: msg.partition(),
                            offset: msg.offset(),
                        },
                    })
                }
                Err(e) => Err(EventBusError::Kafka(e)),
            }),
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        let DeliveryTag::Kafka {
            topic,
            partition,
            offset,
        } = &delivery.tag
        else {
            return Err(EventBusError::Ack(
                "delivery does not belong to a Kafka subscription".to_string(),
            ));
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, *partition, Offset::Offset(offset + 1))
            .map_err(|e| EventBusError::Ack(e.to_string()))?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| EventBusError::Ack(e.to_string()))
    }
}
