use std::env;
use std::time::Duration;

/// What the consumer does with a delivery after its handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckPolicy {
    /// Ack as soon as the handler returns, success or not. A failed
    /// handler loses the message (at-most-once).
    AlwaysAck,
    /// Ack only after the handler succeeds. Failures are retried
    /// in-process; once `max_attempts` is spent the raw body is routed to
    /// `dlq.<routing_key>` (when `dead_letter` is set) and acked.
    AckOnSuccess {
        max_attempts: u32,
        retry_delay: Duration,
        dead_letter: bool,
    },
}

impl Default for AckPolicy {
    fn default() -> Self {
        AckPolicy::AckOnSuccess {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            dead_letter: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Comma-separated Kafka bootstrap servers
    pub brokers: String,
    /// Name of the shared topic exchange
    pub exchange: String,
    /// Identifies this process in consumer group names
    pub client_id: String,
    pub ack_policy: AckPolicy,
    /// Messages a subscription may buffer ahead of its handler
    pub prefetch: usize,
    pub publish_timeout: Duration,
}

impl EventBusConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            exchange: "nova.events".to_string(),
            client_id: client_id.into(),
            ack_policy: AckPolicy::default(),
            prefetch: 10,
            publish_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_ack_policy(mut self, ack_policy: AckPolicy) -> Self {
        self.ack_policy = ack_policy;
        self
    }

    /// Build from environment variables, falling back to development defaults
    pub fn from_env(client_id: impl Into<String>) -> Self {
        let defaults = Self::new(client_id);

        let max_attempts = env::var("EVENT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let retry_delay = env::var("EVENT_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));
        let ack_policy = match env::var("EVENT_ACK_POLICY").as_deref() {
            Ok("always") => AckPolicy::AlwaysAck,
            _ => AckPolicy::AckOnSuccess {
                max_attempts,
                retry_delay,
                dead_letter: env::var("EVENT_DEAD_LETTER")
                    .map(|v| v != "false")
                    .unwrap_or(true),
            },
        };

        Self {
            brokers: env::var("KAFKA_BROKERS").unwrap_or(defaults.brokers),
            exchange: env::var("EVENT_EXCHANGE").unwrap_or(defaults.exchange),
            client_id: defaults.client_id,
            ack_policy,
            prefetch: env::var("EVENT_PREFETCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prefetch),
            publish_timeout: env::var("EVENT_PUBLISH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.publish_timeout),
        }
    }
}

/// Routing key that receives deliveries a handler could not process
pub fn dead_letter_key(routing_key: &str) -> String {
    format!("dlq.{}", routing_key)
}
