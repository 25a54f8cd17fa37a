use prometheus::{IntCounter, IntGauge, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct OutboxMetrics {
    pub pending: IntGauge,
    pub oldest_pending_age_seconds: IntGauge,
    pub published: IntCounter,
    pub failed: IntCounter,
}

impl OutboxMetrics {
    pub fn new(service: &str) -> Self {
        let gauge = |name: &str, help: &str| {
            IntGauge::with_opts(Opts::new(name, help).const_label("service", service.to_string()))
                .expect("valid metric definition")
        };
        let counter = |name: &str, help: &str| {
            IntCounter::with_opts(Opts::new(name, help).const_label("service", service.to_string()))
                .expect("valid metric definition")
        };

        let metrics = Self {
            pending: gauge(
                "outbox_pending_count",
                "Number of unpublished outbox events currently pending",
            ),
            oldest_pending_age_seconds: gauge(
                "outbox_oldest_pending_age_seconds",
                "Age in seconds of the oldest pending outbox event",
            ),
            published: counter(
                "outbox_published_total",
                "Total number of outbox events marked as published",
            ),
            failed: counter(
                "outbox_publish_failures_total",
                "Total number of failed outbox publish attempts",
            ),
        };

        let registry = prometheus::default_registry();
        for metric in [
            Box::new(metrics.pending.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(metrics.oldest_pending_age_seconds.clone()),
            Box::new(metrics.published.clone()),
            Box::new(metrics.failed.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register outbox metric: {}", e);
            }
        }

        metrics
    }
}
