use prometheus::{IntCounterVec, Opts};
use std::sync::OnceLock;

static METRICS: OnceLock<BusMetricsInner> = OnceLock::new();

struct BusMetricsInner {
    published: IntCounterVec,
    publish_failures: IntCounterVec,
    handler_failures: IntCounterVec,
    dead_lettered: IntCounterVec,
}

impl BusMetricsInner {
    fn new() -> Self {
        let inner = Self {
            published: IntCounterVec::new(
                Opts::new("event_bus_published_total", "Events handed to the broker"),
                &["routing_key"],
            )
            .expect("valid metric definition"),
            publish_failures: IntCounterVec::new(
                Opts::new(
                    "event_bus_publish_failures_total",
                    "Publishes the broker did not accept",
                ),
                &["routing_key"],
            )
            .expect("valid metric definition"),
            handler_failures: IntCounterVec::new(
                Opts::new(
                    "event_bus_handler_failures_total",
                    "Handler invocations that returned an error",
                ),
                &["handler"],
            )
            .expect("valid metric definition"),
            dead_lettered: IntCounterVec::new(
                Opts::new(
                    "event_bus_dead_lettered_total",
                    "Deliveries routed to a dead-letter key",
                ),
                &["routing_key"],
            )
            .expect("valid metric definition"),
        };

        let registry = prometheus::default_registry();
        for metric in [
            Box::new(inner.published.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(inner.publish_failures.clone()),
            Box::new(inner.handler_failures.clone()),
            Box::new(inner.dead_lettered.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                tracing::warn!("Failed to register event bus metric: {}", e);
            }
        }
        inner
    }
}

fn get_metrics() -> &'static BusMetricsInner {
    METRICS.get_or_init(BusMetricsInner::new)
}

pub(crate) fn record_published(routing_key: &str) {
    get_metrics()
        .published
        .with_label_values(&[routing_key])
        .inc();
}

pub(crate) fn record_publish_failure(routing_key: &str) {
    get_metrics()
        .publish_failures
        .with_label_values(&[routing_key])
        .inc();
}

pub(crate) fn record_handler_failure(handler: &str) {
    get_metrics()
        .handler_failures
        .with_label_values(&[handler])
        .inc();
}

pub(crate) fn record_dead_lettered(routing_key: &str) {
    get_metrics()
        .dead_lettered
        .with_label_values(&[routing_key])
        .inc();
}
