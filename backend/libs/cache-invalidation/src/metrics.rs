//! Invalidation metrics

use prometheus::{IntCounterVec, Opts};
use std::sync::OnceLock;

static METRICS: OnceLock<InvalidationMetricsInner> = OnceLock::new();

struct InvalidationMetricsInner {
    failures: IntCounterVec,
    deleted: IntCounterVec,
}

impl InvalidationMetricsInner {
    fn new() -> Self {
        let inner = Self {
            failures: IntCounterVec::new(
                Opts::new(
                    "cache_invalidation_failures_total",
                    "Cache invalidation targets that could not be evicted",
                ),
                &["service"],
            )
            .expect("valid metric definition"),
            deleted: IntCounterVec::new(
                Opts::new(
                    "cache_invalidation_deleted_keys_total",
                    "Cache keys evicted by invalidation",
                ),
                &["service"],
            )
            .expect("valid metric definition"),
        };

        let registry = prometheus::default_registry();
        let _ = registry.register(Box::new(inner.failures.clone()));
        let _ = registry.register(Box::new(inner.deleted.clone()));
        inner
    }
}

fn get_metrics() -> &'static InvalidationMetricsInner {
    METRICS.get_or_init(InvalidationMetricsInner::new)
}

pub(crate) fn record_failure(service: &str) {
    get_metrics().failures.with_label_values(&[service]).inc();
}

pub(crate) fn record_deleted(service: &str, count: usize) {
    get_metrics()
        .deleted
        .with_label_values(&[service])
        .inc_by(count as u64);
}

/// Current value of `cache_invalidation_failures_total{service}`
pub fn failure_count(service: &str) -> u64 {
    get_metrics().failures.with_label_values(&[service]).get()
}
