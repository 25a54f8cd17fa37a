//! Prometheus metrics for content-service.
//!
//! Exposes saga outcome counters and an HTTP handler for the `/metrics` endpoint.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

/// Create-post sagas by terminal state (done, compensated, compensation_failed).
pub static POST_SAGA_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "post_saga_total",
        "Create-post sagas segmented by terminal state",
        &["outcome"]
    )
    .expect("failed to register post_saga_total")
});

pub fn record_saga_outcome(outcome: &str) {
    POST_SAGA_TOTAL.with_label_values(&[outcome]).inc();
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
