//! Prometheus metrics for user-service.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

/// posts_count updates applied from post events, by direction.
pub static POSTS_COUNTER_UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "user_posts_counter_updates_total",
        "posts_count adjustments applied from post events",
        &["direction"]
    )
    .expect("failed to register user_posts_counter_updates_total")
});

pub fn record_counter_update(direction: &str) {
    POSTS_COUNTER_UPDATES_TOTAL.with_label_values(&[direction]).inc();
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
