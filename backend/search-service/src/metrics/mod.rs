//! Prometheus metrics for search-service.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

/// Index writes by entity (post/user) and operation (upsert/remove).
pub static SEARCH_INDEX_OPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "search_index_ops_total",
        "Search index writes segmented by entity and operation",
        &["entity", "op"]
    )
    .expect("failed to register search_index_ops_total")
});

pub fn record_index_op(entity: &str, op: &str) {
    SEARCH_INDEX_OPS_TOTAL.with_label_values(&[entity, op]).inc();
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
