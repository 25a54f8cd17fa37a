//! Prometheus metrics for media-service.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

/// Bytes accepted by the ingest endpoint.
pub static MEDIA_INGESTED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("media_ingested_bytes_total", "Bytes stored by media ingest")
        .expect("failed to register media_ingested_bytes_total")
});

/// Orphan cleanups by result (success/error).
pub static MEDIA_PURGE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "media_purge_total",
        "Post media cleanups segmented by result",
        &["result"]
    )
    .expect("failed to register media_purge_total")
});

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
