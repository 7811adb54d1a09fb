#![allow(dead_code)]

use axum::{Router, http::StatusCode, routing::get};
use reqlog::logging::{BoxedLayer, EncoderLayer, Logger, MemorySink, Severity};
use reqlog::middleware::request_logger;
use serde_json::Value;
use tracing_subscriber::Layer;

/// JSON logger writing into an in-memory buffer, no base fields.
pub fn buffer_logger() -> (Logger, MemorySink) {
    let sink = MemorySink::new();
    let layers: Vec<BoxedLayer> = vec![EncoderLayer::json(sink.clone()).boxed()];
    (Logger::from_layers(layers, Severity::Debug), sink)
}

/// Router answering `status` on every GET path, wrapped in the request logger.
pub fn logged_app(logger: Logger, status: StatusCode) -> Router {
    Router::new()
        .route("/{*path}", get(move || async move { status }))
        .layer(request_logger::layer(logger))
}

/// Drops the keys that legitimately differ between two runs of the same request.
pub fn stable_fields(mut record: Value) -> Value {
    if let Some(object) = record.as_object_mut() {
        object.remove("time");
        object.remove("duration");
    }
    record
}
