//! Handlers for the liveness endpoint and unmatched routes.

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Returns service liveness.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// ```json
/// { "status": "healthy", "version": "0.1.0" }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for unmatched routes.
pub async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
