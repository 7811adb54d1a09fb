//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`  - Liveness check
//! - everything else - `404 Not Found`
//!
//! # Middleware
//!
//! Outermost first:
//!
//! - **Request ID** - Assigns a UUID `x-request-id` when the client sent none
//! - **Request logging** - One structured record per request, tagged `reqId`

use axum::Router;
use axum::http::HeaderName;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::handlers::{health_handler, not_found_handler};
use crate::logging::Logger;
use crate::middleware::{X_REQUEST_ID, request_logger};

/// Constructs the application router with all routes and middleware.
pub fn app_router(logger: Logger) -> Router {
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(request_logger::layer(logger))
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
}
