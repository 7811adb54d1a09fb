//! # reqlog
//!
//! Structured logging for HTTP services built on `tracing`.
//!
//! ## Components
//!
//! - **Logger factory** ([`logging`]) - Builds a [`Logger`] with a JSON or
//!   console encoder, a minimum [`Severity`], optional file mirroring, and
//!   process base fields (`hostname`, `pid`) in JSON mode
//! - **Request logging middleware** ([`middleware`]) - Tower layer emitting one
//!   record per request with `method`, `status`, `path` and timing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use reqlog::{logging, middleware::request_logger};
//!
//! let logger = logging::new(false, false, "info".parse()?, false, "");
//! let app = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(request_logger::layer(logger));
//! ```
//!
//! ## Configuration
//!
//! The demo server reads its settings from environment variables via
//! [`config::Config`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::{LoggerError, UnknownLevel};
pub use logging::{Logger, LoggerConfig, Severity};

/// Commonly used types for external consumers.
pub mod prelude {
    pub use crate::logging::{Logger, LoggerConfig, MemorySink, Severity};
    pub use crate::middleware::{RequestLogger, RequestLoggerLayer};
}
