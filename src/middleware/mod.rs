//! HTTP middleware for request observability.

pub mod request_logger;

pub use request_logger::{RequestLogger, RequestLoggerLayer, X_REQUEST_ID};
