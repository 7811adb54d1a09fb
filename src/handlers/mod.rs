//! HTTP request handlers.

pub mod health;

pub use health::{HealthResponse, health_handler, not_found_handler};
