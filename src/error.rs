//! Error types surfaced by the logger factory.
//!
//! Runtime logging has no error path: sink write failures are absorbed by the
//! encoder layers. Only configuration mistakes reach the caller.

use thiserror::Error;

/// Returned when a severity name is not one of the six known levels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

/// Errors raised while installing a [`Logger`](crate::logging::Logger) process-wide.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("global logger already installed: {0}")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
