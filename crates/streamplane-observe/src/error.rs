//! Observability error types.

use thiserror::Error;

/// Errors raised while registering query metrics.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// A required construction argument was not supplied.
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// A metric with the same identity is already registered.
    #[error("metric already registered: {0}")]
    DuplicateMetric(String),
}
