//! Error types for query startup.

use crate::config::ConfigError;

/// Errors that prevent a persistent query from starting.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The persisted plan cannot be read.
    #[error("Plan error: {0}")]
    Plan(#[from] streamplane_plan::PlanError),

    /// A required topic could not be reconciled.
    #[error("Topic error: {0}")]
    Topic(#[from] streamplane_connectors::TopicError),

    /// A broker lookup failed.
    #[error("Broker error: {0}")]
    Broker(#[from] streamplane_connectors::BrokerError),

    /// Query metrics could not be registered.
    #[error("Metrics error: {0}")]
    Observe(#[from] streamplane_observe::ObserveError),

    /// The engine configuration is invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A query plan cannot be started as written.
    #[error("Query '{query_id}' cannot start: {reason}")]
    InvalidQuery {
        /// Query id.
        query_id: String,
        /// What is wrong.
        reason: String,
    },
}
