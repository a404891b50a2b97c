//! # Streamplane Observability
//!
//! Run-state tracking for persistent queries.
//!
//! - [`metrics`] - Metrics registry contract and in-memory registry
//! - [`state`] - Run states, error types, and the lock-free state cell
//! - [`listener`] - Lifecycle tracker publishing state as gauges

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Observability error types.
pub mod error;

/// Metrics registry contract and in-memory registry.
pub mod metrics;

/// Run states and the per-query state cell.
pub mod state;

/// Query lifecycle tracker.
pub mod listener;

pub use error::ObserveError;
pub use listener::{QueryStateListener, QueryStateListenerBuilder, QueryStateObserver};
pub use metrics::{Gauge, MetricName, Metrics, MetricsRegistry};
pub use state::{QueryError, QueryErrorType, QueryRuntimeState, StreamsState};
