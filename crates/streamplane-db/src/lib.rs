//! # Streamplane
//!
//! Startup of persistent queries from their persisted plans.
//!
//! This crate ties together:
//! - **Plans** (`streamplane-plan`): decoding and topology rendering
//! - **Topics** (`streamplane-connectors`): reconciliation of internal and
//!   sink topics
//! - **Tracking** (`streamplane-observe`): run-state gauges per query
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use streamplane_db::{EngineConfig, QueryStarter};
//! use streamplane_observe::Metrics;
//!
//! let starter = QueryStarter::with_kafka(config, Arc::new(Metrics::new()))?;
//! starter.ensure_command_topic()?;
//! for query in starter.start(&plan_bytes)? {
//!     runtime.build(query.topology(), query.observer());
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Engine configuration.
pub mod config;

/// Startup error types.
pub mod error;

/// Persistent query startup.
pub mod startup;

pub use config::{ConfigError, EngineConfig};
pub use error::DbError;
pub use startup::{PersistentQuery, QueryStarter};

/// Result type for startup operations.
pub type Result<T> = std::result::Result<T, DbError>;
