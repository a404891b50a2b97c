//! # Streamplane Connectors
//!
//! Broker-facing plumbing for persistent queries.
//!
//! - [`client`] - The synchronous `TopicClient` contract
//! - [`requirement`] - Required topic shapes derived from plans and config
//! - [`internal`] - Topic reconciliation (`ensure_topic`, `reconcile`)
//! - [`testing`] - In-memory broker for tests
//! - `kafka` - rdkafka admin client (feature `kafka`)

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Broker and reconciliation error types.
pub mod error;

/// Broker topic client contract.
pub mod client;

/// Required topic shapes.
pub mod requirement;

/// Topic reconciliation.
pub mod internal;

/// Testing utilities (in-memory broker).
pub mod testing;

/// Kafka admin client.
#[cfg(feature = "kafka")]
pub mod kafka;

pub use client::{PartitionInfo, TopicClient, TopicConfig, TopicDescription};
pub use error::{BrokerError, TopicError};
pub use internal::{ensure_internal_topic, ensure_topic, reconcile};
pub use requirement::TopicRequirement;
