//! # Streamplane Plan
//!
//! The persisted form of a persistent query and the rules for reading it
//! back across engine versions.
//!
//! This crate provides:
//! - **Model**: plan documents, DDL commands, and physical plan nodes
//! - **Codec**: JSON encoding with versioned `@type` tags
//! - **Registry**: the table of every tag this engine can read
//! - **Topology**: deterministic rendering of the runtime a plan builds
//! - **Compatibility**: replay of historical plans frozen by older engines
//!
//! ## Compatibility rules
//!
//! 1. A tag, once written, is never removed or reinterpreted
//! 2. Unknown fields on known tags are ignored
//! 3. Unknown tags are rejected as version errors, never skipped
//! 4. Store names come from the plan's config snapshot, not live config
//!
//! ## Example
//!
//! ```rust,ignore
//! use streamplane_plan::{codec, PlanTopology};
//!
//! let document = codec::decode(&bytes)?;
//! for query in document.queries() {
//!     println!("{}", PlanTopology::of(query, &document.configs));
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod compat;
pub mod config;
pub mod ddl;
pub mod document;
pub mod error;
pub mod format;
pub mod query;
pub mod registry;
pub mod schema;
pub mod step;
pub mod testing;
pub mod topology;
pub mod version;

// Re-export key types
pub use compat::HistoricalPlan;
pub use config::ConfigSnapshot;
pub use ddl::{CreateSourceCommand, DdlCommand};
pub use document::{PlanDocument, PlanEntry, StatementPlan};
pub use error::{CompatibilityError, PlanError, Result};
pub use format::{FormatInfo, Formats};
pub use query::QueryPlan;
pub use schema::{Column, LogicalSchema, SqlType};
pub use step::{PhysicalPlanNode, QueryContext, StepProperties};
pub use topology::PlanTopology;
pub use version::{EngineVersion, PlanShape};
