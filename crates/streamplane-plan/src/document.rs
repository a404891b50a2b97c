//! Plan documents: the persisted migration unit of one or more statements.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ConfigSnapshot;
use crate::ddl::DdlCommand;
use crate::error::PlanError;
use crate::query::QueryPlan;

/// A single planned statement.
///
/// `CREATE STREAM` carries only a DDL command; `CREATE ... AS SELECT` also
/// carries the compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementPlan {
    /// Original SQL text.
    pub statement_text: String,
    /// Source-creating command.
    pub ddl_command: DdlCommand,
    /// Compiled query, for statements that start one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_plan: Option<QueryPlan>,
}

/// A versioned plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum PlanEntry {
    /// First plan entry format.
    #[serde(rename = "ksqlPlanV1")]
    V1(StatementPlan),
}

impl PlanEntry {
    /// The versioned `@type` tag this entry is written with.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            PlanEntry::V1(_) => "ksqlPlanV1",
        }
    }

    /// The planned statement.
    #[must_use]
    pub fn statement(&self) -> &StatementPlan {
        match self {
            PlanEntry::V1(plan) => plan,
        }
    }

    /// The DDL command of the statement.
    #[must_use]
    pub fn ddl_command(&self) -> &DdlCommand {
        &self.statement().ddl_command
    }

    /// The compiled query, if any.
    #[must_use]
    pub fn query_plan(&self) -> Option<&QueryPlan> {
        self.statement().query_plan.as_ref()
    }
}

impl From<StatementPlan> for PlanEntry {
    fn from(plan: StatementPlan) -> Self {
        PlanEntry::V1(plan)
    }
}

/// Ordered statements plus the engine configuration active when they were
/// planned.
///
/// Written once when the query is created and read back verbatim on every
/// restart. A changed plan is a new document with `orReplace` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    /// Statements in execution order.
    pub plan: Vec<PlanEntry>,
    /// Engine configuration at authoring time.
    pub configs: ConfigSnapshot,
}

impl PlanDocument {
    /// Creates a document.
    #[must_use]
    pub fn new(plan: Vec<PlanEntry>, configs: ConfigSnapshot) -> Self {
        Self { plan, configs }
    }

    /// Compiled queries in document order.
    pub fn queries(&self) -> impl Iterator<Item = &QueryPlan> {
        self.plan.iter().filter_map(PlanEntry::query_plan)
    }

    /// Checks every query plan and cross-entry ordering.
    ///
    /// A query may read a source created by an earlier entry or one that
    /// exists outside the document, but not one created by a later entry.
    /// Query ids must be unique, and each query's sink must be the source
    /// its own entry creates.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidPlan` describing the first violation.
    pub fn validate(&self) -> Result<(), PlanError> {
        let created: Vec<&str> = self
            .plan
            .iter()
            .map(|entry| entry.ddl_command().source_name())
            .collect();
        let mut query_ids = HashSet::new();

        for (index, entry) in self.plan.iter().enumerate() {
            let Some(query) = entry.query_plan() else {
                continue;
            };
            query.validate()?;

            if !query_ids.insert(query.query_id.as_str()) {
                return Err(PlanError::InvalidPlan(format!(
                    "duplicate query id {}",
                    query.query_id
                )));
            }
            if query.sink != entry.ddl_command().source_name() {
                return Err(PlanError::InvalidPlan(format!(
                    "query {} writes {} but its statement creates {}",
                    query.query_id,
                    query.sink,
                    entry.ddl_command().source_name()
                )));
            }
            for source in &query.sources {
                let name = source.as_str();
                if !created[..index].contains(&name) && created[index..].contains(&name) {
                    return Err(PlanError::InvalidPlan(format!(
                        "query {} reads {source} before it is created",
                        query.query_id
                    )));
                }
            }
        }
        Ok(())
    }
}
