//! Compiled persistent-query plans.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::step::PhysicalPlanNode;

/// The compiled form of a `CREATE ... AS SELECT` statement.
///
/// `query_id` is stable for the life of the persistent query and joins plan
/// storage, resource reconciliation, and runtime tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    /// Upstream source names, in the order the compiler listed them.
    pub sources: Vec<String>,
    /// Name of the sink source the query writes.
    pub sink: String,
    /// Root of the physical operator tree.
    pub physical_plan: PhysicalPlanNode,
    /// Persistent query identifier.
    pub query_id: String,
}

impl QueryPlan {
    /// Checks the query's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidPlan` if the query id is empty, sources
    /// repeat, or the operator tree is malformed.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.query_id.is_empty() {
            return Err(PlanError::InvalidPlan("query plan has an empty query id".into()));
        }
        let mut seen = HashSet::with_capacity(self.sources.len());
        for source in &self.sources {
            if !seen.insert(source.as_str()) {
                return Err(PlanError::InvalidPlan(format!(
                    "query {} lists source {source} twice",
                    self.query_id
                )));
            }
        }
        self.physical_plan.validate_root()
    }

    /// Topic the query writes to. Always `Some` on a validated plan.
    #[must_use]
    pub fn sink_topic(&self) -> Option<&str> {
        self.physical_plan
            .as_sink()
            .map(|sink| sink.topic_name.as_str())
    }

    /// Topic read by the leaf source operator.
    #[must_use]
    pub fn source_topic(&self) -> Option<&str> {
        self.physical_plan.leaf().source_topic()
    }
}
