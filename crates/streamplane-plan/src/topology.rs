//! Deterministic rendering of a query's runtime topology.
//!
//! The rendering lists every operator from sink to source with its tag,
//! query context, ordered field lists, and the state-store changelog topics
//! the runtime will create. Store names derive from the application id,
//! which comes from the plan's config snapshot rather than live
//! configuration. Two engine builds that render the same text for a plan
//! build the same runtime topology from it.

use std::fmt;

use crate::config::ConfigSnapshot;
use crate::query::QueryPlan;
use crate::step::{PhysicalPlanNode, QueryContext};

/// One operator in a rendered topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyNode {
    /// Distance from the sink.
    pub depth: usize,
    /// Versioned node tag.
    pub tag: &'static str,
    /// Node query context.
    pub query_context: String,
    /// Kind-specific attributes, in rendering order.
    pub attributes: Vec<(&'static str, String)>,
}

/// The rendered topology of one persistent query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTopology {
    /// Persistent query id.
    pub query_id: String,
    /// Runtime application id.
    pub application_id: String,
    /// Operators from sink to source.
    pub nodes: Vec<TopologyNode>,
}

fn list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

fn store_name(application_id: &str, context: &QueryContext, suffix: &str) -> String {
    let mut name = application_id.to_string();
    for segment in context.segments() {
        name.push('-');
        name.push_str(segment);
    }
    name.push('-');
    name.push_str(suffix);
    name
}

fn changelog(application_id: &str, context: &QueryContext, store: &str) -> String {
    format!("{}-changelog", store_name(application_id, context, store))
}

impl PlanTopology {
    /// Renders the topology of `query` under the given config snapshot.
    #[must_use]
    pub fn of(query: &QueryPlan, configs: &ConfigSnapshot) -> Self {
        let application_id = configs.application_id(&query.query_id);
        let nodes = query
            .physical_plan
            .steps()
            .enumerate()
            .map(|(depth, step)| TopologyNode {
                depth,
                tag: step.tag(),
                query_context: step.query_context().to_string(),
                attributes: attributes(step, &application_id),
            })
            .collect();
        Self {
            query_id: query.query_id.clone(),
            application_id,
            nodes,
        }
    }

    /// Changelog topics the runtime creates for this query's state stores.
    #[must_use]
    pub fn changelog_topics(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .flat_map(|node| &node.attributes)
            .filter(|(name, _)| *name == "changelog")
            .map(|(_, topic)| topic.as_str())
            .collect()
    }
}

fn attributes(step: &PhysicalPlanNode, application_id: &str) -> Vec<(&'static str, String)> {
    let ctx = step.query_context();
    match step {
        PhysicalPlanNode::StreamSource(s) => {
            let mut attrs = vec![
                ("topic", s.topic_name.clone()),
                ("formats", s.formats.to_string()),
                ("schema", s.source_schema.to_string()),
            ];
            if let Some(ts) = &s.timestamp_column {
                attrs.push(("timestamp", ts.clone()));
            }
            attrs
        }
        PhysicalPlanNode::TableSource(s) => {
            let mut attrs = vec![
                ("topic", s.topic_name.clone()),
                ("formats", s.formats.to_string()),
                ("schema", s.source_schema.to_string()),
            ];
            if let Some(ts) = &s.timestamp_column {
                attrs.push(("timestamp", ts.clone()));
            }
            attrs.push(("changelog", changelog(application_id, ctx, "Reduce")));
            attrs
        }
        PhysicalPlanNode::TableSourceV2(s) => {
            let mut attrs = vec![
                ("topic", s.topic_name.clone()),
                ("formats", s.formats.to_string()),
                ("schema", s.source_schema.to_string()),
            ];
            if let Some(ts) = &s.timestamp_column {
                attrs.push(("timestamp", ts.clone()));
            }
            attrs.push(("storeFormats", s.state_store_formats.to_string()));
            attrs.push(("changelog", changelog(application_id, ctx, "Materialized")));
            attrs
        }
        PhysicalPlanNode::StreamFilter(f) | PhysicalPlanNode::TableFilter(f) => {
            vec![("filter", f.filter_expression.clone())]
        }
        PhysicalPlanNode::StreamSelect(s) | PhysicalPlanNode::TableSelect(s) => vec![
            ("keyColumnNames", list(&s.key_column_names)),
            ("selectExpressions", list(&s.select_expressions)),
        ],
        PhysicalPlanNode::StreamGroupByKey(g) => {
            vec![("internalFormats", g.internal_formats.to_string())]
        }
        PhysicalPlanNode::StreamAggregate(a) => vec![
            ("internalFormats", a.internal_formats.to_string()),
            ("nonAggregateColumns", list(&a.non_aggregate_columns)),
            ("aggregationFunctions", list(&a.aggregation_functions)),
            ("changelog", changelog(application_id, ctx, "Materialize")),
        ],
        PhysicalPlanNode::StreamSink(s) | PhysicalPlanNode::TableSink(s) => {
            let mut attrs = vec![
                ("topic", s.topic_name.clone()),
                ("formats", s.formats.to_string()),
            ];
            if let Some(ts) = &s.timestamp_column {
                attrs.push(("timestamp", ts.clone()));
            }
            attrs
        }
    }
}

impl fmt::Display for PlanTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query {} ({})", self.query_id, self.application_id)?;
        for node in &self.nodes {
            let indent = "  ".repeat(node.depth);
            writeln!(f, "{indent} > {} [{}]", node.tag, node.query_context)?;
            for (name, value) in &node.attributes {
                writeln!(f, "{indent}     {name}: {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn aggregate_query() -> QueryPlan {
        testing::count_by_key_entry()
            .query_plan()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_nodes_follow_plan_order() {
        let topology = PlanTopology::of(&aggregate_query(), &testing::sample_configs());
        let tags: Vec<_> = topology.nodes.iter().map(|n| n.tag).collect();
        assert_eq!(
            tags,
            [
                "tableSinkV1",
                "tableSelectV1",
                "streamAggregateV1",
                "streamGroupByKeyV1",
                "streamSourceV1"
            ]
        );
        assert_eq!(topology.nodes[2].query_context, "Aggregate/Aggregate");
    }

    #[test]
    fn test_changelog_uses_snapshot_service_id() {
        let configs: ConfigSnapshot = [("ksql.service.id", Some("billing_"))]
            .into_iter()
            .collect();
        let topology = PlanTopology::of(&aggregate_query(), &configs);
        assert_eq!(
            topology.changelog_topics(),
            ["_confluent-ksql-billing_query_CTAS_COUNTS_0-Aggregate-Aggregate-Materialize-changelog"]
        );
    }

    #[test]
    fn test_rendering() {
        let topology = PlanTopology::of(&aggregate_query(), &testing::sample_configs());
        let text = topology.to_string();
        assert!(text.starts_with(
            "Query CTAS_COUNTS_0 (_confluent-ksql-default_query_CTAS_COUNTS_0)\n > tableSinkV1 [COUNTS]\n"
        ));
        assert!(text.contains("      nonAggregateColumns: [ID, VAL]\n"));
        assert!(text.contains("        > streamSourceV1 [KsqlTopic/Source]\n"));
    }
}
