//! Physical plan nodes.
//!
//! A persistent query's physical plan is a single-path tree: every operator
//! owns exactly one upstream `source`, except the source operators, which are
//! leaves. The root is always a sink. Each node is written with a
//! versioned `@type` tag (e.g. `tableSinkV1`) so that old plans stay
//! readable after new kinds or versions are added.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::format::Formats;
use crate::schema::LogicalSchema;

/// Slash-separated path naming a node, e.g. `Aggregate/GroupBy`.
///
/// Unique within a plan; used in diagnostics and for naming state stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryContext(String);

impl QueryContext {
    /// Joins segments into a context path.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self(path)
    }

    /// The full path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Properties common to every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProperties {
    /// Diagnostic path of the node.
    pub query_context: QueryContext,
}

impl StepProperties {
    /// Creates properties for the given context path.
    #[must_use]
    pub fn at(path: &str) -> Self {
        Self {
            query_context: QueryContext(path.to_string()),
        }
    }
}

/// Reads a topic as a stream or table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Common properties.
    pub properties: StepProperties,
    /// Topic to read.
    pub topic_name: String,
    /// Formats of the topic's records.
    pub formats: Formats,
    /// Column holding the event timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_column: Option<String>,
    /// Schema of the source.
    pub source_schema: LogicalSchema,
}

/// Table source that materializes into a state store with its own formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedSource {
    /// Common properties.
    pub properties: StepProperties,
    /// Topic to read.
    pub topic_name: String,
    /// Formats of the topic's records.
    pub formats: Formats,
    /// Column holding the event timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_column: Option<String>,
    /// Schema of the source.
    pub source_schema: LogicalSchema,
    /// Formats used by the materializing state store.
    pub state_store_formats: Formats,
}

/// Drops rows not matching a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Common properties.
    pub properties: StepProperties,
    /// Upstream node.
    pub source: Box<PhysicalPlanNode>,
    /// Predicate expression text.
    pub filter_expression: String,
}

/// Projects key and value columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Select {
    /// Common properties.
    pub properties: StepProperties,
    /// Upstream node.
    pub source: Box<PhysicalPlanNode>,
    /// Output key columns, in output order.
    pub key_column_names: Vec<String>,
    /// Projection expressions, in output order.
    pub select_expressions: Vec<String>,
}

/// Groups a stream by its existing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByKey {
    /// Common properties.
    pub properties: StepProperties,
    /// Upstream node.
    pub source: Box<PhysicalPlanNode>,
    /// Formats of the grouped records.
    pub internal_formats: Formats,
}

/// Aggregates a grouped stream into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    /// Common properties.
    pub properties: StepProperties,
    /// Upstream node.
    pub source: Box<PhysicalPlanNode>,
    /// Formats of the aggregation state store.
    pub internal_formats: Formats,
    /// Columns passed through unaggregated, in output order.
    pub non_aggregate_columns: Vec<String>,
    /// Aggregate function calls, in output order.
    pub aggregation_functions: Vec<String>,
}

/// Writes the result to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sink {
    /// Common properties.
    pub properties: StepProperties,
    /// Upstream node.
    pub source: Box<PhysicalPlanNode>,
    /// Formats of the written records.
    pub formats: Formats,
    /// Topic to write.
    pub topic_name: String,
    /// Column holding the event timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_column: Option<String>,
}

/// A physical plan node, tagged by kind and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum PhysicalPlanNode {
    /// Stream read from a topic.
    #[serde(rename = "streamSourceV1")]
    StreamSource(Source),
    /// Table read from a topic.
    #[serde(rename = "tableSourceV1")]
    TableSource(Source),
    /// Table read from a topic into a state store with explicit formats.
    #[serde(rename = "tableSourceV2")]
    TableSourceV2(MaterializedSource),
    /// Stream filter.
    #[serde(rename = "streamFilterV1")]
    StreamFilter(Filter),
    /// Stream projection.
    #[serde(rename = "streamSelectV1")]
    StreamSelect(Select),
    /// Stream grouping by existing key.
    #[serde(rename = "streamGroupByKeyV1")]
    StreamGroupByKey(GroupByKey),
    /// Grouped stream aggregation.
    #[serde(rename = "streamAggregateV1")]
    StreamAggregate(Aggregate),
    /// Stream written to a topic.
    #[serde(rename = "streamSinkV1")]
    StreamSink(Sink),
    /// Table filter.
    #[serde(rename = "tableFilterV1")]
    TableFilter(Filter),
    /// Table projection.
    #[serde(rename = "tableSelectV1")]
    TableSelect(Select),
    /// Table written to a topic.
    #[serde(rename = "tableSinkV1")]
    TableSink(Sink),
}

impl PhysicalPlanNode {
    /// The versioned `@type` tag this node is written with.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::StreamSource(_) => "streamSourceV1",
            Self::TableSource(_) => "tableSourceV1",
            Self::TableSourceV2(_) => "tableSourceV2",
            Self::StreamFilter(_) => "streamFilterV1",
            Self::StreamSelect(_) => "streamSelectV1",
            Self::StreamGroupByKey(_) => "streamGroupByKeyV1",
            Self::StreamAggregate(_) => "streamAggregateV1",
            Self::StreamSink(_) => "streamSinkV1",
            Self::TableFilter(_) => "tableFilterV1",
            Self::TableSelect(_) => "tableSelectV1",
            Self::TableSink(_) => "tableSinkV1",
        }
    }

    /// Common node properties.
    #[must_use]
    pub fn properties(&self) -> &StepProperties {
        match self {
            Self::StreamSource(s) | Self::TableSource(s) => &s.properties,
            Self::TableSourceV2(s) => &s.properties,
            Self::StreamFilter(s) | Self::TableFilter(s) => &s.properties,
            Self::StreamSelect(s) | Self::TableSelect(s) => &s.properties,
            Self::StreamGroupByKey(s) => &s.properties,
            Self::StreamAggregate(s) => &s.properties,
            Self::StreamSink(s) | Self::TableSink(s) => &s.properties,
        }
    }

    /// The node's query context.
    #[must_use]
    pub fn query_context(&self) -> &QueryContext {
        &self.properties().query_context
    }

    /// The upstream node, or `None` for sources.
    #[must_use]
    pub fn source(&self) -> Option<&PhysicalPlanNode> {
        match self {
            Self::StreamSource(_) | Self::TableSource(_) | Self::TableSourceV2(_) => None,
            Self::StreamFilter(s) | Self::TableFilter(s) => Some(&*s.source),
            Self::StreamSelect(s) | Self::TableSelect(s) => Some(&*s.source),
            Self::StreamGroupByKey(s) => Some(&*s.source),
            Self::StreamAggregate(s) => Some(&*s.source),
            Self::StreamSink(s) | Self::TableSink(s) => Some(&*s.source),
        }
    }

    /// Returns `true` for topic-reading leaves.
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.source().is_none()
    }

    /// Returns `true` for topic-writing roots.
    #[must_use]
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::StreamSink(_) | Self::TableSink(_))
    }

    /// The sink body, if this node is a sink.
    #[must_use]
    pub fn as_sink(&self) -> Option<&Sink> {
        match self {
            Self::StreamSink(s) | Self::TableSink(s) => Some(s),
            _ => None,
        }
    }

    /// Topic read by this node, if it is a source.
    #[must_use]
    pub fn source_topic(&self) -> Option<&str> {
        match self {
            Self::StreamSource(s) | Self::TableSource(s) => Some(&s.topic_name),
            Self::TableSourceV2(s) => Some(&s.topic_name),
            _ => None,
        }
    }

    /// Walks the path from this node down to the leaf.
    pub fn steps(&self) -> impl Iterator<Item = &PhysicalPlanNode> {
        std::iter::successors(Some(self), |node| node.source())
    }

    /// The leaf source at the bottom of the path.
    #[must_use]
    pub fn leaf(&self) -> &PhysicalPlanNode {
        let mut node = self;
        while let Some(next) = node.source() {
            node = next;
        }
        node
    }

    /// Checks the invariants of a query's plan rooted at this node: the root
    /// is a sink, no other node is a sink, and query contexts are non-empty
    /// and unique.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidPlan` describing the first violation.
    pub fn validate_root(&self) -> Result<(), PlanError> {
        if !self.is_sink() {
            return Err(PlanError::InvalidPlan(format!(
                "plan root '{}' is a {}, not a sink",
                self.query_context(),
                self.tag()
            )));
        }
        let mut contexts = HashSet::new();
        for (depth, step) in self.steps().enumerate() {
            if depth > 0 && step.is_sink() {
                return Err(PlanError::InvalidPlan(format!(
                    "sink '{}' below the plan root",
                    step.query_context()
                )));
            }
            let context = step.query_context().as_str();
            if context.is_empty() {
                return Err(PlanError::InvalidPlan(format!(
                    "{} at depth {depth} has an empty query context",
                    step.tag()
                )));
            }
            if !contexts.insert(context) {
                return Err(PlanError::InvalidPlan(format!(
                    "duplicate query context '{context}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(ctx: &str) -> PhysicalPlanNode {
        PhysicalPlanNode::StreamSource(Source {
            properties: StepProperties::at(ctx),
            topic_name: "input".into(),
            formats: Formats::of("KAFKA", "JSON"),
            timestamp_column: None,
            source_schema: "`ID` INTEGER KEY, `VAL` INTEGER".parse().unwrap(),
        })
    }

    fn select(ctx: &str, upstream: PhysicalPlanNode) -> PhysicalPlanNode {
        PhysicalPlanNode::StreamSelect(Select {
            properties: StepProperties::at(ctx),
            source: Box::new(upstream),
            key_column_names: vec!["ID".into()],
            select_expressions: vec!["VAL AS VAL".into()],
        })
    }

    fn sink(ctx: &str, upstream: PhysicalPlanNode) -> PhysicalPlanNode {
        PhysicalPlanNode::StreamSink(Sink {
            properties: StepProperties::at(ctx),
            source: Box::new(upstream),
            formats: Formats::of("KAFKA", "JSON"),
            topic_name: "OUTPUT".into(),
            timestamp_column: None,
        })
    }

    #[test]
    fn test_tag_matches_wire_tag() {
        let plan = sink("OUTPUT", select("Project", source("KsqlTopic/Source")));
        for step in plan.steps() {
            let value = serde_json::to_value(step).unwrap();
            assert_eq!(value["@type"], step.tag());
        }
    }

    #[test]
    fn test_steps_walk_root_to_leaf() {
        let plan = sink("OUTPUT", select("Project", source("KsqlTopic/Source")));
        let tags: Vec<_> = plan.steps().map(PhysicalPlanNode::tag).collect();
        assert_eq!(tags, ["streamSinkV1", "streamSelectV1", "streamSourceV1"]);
        assert_eq!(plan.leaf().source_topic(), Some("input"));
        assert!(plan.as_sink().is_some());
    }

    #[test]
    fn test_validate_accepts_well_formed_plan() {
        let plan = sink("OUTPUT", select("Project", source("KsqlTopic/Source")));
        plan.validate_root().unwrap();
    }

    #[test]
    fn test_validate_rejects_non_sink_root() {
        let plan = select("Project", source("KsqlTopic/Source"));
        assert!(matches!(plan.validate_root(), Err(PlanError::InvalidPlan(_))));
    }

    #[test]
    fn test_validate_rejects_nested_sink() {
        let plan = sink("OUTPUT", sink("INNER", source("KsqlTopic/Source")));
        assert!(plan.validate_root().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_context() {
        let plan = sink("OUTPUT", select("Project", select("Project", source("Src"))));
        let err = plan.validate_root().unwrap_err();
        assert!(err.to_string().contains("duplicate query context"));
    }

    #[test]
    fn test_query_context_segments() {
        let ctx = QueryContext::new(["Aggregate", "GroupBy"]);
        assert_eq!(ctx.as_str(), "Aggregate/GroupBy");
        assert_eq!(ctx.segments().collect::<Vec<_>>(), ["Aggregate", "GroupBy"]);
    }

    #[test]
    fn test_unknown_sibling_fields_ignored() {
        let json = r#"{"@type":"streamSourceV1","properties":{"queryContext":"Src"},
            "topicName":"t","formats":{"keyFormat":{"format":"KAFKA"},"valueFormat":{"format":"JSON"}},
            "sourceSchema":"`A` INTEGER","pseudoColumnVersion":1}"#;
        let node: PhysicalPlanNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.tag(), "streamSourceV1");
    }
}
