//! Sample plans for tests in this and downstream crates.

use crate::config::ConfigSnapshot;
use crate::ddl::{CreateSourceCommand, DdlCommand};
use crate::document::{PlanDocument, PlanEntry, StatementPlan};
use crate::format::Formats;
use crate::query::QueryPlan;
use crate::step::{Aggregate, GroupByKey, PhysicalPlanNode, Select, Sink, Source, StepProperties};

/// Query id of the aggregate query in [`aggregate_document`].
pub const AGGREGATE_QUERY_ID: &str = "CTAS_COUNTS_0";

fn schema(text: &str) -> crate::schema::LogicalSchema {
    // Sample schemas are literals known to parse.
    text.parse().unwrap_or_else(|e| panic!("bad sample schema: {e}"))
}

/// A `CREATE STREAM` entry over topic `input`.
#[must_use]
pub fn create_input_stream() -> PlanEntry {
    StatementPlan {
        statement_text: "CREATE STREAM INPUT (ID INTEGER KEY, VAL INTEGER) \
                         WITH (kafka_topic='input', value_format='JSON');"
            .into(),
        ddl_command: DdlCommand::CreateStream(CreateSourceCommand {
            source_name: "INPUT".into(),
            schema: schema("`ID` INTEGER KEY, `VAL` INTEGER"),
            topic_name: "input".into(),
            formats: Formats::of("KAFKA", "JSON"),
            or_replace: false,
            timestamp_column: None,
        }),
        query_plan: None,
    }
    .into()
}

/// `CREATE TABLE COUNTS AS SELECT ID, COUNT(VAL) AS CNT FROM INPUT GROUP BY ID`.
#[must_use]
pub fn count_by_key_entry() -> PlanEntry {
    let source = PhysicalPlanNode::StreamSource(Source {
        properties: StepProperties::at("KsqlTopic/Source"),
        topic_name: "input".into(),
        formats: Formats::of("KAFKA", "JSON"),
        timestamp_column: None,
        source_schema: schema("`ID` INTEGER KEY, `VAL` INTEGER"),
    });
    let group_by = PhysicalPlanNode::StreamGroupByKey(GroupByKey {
        properties: StepProperties::at("Aggregate/GroupBy"),
        source: Box::new(source),
        internal_formats: Formats::of("KAFKA", "JSON"),
    });
    let aggregate = PhysicalPlanNode::StreamAggregate(Aggregate {
        properties: StepProperties::at("Aggregate/Aggregate"),
        source: Box::new(group_by),
        internal_formats: Formats::of("KAFKA", "JSON"),
        non_aggregate_columns: vec!["ID".into(), "VAL".into()],
        aggregation_functions: vec!["COUNT(VAL)".into()],
    });
    let select = PhysicalPlanNode::TableSelect(Select {
        properties: StepProperties::at("Aggregate/Project"),
        source: Box::new(aggregate),
        key_column_names: vec!["ID".into()],
        select_expressions: vec!["KSQL_AGG_VARIABLE_0 AS CNT".into()],
    });
    let sink = PhysicalPlanNode::TableSink(Sink {
        properties: StepProperties::at("COUNTS"),
        source: Box::new(select),
        formats: Formats::of("KAFKA", "JSON"),
        topic_name: "COUNTS".into(),
        timestamp_column: None,
    });

    StatementPlan {
        statement_text: "CREATE TABLE COUNTS AS SELECT ID, COUNT(VAL) AS CNT \
                         FROM INPUT GROUP BY ID EMIT CHANGES;"
            .into(),
        ddl_command: DdlCommand::CreateTable(CreateSourceCommand {
            source_name: "COUNTS".into(),
            schema: schema("`ID` INTEGER KEY, `CNT` BIGINT"),
            topic_name: "COUNTS".into(),
            formats: Formats::of("KAFKA", "JSON"),
            or_replace: false,
            timestamp_column: None,
        }),
        query_plan: Some(QueryPlan {
            sources: vec!["INPUT".into()],
            sink: "COUNTS".into(),
            physical_plan: sink,
            query_id: AGGREGATE_QUERY_ID.into(),
        }),
    }
    .into()
}

/// The config snapshot used by the sample documents.
#[must_use]
pub fn sample_configs() -> ConfigSnapshot {
    [
        ("ksql.service.id", Some("default_")),
        ("ksql.persistent.prefix", Some("query_")),
        ("ksql.sink.replicas", Some("1")),
        ("ksql.schema.registry.url", None),
    ]
    .into_iter()
    .collect()
}

/// A stream definition followed by an aggregating CTAS over it.
#[must_use]
pub fn aggregate_document() -> PlanDocument {
    PlanDocument::new(
        vec![create_input_stream(), count_by_key_entry()],
        sample_configs(),
    )
}
