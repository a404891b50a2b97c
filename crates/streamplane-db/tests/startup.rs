//! End-to-end startup against in-memory backends.
//!
//! Covers the path from persisted plan bytes to running trackers: the
//! command topic, sink reconciliation, and gauges driven by runtime
//! callbacks.

use std::path::Path;
use std::sync::Arc;

use streamplane_connectors::testing::MockTopicClient;
use streamplane_connectors::TopicClient;
use streamplane_db::{DbError, EngineConfig, QueryStarter};
use streamplane_observe::{Metrics, QueryError, QueryErrorType, StreamsState};
use streamplane_plan::HistoricalPlan;

fn fixture(name: &str) -> HistoricalPlan {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../streamplane-plan/tests/historical_plans");
    HistoricalPlan::load_corpus(&root)
        .unwrap()
        .into_iter()
        .find(|plan| plan.name == name)
        .unwrap()
}

// ── Scenario 1: Fresh cluster ──

#[test]
fn test_fresh_cluster_startup() {
    let topics = Arc::new(MockTopicClient::new().with_topic("pageviews", 2, 3));
    let metrics = Arc::new(Metrics::new());
    let config = EngineConfig::with_properties([("ksql.internal.topic.replicas", "3")]);
    let starter = QueryStarter::new(config, topics.clone(), metrics.clone())
        .with_group_prefix("_confluent-");

    starter.ensure_command_topic().unwrap();
    let queries = starter.start(&fixture("csas_filter_project").plan).unwrap();

    let command = topics
        .describe_topic("_confluent-ksql-default__command_topic")
        .unwrap();
    assert_eq!(command.partition_count(), 1);
    assert_eq!(command.min_replication_factor(), Some(3));

    let sink = topics.describe_topic("PAGEVIEWS_HOME").unwrap();
    assert_eq!(sink.partition_count(), 2);

    assert_eq!(queries.len(), 1);
    let query = &queries[0];
    assert_eq!(query.query_id(), "CSAS_PAGEVIEWS_HOME_1");
    assert_eq!(
        query.listener().query_status_metric().group,
        "_confluent-ksql-queries"
    );
    assert_eq!(
        metrics.value(query.listener().query_status_metric()).as_deref(),
        Some("-")
    );
}

// ── Scenario 2: Runtime callbacks reach the gauges ──

#[test]
fn test_runtime_callbacks_drive_gauges() {
    let topics = Arc::new(MockTopicClient::new().with_topic("input", 1, 1));
    let metrics = Arc::new(Metrics::new());
    let starter = QueryStarter::new(EngineConfig::new(), topics, metrics.clone());
    let queries = starter
        .start(&fixture("ctas_count_group_by_key").plan)
        .unwrap();
    let query = &queries[0];

    let observer = query.observer();
    observer.on_state_change(StreamsState::Created, StreamsState::Rebalancing);
    observer.on_state_change(StreamsState::Rebalancing, StreamsState::Running);
    observer.on_error(&QueryError::new("deserialization failed", QueryErrorType::User));

    let status = metrics.value(query.listener().query_status_metric());
    let error = metrics.value(query.listener().error_status_metric());
    assert_eq!(status.as_deref(), Some("RUNNING"));
    assert_eq!(error.as_deref(), Some("USER"));

    drop(queries);
    assert!(metrics.is_empty());
}

// ── Scenario 3: Restart against existing topics ──

#[test]
fn test_restart_reuses_existing_topics() {
    let topics = Arc::new(MockTopicClient::new().with_topic("users", 4, 1));
    let metrics = Arc::new(Metrics::new());
    let starter = QueryStarter::new(EngineConfig::new(), topics.clone(), metrics.clone());
    let plan = fixture("ctas_table_source_v2").plan;

    let first = starter.start(&plan).unwrap();
    assert_eq!(
        first[0].topology().changelog_topics(),
        ["_confluent-ksql-billing_pq_CTAS_ACTIVE_USERS_3-KsqlTopic-Source-Materialized-changelog"]
    );
    drop(first);

    topics.clear_calls();
    let second = starter.start(&plan).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(topics.create_count(), 0);
    assert_eq!(metrics.len(), 2);
}

// ── Scenario 4: Two servers racing on the command topic ──

#[test]
fn test_command_topic_race_fails_loudly() {
    let topics = Arc::new(MockTopicClient::new().with_create_race());
    let starter = QueryStarter::new(EngineConfig::new(), topics, Arc::new(Metrics::new()));
    assert!(matches!(
        starter.ensure_command_topic(),
        Err(DbError::Topic(streamplane_connectors::TopicError::TopicExists(_)))
    ));
}
