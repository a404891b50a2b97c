//! Persistent query startup.
//!
//! Starting a plan runs every step up to handing the topology to the
//! dataflow runtime:
//!
//! 1. decode and validate the persisted plan document
//! 2. size each query's sink topic from its source topic and reconcile it
//! 3. render the query's topology from the plan's own config snapshot
//! 4. attach a lifecycle tracker keyed by the query id
//!
//! A failure at any step stops the whole plan. Trackers of queries that
//! were already prepared are closed when their handles drop.

use std::sync::Arc;

use streamplane_connectors::{ensure_internal_topic, reconcile, TopicClient, TopicRequirement};
use streamplane_observe::{MetricsRegistry, QueryStateListener, QueryStateObserver};
use streamplane_plan::{codec, ConfigSnapshot, PlanTopology, QueryPlan};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::DbError;

/// Prepares persistent queries for execution.
pub struct QueryStarter {
    config: EngineConfig,
    topics: Arc<dyn TopicClient>,
    metrics: Arc<dyn MetricsRegistry>,
    group_prefix: String,
}

impl std::fmt::Debug for QueryStarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStarter")
            .field("config", &self.config)
            .field("group_prefix", &self.group_prefix)
            .finish_non_exhaustive()
    }
}

impl QueryStarter {
    /// Creates a starter over the given broker and metrics backends.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        topics: Arc<dyn TopicClient>,
        metrics: Arc<dyn MetricsRegistry>,
    ) -> Self {
        Self {
            config,
            topics,
            metrics,
            group_prefix: String::new(),
        }
    }

    /// Creates a starter talking to the Kafka cluster in `bootstrap.servers`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Config` if no servers are configured and
    /// `DbError::Broker` if the admin client cannot be created.
    #[cfg(feature = "kafka")]
    pub fn with_kafka(
        config: EngineConfig,
        metrics: Arc<dyn MetricsRegistry>,
    ) -> Result<Self, DbError> {
        let client =
            streamplane_connectors::kafka::KafkaTopicClient::new(config.bootstrap_servers()?)?;
        Ok(Self::new(config, Arc::new(client), metrics))
    }

    /// Sets the prefix of the query metric group.
    #[must_use]
    pub fn with_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = prefix.into();
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ensures the cluster's command topic exists with the internal topic
    /// shape.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Topic` if the topic cannot be reconciled.
    pub fn ensure_command_topic(&self) -> Result<(), DbError> {
        let topic = self.config.command_topic();
        ensure_internal_topic(self.topics.as_ref(), &topic, &self.config.snapshot())?;
        debug!(topic = %topic, "command topic ready");
        Ok(())
    }

    /// Decodes a persisted plan and prepares each of its queries.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Plan` if the plan cannot be read, and the error of
    /// the first query that fails to prepare otherwise.
    pub fn start(&self, plan: &[u8]) -> Result<Vec<PersistentQuery>, DbError> {
        let document = codec::decode(plan)?;
        let mut queries = Vec::new();
        for query in document.queries() {
            queries.push(self.start_query(query, &document.configs)?);
        }
        info!(
            entries = document.plan.len(),
            queries = queries.len(),
            "plan started"
        );
        Ok(queries)
    }

    fn start_query(
        &self,
        query: &QueryPlan,
        configs: &ConfigSnapshot,
    ) -> Result<PersistentQuery, DbError> {
        let invalid = |reason: String| DbError::InvalidQuery {
            query_id: query.query_id.clone(),
            reason,
        };

        let source = query
            .source_topic()
            .ok_or_else(|| invalid("plan has no source topic".into()))?;
        let description = self.topics.describe_topic(source)?;
        let partitions = u32::try_from(description.partition_count())
            .map_err(|_| invalid(format!("source topic {source} has too many partitions")))?;

        let sink = TopicRequirement::for_sink(query, configs, partitions)?;
        reconcile(self.topics.as_ref(), &sink)?;

        let topology = PlanTopology::of(query, configs);
        let listener = QueryStateListener::new(
            Arc::clone(&self.metrics),
            &self.group_prefix,
            &query.query_id,
        )?;

        info!(
            query_id = %query.query_id,
            application_id = %topology.application_id,
            source = source,
            sink = %sink.topic_name,
            partitions,
            "persistent query ready"
        );
        Ok(PersistentQuery {
            sink,
            topology,
            listener,
        })
    }
}

/// A persistent query ready to hand to the dataflow runtime.
///
/// Dropping the handle removes its metrics.
#[derive(Debug)]
pub struct PersistentQuery {
    sink: TopicRequirement,
    topology: PlanTopology,
    listener: QueryStateListener,
}

impl PersistentQuery {
    /// Query id.
    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.topology.query_id
    }

    /// Runtime application id.
    #[must_use]
    pub fn application_id(&self) -> &str {
        &self.topology.application_id
    }

    /// The topology the runtime must build.
    #[must_use]
    pub fn topology(&self) -> &PlanTopology {
        &self.topology
    }

    /// The reconciled sink topic.
    #[must_use]
    pub fn sink(&self) -> &TopicRequirement {
        &self.sink
    }

    /// Callback target for the runtime's state changes and errors.
    #[must_use]
    pub fn observer(&self) -> &dyn QueryStateObserver {
        &self.listener
    }

    /// The query's lifecycle tracker.
    #[must_use]
    pub fn listener(&self) -> &QueryStateListener {
        &self.listener
    }

    /// Stops tracking the query.
    pub fn close(&self) {
        self.listener.close();
    }
}
