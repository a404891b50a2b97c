//! Required shapes of the topics a persistent query depends on.

use streamplane_plan::config::{INTERNAL_TOPIC_REPLICAS_CONFIG, SINK_REPLICAS_CONFIG};
use streamplane_plan::{ConfigSnapshot, QueryPlan};
use tracing::warn;

use crate::client::TopicConfig;
use crate::error::TopicError;

/// Topic config key for retention time.
pub const RETENTION_MS_CONFIG: &str = "retention.ms";

/// Topic config key for the cleanup policy.
pub const CLEANUP_POLICY_CONFIG: &str = "cleanup.policy";

/// Cleanup policy that deletes old segments rather than compacting them.
pub const CLEANUP_POLICY_DELETE: &str = "delete";

/// Internal topics are single-partition.
pub const INTERNAL_TOPIC_PARTITIONS: u32 = 1;

const DEFAULT_REPLICAS: u16 = 1;

/// Partitions, replicas, and config a topic must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRequirement {
    /// Topic name.
    pub topic_name: String,
    /// Partition count used on creation.
    pub partitions: u32,
    /// Whether an existing topic must have exactly `partitions` partitions.
    pub exact_partitions: bool,
    /// Minimum replica count per partition.
    pub replicas: u16,
    /// Config applied on creation.
    pub config: TopicConfig,
}

impl TopicRequirement {
    /// Creates a requirement with no config.
    #[must_use]
    pub fn new(topic_name: impl Into<String>, partitions: u32, replicas: u16) -> Self {
        Self {
            topic_name: topic_name.into(),
            partitions,
            exact_partitions: true,
            replicas,
            config: TopicConfig::new(),
        }
    }

    /// Accepts an existing topic with any partition count.
    #[must_use]
    pub fn with_any_partitions(mut self) -> Self {
        self.exact_partitions = false;
        self
    }

    /// Adds a config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// An internal topic: one partition, infinite retention, delete cleanup.
    #[must_use]
    pub fn internal(topic_name: impl Into<String>, replicas: u16) -> Self {
        Self::new(topic_name, INTERNAL_TOPIC_PARTITIONS, replicas)
            .with_config(RETENTION_MS_CONFIG, i64::MAX.to_string())
            .with_config(CLEANUP_POLICY_CONFIG, CLEANUP_POLICY_DELETE)
    }

    /// The sink topic of a query, created with as many partitions as its
    /// source.
    ///
    /// An existing sink keeps whatever partition count it has, so a source
    /// topic repartitioned after the sink was created does not block restart.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::Config` if the plan has no sink topic or the
    /// snapshot holds an unparsable replica count.
    pub fn for_sink(
        query: &QueryPlan,
        configs: &ConfigSnapshot,
        partitions: u32,
    ) -> Result<Self, TopicError> {
        let topic = query.sink_topic().ok_or_else(|| {
            TopicError::Config(format!("query {} has no sink topic", query.query_id))
        })?;
        let replicas = replicas(configs, SINK_REPLICAS_CONFIG)?.unwrap_or(DEFAULT_REPLICAS);
        Ok(Self::new(topic, partitions, replicas).with_any_partitions())
    }

    /// Entries re-applied to a topic that already exists.
    ///
    /// Only retention is re-applied; the cleanup policy is set at creation.
    #[must_use]
    pub fn reapplied_config(&self) -> TopicConfig {
        self.config
            .iter()
            .filter(|(key, _)| key.as_str() == RETENTION_MS_CONFIG)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn replicas(configs: &ConfigSnapshot, key: &str) -> Result<Option<u16>, TopicError> {
    let value = configs
        .get_parsed::<u16>(key)
        .map_err(|e| TopicError::Config(e.to_string()))?;
    if value == Some(0) {
        return Err(TopicError::Config(format!("{key} must be at least 1")));
    }
    Ok(value)
}

/// Replica count for internal topics.
///
/// An explicit `ksql.sink.replicas` wins; otherwise
/// `ksql.internal.topic.replicas` is used, defaulting to 1.
///
/// # Errors
///
/// Returns `TopicError::Config` for an unparsable or zero replica count.
pub fn internal_topic_replicas(configs: &ConfigSnapshot) -> Result<u16, TopicError> {
    let replicas = match replicas(configs, SINK_REPLICAS_CONFIG)? {
        Some(sink) => sink,
        None => replicas(configs, INTERNAL_TOPIC_REPLICAS_CONFIG)?.unwrap_or(DEFAULT_REPLICAS),
    };
    if replicas < 2 {
        warn!(
            replicas,
            "internal topics are not replicated; set {INTERNAL_TOPIC_REPLICAS_CONFIG} to at least 2"
        );
    }
    Ok(replicas)
}
