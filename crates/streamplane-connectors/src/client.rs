//! Broker topic client contract.
//!
//! Every call is synchronous and may block the calling thread for a broker
//! round trip. Reconciliation only happens at query startup, off the
//! record-processing path.

use std::collections::BTreeMap;

use crate::error::BrokerError;

/// Topic-level config entries, ordered by key.
pub type TopicConfig = BTreeMap<String, String>;

/// One partition of a described topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Partition id.
    pub partition: u32,
    /// Broker ids holding a replica of the partition.
    pub replicas: Vec<i32>,
}

impl PartitionInfo {
    /// Creates a partition description.
    #[must_use]
    pub fn new(partition: u32, replicas: Vec<i32>) -> Self {
        Self {
            partition,
            replicas,
        }
    }

    /// Number of replicas of this partition.
    #[must_use]
    pub fn replication_factor(&self) -> usize {
        self.replicas.len()
    }
}

/// Broker-side shape of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    /// Topic name.
    pub name: String,
    /// Partitions ordered by id.
    pub partitions: Vec<PartitionInfo>,
}

impl TopicDescription {
    /// Creates a description.
    #[must_use]
    pub fn new(name: impl Into<String>, partitions: Vec<PartitionInfo>) -> Self {
        Self {
            name: name.into(),
            partitions,
        }
    }

    /// Number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Lowest replica count across partitions, if there are any.
    #[must_use]
    pub fn min_replication_factor(&self) -> Option<usize> {
        self.partitions
            .iter()
            .map(PartitionInfo::replication_factor)
            .min()
    }
}

/// Administrative operations on broker topics.
pub trait TopicClient: Send + Sync {
    /// Returns whether the topic exists.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the broker cannot be queried.
    fn topic_exists(&self, name: &str) -> Result<bool, BrokerError>;

    /// Describes the partitions of an existing topic.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::TopicNotFound` for a missing topic.
    fn describe_topic(&self, name: &str) -> Result<TopicDescription, BrokerError>;

    /// Creates a topic.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::TopicExists` if the topic already exists.
    fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replicas: u16,
        config: &TopicConfig,
    ) -> Result<(), BrokerError>;

    /// Sets the given entries on a topic, keeping every other entry.
    ///
    /// Returns `true` if the broker config changed.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the config cannot be read or written.
    fn add_topic_config(&self, name: &str, config: &TopicConfig) -> Result<bool, BrokerError>;
}
