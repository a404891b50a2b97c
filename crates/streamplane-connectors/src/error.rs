//! Broker and reconciliation error types.
//!
//! - `BrokerError`: failures reported by a [`TopicClient`](crate::client::TopicClient)
//! - `TopicError`: failures of topic reconciliation, fatal to query startup

use thiserror::Error;

/// Errors reported by the broker client.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker refused a create because the topic exists.
    #[error("topic '{0}' already exists")]
    TopicExists(String),

    /// The topic does not exist.
    #[error("topic '{0}' does not exist")]
    TopicNotFound(String),

    /// The broker did not answer in time.
    #[error("broker request timed out: {0}")]
    Timeout(String),

    /// Any other broker-side failure.
    #[error("broker request failed: {0}")]
    Request(String),
}

/// Errors raised while reconciling a topic against its requirement.
///
/// None of these are retried here. Query startup must fail on any of them.
#[derive(Debug, Error)]
pub enum TopicError {
    /// A create raced with another writer and the broker reported the topic
    /// as already present.
    #[error("topic '{0}' was created concurrently")]
    TopicExists(String),

    /// The existing topic has the wrong number of partitions.
    #[error("invalid partition count on topic '{topic}': required {required}, found {actual}")]
    InvalidPartitionCount {
        /// Topic name.
        topic: String,
        /// Required partition count.
        required: u32,
        /// Partition count at the broker.
        actual: usize,
    },

    /// A partition of the existing topic has fewer replicas than required.
    #[error(
        "invalid replication factor on topic '{topic}' partition {partition}: \
         required at least {required}, found {actual}"
    )]
    InvalidReplicationFactor {
        /// Topic name.
        topic: String,
        /// Partition id.
        partition: u32,
        /// Required replica count.
        required: u16,
        /// Replica count at the broker.
        actual: usize,
    },

    /// The engine configuration does not yield a usable requirement.
    #[error("invalid topic configuration: {0}")]
    Config(String),

    /// The broker call itself failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}
