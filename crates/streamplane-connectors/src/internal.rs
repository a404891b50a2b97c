//! Reconciliation of the topics a persistent query depends on.
//!
//! A missing topic is created with the required shape. An existing topic
//! is validated and never resized: too few replicas fail the call, as does
//! a partition count other than the required one when the requirement pins
//! it. Extra replicas are accepted and left alone.
//!
//! There is no locking here. Two callers creating the same topic at once
//! race at the broker, and the loser gets `TopicError::TopicExists`.

use streamplane_plan::ConfigSnapshot;
use tracing::{debug, info, warn};

use crate::client::{TopicClient, TopicConfig, TopicDescription};
use crate::error::{BrokerError, TopicError};
use crate::requirement::{internal_topic_replicas, TopicRequirement, INTERNAL_TOPIC_PARTITIONS};

/// Ensures a single-partition topic with at least `replication_factor`
/// replicas exists, creating it with `required_config` if missing.
///
/// # Errors
///
/// See [`reconcile`].
pub fn ensure_topic(
    client: &dyn TopicClient,
    name: &str,
    replication_factor: u16,
    required_config: &TopicConfig,
) -> Result<(), TopicError> {
    if replication_factor == 0 {
        return Err(TopicError::Config(format!(
            "replication factor for topic {name} must be at least 1"
        )));
    }
    let requirement = TopicRequirement {
        config: required_config.clone(),
        ..TopicRequirement::new(name, INTERNAL_TOPIC_PARTITIONS, replication_factor)
    };
    reconcile(client, &requirement)
}

/// Ensures an internal topic exists with infinite retention and the
/// replica count configured in `configs`.
///
/// # Errors
///
/// Returns `TopicError::Config` for a bad replica setting, otherwise see
/// [`reconcile`].
pub fn ensure_internal_topic(
    client: &dyn TopicClient,
    name: &str,
    configs: &ConfigSnapshot,
) -> Result<(), TopicError> {
    let replicas = internal_topic_replicas(configs)?;
    reconcile(client, &TopicRequirement::internal(name, replicas))
}

/// Brings a topic in line with `requirement`, or fails.
///
/// # Errors
///
/// - `TopicError::TopicExists` if the create lost a race
/// - `TopicError::InvalidPartitionCount` if an existing topic has a
///   different partition count and the requirement pins it
/// - `TopicError::InvalidReplicationFactor` if a partition of an existing
///   topic is under-replicated
/// - `TopicError::Broker` for any other broker failure
pub fn reconcile(client: &dyn TopicClient, requirement: &TopicRequirement) -> Result<(), TopicError> {
    let name = requirement.topic_name.as_str();

    if !client.topic_exists(name)? {
        info!(
            topic = name,
            partitions = requirement.partitions,
            replicas = requirement.replicas,
            "creating topic"
        );
        return client
            .create_topic(
                name,
                requirement.partitions,
                requirement.replicas,
                &requirement.config,
            )
            .map_err(|e| match e {
                BrokerError::TopicExists(topic) => TopicError::TopicExists(topic),
                other => TopicError::Broker(other),
            });
    }

    let description = client.describe_topic(name)?;
    validate(requirement, &description)?;

    let reapplied = requirement.reapplied_config();
    if !reapplied.is_empty() && client.add_topic_config(name, &reapplied)? {
        info!(topic = name, config = ?reapplied, "updated topic config");
    }
    debug!(topic = name, "topic is up to date");
    Ok(())
}

fn validate(requirement: &TopicRequirement, description: &TopicDescription) -> Result<(), TopicError> {
    let name = &requirement.topic_name;
    let required = requirement.partitions;
    if description.partition_count() != required as usize {
        if requirement.exact_partitions {
            return Err(TopicError::InvalidPartitionCount {
                topic: name.clone(),
                required,
                actual: description.partition_count(),
            });
        }
        debug!(
            topic = %name,
            required,
            actual = description.partition_count(),
            "keeping existing partition count"
        );
    }

    let required = requirement.replicas;
    for partition in &description.partitions {
        let actual = partition.replication_factor();
        if actual < usize::from(required) {
            return Err(TopicError::InvalidReplicationFactor {
                topic: name.clone(),
                partition: partition.partition,
                required,
                actual,
            });
        }
    }
    if let Some(min) = description.min_replication_factor() {
        if min > usize::from(required) {
            warn!(
                topic = %name,
                required,
                actual = min,
                "topic has more replicas than required; leaving as is"
            );
        }
    }
    Ok(())
}
