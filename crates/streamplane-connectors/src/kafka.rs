//! Kafka implementation of [`TopicClient`] over the rdkafka admin client.
//!
//! The admin API is asynchronous; each call here blocks on its future with
//! a bounded request timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::executor::block_on;
use rdkafka::admin::{
    AdminClient, AdminOptions, AlterConfig, ConfigSource, NewTopic, ResourceSpecifier,
    TopicReplication,
};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::types::RDKafkaRespErr;
use tracing::debug;

use crate::client::{PartitionInfo, TopicClient, TopicConfig, TopicDescription};
use crate::error::BrokerError;

/// Default timeout for admin requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Topic client backed by a Kafka cluster.
pub struct KafkaTopicClient {
    admin: AdminClient<DefaultClientContext>,
    request_timeout: Duration,
}

impl std::fmt::Debug for KafkaTopicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTopicClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn broker_error(e: &KafkaError) -> BrokerError {
    match e.rdkafka_error_code() {
        Some(RDKafkaErrorCode::RequestTimedOut | RDKafkaErrorCode::OperationTimedOut) => {
            BrokerError::Timeout(e.to_string())
        }
        _ => BrokerError::Request(e.to_string()),
    }
}

fn metadata_error(code: RDKafkaRespErr) -> BrokerError {
    let code = RDKafkaErrorCode::from(code);
    match code {
        RDKafkaErrorCode::RequestTimedOut | RDKafkaErrorCode::OperationTimedOut => {
            BrokerError::Timeout(code.to_string())
        }
        _ => BrokerError::Request(code.to_string()),
    }
}

/// Reads existence from a topic's metadata error. Only an unknown topic is
/// missing; any other error (leader election, authorization) is reported.
fn existence(error: Option<RDKafkaRespErr>) -> Result<bool, BrokerError> {
    match error {
        None => Ok(true),
        Some(RDKafkaRespErr::RD_KAFKA_RESP_ERR_UNKNOWN_TOPIC_OR_PART) => Ok(false),
        Some(code) => Err(metadata_error(code)),
    }
}

impl KafkaTopicClient {
    /// Connects an admin client to `bootstrap_servers`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Request` if the client cannot be created.
    pub fn new(bootstrap_servers: &str) -> Result<Self, BrokerError> {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", bootstrap_servers);
        Self::from_config(&config, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client from a prepared rdkafka config.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Request` if the client cannot be created.
    pub fn from_config(config: &ClientConfig, request_timeout: Duration) -> Result<Self, BrokerError> {
        let admin = config
            .create::<AdminClient<DefaultClientContext>>()
            .map_err(|e| broker_error(&e))?;
        Ok(Self {
            admin,
            request_timeout,
        })
    }

    fn options(&self) -> AdminOptions {
        AdminOptions::new().request_timeout(Some(self.request_timeout))
    }

    /// Dynamic (topic-level overrides) config of a topic.
    fn dynamic_config(&self, name: &str) -> Result<TopicConfig, BrokerError> {
        let results = block_on(
            self.admin
                .describe_configs(&[ResourceSpecifier::Topic(name)], &self.options()),
        )
        .map_err(|e| broker_error(&e))?;

        let mut config = TopicConfig::new();
        for result in results {
            let resource = result.map_err(|code| BrokerError::Request(code.to_string()))?;
            for entry in resource.entries {
                if entry.source != ConfigSource::DynamicTopic {
                    continue;
                }
                if let Some(value) = entry.value {
                    config.insert(entry.name, value);
                }
            }
        }
        Ok(config)
    }
}

impl TopicClient for KafkaTopicClient {
    fn topic_exists(&self, name: &str) -> Result<bool, BrokerError> {
        let metadata = self
            .admin
            .inner()
            .fetch_metadata(Some(name), self.request_timeout)
            .map_err(|e| broker_error(&e))?;
        match metadata.topics().iter().find(|topic| topic.name() == name) {
            Some(topic) => existence(topic.error()),
            None => Ok(false),
        }
    }

    fn describe_topic(&self, name: &str) -> Result<TopicDescription, BrokerError> {
        let metadata = self
            .admin
            .inner()
            .fetch_metadata(Some(name), self.request_timeout)
            .map_err(|e| broker_error(&e))?;
        let topic = metadata
            .topics()
            .iter()
            .find(|topic| topic.name() == name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;

        if !existence(topic.error())? {
            return Err(BrokerError::TopicNotFound(name.to_string()));
        }

        let mut partitions: Vec<PartitionInfo> = topic
            .partitions()
            .iter()
            .map(|p| {
                PartitionInfo::new(u32::try_from(p.id()).unwrap_or_default(), p.replicas().to_vec())
            })
            .collect();
        partitions.sort_by_key(|p| p.partition);
        Ok(TopicDescription::new(name, partitions))
    }

    fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replicas: u16,
        config: &TopicConfig,
    ) -> Result<(), BrokerError> {
        let partitions = i32::try_from(partitions)
            .map_err(|_| BrokerError::Request(format!("too many partitions: {partitions}")))?;
        let mut topic = NewTopic::new(name, partitions, TopicReplication::Fixed(i32::from(replicas)));
        for (key, value) in config {
            topic = topic.set(key, value);
        }

        let results = block_on(self.admin.create_topics(&[topic], &self.options()))
            .map_err(|e| broker_error(&e))?;
        for result in results {
            match result {
                Ok(_) => {}
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    return Err(BrokerError::TopicExists(topic));
                }
                Err((topic, code)) => {
                    return Err(BrokerError::Request(format!("create {topic}: {code}")));
                }
            }
        }
        debug!(topic = name, partitions, replicas, "created topic");
        Ok(())
    }

    fn add_topic_config(&self, name: &str, config: &TopicConfig) -> Result<bool, BrokerError> {
        let current = self.dynamic_config(name)?;
        if config.iter().all(|(key, value)| current.get(key) == Some(value)) {
            return Ok(false);
        }

        // AlterConfigs replaces the whole dynamic config, so resend the
        // existing overrides alongside the new entries.
        let merged: BTreeMap<&str, &str> = current
            .iter()
            .chain(config.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let mut alter = AlterConfig::new(ResourceSpecifier::Topic(name));
        for (key, value) in &merged {
            alter = alter.set(key, value);
        }

        let results = block_on(self.admin.alter_configs(&[alter], &self.options()))
            .map_err(|e| broker_error(&e))?;
        for result in results {
            result.map_err(|(_, code)| BrokerError::Request(format!("alter {name}: {code}")))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_topic_is_missing() {
        assert!(existence(None).unwrap());
        assert!(!existence(Some(RDKafkaRespErr::RD_KAFKA_RESP_ERR_UNKNOWN_TOPIC_OR_PART)).unwrap());
    }

    #[test]
    fn test_other_metadata_errors_are_reported() {
        for code in [
            RDKafkaRespErr::RD_KAFKA_RESP_ERR_LEADER_NOT_AVAILABLE,
            RDKafkaRespErr::RD_KAFKA_RESP_ERR_TOPIC_AUTHORIZATION_FAILED,
        ] {
            assert!(matches!(existence(Some(code)), Err(BrokerError::Request(_))));
        }
        assert!(matches!(
            existence(Some(RDKafkaRespErr::RD_KAFKA_RESP_ERR_REQUEST_TIMED_OUT)),
            Err(BrokerError::Timeout(_))
        ));
    }
}
