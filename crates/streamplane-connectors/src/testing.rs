//! Testing utilities for topic reconciliation.
//!
//! Provides an in-memory [`TopicClient`] that records every call.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::client::{PartitionInfo, TopicClient, TopicConfig, TopicDescription};
use crate::error::BrokerError;

/// A call received by [`MockTopicClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCall {
    /// `topic_exists(name)`.
    Exists(String),
    /// `describe_topic(name)`.
    Describe(String),
    /// `create_topic(..)`.
    Create {
        /// Topic name.
        name: String,
        /// Partition count.
        partitions: u32,
        /// Replica count.
        replicas: u16,
        /// Creation config.
        config: TopicConfig,
    },
    /// `add_topic_config(..)`.
    AddConfig {
        /// Topic name.
        name: String,
        /// Entries to set.
        config: TopicConfig,
    },
}

#[derive(Debug)]
struct MockTopic {
    description: TopicDescription,
    config: TopicConfig,
}

#[derive(Debug, Default)]
struct MockState {
    topics: BTreeMap<String, MockTopic>,
    calls: Vec<TopicCall>,
    mutations: usize,
    create_races: bool,
}

/// In-memory broker for tests.
#[derive(Debug, Default)]
pub struct MockTopicClient {
    state: Mutex<MockState>,
}

fn describe(name: &str, partitions: u32, replicas: u16) -> TopicDescription {
    let partitions = (0..partitions)
        .map(|p| PartitionInfo::new(p, (0..i32::from(replicas)).collect()))
        .collect();
    TopicDescription::new(name, partitions)
}

impl MockTopicClient {
    /// Creates a broker with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an existing topic where every partition has `replicas` replicas.
    #[must_use]
    pub fn with_topic(self, name: &str, partitions: u32, replicas: u16) -> Self {
        self.state.lock().topics.insert(
            name.to_string(),
            MockTopic {
                description: describe(name, partitions, replicas),
                config: TopicConfig::new(),
            },
        );
        self
    }

    /// Makes every create fail as if another client created the topic
    /// between the existence check and the create.
    #[must_use]
    pub fn with_create_race(self) -> Self {
        self.state.lock().create_races = true;
        self
    }

    /// All calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TopicCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `create_topic` calls received.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, TopicCall::Create { .. }))
            .count()
    }

    /// Number of calls that changed broker state.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state.lock().mutations
    }

    /// Current config of a topic.
    #[must_use]
    pub fn topic_config(&self, name: &str) -> Option<TopicConfig> {
        self.state.lock().topics.get(name).map(|t| t.config.clone())
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

impl TopicClient for MockTopicClient {
    fn topic_exists(&self, name: &str) -> Result<bool, BrokerError> {
        let mut state = self.state.lock();
        state.calls.push(TopicCall::Exists(name.to_string()));
        Ok(state.topics.contains_key(name))
    }

    fn describe_topic(&self, name: &str) -> Result<TopicDescription, BrokerError> {
        let mut state = self.state.lock();
        state.calls.push(TopicCall::Describe(name.to_string()));
        state
            .topics
            .get(name)
            .map(|t| t.description.clone())
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))
    }

    fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replicas: u16,
        config: &TopicConfig,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.calls.push(TopicCall::Create {
            name: name.to_string(),
            partitions,
            replicas,
            config: config.clone(),
        });
        if state.create_races || state.topics.contains_key(name) {
            return Err(BrokerError::TopicExists(name.to_string()));
        }
        state.topics.insert(
            name.to_string(),
            MockTopic {
                description: describe(name, partitions, replicas),
                config: config.clone(),
            },
        );
        state.mutations += 1;
        Ok(())
    }

    fn add_topic_config(&self, name: &str, config: &TopicConfig) -> Result<bool, BrokerError> {
        let mut state = self.state.lock();
        state.calls.push(TopicCall::AddConfig {
            name: name.to_string(),
            config: config.clone(),
        });
        let topic = state
            .topics
            .get_mut(name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;
        let mut changed = false;
        for (key, value) in config {
            if topic.config.get(key) != Some(value) {
                topic.config.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if changed {
            state.mutations += 1;
        }
        Ok(changed)
    }
}
