//! Engine configuration.
//!
//! Properties are plain string key/value pairs supplied by whatever loads
//! configuration. Typed accessors parse on read. A [`ConfigSnapshot`] of the
//! properties is what gets embedded in newly written plans.

use std::collections::BTreeMap;

use streamplane_plan::config::{
    DEFAULT_PERSISTENT_PREFIX, DEFAULT_SERVICE_ID, INTERNAL_PREFIX, PERSISTENT_PREFIX_CONFIG,
    SERVICE_ID_CONFIG,
};
use streamplane_plan::ConfigSnapshot;

/// Config key for the broker bootstrap servers.
pub const BOOTSTRAP_SERVERS_CONFIG: &str = "bootstrap.servers";

/// Errors raised while reading engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key is missing.
    #[error("missing required config: {0}")]
    Missing(String),
}

/// Engine configuration properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    properties: BTreeMap<String, String>,
}

impl EngineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from key/value pairs.
    #[must_use]
    pub fn with_properties<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Returns a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns a property that must be present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is absent.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// All properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Service id shared by every server of one cluster.
    #[must_use]
    pub fn service_id(&self) -> &str {
        self.get(SERVICE_ID_CONFIG).unwrap_or(DEFAULT_SERVICE_ID)
    }

    /// Prefix of persistent query application ids.
    #[must_use]
    pub fn persistent_query_prefix(&self) -> &str {
        self.get(PERSISTENT_PREFIX_CONFIG)
            .unwrap_or(DEFAULT_PERSISTENT_PREFIX)
    }

    /// Broker bootstrap servers.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if not configured.
    pub fn bootstrap_servers(&self) -> Result<&str, ConfigError> {
        self.require(BOOTSTRAP_SERVERS_CONFIG)
    }

    /// Name of the cluster's command topic.
    #[must_use]
    pub fn command_topic(&self) -> String {
        format!("{INTERNAL_PREFIX}{}_command_topic", self.service_id())
    }

    /// Snapshot of every property, for embedding in a plan.
    #[must_use]
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), Some(v.as_str())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.service_id(), "default_");
        assert_eq!(config.persistent_query_prefix(), "query_");
        assert_eq!(config.command_topic(), "_confluent-ksql-default__command_topic");
        assert!(matches!(
            config.bootstrap_servers(),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_properties_override_defaults() {
        let config = EngineConfig::with_properties([
            ("ksql.service.id", "billing_"),
            ("ksql.persistent.prefix", "pq_"),
            ("bootstrap.servers", "broker:9092"),
        ]);
        assert_eq!(config.service_id(), "billing_");
        assert_eq!(config.persistent_query_prefix(), "pq_");
        assert_eq!(config.bootstrap_servers().unwrap(), "broker:9092");
        assert_eq!(config.command_topic(), "_confluent-ksql-billing__command_topic");
        assert_eq!(config.properties().len(), 3);
    }

    #[test]
    fn test_snapshot_round_trips_values() {
        let mut config = EngineConfig::new();
        config.set("ksql.service.id", "billing_");
        let snapshot = config.snapshot();
        assert_eq!(snapshot.service_id(), "billing_");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.application_id("CTAS_X_1"),
            "_confluent-ksql-billing_query_CTAS_X_1"
        );
    }
}
