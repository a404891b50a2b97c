//! Engine configuration snapshot carried inside a plan document.
//!
//! The snapshot is captured when the plan is written and is the only
//! configuration consulted when the plan is replayed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Service identifier that namespaces internal resources.
pub const SERVICE_ID_CONFIG: &str = "ksql.service.id";

/// Prefix between the service id and the query id in application ids.
pub const PERSISTENT_PREFIX_CONFIG: &str = "ksql.persistent.prefix";

/// Replication factor for sink topics.
pub const SINK_REPLICAS_CONFIG: &str = "ksql.sink.replicas";

/// Replication factor for engine-internal topics.
pub const INTERNAL_TOPIC_REPLICAS_CONFIG: &str = "ksql.internal.topic.replicas";

/// Default value of [`SERVICE_ID_CONFIG`].
pub const DEFAULT_SERVICE_ID: &str = "default_";

/// Default value of [`PERSISTENT_PREFIX_CONFIG`].
pub const DEFAULT_PERSISTENT_PREFIX: &str = "query_";

/// Prefix shared by all engine-owned resource names.
pub const INTERNAL_PREFIX: &str = "_confluent-ksql-";

/// Immutable, ordered map of engine config keys to values.
///
/// Null values are kept: a key explicitly set to null at authoring time is
/// different from a key that was never present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSnapshot {
    entries: BTreeMap<String, Option<String>>,
}

impl ConfigSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was present when the snapshot was taken,
    /// even with a null value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the non-null value of a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Option::as_deref)
    }

    /// Returns a value parsed as `T`, or `None` if absent or null.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::InvalidPlan` if the value does not parse.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, PlanError>
    where
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|v| {
                v.parse::<T>().map_err(|e| {
                    PlanError::InvalidPlan(format!("invalid config value for '{key}': {e}"))
                })
            })
            .transpose()
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Number of entries, including nulls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Service id recorded in the snapshot.
    #[must_use]
    pub fn service_id(&self) -> &str {
        self.get(SERVICE_ID_CONFIG).unwrap_or(DEFAULT_SERVICE_ID)
    }

    /// Persistent query prefix recorded in the snapshot.
    #[must_use]
    pub fn persistent_prefix(&self) -> &str {
        self.get(PERSISTENT_PREFIX_CONFIG)
            .unwrap_or(DEFAULT_PERSISTENT_PREFIX)
    }

    /// Application id the runtime uses for a persistent query.
    #[must_use]
    pub fn application_id(&self, query_id: &str) -> String {
        format!(
            "{INTERNAL_PREFIX}{}{}{query_id}",
            self.service_id(),
            self.persistent_prefix()
        )
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for ConfigSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_values_survive_json() {
        let snapshot: ConfigSnapshot = [
            ("ksql.service.id", Some("svc_")),
            ("ksql.schema.registry.url", None),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"ksql.schema.registry.url":null,"ksql.service.id":"svc_"}"#
        );
        let back: ConfigSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
        assert!(back.contains("ksql.schema.registry.url"));
        assert_eq!(back.get("ksql.schema.registry.url"), None);
    }

    #[test]
    fn test_application_id_defaults() {
        let snapshot = ConfigSnapshot::new();
        assert_eq!(
            snapshot.application_id("CTAS_OUT_0"),
            "_confluent-ksql-default_query_CTAS_OUT_0"
        );
    }

    #[test]
    fn test_application_id_from_snapshot() {
        let snapshot: ConfigSnapshot = [
            (SERVICE_ID_CONFIG, Some("prod_")),
            (PERSISTENT_PREFIX_CONFIG, Some("pq_")),
        ]
        .into_iter()
        .collect();
        assert_eq!(snapshot.application_id("Q1"), "_confluent-ksql-prod_pq_Q1");
    }

    #[test]
    fn test_get_parsed() {
        let snapshot: ConfigSnapshot = [(SINK_REPLICAS_CONFIG, Some("3")), ("bad", Some("x"))]
            .into_iter()
            .collect();
        assert_eq!(snapshot.get_parsed::<i16>(SINK_REPLICAS_CONFIG).unwrap(), Some(3));
        assert_eq!(snapshot.get_parsed::<i16>("missing").unwrap(), None);
        assert!(snapshot.get_parsed::<i16>("bad").is_err());
    }
}
