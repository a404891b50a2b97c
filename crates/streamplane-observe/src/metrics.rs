//! Metrics registry contract and an in-memory implementation.
//!
//! A gauge is a closure read on demand by whatever exports metrics. The
//! registry only maps metric identities to gauges; it never caches values.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ObserveError;

/// A gauge: returns the current value each time it is read.
pub type Gauge = Arc<dyn Fn() -> String + Send + Sync>;

/// Identity of a registered metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricName {
    /// Metric name, e.g. `query-status`.
    pub name: String,
    /// Metric group, e.g. `ksql-queries`.
    pub group: String,
    /// Human-readable description.
    pub description: String,
    /// Identifying tags.
    pub tags: BTreeMap<String, String>,
}

impl MetricName {
    /// Creates a metric identity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        description: impl Into<String>,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            description: description.into(),
            tags,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        for (key, value) in &self.tags {
            write!(f, ",{key}={value}")?;
        }
        Ok(())
    }
}

/// A metrics backend.
pub trait MetricsRegistry: Send + Sync {
    /// Builds a metric identity.
    fn metric_name(
        &self,
        name: &str,
        group: &str,
        description: &str,
        tags: BTreeMap<String, String>,
    ) -> MetricName {
        MetricName::new(name, group, description, tags)
    }

    /// Registers a gauge.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::DuplicateMetric` if the identity is taken.
    fn add_metric(&self, name: MetricName, gauge: Gauge) -> Result<(), ObserveError>;

    /// Removes a metric, returning its gauge if it was registered.
    fn remove_metric(&self, name: &MetricName) -> Option<Gauge>;
}

/// In-memory metrics registry.
#[derive(Default)]
pub struct Metrics {
    gauges: RwLock<HashMap<MetricName, Gauge>>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("metrics", &self.gauges.read().len())
            .finish()
    }
}

impl Metrics {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a gauge.
    #[must_use]
    pub fn value(&self, name: &MetricName) -> Option<String> {
        let gauge = self.gauges.read().get(name).cloned()?;
        Some(gauge())
    }

    /// Returns `true` if the metric is registered.
    #[must_use]
    pub fn contains(&self, name: &MetricName) -> bool {
        self.gauges.read().contains_key(name)
    }

    /// Number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gauges.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gauges.read().is_empty()
    }

    /// Reads every gauge, ordered by display name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let gauges: Vec<(MetricName, Gauge)> = self
            .gauges
            .read()
            .iter()
            .map(|(name, gauge)| (name.clone(), Arc::clone(gauge)))
            .collect();
        gauges
            .into_iter()
            .map(|(name, gauge)| (name.to_string(), gauge()))
            .collect()
    }
}

impl MetricsRegistry for Metrics {
    fn add_metric(&self, name: MetricName, gauge: Gauge) -> Result<(), ObserveError> {
        let mut gauges = self.gauges.write();
        if gauges.contains_key(&name) {
            return Err(ObserveError::DuplicateMetric(name.to_string()));
        }
        gauges.insert(name, gauge);
        Ok(())
    }

    fn remove_metric(&self, name: &MetricName) -> Option<Gauge> {
        self.gauges.write().remove(name)
    }
}
