//! Query lifecycle tracker.
//!
//! [`QueryStateListener`] receives run-state and error callbacks for one
//! persistent query and exposes the latest of each as a gauge:
//!
//! | metric         | group                     | tags                 | initial    |
//! |----------------|---------------------------|----------------------|------------|
//! | `query-status` | `{prefix}ksql-queries`    | `status = <queryId>` | `-`        |
//! | `error-status` | `{prefix}ksql-queries`    | `status = <queryId>` | `NO_ERROR` |
//!
//! Callbacks do a single atomic store. [`close`](QueryStateListener::close)
//! removes both gauges once; callbacks after that are accepted and ignored.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::ObserveError;
use crate::metrics::{Gauge, MetricName, MetricsRegistry};
use crate::state::{QueryError, QueryRuntimeState, StreamsState};

/// Name of the run-state gauge.
pub const QUERY_STATUS_METRIC: &str = "query-status";

/// Name of the error gauge.
pub const ERROR_STATUS_METRIC: &str = "error-status";

/// Metric group, after the optional prefix.
pub const METRIC_GROUP: &str = "ksql-queries";

/// Tag carrying the query id.
pub const STATUS_TAG: &str = "status";

const QUERY_STATUS_DESCRIPTION: &str = "The current status of the given query.";
const ERROR_STATUS_DESCRIPTION: &str =
    "The current error status of the given query, if the state is in ERROR state";

/// Callbacks the dataflow runtime delivers for a running query.
///
/// Called from the runtime's own threads, possibly concurrently.
pub trait QueryStateObserver: Send + Sync {
    /// The runtime moved from `old` to `new`.
    fn on_state_change(&self, old: StreamsState, new: StreamsState);

    /// The runtime reported an error.
    fn on_error(&self, error: &QueryError);
}

/// Publishes one query's run state and last error as gauges.
pub struct QueryStateListener {
    metrics: Arc<dyn MetricsRegistry>,
    state: Arc<QueryRuntimeState>,
    query_id: String,
    query_status: MetricName,
    error_status: MetricName,
    closed: AtomicBool,
}

impl std::fmt::Debug for QueryStateListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStateListener")
            .field("query_id", &self.query_id)
            .field("state", &self.state)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl QueryStateListener {
    /// Registers both gauges for `query_id` under `{group_prefix}ksql-queries`.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::MissingArgument` for an empty query id and
    /// `ObserveError::DuplicateMetric` if the query is already tracked.
    pub fn new(
        metrics: Arc<dyn MetricsRegistry>,
        group_prefix: &str,
        query_id: &str,
    ) -> Result<Self, ObserveError> {
        if query_id.is_empty() {
            return Err(ObserveError::MissingArgument("query_id"));
        }

        let group = format!("{group_prefix}{METRIC_GROUP}");
        let tags: BTreeMap<String, String> = [(STATUS_TAG.to_string(), query_id.to_string())]
            .into_iter()
            .collect();
        let query_status = metrics.metric_name(
            QUERY_STATUS_METRIC,
            &group,
            QUERY_STATUS_DESCRIPTION,
            tags.clone(),
        );
        let error_status =
            metrics.metric_name(ERROR_STATUS_METRIC, &group, ERROR_STATUS_DESCRIPTION, tags);

        let state = Arc::new(QueryRuntimeState::new());
        let reader = Arc::clone(&state);
        let status_gauge: Gauge = Arc::new(move || reader.state_name().to_string());
        let reader = Arc::clone(&state);
        let error_gauge: Gauge = Arc::new(move || reader.error_name().to_string());

        metrics.add_metric(query_status.clone(), status_gauge)?;
        if let Err(e) = metrics.add_metric(error_status.clone(), error_gauge) {
            metrics.remove_metric(&query_status);
            return Err(e);
        }
        debug!(query_id, group = %group, "registered query state metrics");

        Ok(Self {
            metrics,
            state,
            query_id: query_id.to_string(),
            query_status,
            error_status,
            closed: AtomicBool::new(false),
        })
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> QueryStateListenerBuilder {
        QueryStateListenerBuilder::default()
    }

    /// The tracked query.
    #[must_use]
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Identity of the run-state gauge.
    #[must_use]
    pub fn query_status_metric(&self) -> &MetricName {
        &self.query_status
    }

    /// Identity of the error gauge.
    #[must_use]
    pub fn error_status_metric(&self) -> &MetricName {
        &self.error_status
    }

    /// The state cell backing both gauges.
    #[must_use]
    pub fn state(&self) -> &QueryRuntimeState {
        &self.state
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Removes both gauges. Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.metrics.remove_metric(&self.query_status);
        self.metrics.remove_metric(&self.error_status);
        debug!(query_id = %self.query_id, "removed query state metrics");
    }
}

impl QueryStateObserver for QueryStateListener {
    fn on_state_change(&self, old: StreamsState, new: StreamsState) {
        trace!(query_id = %self.query_id, %old, %new, "query state change");
        self.state.set_state(new);
    }

    fn on_error(&self, error: &QueryError) {
        trace!(query_id = %self.query_id, error_type = %error.error_type, "query error");
        self.state.set_error(error.error_type);
    }
}

impl Drop for QueryStateListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`QueryStateListener`] with every argument optional until
/// [`build`](Self::build).
#[derive(Default)]
pub struct QueryStateListenerBuilder {
    metrics: Option<Arc<dyn MetricsRegistry>>,
    group_prefix: String,
    query_id: Option<String>,
}

impl QueryStateListenerBuilder {
    /// Sets the metrics registry.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the metric group prefix. Defaults to empty.
    #[must_use]
    pub fn group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = prefix.into();
        self
    }

    /// Sets the tracked query id.
    #[must_use]
    pub fn query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }

    /// Registers the gauges.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::MissingArgument` if the registry or query id
    /// was not set, otherwise as [`QueryStateListener::new`].
    pub fn build(self) -> Result<QueryStateListener, ObserveError> {
        let metrics = self.metrics.ok_or(ObserveError::MissingArgument("metrics"))?;
        let query_id = self.query_id.ok_or(ObserveError::MissingArgument("query_id"))?;
        QueryStateListener::new(metrics, &self.group_prefix, &query_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::state::QueryErrorType;
    use parking_lot::Mutex;

    const QUERY_ID: &str = "CTAS_COUNTS_0";

    /// Delegates to [`Metrics`] and logs removals.
    #[derive(Default)]
    struct RecordingMetrics {
        inner: Metrics,
        removed: Mutex<Vec<MetricName>>,
    }

    impl MetricsRegistry for RecordingMetrics {
        fn add_metric(&self, name: MetricName, gauge: Gauge) -> Result<(), ObserveError> {
            self.inner.add_metric(name, gauge)
        }

        fn remove_metric(&self, name: &MetricName) -> Option<Gauge> {
            self.removed.lock().push(name.clone());
            self.inner.remove_metric(name)
        }
    }

    fn listener() -> (Arc<RecordingMetrics>, QueryStateListener) {
        let metrics = Arc::new(RecordingMetrics::default());
        let listener = QueryStateListener::new(metrics.clone(), "", QUERY_ID).unwrap();
        (metrics, listener)
    }

    #[test]
    fn test_registers_metric_identities() {
        let (_, listener) = listener();
        let status = listener.query_status_metric();
        assert_eq!(status.name, "query-status");
        assert_eq!(status.group, "ksql-queries");
        assert_eq!(status.description, "The current status of the given query.");
        assert_eq!(status.tags.get("status").map(String::as_str), Some(QUERY_ID));

        let error = listener.error_status_metric();
        assert_eq!(error.name, "error-status");
        assert_eq!(
            error.description,
            "The current error status of the given query, if the state is in ERROR state"
        );
    }

    #[test]
    fn test_group_prefix() {
        let metrics: Arc<dyn MetricsRegistry> = Arc::new(Metrics::new());
        let listener = QueryStateListener::new(metrics, "_confluent-", QUERY_ID).unwrap();
        assert_eq!(listener.query_status_metric().group, "_confluent-ksql-queries");
    }

    #[test]
    fn test_initial_values() {
        let (metrics, listener) = listener();
        assert_eq!(
            metrics.inner.value(listener.query_status_metric()).as_deref(),
            Some("-")
        );
        assert_eq!(
            metrics.inner.value(listener.error_status_metric()).as_deref(),
            Some("NO_ERROR")
        );
    }

    #[test]
    fn test_state_change_updates_gauge() {
        let (metrics, listener) = listener();
        listener.on_state_change(StreamsState::Created, StreamsState::Rebalancing);
        assert_eq!(
            metrics.inner.value(listener.query_status_metric()).as_deref(),
            Some("REBALANCING")
        );
    }

    #[test]
    fn test_error_exposes_type_only() {
        let (metrics, listener) = listener();
        listener.on_error(&QueryError::new("foo", QueryErrorType::User));
        assert_eq!(
            metrics.inner.value(listener.error_status_metric()).as_deref(),
            Some("USER")
        );
    }

    #[test]
    fn test_close_removes_each_metric_once() {
        let (metrics, listener) = listener();
        listener.close();
        listener.close();

        let removed = metrics.removed.lock().clone();
        assert_eq!(
            removed,
            [
                listener.query_status_metric().clone(),
                listener.error_status_metric().clone()
            ]
        );
        assert!(metrics.inner.is_empty());
    }

    #[test]
    fn test_callbacks_after_close_are_harmless() {
        let (metrics, listener) = listener();
        listener.close();
        listener.on_state_change(StreamsState::Running, StreamsState::Error);
        listener.on_error(&QueryError::new("boom", QueryErrorType::System));
        assert!(metrics.inner.value(listener.query_status_metric()).is_none());
    }

    #[test]
    fn test_drop_closes() {
        let (metrics, listener) = listener();
        drop(listener);
        assert_eq!(metrics.removed.lock().len(), 2);
        assert!(metrics.inner.is_empty());
    }

    #[test]
    fn test_missing_arguments_fail_fast() {
        let metrics: Arc<dyn MetricsRegistry> = Arc::new(Metrics::new());
        assert!(matches!(
            QueryStateListener::builder().query_id(QUERY_ID).build(),
            Err(ObserveError::MissingArgument("metrics"))
        ));
        assert!(matches!(
            QueryStateListener::builder().metrics(metrics.clone()).build(),
            Err(ObserveError::MissingArgument("query_id"))
        ));
        assert!(matches!(
            QueryStateListener::new(metrics, "", ""),
            Err(ObserveError::MissingArgument("query_id"))
        ));
    }

    #[test]
    fn test_second_listener_for_same_query_rejected() {
        let (metrics, _listener) = listener();
        let err = QueryStateListener::new(metrics.clone(), "", QUERY_ID).unwrap_err();
        assert!(matches!(err, ObserveError::DuplicateMetric(_)));
        // The failed registration must not disturb the live gauges.
        assert_eq!(metrics.inner.len(), 2);
    }
}
