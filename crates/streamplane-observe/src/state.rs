//! Run states, error types, and the per-query state cell.
//!
//! The cell holds two bytes, each written with a single atomic store by the
//! engine's callback threads and read with a single atomic load by metric
//! readers. Zero means "nothing reported yet".

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use strum::{Display, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Reading of the status gauge before any state change is reported.
pub const NO_STATE: &str = "-";

/// Reading of the error gauge before any error is reported.
pub const NO_ERROR: &str = "NO_ERROR";

/// Run state of a query's dataflow runtime, named as the runtime names it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, FromRepr, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum StreamsState {
    /// Built but not started.
    Created = 1,
    /// Partitions are being reassigned.
    Rebalancing,
    /// Processing records.
    Running,
    /// Shutting down on request.
    PendingShutdown,
    /// Stopped.
    NotRunning,
    /// Shutting down after a failure.
    PendingError,
    /// Stopped after a failure.
    Error,
}

/// Who is to blame for a query error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, FromRepr, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum QueryErrorType {
    /// Not classified.
    Unknown = 1,
    /// Caused by the query or its data.
    User,
    /// Caused by the platform.
    System,
}

/// An error reported by the runtime for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// Error detail. Never exposed through gauges.
    pub message: String,
    /// Error classification.
    pub error_type: QueryErrorType,
}

impl QueryError {
    /// Creates an error report.
    #[must_use]
    pub fn new(message: impl Into<String>, error_type: QueryErrorType) -> Self {
        Self {
            message: message.into(),
            error_type,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.error_type, self.message)
    }
}

/// Last reported run state and error of one query.
#[derive(Debug, Default)]
pub struct QueryRuntimeState {
    state: AtomicU8,
    error: AtomicU8,
}

impl QueryRuntimeState {
    /// Creates a cell with nothing reported.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the run state.
    pub fn set_state(&self, state: StreamsState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Overwrites the error type.
    pub fn set_error(&self, error_type: QueryErrorType) {
        self.error.store(error_type as u8, Ordering::Release);
    }

    /// Last reported run state.
    #[must_use]
    pub fn state(&self) -> Option<StreamsState> {
        StreamsState::from_repr(self.state.load(Ordering::Acquire))
    }

    /// Last reported error type.
    #[must_use]
    pub fn error(&self) -> Option<QueryErrorType> {
        QueryErrorType::from_repr(self.error.load(Ordering::Acquire))
    }

    /// Status gauge reading.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        self.state().map_or(NO_STATE, Into::into)
    }

    /// Error gauge reading.
    #[must_use]
    pub fn error_name(&self) -> &'static str {
        self.error().map_or(NO_ERROR, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_match_runtime() {
        let names: Vec<String> = StreamsState::iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            [
                "CREATED",
                "REBALANCING",
                "RUNNING",
                "PENDING_SHUTDOWN",
                "NOT_RUNNING",
                "PENDING_ERROR",
                "ERROR"
            ]
        );
        assert_eq!("PENDING_ERROR".parse::<StreamsState>().unwrap(), StreamsState::PendingError);
        assert_eq!(QueryErrorType::User.to_string(), "USER");
    }

    #[test]
    fn test_initial_readings() {
        let state = QueryRuntimeState::new();
        assert_eq!(state.state_name(), "-");
        assert_eq!(state.error_name(), "NO_ERROR");
        assert_eq!(state.state(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let state = QueryRuntimeState::new();
        state.set_state(StreamsState::Rebalancing);
        state.set_state(StreamsState::Running);
        state.set_error(QueryErrorType::System);
        state.set_error(QueryErrorType::User);

        assert_eq!(state.state_name(), "RUNNING");
        assert_eq!(state.error_name(), "USER");
    }

    #[test]
    fn test_every_state_round_trips_through_cell() {
        let cell = QueryRuntimeState::new();
        for state in StreamsState::iter() {
            cell.set_state(state);
            assert_eq!(cell.state(), Some(state));
            assert_eq!(cell.state_name(), state.to_string());
        }
    }
}
