//! Circuit state and metrics snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The current state of a circuit breaker.
///
/// - **Closed**: Normal operation. Requests pass through, failures are counted.
/// - **Open**: The protected operation is failing. Requests are rejected immediately.
/// - **Half-Open**: Probing. Requests are allowed through to test recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed; requests pass through normally.
    #[default]
    Closed,
    /// Circuit is open; requests are rejected.
    Open,
    /// Circuit is half-open; probe requests are allowed through.
    HalfOpen,
}

impl CircuitState {
    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen)
    }

    /// Returns `true` if requests may be attempted in this state.
    pub fn can_attempt_request(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }

    /// Returns `true` if requests must be rejected in this state.
    pub fn should_reject_request(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the storage token for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half_open" => Ok(Self::HalfOpen),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized state token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown circuit state '{0}'")]
pub struct UnknownState(pub String);

/// An immutable snapshot of a breaker's counters and timestamps.
///
/// Timestamps are unix-epoch seconds. The consecutive counters are
/// mutually exclusive after any recorded outcome: a success zeroes
/// `consecutive_failures` and a failure zeroes `consecutive_successes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Successes recorded since the last failure.
    pub consecutive_successes: u32,
    /// Failures recorded since the last success.
    pub consecutive_failures: u32,
    /// Total successes recorded over the record's lifetime.
    pub total_successes: u64,
    /// Total failures recorded over the record's lifetime.
    pub total_failures: u64,
    /// When the most recent success was recorded.
    pub last_success_at: Option<i64>,
    /// When the most recent failure was recorded.
    pub last_failure_at: Option<i64>,
}

impl Metrics {
    /// Creates a zeroed snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total outcomes recorded over the record's lifetime.
    pub fn throughput(&self) -> u64 {
        self.total_successes + self.total_failures
    }

    /// Failure rate as a percentage in `0.0..=100.0`.
    ///
    /// Returns `0.0` when no outcomes have been recorded.
    pub fn failure_rate(&self) -> f64 {
        let total = self.throughput();
        if total == 0 {
            return 0.0;
        }
        self.total_failures as f64 / total as f64 * 100.0
    }

    /// Returns `true` once at least `minimum` outcomes have been recorded.
    pub fn has_sufficient_throughput(&self, minimum: u64) -> bool {
        self.throughput() >= minimum
    }

    /// Applies a recorded success at `now`, returning the updated snapshot.
    pub fn with_success(mut self, now: i64) -> Self {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.total_successes += 1;
        self.last_success_at = Some(now);
        self
    }

    /// Applies a recorded failure at `now`, returning the updated snapshot.
    pub fn with_failure(mut self, now: i64) -> Self {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.total_failures += 1;
        self.last_failure_at = Some(now);
        self
    }

    /// Zeroes both consecutive counters, preserving totals and timestamps.
    ///
    /// This is the normal-close rule; an explicit reset discards the
    /// whole record instead.
    pub fn with_consecutive_cleared(mut self) -> Self {
        self.consecutive_successes = 0;
        self.consecutive_failures = 0;
        self
    }
}
