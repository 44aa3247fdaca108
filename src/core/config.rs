//! Per-breaker configuration.

use std::time::Duration;

/// Built-in strategy name for consecutive-failure tripping.
pub const STRATEGY_CONSECUTIVE: &str = "consecutive_failures";
/// Built-in strategy name for lifetime failure-rate tripping.
pub const STRATEGY_PERCENTAGE: &str = "percentage_failures";
/// Built-in strategy name for windowed failure-rate tripping.
pub const STRATEGY_ROLLING_WINDOW: &str = "rolling_window";

/// Configuration for a single circuit breaker.
///
/// Values are immutable once the breaker is built; the `with_*` methods
/// return updated copies for builder-style construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Name of the breaker this configuration applies to.
    pub name: String,

    /// Consecutive failures required before the circuit opens.
    pub failure_threshold: u32,

    /// Consecutive successes in half-open required to close the circuit.
    pub success_threshold: u32,

    /// How long the circuit stays open before a probe is allowed.
    pub timeout: Duration,

    /// Width of the rolling window consulted by the windowed strategy.
    pub sampling_duration: Duration,

    /// Outcomes required before rate-based strategies may trip.
    pub minimum_throughput: u64,

    /// Failure-rate threshold in percent, `0.0..=100.0`.
    pub percentage_threshold: f64,

    /// Name of the trip strategy to consult.
    pub strategy: String,

    /// Store to persist this breaker in; `None` uses the manager default.
    pub store: Option<String>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            sampling_duration: Duration::from_secs(120),
            minimum_throughput: 10,
            percentage_threshold: 50.0,
            strategy: STRATEGY_CONSECUTIVE.to_string(),
            store: None,
        }
    }
}

impl BreakerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the breaker name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the consecutive-failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the half-open success threshold.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Sets the open-state cooldown.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the rolling-window width.
    pub fn with_sampling_duration(mut self, duration: Duration) -> Self {
        self.sampling_duration = duration;
        self
    }

    /// Sets the minimum throughput gate for rate-based strategies.
    pub fn with_minimum_throughput(mut self, minimum: u64) -> Self {
        self.minimum_throughput = minimum;
        self
    }

    /// Sets the failure-rate threshold, clamped to `0.0..=100.0`.
    pub fn with_percentage_threshold(mut self, percentage: f64) -> Self {
        self.percentage_threshold = percentage.clamp(0.0, 100.0);
        self
    }

    /// Sets the trip strategy by registry name.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Pins this breaker to a named store from the manager configuration.
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// A configuration that trips quickly and recovers slowly.
    ///
    /// Lower failure threshold (3), longer cooldown (120 seconds), more
    /// probes required to close (3).
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 3,
            timeout: Duration::from_secs(120),
            ..Self::default()
        }
    }

    /// A configuration that tolerates more failures and recovers fast.
    ///
    /// Higher failure threshold (10), short cooldown (15 seconds), a
    /// single probe closes the circuit.
    pub fn high_availability() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 1,
            timeout: Duration::from_secs(15),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.sampling_duration, Duration::from_secs(120));
        assert_eq!(config.minimum_throughput, 10);
        assert_eq!(config.percentage_threshold, 50.0);
        assert_eq!(config.strategy, STRATEGY_CONSECUTIVE);
        assert!(config.store.is_none());
    }

    #[test]
    fn test_builder() {
        let config = BreakerConfig::new()
            .with_name("payments")
            .with_failure_threshold(8)
            .with_timeout(Duration::from_secs(30))
            .with_strategy(STRATEGY_ROLLING_WINDOW)
            .with_store("redis");

        assert_eq!(config.name, "payments");
        assert_eq!(config.failure_threshold, 8);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.strategy, STRATEGY_ROLLING_WINDOW);
        assert_eq!(config.store.as_deref(), Some("redis"));
    }

    #[test]
    fn test_percentage_threshold_clamped() {
        assert_eq!(
            BreakerConfig::new()
                .with_percentage_threshold(250.0)
                .percentage_threshold,
            100.0
        );
        assert_eq!(
            BreakerConfig::new()
                .with_percentage_threshold(-1.0)
                .percentage_threshold,
            0.0
        );
    }

    #[test]
    fn test_presets() {
        let strict = BreakerConfig::strict();
        assert!(strict.failure_threshold < BreakerConfig::default().failure_threshold);
        assert!(strict.timeout > BreakerConfig::default().timeout);

        let ha = BreakerConfig::high_availability();
        assert!(ha.failure_threshold > BreakerConfig::default().failure_threshold);
        assert_eq!(ha.success_threshold, 1);
    }
}
