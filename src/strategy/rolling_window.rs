//! Windowed failure-rate strategy.

use crate::core::config::BreakerConfig;
use crate::core::state::Metrics;
use crate::strategy::TripStrategy;

/// The percentage strategy, additionally gated on failure recency.
///
/// Opens only while the most recent failure still falls inside the
/// sampling window; once the window slides past it, the breaker stays
/// closed regardless of the lifetime rate. Older bursts are forgotten
/// without any counter maintenance.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingWindow;

impl TripStrategy for RollingWindow {
    fn should_open(&self, metrics: &Metrics, config: &BreakerConfig, now: i64) -> bool {
        let window_start = now - config.sampling_duration.as_secs() as i64;
        let recent_failure = metrics
            .last_failure_at
            .is_some_and(|at| at >= window_start);

        recent_failure
            && metrics.has_sufficient_throughput(config.minimum_throughput)
            && metrics.failure_rate() >= config.percentage_threshold
    }
}
