//! Lifetime failure-rate strategy.

use crate::core::config::BreakerConfig;
use crate::core::state::Metrics;
use crate::strategy::TripStrategy;

/// Opens once the lifetime failure rate reaches the percentage
/// threshold, gated on a minimum throughput.
///
/// Uses lifetime totals, so it reacts more slowly than the consecutive
/// strategy but tolerates intermittency: isolated failures inside a
/// healthy stream never trip it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentageFailures;

impl TripStrategy for PercentageFailures {
    fn should_open(&self, metrics: &Metrics, config: &BreakerConfig, _now: i64) -> bool {
        metrics.has_sufficient_throughput(config.minimum_throughput)
            && metrics.failure_rate() >= config.percentage_threshold
    }
}
