//! Consecutive-failure strategy.

use crate::core::config::BreakerConfig;
use crate::core::state::Metrics;
use crate::strategy::TripStrategy;

/// Opens once `consecutive_failures` reaches the failure threshold.
///
/// Any single interleaved success resets the streak, so this is the
/// fastest detector of sudden total outages and the most forgiving of
/// intermittent errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsecutiveFailures;

impl TripStrategy for ConsecutiveFailures {
    fn should_open(&self, metrics: &Metrics, config: &BreakerConfig, _now: i64) -> bool {
        metrics.consecutive_failures >= config.failure_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_on_nth_failure_never_earlier() {
        let config = BreakerConfig::default().with_failure_threshold(5);
        let strategy = ConsecutiveFailures;

        let mut metrics = Metrics::new();
        for i in 0..4 {
            metrics = metrics.with_failure(i);
            assert!(!strategy.should_open(&metrics, &config, i));
        }
        metrics = metrics.with_failure(4);
        assert!(strategy.should_open(&metrics, &config, 4));
    }

    #[test]
    fn test_interleaved_success_resets() {
        let config = BreakerConfig::default().with_failure_threshold(3);
        let strategy = ConsecutiveFailures;

        let metrics = Metrics::new()
            .with_failure(0)
            .with_failure(1)
            .with_success(2)
            .with_failure(3)
            .with_failure(4);
        assert!(!strategy.should_open(&metrics, &config, 4));
    }
}
