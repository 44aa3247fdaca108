//! Trip strategies: pure decision procedures over metrics.
//!
//! A strategy decides, from the post-recording metrics snapshot and the
//! breaker configuration, whether the circuit should open. Strategies
//! never touch the store or the OS clock; the engine passes the current
//! time in.

mod consecutive;
mod percentage;
mod rolling_window;

pub use consecutive::ConsecutiveFailures;
pub use percentage::PercentageFailures;
pub use rolling_window::RollingWindow;

use crate::core::config::{
    BreakerConfig, STRATEGY_CONSECUTIVE, STRATEGY_PERCENTAGE, STRATEGY_ROLLING_WINDOW,
};
use crate::core::state::Metrics;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Decision procedure consulted after each recorded failure.
///
/// Implementations must be pure: the verdict depends only on the
/// arguments, so identical inputs give identical outputs.
pub trait TripStrategy: Send + Sync + Debug {
    /// Returns `true` if the circuit should open.
    fn should_open(&self, metrics: &Metrics, config: &BreakerConfig, now: i64) -> bool;
}

/// An arc-wrapped strategy for shared ownership.
pub type ArcTripStrategy = Arc<dyn TripStrategy>;

/// Registry mapping strategy names to implementations.
///
/// Pre-populated with the three built-ins; the manager accepts
/// user-registered additions.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, ArcTripStrategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut strategies: HashMap<String, ArcTripStrategy> = HashMap::new();
        strategies.insert(
            STRATEGY_CONSECUTIVE.to_string(),
            Arc::new(ConsecutiveFailures),
        );
        strategies.insert(
            STRATEGY_PERCENTAGE.to_string(),
            Arc::new(PercentageFailures),
        );
        strategies.insert(STRATEGY_ROLLING_WINDOW.to_string(), Arc::new(RollingWindow));
        Self { strategies }
    }
}

impl StrategyRegistry {
    /// Creates a registry holding the built-in strategies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a strategy under `name`.
    pub fn register(&mut self, name: impl Into<String>, strategy: ArcTripStrategy) {
        self.strategies.insert(name.into(), strategy);
    }

    /// Looks up a strategy by name.
    pub fn get(&self, name: &str) -> Option<ArcTripStrategy> {
        self.strategies.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct AlwaysOpen;

    impl TripStrategy for AlwaysOpen {
        fn should_open(&self, _: &Metrics, _: &BreakerConfig, _: i64) -> bool {
            true
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = StrategyRegistry::new();
        assert!(registry.get(STRATEGY_CONSECUTIVE).is_some());
        assert!(registry.get(STRATEGY_PERCENTAGE).is_some());
        assert!(registry.get(STRATEGY_ROLLING_WINDOW).is_some());
        assert!(registry.get("nonsense").is_none());
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = StrategyRegistry::new();
        registry.register("always_open", Arc::new(AlwaysOpen));

        let strategy = registry.get("always_open").unwrap();
        assert!(strategy.should_open(&Metrics::new(), &BreakerConfig::default(), 0));
    }
}
