//! Injectable time source.
//!
//! Cooldown checks and the rolling-window strategy never read the OS
//! clock directly; they take the current time from a [`Clock`] so tests
//! can drive transitions deterministically.

use chrono::Utc;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A source of the current unix-epoch time in seconds.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current unix-epoch seconds.
    fn now(&self) -> i64;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a manual clock starting at `now` epoch seconds.
    pub fn starting_at(now: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now),
        })
    }

    /// Moves the clock to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advances the clock by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::starting_at(1_000);
        assert_eq!(clock.now(), 1_000);

        clock.advance(60);
        assert_eq!(clock.now(), 1_060);

        clock.set(500);
        assert_eq!(clock.now(), 500);
    }

    #[test]
    fn test_system_clock_is_sane() {
        // Well past 2020-01-01.
        assert!(SystemClock::new().now() > 1_577_836_800);
    }
}
