//! In-process store driver.

use crate::core::error::StoreError;
use crate::core::scope::BreakerKey;
use crate::core::state::{CircuitState, Metrics};
use crate::core::traits::StateStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct Record {
    state: CircuitState,
    metrics: Metrics,
}

/// Process-local store keyed by the canonical identity string.
///
/// Every mutation holds the map's write lock, so counter updates and
/// transitions never interleave. Nothing is shared across processes and
/// nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities currently held.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if no identities are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_record(&self, key: &BreakerKey) -> Record {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key.identity())
            .cloned()
            .unwrap_or_default()
    }

    fn update<R>(&self, key: &BreakerKey, apply: impl FnOnce(&mut Record) -> R) -> R {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = records.entry(key.identity()).or_default();
        apply(record)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn state(&self, key: &BreakerKey) -> Result<CircuitState, StoreError> {
        Ok(self.read_record(key).state)
    }

    async fn metrics(&self, key: &BreakerKey) -> Result<Metrics, StoreError> {
        Ok(self.read_record(key).metrics)
    }

    async fn record_success(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        Ok(self.update(key, |record| {
            record.metrics = record.metrics.clone().with_success(now);
            record.metrics.clone()
        }))
    }

    async fn record_failure(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        Ok(self.update(key, |record| {
            record.metrics = record.metrics.clone().with_failure(now);
            record.metrics.clone()
        }))
    }

    async fn transition_to_open(&self, key: &BreakerKey, _now: i64) -> Result<(), StoreError> {
        self.update(key, |record| record.state = CircuitState::Open);
        Ok(())
    }

    async fn transition_to_half_open(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.update(key, |record| record.state = CircuitState::HalfOpen);
        Ok(())
    }

    async fn transition_to_closed(&self, key: &BreakerKey, _now: i64) -> Result<(), StoreError> {
        self.update(key, |record| {
            record.state = CircuitState::Closed;
            record.metrics = record.metrics.clone().with_consecutive_cleared();
        });
        Ok(())
    }

    async fn reset(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&key.identity());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scope::{Scope, ScopeRef};

    fn key(name: &str) -> BreakerKey {
        BreakerKey::new(name, Scope::global())
    }

    #[tokio::test]
    async fn test_unknown_key_reads_closed_and_zeroed() {
        let store = MemoryStore::new();
        let key = key("payments");

        assert_eq!(store.state(&key).await.unwrap(), CircuitState::Closed);
        assert_eq!(store.metrics(&key).await.unwrap(), Metrics::new());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_record_and_transition_round_trip() {
        let store = MemoryStore::new();
        let key = key("payments");

        let metrics = store.record_failure(&key, 100).await.unwrap();
        assert_eq!(metrics.consecutive_failures, 1);
        assert_eq!(metrics.last_failure_at, Some(100));

        store.transition_to_open(&key, 100).await.unwrap();
        assert_eq!(store.state(&key).await.unwrap(), CircuitState::Open);

        store.transition_to_half_open(&key).await.unwrap();
        assert_eq!(store.state(&key).await.unwrap(), CircuitState::HalfOpen);

        let metrics = store.record_success(&key, 200).await.unwrap();
        assert_eq!(metrics.consecutive_failures, 0);
        assert_eq!(metrics.consecutive_successes, 1);

        store.transition_to_closed(&key, 200).await.unwrap();
        assert_eq!(store.state(&key).await.unwrap(), CircuitState::Closed);
        let metrics = store.metrics(&key).await.unwrap();
        assert_eq!(metrics.consecutive_successes, 0);
        // Totals survive a normal close.
        assert_eq!(metrics.total_failures, 1);
        assert_eq!(metrics.total_successes, 1);
    }

    #[tokio::test]
    async fn test_reset_removes_the_record() {
        let store = MemoryStore::new();
        let key = key("payments");

        store.record_failure(&key, 1).await.unwrap();
        store.transition_to_open(&key, 1).await.unwrap();
        store.reset(&key).await.unwrap();

        assert_eq!(store.state(&key).await.unwrap(), CircuitState::Closed);
        assert_eq!(store.metrics(&key).await.unwrap(), Metrics::new());
    }

    #[tokio::test]
    async fn test_scope_isolation() {
        let store = MemoryStore::new();
        let first = BreakerKey::new(
            "x",
            Scope::global().with_context(ScopeRef::new("user", "1")),
        );
        let second = BreakerKey::new(
            "x",
            Scope::global().with_context(ScopeRef::new("user", "2")),
        );

        for _ in 0..5 {
            store.record_failure(&first, 10).await.unwrap();
        }
        store.transition_to_open(&first, 10).await.unwrap();

        assert_eq!(store.state(&second).await.unwrap(), CircuitState::Closed);
        assert_eq!(store.metrics(&second).await.unwrap(), Metrics::new());
    }

    #[tokio::test]
    async fn test_concurrent_recorders_lose_no_updates() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let key = Arc::new(key("payments"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    store.record_success(&key, 1).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.metrics(&key).await.unwrap().total_successes, 400);
    }
}
