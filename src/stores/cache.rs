//! Cache store driver.
//!
//! Delegates persistence to an external key-value repository through the
//! narrow [`KeyValueRepository`] contract. Two logical keys are kept per
//! identity: `…:state` holds the state token and `…:metrics` a JSON
//! snapshot. Counter updates are read-modify-write; concurrent recorders
//! on the same key observe last-writer-wins, which the threshold-based
//! strategies tolerate.

use crate::core::error::StoreError;
use crate::core::scope::{BreakerKey, KeyAttribute};
use crate::core::state::{CircuitState, Metrics};
use crate::core::traits::{ArcKeyValueRepository, KeyValueRepository, StateStore};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Store driver over an external key-value repository.
#[derive(Debug)]
pub struct CacheStore {
    repository: ArcKeyValueRepository,
}

impl CacheStore {
    /// Creates a cache store over `repository`.
    pub fn new(repository: ArcKeyValueRepository) -> Self {
        Self { repository }
    }

    async fn read_metrics(&self, key: &BreakerKey) -> Result<Metrics, StoreError> {
        let storage_key = key.attribute_key(KeyAttribute::Metrics);
        match self.repository.get(&storage_key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::CorruptRecord {
                key: storage_key,
                reason: e.to_string(),
            }),
            None => Ok(Metrics::new()),
        }
    }

    async fn write_metrics(&self, key: &BreakerKey, metrics: &Metrics) -> Result<(), StoreError> {
        let raw = serde_json::to_string(metrics)?;
        self.repository
            .put(&key.attribute_key(KeyAttribute::Metrics), raw)
            .await
    }

    async fn write_state(&self, key: &BreakerKey, state: CircuitState) -> Result<(), StoreError> {
        self.repository
            .put(&key.attribute_key(KeyAttribute::State), state.to_string())
            .await
    }
}

#[async_trait]
impl StateStore for CacheStore {
    async fn state(&self, key: &BreakerKey) -> Result<CircuitState, StoreError> {
        let storage_key = key.attribute_key(KeyAttribute::State);
        match self.repository.get(&storage_key).await? {
            Some(raw) => raw.parse().map_err(|_| StoreError::CorruptRecord {
                key: storage_key,
                reason: format!("unrecognized state token '{raw}'"),
            }),
            None => Ok(CircuitState::Closed),
        }
    }

    async fn metrics(&self, key: &BreakerKey) -> Result<Metrics, StoreError> {
        self.read_metrics(key).await
    }

    async fn record_success(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        let metrics = self.read_metrics(key).await?.with_success(now);
        self.write_metrics(key, &metrics).await?;
        Ok(metrics)
    }

    async fn record_failure(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        let metrics = self.read_metrics(key).await?.with_failure(now);
        self.write_metrics(key, &metrics).await?;
        Ok(metrics)
    }

    async fn transition_to_open(&self, key: &BreakerKey, _now: i64) -> Result<(), StoreError> {
        self.write_state(key, CircuitState::Open).await
    }

    async fn transition_to_half_open(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.write_state(key, CircuitState::HalfOpen).await
    }

    async fn transition_to_closed(&self, key: &BreakerKey, _now: i64) -> Result<(), StoreError> {
        let metrics = self.read_metrics(key).await?.with_consecutive_cleared();
        self.write_metrics(key, &metrics).await?;
        self.write_state(key, CircuitState::Closed).await
    }

    async fn reset(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.repository
            .delete(&key.attribute_key(KeyAttribute::State))
            .await?;
        self.repository
            .delete(&key.attribute_key(KeyAttribute::Metrics))
            .await
    }
}

/// A process-local [`KeyValueRepository`].
///
/// Stands in for an external cache in tests and single-process
/// deployments; exercises the same read-modify-write code paths the
/// real repository would.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueRepository for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        Ok(())
    }
}
