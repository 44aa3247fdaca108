//! Core traits for the fusebox library.
//!
//! This module defines the `StateStore` trait that all persistence
//! drivers implement, and the narrow `KeyValueRepository` contract the
//! cache driver delegates to.

use crate::core::error::StoreError;
use crate::core::scope::BreakerKey;
use crate::core::state::{CircuitState, Metrics};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Persistence contract for breaker state and metrics.
///
/// All operations are keyed by a [`BreakerKey`]. Unknown keys read as
/// Closed with a zero metrics snapshot; recording an outcome creates the
/// record.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; many concurrent calls
///   against the same key must be expected.
/// - `record_success` and `record_failure` must apply their counter
///   update atomically with respect to concurrent recorders, to the
///   extent the backing medium allows. The in-process and database
///   drivers are strictly atomic; the cache driver is read-modify-write
///   and tolerates lost updates.
/// - `record_*` return the post-recording snapshot so the caller can
///   consult a trip strategy without a second read.
/// - Implementations should never panic; all failures are `StoreError`s.
#[async_trait]
pub trait StateStore: Send + Sync + Debug {
    /// Returns the current state, Closed if the key is unknown.
    async fn state(&self, key: &BreakerKey) -> Result<CircuitState, StoreError>;

    /// Returns the current metrics, a zero snapshot if the key is unknown.
    async fn metrics(&self, key: &BreakerKey) -> Result<Metrics, StoreError>;

    /// Records a success at `now` and returns the updated snapshot.
    ///
    /// Increments `consecutive_successes` and `total_successes`, zeroes
    /// `consecutive_failures`, stamps `last_success_at`.
    async fn record_success(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError>;

    /// Records a failure at `now` and returns the updated snapshot.
    ///
    /// Increments `consecutive_failures` and `total_failures`, zeroes
    /// `consecutive_successes`, stamps `last_failure_at`.
    async fn record_failure(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError>;

    /// Moves the record to Open at `now`.
    async fn transition_to_open(&self, key: &BreakerKey, now: i64) -> Result<(), StoreError>;

    /// Moves the record to HalfOpen.
    async fn transition_to_half_open(&self, key: &BreakerKey) -> Result<(), StoreError>;

    /// Moves the record to Closed at `now`, zeroing both consecutive
    /// counters. Totals and timestamps are preserved.
    async fn transition_to_closed(&self, key: &BreakerKey, now: i64) -> Result<(), StoreError>;

    /// Deletes or zeroes both state and metrics for the key.
    async fn reset(&self, key: &BreakerKey) -> Result<(), StoreError>;
}

/// An arc-wrapped store for shared ownership.
pub type ArcStateStore = Arc<dyn StateStore>;

/// Narrow contract over an external key-value cache.
///
/// The host supplies an implementation over its cache client (Redis,
/// Memcached, ...); the cache driver only needs get, set-forever, and
/// delete. Values are opaque strings.
#[async_trait]
pub trait KeyValueRepository: Send + Sync + Debug {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key` with no expiry.
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes `key` if present.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// An arc-wrapped repository for shared ownership.
pub type ArcKeyValueRepository = Arc<dyn KeyValueRepository>;
