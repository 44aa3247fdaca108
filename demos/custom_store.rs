//! Registering a custom store driver.
//!
//! This example shows how to:
//! - Implement the `StateStore` trait for your own backend
//! - Register a driver factory under a custom name
//! - Point a named store entry at the custom driver
//!
//! Run with: cargo run --example custom_store

use async_trait::async_trait;
use fusebox::{
    BreakerKey, CircuitState, Manager, ManagerConfig, MemoryStore, Metrics, StateStore,
    StoreConfig, StoreError,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("search index unavailable")]
struct SearchError;

/// A store that delegates to `MemoryStore` and counts every operation.
/// A real implementation would talk to your storage backend instead.
#[derive(Debug, Default)]
struct CountingStore {
    inner: MemoryStore,
    operations: std::sync::atomic::AtomicU64,
}

impl CountingStore {
    fn tick(&self) {
        self.operations
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

#[async_trait]
impl StateStore for CountingStore {
    async fn state(&self, key: &BreakerKey) -> Result<CircuitState, StoreError> {
        self.tick();
        self.inner.state(key).await
    }

    async fn metrics(&self, key: &BreakerKey) -> Result<Metrics, StoreError> {
        self.tick();
        self.inner.metrics(key).await
    }

    async fn record_success(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        self.tick();
        self.inner.record_success(key, now).await
    }

    async fn record_failure(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        self.tick();
        self.inner.record_failure(key, now).await
    }

    async fn transition_to_open(&self, key: &BreakerKey, now: i64) -> Result<(), StoreError> {
        self.tick();
        self.inner.transition_to_open(key, now).await
    }

    async fn transition_to_half_open(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.tick();
        self.inner.transition_to_half_open(key).await
    }

    async fn transition_to_closed(&self, key: &BreakerKey, now: i64) -> Result<(), StoreError> {
        self.tick();
        self.inner.transition_to_closed(key, now).await
    }

    async fn reset(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.tick();
        self.inner.reset(key).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    println!("=== Custom Store Example ===\n");

    let counting = Arc::new(CountingStore::default());
    let handle = counting.clone();

    let config = ManagerConfig::default()
        .with_store("counted", StoreConfig::for_driver("counting"))
        .with_default_store("counted");

    let manager = Manager::builder(config)
        .with_driver(
            "counting",
            Arc::new(move |_: &str, _: &StoreConfig| Ok(handle.clone() as Arc<dyn StateStore>)),
        )
        .build();

    let breaker = manager.breaker("search")?;

    for _ in 0..3 {
        let _ = breaker.call(|| async { Err::<(), _>(SearchError) }).await;
    }
    breaker.call(|| async { Ok::<_, SearchError>(()) }).await?;

    println!(
        "store saw {} operations; breaker is {}",
        counting
            .operations
            .load(std::sync::atomic::Ordering::Relaxed),
        breaker.state().await?
    );

    Ok(())
}
