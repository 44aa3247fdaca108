//! The circuit breaker engine.

use crate::breaker::fallback::{FallbackOutcome, FallbackRegistry};
use crate::breaker::filter::ErrorFilter;
use crate::core::clock::Clock;
use crate::core::config::BreakerConfig;
use crate::core::error::{CallError, StoreError};
use crate::core::scope::BreakerKey;
use crate::core::state::{CircuitState, Metrics};
use crate::core::traits::ArcStateStore;
use crate::events::{BreakerEvent, EventBus};
use crate::strategy::ArcTripStrategy;

use std::future::Future;
use std::sync::Arc;

/// One guarded identity: a name plus scope, its configuration, and the
/// collaborators that gate, record, and publish its calls.
///
/// The breaker itself holds no mutable state; counters, timestamps, and
/// the circuit state live in the store, so clones and concurrent callers
/// always observe the same record.
///
/// # Example
///
/// ```rust,ignore
/// use fusebox::{Manager, ManagerConfig};
///
/// let manager = Manager::builder(ManagerConfig::default()).build();
/// let breaker = manager.breaker("payments")?;
///
/// let charge = breaker.call(|| gateway.charge(&order)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    key: BreakerKey,
    config: BreakerConfig,
    store: ArcStateStore,
    strategy: ArcTripStrategy,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    fallbacks: Arc<FallbackRegistry>,
    filter: Arc<ErrorFilter>,
}

impl CircuitBreaker {
    /// Composes a breaker from resolved collaborators. Hosts normally go
    /// through [`Manager::breaker`](crate::Manager::breaker) instead.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: BreakerKey,
        config: BreakerConfig,
        store: ArcStateStore,
        strategy: ArcTripStrategy,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
        fallbacks: Arc<FallbackRegistry>,
        filter: Arc<ErrorFilter>,
    ) -> Self {
        Self {
            name: key.name.clone(),
            key,
            config,
            store,
            strategy,
            clock,
            events,
            fallbacks,
            filter,
        }
    }

    /// Returns the breaker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the breaker's identity key.
    pub fn key(&self) -> &BreakerKey {
        &self.key
    }

    /// Returns the breaker's configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Returns the current state from the store.
    pub async fn state(&self) -> Result<CircuitState, StoreError> {
        self.store.state(&self.key).await
    }

    /// Returns the current metrics snapshot from the store.
    pub async fn metrics(&self) -> Result<Metrics, StoreError> {
        self.store.metrics(&self.key).await
    }

    /// Zeroes the store for this identity and emits `Closed`.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.store.reset(&self.key).await?;
        self.events.emit(&BreakerEvent::Closed {
            name: self.name.clone(),
        });
        Ok(())
    }

    /// Executes `op` under protection.
    ///
    /// Returns `op`'s value, or [`CallError::Open`] when the circuit is
    /// open and the cooldown has not elapsed. Errors raised by `op` are
    /// always re-surfaced unchanged as [`CallError::Operation`];
    /// classification by the configured filter only decides whether they
    /// count as failures.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let mut state = self.store.state(&self.key).await.map_err(CallError::Store)?;

        self.events.emit(&BreakerEvent::RequestAttempted {
            name: self.name.clone(),
            state,
        });

        if state.is_open() {
            if self.cooldown_elapsed().await.map_err(CallError::Store)? {
                self.store
                    .transition_to_half_open(&self.key)
                    .await
                    .map_err(CallError::Store)?;
                state = CircuitState::HalfOpen;
                self.events.emit(&BreakerEvent::HalfOpened {
                    name: self.name.clone(),
                });
            } else {
                return Err(self.reject());
            }
        }

        match op().await {
            Ok(value) => {
                self.on_success(state).await.map_err(CallError::Store)?;
                Ok(value)
            }
            Err(error) => {
                if self.filter.should_record(&error) {
                    self.on_failure(state).await.map_err(CallError::Store)?;
                }
                Err(CallError::Operation(error))
            }
        }
    }

    /// True once `timeout` has elapsed since the last recorded failure.
    /// A record with no failure timestamp may probe immediately.
    async fn cooldown_elapsed(&self) -> Result<bool, StoreError> {
        let metrics = self.store.metrics(&self.key).await?;
        Ok(match metrics.last_failure_at {
            Some(at) => self.clock.now() - at >= self.config.timeout.as_secs() as i64,
            None => true,
        })
    }

    fn reject<E>(&self) -> CallError<E> {
        match self.fallbacks.resolve(&self.name) {
            FallbackOutcome::None => CallError::Open {
                name: self.name.clone(),
                fallback: None,
            },
            FallbackOutcome::Value(value) => CallError::Open {
                name: self.name.clone(),
                fallback: Some(value),
            },
            FallbackOutcome::Raised(source) => CallError::Fallback {
                name: self.name.clone(),
                source,
            },
        }
    }

    async fn on_success(&self, pre_call_state: CircuitState) -> Result<(), StoreError> {
        let now = self.clock.now();
        let metrics = self.store.record_success(&self.key, now).await?;

        self.events.emit(&BreakerEvent::RequestSucceeded {
            name: self.name.clone(),
            state: pre_call_state,
        });

        if pre_call_state.is_half_open()
            && metrics.consecutive_successes >= self.config.success_threshold
        {
            self.store.transition_to_closed(&self.key, now).await?;
            self.events.emit(&BreakerEvent::Closed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    async fn on_failure(&self, pre_call_state: CircuitState) -> Result<(), StoreError> {
        let now = self.clock.now();
        let metrics = self.store.record_failure(&self.key, now).await?;

        self.events.emit(&BreakerEvent::RequestFailed {
            name: self.name.clone(),
            state: pre_call_state,
        });

        // Any recorded failure while probing re-opens; from Closed the
        // configured strategy decides.
        let should_open = pre_call_state.can_attempt_request()
            && (pre_call_state.is_half_open()
                || self.strategy.should_open(&metrics, &self.config, now));

        if should_open {
            self.store.transition_to_open(&self.key, now).await?;
            self.events.emit(&BreakerEvent::Opened {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}
