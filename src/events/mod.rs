//! Domain events emitted on transitions and request outcomes.
//!
//! Six event types are dispatched synchronously to registered listeners
//! and logged under the `fusebox::events` target. Emission is gated by
//! the manager's `events_enabled` flag; when disabled nothing is
//! dispatched or logged.

use crate::core::state::CircuitState;

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// A domain event. Transition events carry only the breaker name;
/// request events additionally carry the post-operation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BreakerEvent {
    /// The circuit transitioned to Open.
    Opened {
        /// Breaker name.
        name: String,
    },
    /// The circuit transitioned to Closed.
    Closed {
        /// Breaker name.
        name: String,
    },
    /// The circuit transitioned to HalfOpen.
    HalfOpened {
        /// Breaker name.
        name: String,
    },
    /// A call entered the breaker.
    RequestAttempted {
        /// Breaker name.
        name: String,
        /// State observed on entry.
        state: CircuitState,
    },
    /// The protected operation returned a value.
    RequestSucceeded {
        /// Breaker name.
        name: String,
        /// State after the outcome was recorded.
        state: CircuitState,
    },
    /// The protected operation failed and the failure was recorded.
    RequestFailed {
        /// Breaker name.
        name: String,
        /// State after the outcome was recorded.
        state: CircuitState,
    },
}

impl BreakerEvent {
    /// Returns the breaker name the event concerns.
    pub fn name(&self) -> &str {
        match self {
            Self::Opened { name }
            | Self::Closed { name }
            | Self::HalfOpened { name }
            | Self::RequestAttempted { name, .. }
            | Self::RequestSucceeded { name, .. }
            | Self::RequestFailed { name, .. } => name,
        }
    }

    /// Returns the stable event-type token.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::Closed { .. } => "closed",
            Self::HalfOpened { .. } => "half_opened",
            Self::RequestAttempted { .. } => "request_attempted",
            Self::RequestSucceeded { .. } => "request_succeeded",
            Self::RequestFailed { .. } => "request_failed",
        }
    }
}

/// A registered event listener.
pub type Listener = Arc<dyn Fn(&BreakerEvent) + Send + Sync>;

/// Synchronous event dispatcher.
///
/// Listeners run on the caller's thread, in registration order. A
/// panicking listener is caught and logged; it never prevents the caller
/// from observing the outcome of the call that emitted the event.
pub struct EventBus {
    enabled: bool,
    listeners: RwLock<Vec<Listener>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("enabled", &self.enabled)
            .field(
                "listeners",
                &self
                    .listeners
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len(),
            )
            .finish()
    }
}

impl EventBus {
    /// Creates a bus; `enabled` gates all emission.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Returns `true` if emission is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registers a listener for all events.
    pub fn subscribe(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Dispatches `event` to every listener and logs it.
    pub fn emit(&self, event: &BreakerEvent) {
        if !self.enabled {
            return;
        }

        log_event(event);

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(
                    target: "fusebox::events",
                    event_type = event.kind(),
                    breaker = event.name(),
                    "Event listener panicked"
                );
            }
        }
    }
}

fn log_event(event: &BreakerEvent) {
    match event {
        BreakerEvent::Opened { name } => {
            tracing::warn!(
                target: "fusebox::events",
                event_type = "opened",
                breaker = %name,
                "Circuit opened"
            );
        }
        BreakerEvent::Closed { name } => {
            tracing::info!(
                target: "fusebox::events",
                event_type = "closed",
                breaker = %name,
                "Circuit closed"
            );
        }
        BreakerEvent::HalfOpened { name } => {
            tracing::info!(
                target: "fusebox::events",
                event_type = "half_opened",
                breaker = %name,
                "Circuit half-opened"
            );
        }
        BreakerEvent::RequestAttempted { name, state } => {
            tracing::debug!(
                target: "fusebox::events",
                event_type = "request_attempted",
                breaker = %name,
                state = %state,
                "Request attempted"
            );
        }
        BreakerEvent::RequestSucceeded { name, state } => {
            tracing::debug!(
                target: "fusebox::events",
                event_type = "request_succeeded",
                breaker = %name,
                state = %state,
                "Request succeeded"
            );
        }
        BreakerEvent::RequestFailed { name, state } => {
            tracing::debug!(
                target: "fusebox::events",
                event_type = "request_failed",
                breaker = %name,
                state = %state,
                "Request failed"
            );
        }
    }
}
