//! Error types for the fusebox library.
//!
//! The library never panics; all failures are returned as `Result`
//! values. Errors are split by concern: [`StoreError`] for driver
//! failures, [`BreakerError`] for construction and manager failures, and
//! [`CallError`] for the protected-call path.

use thiserror::Error;

/// Which side of a scope a morph violation occurred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSide {
    /// The "who" side.
    Context,
    /// The "what" side.
    Boundary,
}

impl std::fmt::Display for ScopeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Context => f.write_str("context"),
            Self::Boundary => f.write_str("boundary"),
        }
    }
}

/// Errors raised by store drivers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The external key-value repository failed.
    #[error("cache repository error: {message}")]
    Cache {
        /// Description of the failure.
        message: String,
    },

    /// A stored value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database rejected or failed a query.
    #[cfg(feature = "durable")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value was present but unreadable.
    #[error("corrupt record under key '{key}': {reason}")]
    CorruptRecord {
        /// The storage key that held the value.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl StoreError {
    /// Creates a `Cache` error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }
}

/// Errors raised at construction time or by the manager.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The configuration names a store that has no entry.
    #[error("store '{0}' is not defined in the configuration")]
    UndefinedStore(String),

    /// A store entry requests a driver with no registered factory.
    #[error("no driver factory registered for '{0}'")]
    UnsupportedDriver(String),

    /// A scope used an unmapped type-tag while enforcement is on.
    #[error("{side} type-tag '{tag}' violates the morph key map")]
    MorphKeyViolation {
        /// The offending type-tag.
        tag: String,
        /// Which scope side it was bound on.
        side: ScopeSide,
    },

    /// A driver factory was missing a required collaborator.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BreakerError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors returned from [`CircuitBreaker::call`](crate::CircuitBreaker::call).
///
/// The protected operation's own error is always re-surfaced unchanged
/// as [`CallError::Operation`]; classification only decides whether it
/// counted as a failure.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The operation was not attempted because the circuit is open.
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Name of the open breaker.
        name: String,
        /// Value produced by the resolved fallback handler, if any.
        fallback: Option<serde_json::Value>,
    },

    /// A fallback handler overrode the open behaviour with its own error.
    #[error("fallback handler for '{name}' failed")]
    Fallback {
        /// Name of the open breaker.
        name: String,
        /// The handler's error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The protected operation failed.
    #[error(transparent)]
    Operation(E),

    /// The backing store failed while gating or recording the call.
    #[error(transparent)]
    Store(StoreError),
}

impl<E> CallError<E> {
    /// Returns the fallback value if the circuit was open and a handler
    /// produced one.
    pub fn fallback_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Open { fallback, .. } => fallback.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` if the call was rejected by an open circuit.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns the operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(inner) => Some(inner),
            _ => None,
        }
    }
}
