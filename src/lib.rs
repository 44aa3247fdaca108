//! # Fusebox
//!
//! A scoped, pluggable circuit-breaker engine: a tri-state state machine
//! with time-based transitions, swappable failure-evaluation strategies,
//! and persistence drivers that share state in-process, through an
//! external cache, or in PostgreSQL.
//!
//! ## Overview
//!
//! Fusebox protects a caller from repeatedly invoking a failing
//! operation:
//!
//! - Gate calls through a **Closed / Open / Half-Open** state machine
//! - Pick how failures trip the circuit: consecutive count, lifetime
//!   failure rate, or a rolling window
//! - Persist state where it is needed: per process, shared across
//!   processes via a cache, or durably in a database with an audit trail
//! - Scope breakers independently by a "who" (context) and a "what"
//!   (boundary) without coupling the engine to your models
//! - Serve fallback values on rejected calls and observe six domain
//!   events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fusebox::{Manager, ManagerConfig, ScopeRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Manager::builder(ManagerConfig::default()).build();
//!
//!     let breaker = manager
//!         .for_context(ScopeRef::new("tenant", "42"))?
//!         .breaker("payments")?;
//!
//!     let receipt = breaker.call(|| charge_gateway()).await?;
//!     println!("charged: {receipt:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `durable` (default) - PostgreSQL-backed store driver via sqlx
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: state and metrics value types, configuration, scoping,
//!   clock, and error types
//! - **Stores**: the three persistence drivers behind one contract
//! - **Strategy**: pure trip-decision procedures and their registry
//! - **Breaker**: the engine, failure classification, and fallbacks
//! - **Events**: synchronous domain-event dispatch
//! - **Manager**: configuration lookup, driver factories, scope binding

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod breaker;
pub mod core;
pub mod events;
pub mod manager;
pub mod stores;
pub mod strategy;

// Re-export commonly used types at the crate root
pub use crate::core::{
    BreakerConfig, BreakerError, BreakerKey, CallError, CircuitState, Clock, IdentifierKind,
    KeyValueRepository, ManualClock, Metrics, Scope, ScopeRef, StateStore, StoreError,
    SystemClock,
};

pub use crate::breaker::{CircuitBreaker, ErrorFilter, FallbackRegistry};
pub use crate::events::{BreakerEvent, EventBus};
pub use crate::manager::{Manager, ManagerBuilder, ManagerConfig, MorphMap, StoreConfig};
pub use crate::stores::{CacheStore, InMemoryRepository, MemoryStore};
pub use crate::strategy::{StrategyRegistry, TripStrategy};

#[cfg(feature = "durable")]
pub use crate::stores::{DurableStore, TableNames};

/// Prelude module for convenient imports.
///
/// ```rust
/// use fusebox::prelude::*;
/// ```
pub mod prelude {
    pub use crate::breaker::{CircuitBreaker, ErrorFilter, FallbackRegistry};
    pub use crate::core::{
        BreakerConfig, BreakerError, CallError, CircuitState, Metrics, Scope, ScopeRef,
        StateStore, StoreError,
    };
    pub use crate::events::BreakerEvent;
    pub use crate::manager::{Manager, ManagerConfig, StoreConfig};
    pub use crate::strategy::TripStrategy;
}
