//! Core types and traits for the fusebox library.
//!
//! - [`state`] - `CircuitState` and `Metrics` value types
//! - [`config`] - per-breaker configuration
//! - [`scope`] - polymorphic scoping and the storage key algebra
//! - [`clock`] - injectable time source
//! - [`error`] - structured error types
//! - [`traits`] - the `StateStore` and `KeyValueRepository` contracts

pub mod clock;
pub mod config;
pub mod error;
pub mod scope;
pub mod state;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BreakerConfig;
pub use error::{BreakerError, CallError, ScopeSide, StoreError};
pub use scope::{BreakerKey, IdentifierKind, KeyAttribute, Scope, ScopeRef};
pub use state::{CircuitState, Metrics};
pub use traits::{ArcKeyValueRepository, ArcStateStore, KeyValueRepository, StateStore};
