//! Manager layer: configuration, registries, and breaker composition.
//!
//! The [`Manager`] holds the driver and strategy registries, resolves
//! and caches store instances from named configuration entries, binds
//! scopes through an immutable fluent interface, and composes
//! [`CircuitBreaker`](crate::CircuitBreaker)s.

mod breaker_manager;
mod config;

pub use breaker_manager::{DriverFactory, Manager, ManagerBuilder};
pub use config::{
    ManagerConfig, MorphMap, StoreConfig, DRIVER_CACHE, DRIVER_DURABLE, DRIVER_MEMORY,
};
