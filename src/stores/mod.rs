//! Store driver implementations.
//!
//! Semantics are identical across drivers; durability and sharing
//! differ:
//!
//! - [`MemoryStore`] - process-local, for tests and single-process use
//! - [`CacheStore`] - delegates to an external key-value repository
//! - [`DurableStore`] - PostgreSQL-backed, with an append-only event log
//!   (requires the `durable` feature)

mod cache;
mod memory;

#[cfg(feature = "durable")]
mod durable;

pub use cache::{CacheStore, InMemoryRepository};
pub use memory::MemoryStore;

#[cfg(feature = "durable")]
pub use durable::{DurableStore, TableNames};
