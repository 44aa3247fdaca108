//! The breaker engine and its call-path policies.
//!
//! [`CircuitBreaker`] gates requests, invokes the protected operation,
//! records the outcome, consults the trip strategy, drives transitions,
//! and emits events. [`ErrorFilter`] decides which operation errors
//! count as failures; [`FallbackRegistry`] resolves substitute values
//! for rejected calls.

mod engine;
mod fallback;
mod filter;

pub use engine::CircuitBreaker;
pub use fallback::{FallbackError, FallbackFn, FallbackOutcome, FallbackRegistry};
pub use filter::{ErrorFilter, ErrorPredicate};
