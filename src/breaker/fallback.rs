//! Fallback resolution for rejected calls.

use std::collections::HashMap;
use std::sync::Arc;

/// Boxed error a fallback handler may raise instead of producing a value.
pub type FallbackError = Box<dyn std::error::Error + Send + Sync>;

/// A fallback handler: invoked with the breaker's name when a call is
/// rejected, producing a substitute value or its own error.
pub type FallbackFn =
    Arc<dyn Fn(&str) -> Result<serde_json::Value, FallbackError> + Send + Sync>;

/// The outcome of resolving a fallback for a rejected call.
#[derive(Debug)]
pub enum FallbackOutcome {
    /// No handler applied; reject without a value.
    None,
    /// A handler produced a substitute value.
    Value(serde_json::Value),
    /// A handler raised, overriding the default open behaviour.
    Raised(FallbackError),
}

/// Registry of fallback handlers.
///
/// Resolution order for a rejected call: disabled short-circuits to
/// nothing; otherwise the per-name handler, then the global default,
/// then nothing.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    enabled: bool,
    default: Option<FallbackFn>,
    handlers: HashMap<String, FallbackFn>,
}

impl std::fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRegistry")
            .field("enabled", &self.enabled)
            .field("default", &self.default.is_some())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl FallbackRegistry {
    /// Creates an enabled registry with no handlers.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Creates a registry that never resolves a fallback.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Returns `true` if fallback resolution is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the global default handler.
    pub fn with_default(
        mut self,
        handler: impl Fn(&str) -> Result<serde_json::Value, FallbackError> + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(Arc::new(handler));
        self
    }

    /// Registers a per-name handler.
    pub fn with_handler(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> Result<serde_json::Value, FallbackError> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Resolves and invokes the handler for `name`.
    pub fn resolve(&self, name: &str) -> FallbackOutcome {
        if !self.enabled {
            return FallbackOutcome::None;
        }
        let handler = self.handlers.get(name).or(self.default.as_ref());
        match handler {
            Some(handler) => match handler(name) {
                Ok(value) => FallbackOutcome::Value(value),
                Err(error) => FallbackOutcome::Raised(error),
            },
            None => FallbackOutcome::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disabled_resolves_nothing() {
        let registry = FallbackRegistry::disabled()
            .with_default(|_| Ok(json!("default")))
            .with_handler("payments", |_| Ok(json!("cached")));
        assert!(matches!(registry.resolve("payments"), FallbackOutcome::None));
    }

    #[test]
    fn test_per_name_beats_default() {
        let registry = FallbackRegistry::new()
            .with_default(|_| Ok(json!("default")))
            .with_handler("payments", |_| Ok(json!("cached")));

        match registry.resolve("payments") {
            FallbackOutcome::Value(value) => assert_eq!(value, json!("cached")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match registry.resolve("search") {
            FallbackOutcome::Value(value) => assert_eq!(value, json!("default")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_no_handler_resolves_nothing() {
        let registry = FallbackRegistry::new();
        assert!(matches!(registry.resolve("payments"), FallbackOutcome::None));
    }

    #[test]
    fn test_handler_receives_name_and_may_raise() {
        let registry = FallbackRegistry::new().with_handler("payments", |name| {
            assert_eq!(name, "payments");
            Err("no cached value".into())
        });
        assert!(matches!(
            registry.resolve("payments"),
            FallbackOutcome::Raised(_)
        ));
    }
}
