//! The breaker manager: driver and strategy registries, scope binding,
//! and breaker composition.

use crate::breaker::{CircuitBreaker, ErrorFilter, FallbackError, FallbackFn, FallbackRegistry};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::BreakerConfig;
use crate::core::error::{BreakerError, ScopeSide};
use crate::core::scope::{BreakerKey, Scope, ScopeRef};
use crate::core::traits::{ArcKeyValueRepository, ArcStateStore};
use crate::events::{EventBus, Listener};
use crate::manager::config::{
    ManagerConfig, StoreConfig, DRIVER_CACHE, DRIVER_DURABLE, DRIVER_MEMORY,
};
use crate::stores::{CacheStore, MemoryStore};
use crate::strategy::{ArcTripStrategy, StrategyRegistry};

#[cfg(feature = "durable")]
use crate::stores::DurableStore;
#[cfg(feature = "durable")]
use sqlx::PgPool;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A driver factory: builds a store instance from a named store entry.
pub type DriverFactory =
    Arc<dyn Fn(&str, &StoreConfig) -> Result<ArcStateStore, BreakerError> + Send + Sync>;

struct ManagerInner {
    config: ManagerConfig,
    strategies: StrategyRegistry,
    factories: HashMap<String, DriverFactory>,
    instances: RwLock<HashMap<String, ArcStateStore>>,
    events: Arc<EventBus>,
    fallbacks: Arc<FallbackRegistry>,
    filter: Arc<ErrorFilter>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ManagerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerInner")
            .field("config", &self.config)
            .field("drivers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves breakers from configuration, stores, strategies, and scope.
///
/// A manager is a cheap handle over shared internals. The scope-binding
/// methods return a **new** manager value with that side set, so
/// chaining never affects the original:
///
/// ```rust,ignore
/// let scoped = manager
///     .for_context(ScopeRef::new("tenant", "42"))?
///     .for_boundary(ScopeRef::new("account", "acc-9"))?;
/// let breaker = scoped.breaker("payments")?;
/// ```
#[derive(Debug, Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
    scope: Scope,
}

impl Manager {
    /// Starts building a manager over `config`.
    pub fn builder(config: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder::new(config)
    }

    /// Returns the manager's configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Returns the scope this manager binds onto breakers.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Registers an event listener.
    pub fn subscribe(&self, listener: Listener) {
        self.inner.events.subscribe(listener);
    }

    /// Returns a manager with the context side bound.
    ///
    /// `None` denotes global on that side. Validated against the context
    /// morph map at bind time.
    pub fn for_context(
        &self,
        context: impl Into<Option<ScopeRef>>,
    ) -> Result<Manager, BreakerError> {
        let context = context.into();
        if let Some(reference) = &context {
            self.inner
                .config
                .context_morphs
                .validate(reference, ScopeSide::Context)?;
        }
        Ok(Self {
            inner: self.inner.clone(),
            scope: self.scope.clone().with_context(context),
        })
    }

    /// Returns a manager with the boundary side bound.
    ///
    /// `None` denotes global on that side. Validated against the
    /// boundary morph map at bind time.
    pub fn for_boundary(
        &self,
        boundary: impl Into<Option<ScopeRef>>,
    ) -> Result<Manager, BreakerError> {
        let boundary = boundary.into();
        if let Some(reference) = &boundary {
            self.inner
                .config
                .boundary_morphs
                .validate(reference, ScopeSide::Boundary)?;
        }
        Ok(Self {
            inner: self.inner.clone(),
            scope: self.scope.clone().with_boundary(boundary),
        })
    }

    /// Builds a breaker named `name` with the manager defaults.
    pub fn breaker(&self, name: &str) -> Result<CircuitBreaker, BreakerError> {
        self.breaker_with(name, None, None)
    }

    /// Builds a breaker with an explicit configuration and/or strategy
    /// override.
    pub fn breaker_with(
        &self,
        name: &str,
        config: Option<BreakerConfig>,
        strategy: Option<&str>,
    ) -> Result<CircuitBreaker, BreakerError> {
        let config = config
            .unwrap_or_else(|| self.inner.config.defaults.clone())
            .with_name(name);

        let store_name = config
            .store
            .clone()
            .unwrap_or_else(|| self.inner.config.default_store.clone());
        let store_config = self
            .inner
            .config
            .stores
            .get(&store_name)
            .ok_or_else(|| BreakerError::UndefinedStore(store_name.clone()))?;
        let store = self.resolve_store(&store_name, store_config)?;

        let strategy_name = strategy.unwrap_or(&config.strategy);
        let strategy: ArcTripStrategy =
            self.inner.strategies.get(strategy_name).ok_or_else(|| {
                BreakerError::configuration(format!("unknown strategy '{strategy_name}'"))
            })?;

        let key =
            BreakerKey::new(name, self.scope.clone()).with_prefix(store_config.prefix.clone());

        Ok(CircuitBreaker::new(
            key,
            config,
            store,
            strategy,
            self.inner.clock.clone(),
            self.inner.events.clone(),
            self.inner.fallbacks.clone(),
            self.inner.filter.clone(),
        ))
    }

    /// Resolves (and caches) the store instance behind a named entry.
    fn resolve_store(
        &self,
        name: &str,
        store_config: &StoreConfig,
    ) -> Result<ArcStateStore, BreakerError> {
        let mut instances = self
            .inner
            .instances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = instances.get(name) {
            return Ok(store.clone());
        }

        let factory = self
            .inner
            .factories
            .get(&store_config.driver)
            .ok_or_else(|| BreakerError::UnsupportedDriver(store_config.driver.clone()))?;
        let store = factory(name, store_config)?;
        instances.insert(name.to_string(), store.clone());
        Ok(store)
    }

    /// Clears cached driver instances.
    ///
    /// Worker-recycling hosts call this on worker termination; data in
    /// external caches and the database is untouched, while in-process
    /// records are dropped with their driver.
    pub fn flush(&self) {
        self.inner
            .instances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// Builder collecting the runtime collaborators a [`Manager`] needs.
pub struct ManagerBuilder {
    config: ManagerConfig,
    strategies: StrategyRegistry,
    factories: HashMap<String, DriverFactory>,
    listeners: Vec<Listener>,
    fallback_default: Option<FallbackFn>,
    fallback_handlers: Vec<(String, FallbackFn)>,
    filter: ErrorFilter,
    clock: Arc<dyn Clock>,
    cache_repository: Option<ArcKeyValueRepository>,
    #[cfg(feature = "durable")]
    pool: Option<PgPool>,
}

impl ManagerBuilder {
    fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            strategies: StrategyRegistry::new(),
            factories: HashMap::new(),
            listeners: Vec::new(),
            fallback_default: None,
            fallback_handlers: Vec::new(),
            filter: ErrorFilter::new(),
            clock: Arc::new(SystemClock::new()),
            cache_repository: None,
            #[cfg(feature = "durable")]
            pool: None,
        }
    }

    /// Supplies the key-value repository the cache driver delegates to.
    pub fn with_cache_repository(mut self, repository: ArcKeyValueRepository) -> Self {
        self.cache_repository = Some(repository);
        self
    }

    /// Supplies the connection pool the durable driver runs on.
    #[cfg(feature = "durable")]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Registers a custom trip strategy.
    pub fn with_strategy(mut self, name: impl Into<String>, strategy: ArcTripStrategy) -> Self {
        self.strategies.register(name, strategy);
        self
    }

    /// Registers a custom driver factory.
    pub fn with_driver(mut self, name: impl Into<String>, factory: DriverFactory) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Registers an event listener.
    pub fn on_event(mut self, listener: Listener) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Sets the global default fallback handler.
    pub fn with_default_fallback(
        mut self,
        handler: impl Fn(&str) -> Result<serde_json::Value, FallbackError> + Send + Sync + 'static,
    ) -> Self {
        self.fallback_default = Some(Arc::new(handler));
        self
    }

    /// Registers a per-name fallback handler.
    pub fn with_fallback(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> Result<serde_json::Value, FallbackError> + Send + Sync + 'static,
    ) -> Self {
        self.fallback_handlers.push((name.into(), Arc::new(handler)));
        self
    }

    /// Sets the failure-classification filter.
    pub fn with_error_filter(mut self, filter: ErrorFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the manager, wiring built-in drivers and collaborators.
    pub fn build(self) -> Manager {
        let events = Arc::new(EventBus::new(self.config.events_enabled));
        for listener in self.listeners {
            events.subscribe(listener);
        }

        let mut fallbacks = if self.config.fallbacks_enabled {
            FallbackRegistry::new()
        } else {
            FallbackRegistry::disabled()
        };
        if let Some(handler) = self.fallback_default {
            fallbacks = fallbacks.with_default(move |name| handler(name));
        }
        for (name, handler) in self.fallback_handlers {
            fallbacks = fallbacks.with_handler(name, move |name| handler(name));
        }

        let mut factories = HashMap::new();

        factories.insert(
            DRIVER_MEMORY.to_string(),
            Arc::new(|_: &str, _: &StoreConfig| {
                Ok(Arc::new(MemoryStore::new()) as ArcStateStore)
            }) as DriverFactory,
        );

        let cache_repository = self.cache_repository;
        factories.insert(
            DRIVER_CACHE.to_string(),
            Arc::new(move |name: &str, _: &StoreConfig| {
                let repository = cache_repository.clone().ok_or_else(|| {
                    BreakerError::configuration(format!(
                        "store '{name}' uses the cache driver but no key-value repository was supplied"
                    ))
                })?;
                Ok(Arc::new(CacheStore::new(repository)) as ArcStateStore)
            }) as DriverFactory,
        );

        #[cfg(feature = "durable")]
        {
            let pool = self.pool;
            let tables = self.config.table_names.clone();
            let key_kind = self.config.primary_key_type;
            factories.insert(
                DRIVER_DURABLE.to_string(),
                Arc::new(move |name: &str, _: &StoreConfig| {
                    let pool = pool.clone().ok_or_else(|| {
                        BreakerError::configuration(format!(
                            "store '{name}' uses the durable driver but no connection pool was supplied"
                        ))
                    })?;
                    Ok(Arc::new(
                        DurableStore::new(pool)
                            .with_tables(tables.clone())
                            .with_key_kind(key_kind),
                    ) as ArcStateStore)
                }) as DriverFactory,
            );
        }

        // User-registered factories may shadow the built-ins.
        factories.extend(self.factories);

        Manager {
            inner: Arc::new(ManagerInner {
                config: self.config,
                strategies: self.strategies,
                factories,
                instances: RwLock::new(HashMap::new()),
                events,
                fallbacks: Arc::new(fallbacks),
                filter: Arc::new(self.filter),
                clock: self.clock,
            }),
            scope: Scope::global(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::error::CallError;
    use crate::core::scope::IdentifierKind;
    use crate::core::state::CircuitState;
    use crate::core::traits::KeyValueRepository;
    use crate::manager::config::MorphMap;
    use crate::stores::InMemoryRepository;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("downstream unavailable")]
    struct DownstreamError;

    fn manager() -> Manager {
        Manager::builder(ManagerConfig::default()).build()
    }

    #[tokio::test]
    async fn test_breaker_round_trip_on_default_memory_store() {
        let manager = manager();
        let breaker = manager.breaker("payments").unwrap();

        breaker
            .call(|| async { Ok::<_, DownstreamError>("ok") })
            .await
            .unwrap();
        assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
        assert_eq!(breaker.metrics().await.unwrap().total_successes, 1);
    }

    #[test]
    fn test_undefined_store() {
        let manager = manager();
        let config = BreakerConfig::default().with_store("missing");
        let err = manager
            .breaker_with("payments", Some(config), None)
            .unwrap_err();
        assert!(matches!(err, BreakerError::UndefinedStore(name) if name == "missing"));
    }

    #[test]
    fn test_unsupported_driver() {
        let config = ManagerConfig::default()
            .with_store("exotic", StoreConfig::for_driver("etcd"))
            .with_default_store("exotic");
        let manager = Manager::builder(config).build();

        let err = manager.breaker("payments").unwrap_err();
        assert!(matches!(err, BreakerError::UnsupportedDriver(driver) if driver == "etcd"));
    }

    #[test]
    fn test_cache_driver_requires_repository() {
        let config = ManagerConfig::default()
            .with_store("redis", StoreConfig::cache())
            .with_default_store("redis");
        let manager = Manager::builder(config).build();

        let err = manager.breaker("payments").unwrap_err();
        assert!(matches!(err, BreakerError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_cache_driver_with_repository_and_prefix() {
        let repository = Arc::new(InMemoryRepository::new());
        let config = ManagerConfig::default()
            .with_store("redis", StoreConfig::cache().with_prefix("fb"))
            .with_default_store("redis");
        let manager = Manager::builder(config)
            .with_cache_repository(repository.clone())
            .build();

        let breaker = manager.breaker("payments").unwrap();
        breaker
            .call(|| async { Ok::<_, DownstreamError>(()) })
            .await
            .unwrap();

        assert!(repository
            .get("fb:payments:metrics")
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_scope_chaining_leaves_original_unaffected() {
        let manager = manager();
        let scoped = manager
            .for_context(ScopeRef::new("tenant", "42"))
            .unwrap()
            .for_boundary(ScopeRef::new("account", "a-1"))
            .unwrap();

        assert!(manager.scope().is_global());
        assert_eq!(
            scoped.scope().context.as_ref().unwrap().id,
            "42".to_string()
        );
        assert_eq!(
            scoped.scope().boundary.as_ref().unwrap().kind,
            "account".to_string()
        );

        // Unbinding a side with None is also a fresh value.
        let unbound = scoped.for_context(None).unwrap();
        assert!(unbound.scope().context.is_none());
        assert!(unbound.scope().boundary.is_some());
    }

    #[tokio::test]
    async fn test_scoped_breakers_isolate_state() {
        let manager = manager();
        let first = manager
            .for_context(ScopeRef::new("user", "u1"))
            .unwrap()
            .breaker("x")
            .unwrap();
        let second = manager
            .for_context(ScopeRef::new("user", "u2"))
            .unwrap()
            .breaker("x")
            .unwrap();

        for _ in 0..5 {
            let _ = first
                .call(|| async { Err::<(), _>(DownstreamError) })
                .await;
        }

        assert_eq!(first.state().await.unwrap(), CircuitState::Open);
        assert_eq!(second.state().await.unwrap(), CircuitState::Closed);
        assert_eq!(second.metrics().await.unwrap().total_failures, 0);
    }

    #[test]
    fn test_morph_enforcement_on_bind() {
        let config = ManagerConfig::default().with_context_morphs(
            MorphMap::new()
                .allow("tenant", IdentifierKind::Integer)
                .with_enforce(true),
        );
        let manager = Manager::builder(config).build();

        assert!(manager.for_context(ScopeRef::new("tenant", "42")).is_ok());
        let err = manager
            .for_context(ScopeRef::new("gadget", "42"))
            .unwrap_err();
        assert!(matches!(
            err,
            BreakerError::MorphKeyViolation {
                side: ScopeSide::Context,
                ..
            }
        ));

        // Boundary map is independent and advisory here.
        assert!(manager.for_boundary(ScopeRef::new("gadget", "42")).is_ok());
    }

    #[tokio::test]
    async fn test_flush_drops_in_process_state() {
        let manager = manager();
        let breaker = manager.breaker("payments").unwrap();
        for _ in 0..5 {
            let _ = breaker
                .call(|| async { Err::<(), _>(DownstreamError) })
                .await;
        }
        assert_eq!(breaker.state().await.unwrap(), CircuitState::Open);

        manager.flush();

        // A breaker built after the flush sees a fresh memory store.
        let rebuilt = manager.breaker("payments").unwrap();
        assert_eq!(rebuilt.state().await.unwrap(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_custom_driver_registration() {
        let config = ManagerConfig::default()
            .with_store("custom", StoreConfig::for_driver("always-memory"))
            .with_default_store("custom");
        let manager = Manager::builder(config)
            .with_driver(
                "always-memory",
                Arc::new(|_: &str, _: &StoreConfig| {
                    Ok(Arc::new(MemoryStore::new()) as ArcStateStore)
                }),
            )
            .build();

        let breaker = manager.breaker("payments").unwrap();
        breaker
            .call(|| async { Ok::<_, DownstreamError>(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fallbacks_wired_through_manager() {
        let clock = ManualClock::starting_at(1_000);
        let manager = Manager::builder(ManagerConfig::default())
            .with_clock(clock)
            .with_fallback("payments", |_| Ok(serde_json::json!("cached")))
            .build();

        let breaker = manager.breaker("payments").unwrap();
        for _ in 0..5 {
            let _ = breaker
                .call(|| async { Err::<(), _>(DownstreamError) })
                .await;
        }

        let result = breaker
            .call(|| async { Ok::<_, DownstreamError>(()) })
            .await;
        match result {
            Err(CallError::Open { fallback, .. }) => {
                assert_eq!(fallback, Some(serde_json::json!("cached")));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_disabled_through_manager() {
        use crate::events::BreakerEvent;
        use std::sync::Mutex;

        let seen: Arc<Mutex<Vec<BreakerEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let manager = Manager::builder(ManagerConfig::default().with_events_enabled(false))
            .on_event(Arc::new(move |event| sink.lock().unwrap().push(event.clone())))
            .build();

        let breaker = manager.breaker("payments").unwrap();
        for _ in 0..6 {
            let _ = breaker
                .call(|| async { Err::<(), _>(DownstreamError) })
                .await;
        }

        assert!(seen.lock().unwrap().is_empty());
    }
}
