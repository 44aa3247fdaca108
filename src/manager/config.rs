//! Manager-level configuration.

use crate::core::config::BreakerConfig;
use crate::core::error::{BreakerError, ScopeSide};
use crate::core::scope::{IdentifierKind, ScopeRef};

#[cfg(feature = "durable")]
use crate::stores::TableNames;

use std::collections::HashMap;

/// Built-in driver name for the in-process store.
pub const DRIVER_MEMORY: &str = "memory";
/// Built-in driver name for the key-value delegating store.
pub const DRIVER_CACHE: &str = "cache";
/// Built-in driver name for the database-backed store.
pub const DRIVER_DURABLE: &str = "durable";

/// One named store entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Driver this store uses; resolved against the driver registry.
    pub driver: String,
    /// Named external cache store, for hosts that run several.
    pub store: Option<String>,
    /// Prefix prepended to every storage key written through this store.
    pub prefix: Option<String>,
    /// Named database connection, for hosts that run several.
    pub connection: Option<String>,
}

impl StoreConfig {
    /// Creates an entry for an arbitrary driver name.
    pub fn for_driver(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            store: None,
            prefix: None,
            connection: None,
        }
    }

    /// An in-process store entry.
    pub fn memory() -> Self {
        Self::for_driver(DRIVER_MEMORY)
    }

    /// A key-value delegating store entry.
    pub fn cache() -> Self {
        Self::for_driver(DRIVER_CACHE)
    }

    /// A database-backed store entry.
    pub fn durable() -> Self {
        Self::for_driver(DRIVER_DURABLE)
    }

    /// Sets the named external cache store.
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Sets the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the named database connection.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }
}

/// A mapping from scope type-tags to the identifier kind they carry.
///
/// In enforce mode, binding a scope side whose tag is missing from the
/// map, or whose id does not have the mapped shape, fails with
/// `MorphKeyViolation`. Outside enforce mode the map is advisory and
/// never rejects. Context and boundary maps are independent.
#[derive(Debug, Clone, Default)]
pub struct MorphMap {
    map: HashMap<String, IdentifierKind>,
    enforce: bool,
}

impl MorphMap {
    /// Creates an empty, non-enforcing map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `tag` to `kind`.
    pub fn allow(mut self, tag: impl Into<String>, kind: IdentifierKind) -> Self {
        self.map.insert(tag.into(), kind);
        self
    }

    /// Sets enforce mode.
    pub fn with_enforce(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    /// Returns `true` if the map rejects unmapped tags.
    pub fn is_enforcing(&self) -> bool {
        self.enforce
    }

    /// Validates a reference bound on `side`.
    pub fn validate(&self, reference: &ScopeRef, side: ScopeSide) -> Result<(), BreakerError> {
        if !self.enforce {
            return Ok(());
        }
        match self.map.get(&reference.kind) {
            Some(kind) if kind.matches(&reference.id) => Ok(()),
            _ => Err(BreakerError::MorphKeyViolation {
                tag: reference.kind.clone(),
                side,
            }),
        }
    }
}

/// The full manager configuration surface.
///
/// Fallback handlers, event listeners, custom strategies, and error
/// filters are runtime values and are registered on the
/// [`ManagerBuilder`](crate::ManagerBuilder) instead.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Store used when a breaker does not pin one.
    pub default_store: String,

    /// Named store entries.
    pub stores: HashMap<String, StoreConfig>,

    /// Defaults applied to breakers built without an explicit config.
    pub defaults: BreakerConfig,

    /// Gate for all event dispatch and logging.
    pub events_enabled: bool,

    /// Gate for fallback resolution on rejected calls.
    pub fallbacks_enabled: bool,

    /// Identifier kind for durable rows.
    pub primary_key_type: IdentifierKind,

    /// Durable table names.
    #[cfg(feature = "durable")]
    pub table_names: TableNames,

    /// Validation map for the context side.
    pub context_morphs: MorphMap,

    /// Validation map for the boundary side.
    pub boundary_morphs: MorphMap,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_store: DRIVER_MEMORY.to_string(),
            stores: HashMap::from([(DRIVER_MEMORY.to_string(), StoreConfig::memory())]),
            defaults: BreakerConfig::default(),
            events_enabled: true,
            fallbacks_enabled: true,
            primary_key_type: IdentifierKind::Integer,
            #[cfg(feature = "durable")]
            table_names: TableNames::default(),
            context_morphs: MorphMap::new(),
            boundary_morphs: MorphMap::new(),
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration with a single in-process store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default store name.
    pub fn with_default_store(mut self, name: impl Into<String>) -> Self {
        self.default_store = name.into();
        self
    }

    /// Adds a named store entry.
    pub fn with_store(mut self, name: impl Into<String>, store: StoreConfig) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    /// Sets the breaker defaults.
    pub fn with_defaults(mut self, defaults: BreakerConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Enables or disables event emission.
    pub fn with_events_enabled(mut self, enabled: bool) -> Self {
        self.events_enabled = enabled;
        self
    }

    /// Enables or disables fallback resolution.
    pub fn with_fallbacks_enabled(mut self, enabled: bool) -> Self {
        self.fallbacks_enabled = enabled;
        self
    }

    /// Sets the durable primary-key kind.
    pub fn with_primary_key_type(mut self, kind: IdentifierKind) -> Self {
        self.primary_key_type = kind;
        self
    }

    /// Sets the durable table names.
    #[cfg(feature = "durable")]
    pub fn with_table_names(mut self, tables: TableNames) -> Self {
        self.table_names = tables;
        self
    }

    /// Sets the context-side morph map.
    pub fn with_context_morphs(mut self, morphs: MorphMap) -> Self {
        self.context_morphs = morphs;
        self
    }

    /// Sets the boundary-side morph map.
    pub fn with_boundary_morphs(mut self, morphs: MorphMap) -> Self {
        self.boundary_morphs = morphs;
        self
    }
}
