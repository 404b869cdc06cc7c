//! Backend registry: maps a backend identifier to the constructor that
//! builds it, so callers pick a backend at runtime by name and the contract
//! never depends on backend crates.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::Store;
use crate::infrastructure_in_memory::InMemoryStore;
use crate::types::StoreConfig;

/// Identifier of the in-process reference backend.
pub const MEMORY: &str = "memory";

/// Identifier of the embedded SQLite backend.
#[cfg(feature = "sqlite")]
pub const SQLITE: &str = "sqlite";

/// Builds a store from a list of backend addresses and optional settings.
pub type Constructor =
    Arc<dyn Fn(&[String], Option<&StoreConfig>) -> StoreResult<Arc<dyn Store>> + Send + Sync>;

/// A table of backend constructors keyed by lowercase identifier.
pub struct Registry {
    constructors: RwLock<HashMap<String, Constructor>>,
}

impl Registry {
    /// An empty registry, isolated from the process-wide one.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with every backend bundled in this crate.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(MEMORY, InMemoryStore::connect);
        #[cfg(feature = "sqlite")]
        registry.register(SQLITE, crate::infrastructure_sqlite::SqliteStore::connect);
        registry
    }

    /// Associate `backend` with `constructor`.
    ///
    /// Registering an identifier twice replaces the earlier constructor.
    /// Last writer wins on purpose: tests rely on it to shadow a real backend
    /// with a double.
    pub fn register<F>(&self, backend: &str, constructor: F)
    where
        F: Fn(&[String], Option<&StoreConfig>) -> StoreResult<Arc<dyn Store>>
            + Send
            + Sync
            + 'static,
    {
        let backend = backend.to_lowercase();
        let previous = self
            .constructors
            .write()
            .insert(backend.clone(), Arc::new(constructor));
        if previous.is_some() {
            tracing::debug!(backend = %backend, "Backend constructor replaced");
        }
    }

    /// Build a store with the constructor registered under `backend`.
    ///
    /// Errors from the constructor itself are returned unchanged.
    pub fn new_store(
        &self,
        backend: &str,
        addrs: &[String],
        config: Option<&StoreConfig>,
    ) -> StoreResult<Arc<dyn Store>> {
        let backend = backend.to_lowercase();
        // Clone the handle so the constructor runs without the lock held.
        let constructor = self.constructors.read().get(&backend).cloned();
        match constructor {
            Some(constructor) => constructor(addrs, config),
            None => Err(StoreError::BackendNotSupported(backend)),
        }
    }

    /// Registered identifiers, sorted.
    pub fn backends(&self) -> Vec<String> {
        let mut backends: Vec<String> = self.constructors.read().keys().cloned().collect();
        backends.sort();
        backends
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::with_defaults);

/// The process-wide registry, pre-populated with the bundled backends.
pub fn default_registry() -> &'static Registry {
    &DEFAULT_REGISTRY
}

/// Register a constructor in the process-wide registry.
pub fn register<F>(backend: &str, constructor: F)
where
    F: Fn(&[String], Option<&StoreConfig>) -> StoreResult<Arc<dyn Store>> + Send + Sync + 'static,
{
    DEFAULT_REGISTRY.register(backend, constructor);
}

/// Build a store from the process-wide registry.
pub fn new_store(
    backend: &str,
    addrs: &[String],
    config: Option<&StoreConfig>,
) -> StoreResult<Arc<dyn Store>> {
    DEFAULT_REGISTRY.new_store(backend, addrs, config)
}
