//! High-level client that wraps a `Store` with the optimistic-concurrency
//! retry loop most callers end up writing by hand.

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::Store;
use crate::infrastructure_in_memory::InMemoryStore;
use crate::registry;
use crate::types::{KVPair, StoreConfig};
use std::sync::Arc;

/// Attempts made by `atomic_update` when the caller has no better number.
pub const DEFAULT_MAX_ATTEMPTS: usize = 16;

/// A cheaply cloneable handle over a shared store.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn Store>,
}

impl StoreClient {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Build the store through the process-wide registry.
    pub fn connect(
        backend: &str,
        addrs: &[String],
        config: Option<&StoreConfig>,
    ) -> StoreResult<Self> {
        let store = registry::new_store(backend, addrs, config)?;
        tracing::info!(backend, "Store client connected");
        Ok(Self::new(store))
    }

    /// The underlying store, for operations the client does not wrap.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Read-modify-write `key` until it sticks.
    ///
    /// `update` receives the current value (`None` if the key is absent) and
    /// returns the value to store. Losing a race to another writer
    /// (`KeyModified`, `KeyExists`, `KeyNotFound`) triggers a fresh read and
    /// another attempt; after `max_attempts` losses the last of those errors
    /// is returned. Any other error is returned immediately.
    pub fn atomic_update<F>(
        &self,
        key: &str,
        max_attempts: usize,
        mut update: F,
    ) -> StoreResult<KVPair>
    where
        F: FnMut(Option<&[u8]>) -> Vec<u8>,
    {
        let mut last_err = StoreError::KeyModified;

        for attempt in 1..=max_attempts.max(1) {
            let current = match self.store.get(key) {
                Ok(pair) => Some(pair),
                Err(StoreError::KeyNotFound) => None,
                Err(e) => return Err(e),
            };

            let value = update(current.as_ref().map(|pair| pair.value.as_slice()));

            match self.store.atomic_put(key, &value, current.as_ref()) {
                Ok(pair) => return Ok(pair),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(
                        key,
                        attempt,
                        error = %e,
                        "Atomic update lost a race, retrying"
                    );
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err)
    }

    pub fn close(&self) {
        self.store.close();
    }
}

impl Default for StoreClient {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }
}
