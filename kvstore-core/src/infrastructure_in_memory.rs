//! In-process reference backend.
//!
//! Every operation runs under one mutex, and versions come from a single
//! counter shared by all keys, so a key recreated after a delete always gets
//! a version above anything it held before. Other backends are checked
//! against this one by the conformance tests.

use crate::error::{validate_key, StoreError, StoreResult};
use crate::infrastructure::Store;
use crate::types::{KVPair, StoreConfig};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

struct Entry {
    value: Vec<u8>,
    last_index: u64,
}

#[derive(Default)]
struct State {
    // Map of Key -> (Value, Version)
    entries: BTreeMap<String, Entry>,
    // Last version handed out, across all keys
    last_index: u64,
    closed: bool,
}

impl State {
    fn next_index(&mut self) -> u64 {
        self.last_index += 1;
        self.last_index
    }

    fn pair(&self, key: &str) -> Option<KVPair> {
        self.entries
            .get(key)
            .map(|e| KVPair::new(key, e.value.clone(), e.last_index))
    }

    fn write(&mut self, key: &str, value: &[u8]) -> KVPair {
        let last_index = self.next_index();
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                last_index,
            },
        );
        KVPair::new(key, value, last_index)
    }

    /// Check `previous` against the stored version of `key`.
    fn check_previous(&self, key: &str, previous: &KVPair) -> StoreResult<()> {
        match self.entries.get(key) {
            None => Err(StoreError::KeyNotFound),
            Some(e) if e.last_index != previous.last_index => {
                tracing::warn!(
                    key,
                    expected = previous.last_index,
                    current = e.last_index,
                    "Atomic operation rejected: key modified"
                );
                Err(StoreError::KeyModified)
            }
            Some(_) => Ok(()),
        }
    }
}

pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Registry constructor. Addresses and options have no meaning for an
    /// in-process map; each call yields a fresh, empty store.
    pub fn connect(
        addrs: &[String],
        _config: Option<&StoreConfig>,
    ) -> StoreResult<Arc<dyn Store>> {
        if !addrs.is_empty() {
            tracing::debug!(?addrs, "In-memory store ignores addresses");
        }
        Ok(Arc::new(Self::new()))
    }

    /// Run `f` under the store lock, failing if the store has been closed.
    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> StoreResult<T>) -> StoreResult<T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::StoreClosed);
        }
        f(&mut *state)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.with_state(|state| {
            validate_key(key)?;
            let pair = state.write(key, value);
            tracing::debug!(key, last_index = pair.last_index, "Put");
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreResult<KVPair> {
        self.with_state(|state| {
            validate_key(key)?;
            state.pair(key).ok_or(StoreError::KeyNotFound)
        })
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.with_state(|state| {
            validate_key(key)?;
            Ok(state.entries.contains_key(key))
        })
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<KVPair>> {
        self.with_state(|state| {
            // Keys sharing a prefix are contiguous in a sorted map.
            let pairs: Vec<KVPair> = state
                .entries
                .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, e)| KVPair::new(k.as_str(), e.value.clone(), e.last_index))
                .collect();

            if pairs.is_empty() {
                return Err(StoreError::KeyNotFound);
            }
            Ok(pairs)
        })
    }

    fn atomic_put(
        &self,
        key: &str,
        value: &[u8],
        previous: Option<&KVPair>,
    ) -> StoreResult<KVPair> {
        self.with_state(|state| {
            validate_key(key)?;
            match previous {
                None if state.entries.contains_key(key) => return Err(StoreError::KeyExists),
                None => {}
                Some(prev) => state.check_previous(key, prev)?,
            }
            let pair = state.write(key, value);
            tracing::debug!(key, last_index = pair.last_index, "Atomic put");
            Ok(pair)
        })
    }

    fn atomic_delete(&self, key: &str, previous: Option<&KVPair>) -> StoreResult<()> {
        self.with_state(|state| {
            let previous = previous.ok_or(StoreError::PreviousNotSpecified)?;
            validate_key(key)?;
            state.check_previous(key, previous)?;
            state.entries.remove(key);
            tracing::debug!(key, "Atomic delete");
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_state(|state| {
            validate_key(key)?;
            state
                .entries
                .remove(key)
                .map(|_| tracing::debug!(key, "Delete"))
                .ok_or(StoreError::KeyNotFound)
        })
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.entries.clear();
            state.closed = true;
        }
    }
}
