use serde::{Deserialize, Serialize};

/// A `{key, value, last_index}` tuple as stored by a backend.
///
/// `last_index` is the version token assigned by the backend on the most
/// recent successful mutation of `key`. Treat it as opaque: callers may only
/// compare it for equality (to build the `previous` argument of an atomic
/// operation) and rely on it increasing with every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KVPair {
    /// Full path-like key, e.g. `"services/web/config"`
    pub key: String,
    /// Opaque payload, never interpreted by the store
    pub value: Vec<u8>,
    /// Version token, always > 0 for a stored pair
    pub last_index: u64,
}

impl KVPair {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>, last_index: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            last_index,
        }
    }
}
