use crate::error::StoreResult;
use crate::types::KVPair;

/// Defines the contract every key-value backend must honor.
///
/// Implementations are shared across threads behind an `Arc`, so every
/// method takes `&self` and each check-then-write sequence must be
/// indivisible relative to every other call on the same store.
pub trait Store: Send + Sync {
    /// Put a value at the specified key, creating or overwriting it.
    /// No version check is performed.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Get the current pair stored at `key`.
    fn get(&self, key: &str) -> StoreResult<KVPair>;

    /// Verify whether a key currently holds a value.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// List every pair whose key starts with `prefix`, including a pair whose
    /// key equals `prefix`. Fails with `KeyNotFound` when nothing matches.
    fn list(&self, prefix: &str) -> StoreResult<Vec<KVPair>>;

    /// Compare-and-swap on a single value.
    ///
    /// `previous = None` creates the key and fails with `KeyExists` if it is
    /// already present. Otherwise `previous.last_index` must match the stored
    /// version (`KeyModified` if not, `KeyNotFound` if the key is gone).
    fn atomic_put(
        &self,
        key: &str,
        value: &[u8],
        previous: Option<&KVPair>,
    ) -> StoreResult<KVPair>;

    /// Delete a value only if it is still at the version of `previous`.
    /// `previous = None` always fails with `PreviousNotSpecified`.
    fn atomic_delete(&self, key: &str, previous: Option<&KVPair>) -> StoreResult<()>;

    /// Delete the value at `key` whatever its version.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Release backend resources. Calling it twice is a no-op; any other call
    /// afterwards fails with `StoreClosed`.
    fn close(&self);
}
