use thiserror::Error;

/// Errors shared by every `Store` backend and the registry.
///
/// The optimistic-concurrency family (`KeyModified`, `KeyExists`,
/// `KeyNotFound`, `PreviousNotSpecified`) is recoverable: re-read the key and
/// retry with a fresh `previous`. Engine and transport failures are carried
/// unchanged in `Backend`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend storage '{0}' not supported")]
    BackendNotSupported(String),

    #[error("key not found in store")]
    KeyNotFound,

    #[error("unable to complete atomic operation, key modified")]
    KeyModified,

    #[error("previous K/V pair exists, cannot complete atomic operation")]
    KeyExists,

    #[error("previous K/V pair should be provided for the atomic operation")]
    PreviousNotSpecified,

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("store is closed")]
    StoreClosed,

    #[error("backend '{0}' supports a single endpoint only")]
    MultipleEndpointsUnsupported(String),

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Wrap an engine or transport error without reinterpreting it.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }

    /// True for the optimistic-concurrency errors a caller can recover from
    /// by re-reading the key and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::KeyModified
                | StoreError::KeyExists
                | StoreError::KeyNotFound
                | StoreError::PreviousNotSpecified
        )
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::backend(err)
    }
}

/// Reject empty keys before they reach a backend.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
