use serde::Serialize;

use kvstore_core::{KVPair, Store, StoreError};

use crate::Commands;

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CliResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl CliResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(err: &StoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorInfo {
                code: error_code(err),
                message: err.to_string(),
                retryable: err.is_retryable(),
            }),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// A pair as shown to a human: the value is decoded as (lossy) UTF-8.
#[derive(Serialize)]
pub struct PairView {
    pub key: String,
    pub value: String,
    pub last_index: u64,
}

impl From<KVPair> for PairView {
    fn from(pair: KVPair) -> Self {
        Self {
            value: String::from_utf8_lossy(&pair.value).into_owned(),
            key: pair.key,
            last_index: pair.last_index,
        }
    }
}

/// `put` returns no version, so neither does the command. Reading the pair
/// back could report another writer's value.
#[derive(Serialize)]
pub struct PutResponse {
    pub key: String,
    pub stored: bool,
}

#[derive(Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub key: String,
    pub deleted: bool,
}

pub fn error_code(err: &StoreError) -> &'static str {
    match err {
        StoreError::BackendNotSupported(_) => "BackendNotSupported",
        StoreError::KeyNotFound => "KeyNotFound",
        StoreError::KeyModified => "KeyModified",
        StoreError::KeyExists => "KeyExists",
        StoreError::PreviousNotSpecified => "PreviousNotSpecified",
        StoreError::InvalidKey(_) => "InvalidKey",
        StoreError::StoreClosed => "StoreClosed",
        StoreError::MultipleEndpointsUnsupported(_) => "MultipleEndpointsUnsupported",
        StoreError::InvalidConfig(_) => "InvalidConfig",
        StoreError::Backend(_) => "Backend",
    }
}

// ─── Command Execution ──────────────────────────────────────────────────────

/// The version proof for an atomic command. Only `last_index` is compared,
/// so the value is left empty.
fn previous_pair(key: &str, previous_index: Option<u64>) -> Option<KVPair> {
    previous_index.map(|index| KVPair::new(key, Vec::new(), index))
}

fn to_json<T: Serialize>(data: T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(data).map_err(StoreError::backend)
}

/// Run one store command and return its JSON payload.
pub(crate) fn execute(
    store: &dyn Store,
    command: Commands,
) -> Result<serde_json::Value, StoreError> {
    match command {
        Commands::Put { key, value } => {
            store.put(&key, value.as_bytes())?;
            tracing::info!(key = %key, "Value stored");
            to_json(PutResponse { key, stored: true })
        }
        Commands::Get { key } => to_json(PairView::from(store.get(&key)?)),
        Commands::Exists { key } => {
            let exists = store.exists(&key)?;
            to_json(ExistsResponse { key, exists })
        }
        Commands::List { prefix } => {
            let pairs: Vec<PairView> = store
                .list(&prefix)?
                .into_iter()
                .map(PairView::from)
                .collect();
            to_json(pairs)
        }
        Commands::Delete { key } => {
            store.delete(&key)?;
            tracing::info!(key = %key, "Key deleted");
            to_json(DeleteResponse { key, deleted: true })
        }
        Commands::AtomicPut {
            key,
            value,
            previous_index,
        } => {
            let previous = previous_pair(&key, previous_index);
            let pair = store.atomic_put(&key, value.as_bytes(), previous.as_ref())?;
            tracing::info!(key = %key, last_index = pair.last_index, "Value swapped");
            to_json(PairView::from(pair))
        }
        Commands::AtomicDelete { key, previous_index } => {
            let previous = previous_pair(&key, previous_index);
            store.atomic_delete(&key, previous.as_ref())?;
            tracing::info!(key = %key, "Key deleted atomically");
            to_json(DeleteResponse { key, deleted: true })
        }
        Commands::Backends | Commands::Version => Ok(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvstore_core::infrastructure_in_memory::InMemoryStore;

    fn put(store: &dyn Store, key: &str, value: &str) -> serde_json::Value {
        execute(
            store,
            Commands::Put {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
        .unwrap()
    }

    fn get(store: &dyn Store, key: &str) -> serde_json::Value {
        execute(store, Commands::Get { key: key.to_string() }).unwrap()
    }

    #[test]
    fn test_put_reports_key_only() {
        let store = InMemoryStore::new();
        let data = put(&store, "svc/web", "{\"replicas\":3}");
        assert_eq!(data["key"], "svc/web");
        assert_eq!(data["stored"], true);
        assert!(data.get("value").is_none());
        assert!(data.get("last_index").is_none());

        let stored = get(&store, "svc/web");
        assert_eq!(stored["value"], "{\"replicas\":3}");
        assert!(stored["last_index"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_put_does_not_read_back() {
        // A store whose reads fail: put must still succeed on the write alone.
        struct WriteOnly(InMemoryStore);

        impl Store for WriteOnly {
            fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
                self.0.put(key, value)
            }
            fn get(&self, _key: &str) -> Result<KVPair, StoreError> {
                Err(StoreError::KeyNotFound)
            }
            fn exists(&self, key: &str) -> Result<bool, StoreError> {
                self.0.exists(key)
            }
            fn list(&self, prefix: &str) -> Result<Vec<KVPair>, StoreError> {
                self.0.list(prefix)
            }
            fn atomic_put(
                &self,
                key: &str,
                value: &[u8],
                previous: Option<&KVPair>,
            ) -> Result<KVPair, StoreError> {
                self.0.atomic_put(key, value, previous)
            }
            fn atomic_delete(&self, key: &str, previous: Option<&KVPair>) -> Result<(), StoreError> {
                self.0.atomic_delete(key, previous)
            }
            fn delete(&self, key: &str) -> Result<(), StoreError> {
                self.0.delete(key)
            }
            fn close(&self) {
                self.0.close()
            }
        }

        let store = WriteOnly(InMemoryStore::new());
        let data = put(&store, "k", "v");
        assert_eq!(data["key"], "k");
        assert!(store.exists("k").unwrap());
    }

    #[test]
    fn test_atomic_put_with_stale_index() {
        let store = InMemoryStore::new();
        put(&store, "k", "a");
        let index = get(&store, "k")["last_index"].as_u64().unwrap();
        put(&store, "k", "b");

        let result = execute(
            &store,
            Commands::AtomicPut {
                key: "k".to_string(),
                value: "c".to_string(),
                previous_index: Some(index),
            },
        );
        let err = result.unwrap_err();
        assert_eq!(error_code(&err), "KeyModified");

        let response = serde_json::to_value(CliResponse::err(&err)).unwrap();
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["retryable"], true);
    }

    #[test]
    fn test_atomic_delete_requires_index() {
        let store = InMemoryStore::new();
        put(&store, "k", "a");
        let err = execute(
            &store,
            Commands::AtomicDelete {
                key: "k".to_string(),
                previous_index: None,
            },
        )
        .unwrap_err();
        assert_eq!(error_code(&err), "PreviousNotSpecified");
    }

    #[test]
    fn test_list_renders_pairs() {
        let store = InMemoryStore::new();
        put(&store, "a/x", "1");
        put(&store, "a/y", "2");
        put(&store, "b/z", "3");

        let data = execute(&store, Commands::List { prefix: "a/".to_string() }).unwrap();
        assert_eq!(data.as_array().unwrap().len(), 2);

        let err = execute(&store, Commands::List { prefix: "c/".to_string() }).unwrap_err();
        assert_eq!(error_code(&err), "KeyNotFound");
    }
}
