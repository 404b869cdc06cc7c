//! # kvstore-core
//!
//! A pluggable key-value coordination store. Defines the `Store` contract
//! (versioned, compare-and-swap based optimistic concurrency), a registry
//! that selects a backend by name at runtime, an in-process reference
//! backend and an embedded SQLite backend.

pub mod client;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod registry;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use infrastructure::Store;
pub use registry::{new_store, register, Registry};
pub use types::{ClientTlsConfig, KVPair, StoreConfig};
