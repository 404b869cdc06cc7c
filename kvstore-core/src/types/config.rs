use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// TLS material for backends reached over the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTlsConfig {
    pub ca_cert_file: PathBuf,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Options handed to a backend constructor alongside its addresses.
///
/// Each backend picks the options that make sense for it and ignores the
/// rest; the embedded `sqlite` backend, for instance, has no use for TLS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long to wait for the backend before giving up on a call
    pub connection_timeout: Option<Duration>,
    /// Keep the connection open between calls instead of reopening it
    pub persistent_connection: bool,
    pub tls: Option<ClientTlsConfig>,
    /// Namespace inside the backend (bucket, table, key prefix...)
    pub bucket: Option<String>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    pub fn with_persistent_connection(mut self, persistent: bool) -> Self {
        self.persistent_connection = persistent;
        self
    }

    pub fn with_tls(mut self, tls: ClientTlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }
}
