mod config;
mod pair;

pub use config::{ClientTlsConfig, StoreConfig};
pub use pair::KVPair;
