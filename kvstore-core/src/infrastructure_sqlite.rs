//! SQLite-backed Store implementation.
//! Provides a persistent, file-backed store that several processes can share.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! kvstore-core = { path = "../kvstore-core", features = ["sqlite"] }
//! ```

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{validate_key, StoreError, StoreResult};
use crate::infrastructure::Store;
use crate::types::{KVPair, StoreConfig};

/// Bucket used when the configuration does not name one.
pub const DEFAULT_BUCKET: &str = "kvstore";

struct Inner {
    conn: Option<Connection>,
    closed: bool,
}

/// A persistent store backed by a single SQLite file.
///
/// Pairs live in the `kv` table, keyed by `(bucket, key)`. Each bucket has
/// its own version counter in `kv_index`, bumped inside the same IMMEDIATE
/// transaction as the write it versions, so versions keep increasing across
/// deletes, reopens and concurrent writers on the same file.
pub struct SqliteStore {
    path: PathBuf,
    bucket: String,
    timeout: Option<Duration>,
    persistent: bool,
    inner: Mutex<Inner>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> StoreResult<Self> {
        let bucket = match config.bucket.as_deref() {
            Some("") => {
                return Err(StoreError::InvalidConfig("bucket name is empty".to_string()));
            }
            Some(bucket) => bucket.to_string(),
            None => DEFAULT_BUCKET.to_string(),
        };

        let store = Self {
            path: path.as_ref().to_path_buf(),
            bucket,
            timeout: config.connection_timeout,
            persistent: config.persistent_connection,
            inner: Mutex::new(Inner {
                conn: None,
                closed: false,
            }),
        };

        let conn = store.open_connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                bucket      TEXT NOT NULL,
                key         TEXT NOT NULL,
                value       BLOB NOT NULL,
                last_index  INTEGER NOT NULL,
                PRIMARY KEY (bucket, key)
            );

            CREATE TABLE IF NOT EXISTS kv_index (
                bucket      TEXT PRIMARY KEY,
                last_index  INTEGER NOT NULL
            );",
        )?;
        if store.persistent {
            store.inner.lock().conn = Some(conn);
        }

        Ok(store)
    }

    /// Registry constructor: `addrs` must hold exactly the database path.
    pub fn connect(
        addrs: &[String],
        config: Option<&StoreConfig>,
    ) -> StoreResult<Arc<dyn Store>> {
        let path = match addrs {
            [path] => path,
            [] => {
                return Err(StoreError::InvalidConfig(
                    "sqlite backend needs a database path".to_string(),
                ));
            }
            _ => return Err(StoreError::MultipleEndpointsUnsupported("sqlite".to_string())),
        };

        let default_config = StoreConfig::default();
        let config = config.unwrap_or(&default_config);
        if config.tls.is_some() {
            tracing::debug!("TLS material ignored by the sqlite backend");
        }

        let store = Self::open(path, config)?;
        tracing::info!(path = %path, bucket = %store.bucket, "SQLite store opened");
        Ok(Arc::new(store))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        if let Some(timeout) = self.timeout {
            conn.busy_timeout(timeout)?;
        }

        // WAL lets readers in other processes proceed while we write
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }

    /// Reject calls on a closed store before looking at their arguments.
    fn ensure_open(&self) -> StoreResult<()> {
        if self.inner.lock().closed {
            return Err(StoreError::StoreClosed);
        }
        Ok(())
    }

    /// Run `f` on a connection, reopening the file when the store does not
    /// keep a persistent one.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::StoreClosed);
        }

        let mut conn = match inner.conn.take() {
            Some(conn) => conn,
            None => self.open_connection()?,
        };
        let result = f(&mut conn);
        if self.persistent {
            inner.conn = Some(conn);
        }
        result
    }

    /// Run `f` inside an IMMEDIATE transaction; it is rolled back if `f` fails.
    fn with_write_txn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&*tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    fn current_index(&self, conn: &Connection, key: &str) -> StoreResult<Option<u64>> {
        Ok(conn
            .query_row(
                "SELECT last_index FROM kv WHERE bucket = ?1 AND key = ?2",
                params![self.bucket, key],
                |row| row.get::<_, u64>(0),
            )
            .optional()?)
    }

    fn next_index(&self, conn: &Connection) -> StoreResult<u64> {
        conn.execute(
            "INSERT INTO kv_index (bucket, last_index) VALUES (?1, 1)
             ON CONFLICT(bucket) DO UPDATE SET last_index = last_index + 1",
            params![self.bucket],
        )?;
        Ok(conn.query_row(
            "SELECT last_index FROM kv_index WHERE bucket = ?1",
            params![self.bucket],
            |row| row.get::<_, u64>(0),
        )?)
    }

    fn write(&self, conn: &Connection, key: &str, value: &[u8]) -> StoreResult<KVPair> {
        let last_index = self.next_index(conn)?;
        conn.execute(
            "INSERT INTO kv (bucket, key, value, last_index) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(bucket, key) DO UPDATE
             SET value = excluded.value, last_index = excluded.last_index",
            params![self.bucket, key, value, last_index],
        )?;
        Ok(KVPair::new(key, value, last_index))
    }

    fn check_previous(&self, conn: &Connection, key: &str, previous: &KVPair) -> StoreResult<()> {
        match self.current_index(conn, key)? {
            None => Err(StoreError::KeyNotFound),
            Some(current) if current != previous.last_index => {
                tracing::warn!(
                    key,
                    expected = previous.last_index,
                    current,
                    "Atomic operation rejected: key modified"
                );
                Err(StoreError::KeyModified)
            }
            Some(_) => Ok(()),
        }
    }

    fn row_to_pair(row: &rusqlite::Row) -> rusqlite::Result<KVPair> {
        Ok(KVPair {
            key: row.get(0)?,
            value: row.get(1)?,
            last_index: row.get(2)?,
        })
    }
}

impl Store for SqliteStore {
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        validate_key(key)?;
        let pair = self.with_write_txn(|conn| self.write(conn, key, value))?;
        tracing::debug!(key, last_index = pair.last_index, "Put");
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<KVPair> {
        self.ensure_open()?;
        validate_key(key)?;
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT key, value, last_index FROM kv WHERE bucket = ?1 AND key = ?2",
                params![self.bucket, key],
                Self::row_to_pair,
            )
            .optional()?
            .ok_or(StoreError::KeyNotFound)
        })
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        validate_key(key)?;
        self.with_conn(|conn| Ok(self.current_index(conn, key)?.is_some()))
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<KVPair>> {
        self.with_conn(|conn| {
            // substr() rather than LIKE so '%' and '_' in keys match literally
            let mut stmt = conn.prepare(
                "SELECT key, value, last_index FROM kv
                 WHERE bucket = ?1 AND substr(key, 1, length(?2)) = ?2
                 ORDER BY key",
            )?;
            let pairs = stmt
                .query_map(params![self.bucket, prefix], Self::row_to_pair)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

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
        self.ensure_open()?;
        validate_key(key)?;
        let pair = self.with_write_txn(|conn| {
            match previous {
                None if self.current_index(conn, key)?.is_some() => {
                    return Err(StoreError::KeyExists);
                }
                None => {}
                Some(prev) => self.check_previous(conn, key, prev)?,
            }
            self.write(conn, key, value)
        })?;
        tracing::debug!(key, last_index = pair.last_index, "Atomic put");
        Ok(pair)
    }

    fn atomic_delete(&self, key: &str, previous: Option<&KVPair>) -> StoreResult<()> {
        self.ensure_open()?;
        let previous = previous.ok_or(StoreError::PreviousNotSpecified)?;
        validate_key(key)?;
        self.with_write_txn(|conn| {
            self.check_previous(conn, key, previous)?;
            conn.execute(
                "DELETE FROM kv WHERE bucket = ?1 AND key = ?2",
                params![self.bucket, key],
            )?;
            Ok(())
        })?;
        tracing::debug!(key, "Atomic delete");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_open()?;
        validate_key(key)?;
        let rows = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM kv WHERE bucket = ?1 AND key = ?2",
                params![self.bucket, key],
            )?)
        })?;
        if rows == 0 {
            return Err(StoreError::KeyNotFound);
        }
        tracing::debug!(key, "Delete");
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        if let Some(conn) = inner.conn.take() {
            if let Err((_, err)) = conn.close() {
                tracing::warn!(error = %err, "Failed to close SQLite connection cleanly");
            }
        }
    }
}
