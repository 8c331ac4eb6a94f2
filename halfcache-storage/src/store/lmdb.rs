//! LMDB-backed byte store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a persistent,
//! memory-mapped byte store. Values are stored as:
//!
//! ```text
//! [expires_at: i64 LE unix millis][value bytes ...]
//! ```
//!
//! An `expires_at` of `i64::MAX` means no expiry. Expired entries read as
//! absent and are deleted lazily. LMDB does not evict: once the map is full,
//! writes fail and the cache counts them as write failures.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use halfcache_core::clock::add_saturating;
use halfcache_core::{Clock, StoreError, SystemClock};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{ByteStore, StoreStats};

const EXPIRY_LEN: usize = 8;
const NO_EXPIRY: i64 = i64::MAX;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        StoreError::Backend {
            reason: e.to_string(),
        }
    }
}

/// LMDB-backed byte store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbStore::open("/tmp/halfcache", 100)?;
/// let cache = HalfCache::with_store(store, config, fetcher);
/// ```
pub struct LmdbStore {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    map_size: usize,
    clock: Arc<dyn Clock>,
    stats: RwLock<StoreStats>,
}

impl LmdbStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the map in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let map_size = max_size_mb * 1024 * 1024;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            map_size,
            clock: Arc::new(SystemClock),
            stats: RwLock::new(StoreStats::default()),
        })
    }

    /// Evaluate TTLs against `clock` instead of the system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn update_stats(&self, f: impl FnOnce(&mut StoreStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn remove(&self, key: &str) -> Result<bool, LmdbStoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(deleted)
    }
}

fn split_expiry(bytes: &[u8]) -> Option<(i64, &[u8])> {
    if bytes.len() < EXPIRY_LEN {
        return None;
    }
    let (head, value) = bytes.split_at(EXPIRY_LEN);
    let expires_at = i64::from_le_bytes(head.try_into().ok()?);
    Some((expires_at, value))
}

#[async_trait]
impl ByteStore for LmdbStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_err = |e: heed::Error| StoreError::ReadFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let found = {
            let rtxn = self.env.read_txn().map_err(read_err)?;
            self.db
                .get(&rtxn, key.as_bytes())
                .map_err(read_err)?
                .and_then(split_expiry)
                .map(|(expires_at, value)| (expires_at, value.to_vec()))
        };

        match found {
            None => {
                self.update_stats(|s| s.misses += 1);
                Ok(None)
            }
            Some((expires_at, _)) if expires_at != NO_EXPIRY && self.now_millis() >= expires_at => {
                if let Err(e) = self.remove(key) {
                    tracing::debug!(key = %key, error = %e, "Failed to drop expired LMDB entry");
                }
                self.update_stats(|s| {
                    s.misses += 1;
                    s.expirations += 1;
                });
                Ok(None)
            }
            Some((_, value)) => {
                self.update_stats(|s| s.hits += 1);
                Ok(Some(value))
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let write_err = |e: heed::Error| StoreError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let expires_at = if ttl.is_zero() {
            NO_EXPIRY
        } else {
            add_saturating(self.clock.now(), ttl).timestamp_millis()
        };

        let mut full_bytes = Vec::with_capacity(EXPIRY_LEN + value.len());
        full_bytes.extend_from_slice(&expires_at.to_le_bytes());
        full_bytes.extend_from_slice(&value);

        let mut wtxn = self.env.write_txn().map_err(write_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(write_err)?;
        wtxn.commit().map_err(write_err)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.remove(key)?)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let entry_count = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            self.db
                .len(&rtxn)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
        };

        let snapshot = self.stats.read().map(|s| s.clone()).unwrap_or_default();
        Ok(StoreStats {
            entry_count,
            capacity_bytes: self.map_size as u64,
            // LMDB doesn't evict, and page-level usage isn't tracked here
            bytes_used: 0,
            evictions: 0,
            ..snapshot
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfcache_core::ManualClock;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbStore, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let clock = Arc::new(ManualClock::at_unix(1_000));
        let store = LmdbStore::open(temp_dir.path(), 10)
            .expect("store creation should succeed")
            .with_clock(clock.clone());
        (store, clock, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _clock, _temp_dir) = create_test_store();

        store
            .set("k", b"value".to_vec(), Duration::from_secs(60))
            .await
            .expect("set should succeed");

        let got = store.get("k").await.expect("get should succeed");
        assert_eq!(got, Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _clock, _temp_dir) = create_test_store();
        let got = store.get("missing").await.expect("get should succeed");
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let (store, clock, _temp_dir) = create_test_store();

        store
            .set("k", b"v".to_vec(), Duration::from_secs(5))
            .await
            .expect("set should succeed");

        clock.advance(Duration::from_secs(4));
        assert!(store.get("k").await.expect("get").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("k").await.expect("get").is_none());

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let (store, clock, _temp_dir) = create_test_store();
        store.set("k", b"v".to_vec(), Duration::ZERO).await.expect("set");
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert!(store.get("k").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _clock, _temp_dir) = create_test_store();
        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .expect("set should succeed");

        assert!(store.delete("k").await.expect("delete should succeed"));
        assert!(!store.delete("k").await.expect("delete should succeed"));
        assert!(store.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (store, _clock, _temp_dir) = create_test_store();
        store.set("k", b"old".to_vec(), Duration::from_secs(60)).await.expect("set");
        store.set("k", b"new".to_vec(), Duration::from_secs(60)).await.expect("set");

        assert_eq!(store.get("k").await.expect("get"), Some(b"new".to_vec()));
        assert_eq!(store.stats().await.expect("stats").entry_count, 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbStore::open(temp_dir.path(), 10).expect("open");
            store.set("k", b"v".to_vec(), Duration::ZERO).await.expect("set");
        }

        let store = LmdbStore::open(temp_dir.path(), 10).expect("reopen");
        assert_eq!(store.get("k").await.expect("get"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _clock, _temp_dir) = create_test_store();

        let _ = store.get("k").await;
        store.set("k", b"v".to_vec(), Duration::from_secs(60)).await.expect("set");
        let _ = store.get("k").await;
        let _ = store.get("k").await;

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.capacity_bytes, 10 * 1024 * 1024);
    }
}
