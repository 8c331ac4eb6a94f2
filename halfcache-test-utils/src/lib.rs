//! halfcache Test Utilities
//!
//! Shared test infrastructure for the halfcache workspace:
//! - A recording direct fetcher with failure and latency injection
//! - A byte store with read/write fault injection
//! - Proptest generators for keys, values and batches
//! - Fixtures and polling helpers for background refreshes

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

// Re-export the types tests reach for most
pub use halfcache_core::{
    Clock, FetchError, FixedHeaderCodec, HalfCacheConfig, HalfCacheError, HalfCacheResult,
    ManualClock, RecordCodec, StoreError, StoredRecord,
};
pub use halfcache_storage::{
    ByteStore, DirectFetcher, FetchResult, HalfCache, HalfCacheStats, MemoryStore, StoreStats,
};

/// Install a fmt subscriber for test output, once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Poll `pred` until it holds or `timeout` passes. Returns the last result.
///
/// Yields to the runtime between polls, so detached refresh tasks get to run
/// on a current-thread runtime.
pub async fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if pred() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// MOCK FETCHER
// ============================================================================

/// Direct fetcher over an in-memory map that records every call.
///
/// Keys missing from the map are left out of the result, like a backend
/// that cannot resolve them.
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    data: RwLock<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<Vec<String>>>,
    delay: Option<Duration>,
    failing: AtomicBool,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher that resolves the given pairs.
    pub fn with_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let fetcher = Self::new();
        for (k, v) in pairs {
            fetcher.set_value(k, v);
        }
        fetcher
    }

    /// Sleep for `delay` inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change what the backend returns for `key`.
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.insert(key.into(), value.into());
    }

    /// Make the backend unable to resolve `key`.
    pub fn remove_value(&self, key: &str) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.remove(key);
    }

    /// Make every subsequent fetch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches started so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Key batches of every fetch, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Key batch of the most recent fetch.
    pub fn last_keys(&self) -> Option<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl DirectFetcher for RecordingFetcher {
    async fn fetch(&self, keys: &[String]) -> FetchResult {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(keys.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::failed(keys.len(), "injected fetch failure"));
        }

        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(keys
            .iter()
            .filter_map(|k| data.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }
}

// ============================================================================
// FAULTY STORE
// ============================================================================

/// [`MemoryStore`] wrapper whose reads and writes can be made to fail.
#[derive(Debug)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new(capacity: usize) -> Self {
        Self::wrap(MemoryStore::new(capacity))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self::wrap(MemoryStore::with_clock(capacity, clock))
    }

    fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write raw bytes, bypassing fault injection and the record codec.
    pub async fn put_raw(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.inner.set(key, bytes, Duration::ZERO).await
    }
}

#[async_trait]
impl ByteStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailed {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys, values and request batches.

    use proptest::prelude::*;

    /// Generate a short printable key from a small alphabet, so batches
    /// collide often enough to exercise deduplication.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-f]{1,3}"
    }

    /// Generate an opaque value.
    pub fn arb_value() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..64)
    }

    /// Generate a request batch, duplicates allowed.
    pub fn arb_keys() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_key(), 1..12)
    }

    /// Generate a backend dataset.
    pub fn arb_dataset() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
        prop::collection::vec((arb_key(), arb_value()), 0..16)
    }

    /// Generate `(update_ttl, final_ttl)` seconds with `update <= final`.
    pub fn arb_ttls() -> impl Strategy<Value = (u64, u64)> {
        (0u64..3600).prop_flat_map(|update| (Just(update), update..update + 3600))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common cache scenarios.

    use super::*;

    /// Unix second every [`manual_clock`] starts at.
    pub const START_SECS: i64 = 1_700_000_000;

    /// A manual clock parked at [`START_SECS`].
    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_unix(START_SECS))
    }

    /// 1 MiB store, stale after 1s, expired after 5s.
    pub fn test_config() -> HalfCacheConfig {
        HalfCacheConfig::new(1024 * 1024, Duration::from_secs(1), Duration::from_secs(5))
    }

    /// Backend resolving `a`, `b` and `c` to `aaa`, `bbb` and `ccc`.
    pub fn abc_fetcher() -> Arc<RecordingFetcher> {
        Arc::new(RecordingFetcher::with_values([
            ("a", "aaa"),
            ("b", "bbb"),
            ("c", "ccc"),
        ]))
    }

    /// A cache over a [`MemoryStore`] that shares `clock`.
    pub fn cache_with(
        fetcher: Arc<RecordingFetcher>,
        clock: Arc<ManualClock>,
    ) -> HalfCache<MemoryStore, Arc<RecordingFetcher>> {
        HalfCache::new_with_clock(test_config(), fetcher, clock)
    }

    /// A cache over a [`FaultyStore`] that shares `clock`.
    pub fn faulty_cache_with(
        fetcher: Arc<RecordingFetcher>,
        clock: Arc<ManualClock>,
    ) -> (HalfCache<FaultyStore, RecordingFetcher>, Arc<FaultyStore>) {
        let store = Arc::new(FaultyStore::with_clock(1024 * 1024, clock.clone()));
        let cache = HalfCache::from_parts(
            Arc::clone(&store),
            fetcher,
            test_config(),
            clock,
            Arc::new(FixedHeaderCodec),
        );
        (cache, store)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over cache responses.

    use super::*;

    /// Assert `map` holds exactly the given pairs.
    pub fn assert_values(map: &HashMap<String, Vec<u8>>, expected: &[(&str, &str)]) {
        let expected: HashMap<String, Vec<u8>> = expected
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        assert_eq!(map, &expected, "unexpected cache response");
    }

    /// Assert `result` failed because a blocking fetch failed.
    pub fn assert_fetch_failed<T: std::fmt::Debug>(result: &HalfCacheResult<T>) {
        match result {
            Err(HalfCacheError::Fetch(FetchError::Failed { .. })) => {}
            other => panic!("Expected fetch failure, got {:?}", other),
        }
    }
}
