//! Stale-while-revalidate batch cache.
//!
//! [`HalfCache`] answers batched lookups out of a byte store and keeps the
//! store warm by re-running the direct fetch for keys whose records have
//! gone stale. Callers only wait when at least one requested key has no
//! servable record.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use halfcache_core::{
    Clock, FetchError, FixedHeaderCodec, HalfCacheConfig, HalfCacheResult, RecordCodec,
    SystemClock,
};

use crate::executor::{RefreshExecutor, RefreshMode, WriteReport};
use crate::fetcher::DirectFetcher;
use crate::merge::merge_fetched;
use crate::planner::{plan_batch, BatchPlan};
use crate::stats::{CacheCounters, HalfCacheStats};
use crate::store::{ByteStore, MemoryStore, StoreStats};

/// Batched lookup capability.
///
/// Lets callers depend on "something that answers multi-gets" rather than
/// on a concrete cache type.
#[async_trait]
pub trait MultiGet: Send + Sync {
    async fn multi_get(&self, keys: &[String]) -> HalfCacheResult<HashMap<String, Vec<u8>>>;
}

/// Read-through, stale-while-revalidate cache for batched key lookups.
///
/// # Type Parameters
///
/// - `S`: the byte store records are kept in
/// - `F`: the direct fetcher the cache sits in front of
///
/// # Example
///
/// ```ignore
/// let fetcher = FnFetcher::new(|keys: Vec<String>| async move { backend.multi_get(keys).await });
/// let cache = HalfCache::new(HalfCacheConfig::from_env()?, fetcher);
///
/// let values = cache.multi_get(&["a", "b", "c"]).await?;
/// ```
pub struct HalfCache<S, F> {
    store: Arc<S>,
    executor: Arc<RefreshExecutor<S, F>>,
    codec: Arc<dyn RecordCodec>,
    clock: Arc<dyn Clock>,
    counters: Arc<CacheCounters>,
    config: HalfCacheConfig,
}

impl<S, F> Clone for HalfCache<S, F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            executor: Arc::clone(&self.executor),
            codec: Arc::clone(&self.codec),
            clock: Arc::clone(&self.clock),
            counters: Arc::clone(&self.counters),
            config: self.config.clone(),
        }
    }
}

impl<F> HalfCache<MemoryStore, F>
where
    F: DirectFetcher + 'static,
{
    /// Create a cache over a fresh [`MemoryStore`] of `config.capacity_bytes`.
    ///
    /// `config.update_ttl <= config.final_ttl` is a precondition and is not
    /// checked in release builds. Use [`HalfCacheConfig::validate`] when the
    /// config comes from outside the program.
    pub fn new(config: HalfCacheConfig, fetcher: F) -> Self {
        Self::new_with_clock(config, fetcher, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), reading time from `clock`.
    ///
    /// The store evaluates its TTLs against the same clock.
    pub fn new_with_clock(config: HalfCacheConfig, fetcher: F, clock: Arc<dyn Clock>) -> Self {
        let store = MemoryStore::with_clock(config.capacity_bytes, Arc::clone(&clock));
        Self::from_parts(
            Arc::new(store),
            Arc::new(fetcher),
            config,
            clock,
            Arc::new(FixedHeaderCodec),
        )
    }
}

impl<S, F> HalfCache<S, F>
where
    S: ByteStore + 'static,
    F: DirectFetcher + 'static,
{
    /// Create a cache over a caller-supplied store.
    ///
    /// `config.capacity_bytes` is ignored; the store owns its own capacity.
    pub fn with_store(store: S, config: HalfCacheConfig, fetcher: F) -> Self {
        Self::from_parts(
            Arc::new(store),
            Arc::new(fetcher),
            config,
            Arc::new(SystemClock),
            Arc::new(FixedHeaderCodec),
        )
    }

    /// Assemble a cache from shared parts.
    pub fn from_parts(
        store: Arc<S>,
        fetcher: Arc<F>,
        config: HalfCacheConfig,
        clock: Arc<dyn Clock>,
        codec: Arc<dyn RecordCodec>,
    ) -> Self {
        debug_assert!(
            config.update_ttl <= config.final_ttl,
            "update_ttl must not exceed final_ttl"
        );

        let counters = Arc::new(CacheCounters::default());
        let executor = Arc::new(RefreshExecutor {
            store: Arc::clone(&store),
            fetcher,
            codec: Arc::clone(&codec),
            clock: Arc::clone(&clock),
            counters: Arc::clone(&counters),
            update_ttl: config.update_ttl,
            final_ttl: config.final_ttl,
        });

        Self {
            store,
            executor,
            codec,
            clock,
            counters,
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &HalfCacheConfig {
        &self.config
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> HalfCacheStats {
        self.counters.snapshot()
    }

    /// Statistics reported by the underlying store.
    pub async fn store_stats(&self) -> HalfCacheResult<StoreStats> {
        Ok(self.store.stats().await?)
    }

    /// Look up a batch of keys.
    ///
    /// - Fresh records are returned as-is.
    /// - Stale records are returned as-is and refreshed by a detached task.
    /// - If any key is missing or expired, the caller waits for one direct
    ///   fetch covering every key that needs one, and the fetched values
    ///   replace whatever was served from the store.
    ///
    /// Keys the fetcher cannot resolve are absent from the result. Duplicate
    /// keys are looked up once.
    ///
    /// # Errors
    ///
    /// Returns [`HalfCacheError::Fetch`](halfcache_core::HalfCacheError::Fetch)
    /// only when the caller had to wait and the fetch failed; no partial
    /// result is returned in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime and a fetch is needed.
    pub async fn multi_get<K>(&self, keys: &[K]) -> HalfCacheResult<HashMap<String, Vec<u8>>>
    where
        K: AsRef<str> + Sync,
    {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let now = self.clock.now();
        let plan = plan_batch(
            self.store.as_ref(),
            self.codec.as_ref(),
            &self.counters,
            keys,
            now,
        )
        .await;

        if plan.is_settled() {
            return Ok(plan.served);
        }

        let BatchPlan {
            served,
            to_fetch,
            must_block,
        } = plan;
        let mode = if must_block {
            RefreshMode::Blocking
        } else {
            RefreshMode::Background
        };

        tracing::debug!(
            requested = keys.len(),
            served = served.len(),
            to_fetch = to_fetch.len(),
            blocking = must_block,
            "Dispatching refresh"
        );

        let executor = Arc::clone(&self.executor);
        let task = tokio::spawn(async move { executor.run(to_fetch, mode).await });

        match mode {
            RefreshMode::Background => Ok(served),
            RefreshMode::Blocking => {
                let fetched = task.await.map_err(|e| FetchError::Aborted {
                    reason: e.to_string(),
                })??;
                Ok(merge_fetched(served, fetched))
            }
        }
    }

    /// Drop the record for `key`, so the next request for it blocks on a
    /// direct fetch. Returns whether a record was removed.
    pub async fn invalidate(&self, key: &str) -> HalfCacheResult<bool> {
        let removed = self.store.delete(key).await?;
        tracing::debug!(key = %key, removed, "Invalidated key");
        Ok(removed)
    }

    /// Store already-known values as if they had just been fetched.
    pub async fn prime<I>(&self, entries: I) -> WriteReport
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let entries: HashMap<String, Vec<u8>> = entries.into_iter().collect();
        self.executor.write_back(&entries).await
    }
}

#[async_trait]
impl<S, F> MultiGet for HalfCache<S, F>
where
    S: ByteStore + 'static,
    F: DirectFetcher + 'static,
{
    async fn multi_get(&self, keys: &[String]) -> HalfCacheResult<HashMap<String, Vec<u8>>> {
        HalfCache::multi_get(self, keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfcache_core::{HalfCacheError, ManualClock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::fetcher::{FetchResult, FnFetcher};

    fn config() -> HalfCacheConfig {
        HalfCacheConfig::new(4096, Duration::from_secs(1), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_request_skips_fetcher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let cache = HalfCache::new(
            config(),
            FnFetcher::new(move |_keys: Vec<String>| {
                counted.fetch_add(1, Ordering::SeqCst);
                async { FetchResult::Ok(HashMap::new()) }
            }),
        );

        let got = cache.multi_get::<&str>(&[]).await.expect("multi_get");
        assert!(got.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats(), HalfCacheStats::default());
    }

    async fn exploding_fetch(_keys: Vec<String>) -> FetchResult {
        panic!("fetcher blew up")
    }

    #[tokio::test]
    async fn test_panicking_fetcher_surfaces_as_aborted() {
        let cache = HalfCache::new(
            config(),
            FnFetcher::new(exploding_fetch),
        );

        let err = cache.multi_get(&["a"]).await.expect_err("should fail");
        assert!(matches!(
            err,
            HalfCacheError::Fetch(FetchError::Aborted { .. })
        ));
    }

    #[tokio::test]
    async fn test_prime_then_serve_without_fetch() {
        let clock = Arc::new(ManualClock::at_unix(1_000));
        let cache = HalfCache::new_with_clock(
            config(),
            FnFetcher::new(|keys: Vec<String>| async move {
                FetchResult::Err(FetchError::failed(keys.len(), "should not be called"))
            }),
            clock,
        );

        let report = cache
            .prime([("a".to_string(), b"aaa".to_vec())])
            .await;
        assert_eq!(report.written, 1);

        let got = cache.multi_get(&["a"]).await.expect("multi_get");
        assert_eq!(got.get("a"), Some(&b"aaa".to_vec()));
        assert_eq!(cache.stats().fetch_calls, 0);
    }

    #[tokio::test]
    async fn test_clones_share_store_and_counters() {
        let cache = HalfCache::new(
            config(),
            FnFetcher::new(|keys: Vec<String>| async move {
                FetchResult::Ok(keys.into_iter().map(|k| (k, b"v".to_vec())).collect())
            }),
        );
        let other = cache.clone();

        cache.multi_get(&["a"]).await.expect("multi_get");
        other.multi_get(&["a"]).await.expect("multi_get");

        let stats = other.stats();
        assert_eq!(stats.fetch_calls, 1);
        assert_eq!(stats.fresh_hits, 1);
        assert_eq!(cache.store_stats().await.expect("stats").entry_count, 1);
    }

    #[tokio::test]
    async fn test_usable_through_multi_get_trait() {
        let cache: Arc<dyn MultiGet> = Arc::new(HalfCache::new(
            config(),
            FnFetcher::new(|keys: Vec<String>| async move {
                FetchResult::Ok(keys.into_iter().map(|k| (k, b"v".to_vec())).collect())
            }),
        ));

        let got = cache
            .multi_get(&["a".to_string(), "b".to_string()])
            .await
            .expect("multi_get");
        assert_eq!(got.len(), 2);
    }
}
