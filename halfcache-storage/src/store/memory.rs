//! Fixed-capacity in-memory byte store.
//!
//! Capacity is counted as `key.len() + value.len()` per entry. When a write
//! would overflow it, least recently used entries are evicted until it
//! fits. Entry TTLs are checked lazily on read against the store's
//! [`Clock`].
//!
//! An entry is gone once `now >= written_at + ttl`. Records use the store
//! TTL `final_ttl` while their own `expire_at` only lapses at
//! `now > expire_at`, so at exactly `expire_at` the store has already
//! dropped the record and the key reads as absent rather than stale.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halfcache_core::clock::add_saturating;
use halfcache_core::{Clock, StoreError, SystemClock};

use super::traits::{ByteStore, StoreStats};

#[derive(Debug)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
    tick: u64,
}

impl Slot {
    fn cost(&self, key: &str) -> usize {
        key.len() + self.value.len()
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
struct Segment {
    entries: HashMap<String, Slot>,
    /// tick -> key, oldest first.
    recency: BTreeMap<u64, String>,
    next_tick: u64,
    used: usize,
    stats: StoreStats,
}

impl Segment {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.tick);
        self.used -= slot.cost(key);
        Some(slot)
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.recency.pop_first() else {
            return false;
        };
        if let Some(slot) = self.entries.remove(&key) {
            self.used -= slot.cost(&key);
            self.stats.evictions += 1;
        }
        true
    }
}

/// In-memory LRU byte store with per-entry TTL.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::new(1024 * 1024);
/// store.set("k", b"v".to_vec(), Duration::from_secs(60)).await?;
/// assert_eq!(store.get("k").await?, Some(b"v".to_vec()));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    clock: Arc<dyn Clock>,
    segment: Mutex<Segment>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` bytes of keys and values.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create a store that evaluates TTLs against `clock`.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            clock,
            segment: Mutex::new(Segment::default()),
        }
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, Segment>, StoreError> {
        self.segment.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl ByteStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        let mut segment = self.lock()?;

        let expired = match segment.entries.get(key) {
            None => {
                segment.stats.misses += 1;
                return Ok(None);
            }
            Some(slot) => slot.is_expired(now),
        };

        if expired {
            segment.remove(key);
            segment.stats.expirations += 1;
            segment.stats.misses += 1;
            return Ok(None);
        }

        let tick = segment.tick();
        let Segment {
            entries, recency, ..
        } = &mut *segment;
        let Some(slot) = entries.get_mut(key) else {
            return Ok(None);
        };
        recency.remove(&slot.tick);
        recency.insert(tick, key.to_string());
        slot.tick = tick;
        let value = slot.value.clone();

        segment.stats.hits += 1;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let size = key.len() + value.len();
        if size > self.capacity {
            return Err(StoreError::EntryTooLarge {
                key: key.to_string(),
                size,
                capacity: self.capacity,
            });
        }

        let expires_at = (!ttl.is_zero()).then(|| add_saturating(self.clock.now(), ttl));
        let mut segment = self.lock()?;

        segment.remove(key);
        while segment.used + size > self.capacity {
            if !segment.evict_oldest() {
                break;
            }
        }

        let tick = segment.tick();
        segment.recency.insert(tick, key.to_string());
        segment.entries.insert(
            key.to_string(),
            Slot {
                value,
                expires_at,
                tick,
            },
        );
        segment.used += size;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let segment = self.lock()?;
        Ok(StoreStats {
            entry_count: segment.entries.len() as u64,
            bytes_used: segment.used as u64,
            capacity_bytes: self.capacity as u64,
            ..segment.stats.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfcache_core::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    fn store_with_clock(capacity: usize) -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(1_000));
        (MemoryStore::with_clock(capacity, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new(1024);
        store
            .set("k", b"value".to_vec(), MINUTE)
            .await
            .expect("set should succeed");

        let got = store.get("k").await.expect("get should succeed");
        assert_eq!(got, Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryStore::new(1024);
        assert_eq!(store.get("nope").await.expect("get should succeed"), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_accounting() {
        let store = MemoryStore::new(1024);
        store.set("k", vec![0; 100], MINUTE).await.expect("set should succeed");
        store.set("k", vec![1; 10], MINUTE).await.expect("set should succeed");

        assert_eq!(store.get("k").await.expect("get"), Some(vec![1; 10]));
        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.bytes_used, 11);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let (store, clock) = store_with_clock(1024);
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
        assert_eq!(stats.bytes_used, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let (store, clock) = store_with_clock(1024);
        store.set("k", b"v".to_vec(), Duration::ZERO).await.expect("set");
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(store.get("k").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        // Each entry costs 1 (key) + 9 (value) = 10 bytes.
        let store = MemoryStore::new(30);
        for key in ["a", "b", "c"] {
            store.set(key, vec![0; 9], MINUTE).await.expect("set");
        }

        // Touch "a" so "b" becomes the oldest.
        assert!(store.get("a").await.expect("get").is_some());
        store.set("d", vec![0; 9], MINUTE).await.expect("set");

        assert!(store.get("a").await.expect("get").is_some());
        assert!(store.get("b").await.expect("get").is_none());
        assert!(store.get("c").await.expect("get").is_some());
        assert!(store.get("d").await.expect("get").is_some());

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.bytes_used, 30);
    }

    #[tokio::test]
    async fn test_rejects_entry_larger_than_capacity() {
        let store = MemoryStore::new(8);
        assert_eq!(store.capacity(), 8);
        let err = store
            .set("key", vec![0; 6], MINUTE)
            .await
            .expect_err("too large");
        assert_eq!(
            err,
            StoreError::EntryTooLarge {
                key: "key".to_string(),
                size: 9,
                capacity: 8,
            }
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new(1024);
        store.set("k", b"v".to_vec(), MINUTE).await.expect("set");

        assert!(store.delete("k").await.expect("delete"));
        assert!(!store.delete("k").await.expect("delete"));
        assert!(store.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_stats_counts_hits_and_misses() {
        let store = MemoryStore::new(1024);
        let _ = store.get("k").await;
        store.set("k", b"v".to_vec(), MINUTE).await.expect("set");
        let _ = store.get("k").await;
        let _ = store.get("k").await;

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.capacity_bytes, 1024);
    }
}
