//! Byte store trait and store statistics.
//!
//! The store is an external collaborator: a bounded key/value map of raw
//! bytes with per-entry TTL and its own eviction. The cache only needs
//! get, set and delete from it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use halfcache_core::StoreError;

/// Byte store trait for pluggable store implementations.
///
/// Implementations must be safe for concurrent use from many tasks; the
/// cache adds no locking of its own around them.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Get the bytes stored under `key`, or `None` if absent or past its TTL.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any existing entry.
    ///
    /// A zero `ttl` means the entry never expires on its own.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Get store statistics.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

#[async_trait]
impl<T: ByteStore + ?Sized> ByteStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        (**self).stats().await
    }
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of reads that found a live entry.
    pub hits: u64,
    /// Number of reads that found nothing.
    pub misses: u64,
    /// Number of entries currently held.
    pub entry_count: u64,
    /// Bytes currently accounted against capacity.
    pub bytes_used: u64,
    /// Configured capacity in bytes.
    pub capacity_bytes: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries dropped because their TTL ran out.
    pub expirations: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_stats_hit_rate() {
        let stats = StoreStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = StoreStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
