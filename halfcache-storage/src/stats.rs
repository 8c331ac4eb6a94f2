//! Cache-level statistics.
//!
//! Counters are plain relaxed atomics; a [`HalfCacheStats`] snapshot is not
//! a consistent cut across counters.

use std::sync::atomic::{AtomicU64, Ordering};

use halfcache_core::Freshness;

use crate::executor::RefreshMode;

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HalfCacheStats {
    /// Keys served from a fresh record.
    pub fresh_hits: u64,
    /// Keys served from a stale record (refresh scheduled).
    pub stale_hits: u64,
    /// Keys with no usable record (absent, unreadable or undecodable).
    pub misses: u64,
    /// Keys whose record was past hard expiry.
    pub expired: u64,
    /// Records that failed to decode.
    pub decode_failures: u64,
    /// Store reads that errored.
    pub read_errors: u64,
    /// Direct-fetch invocations.
    pub fetch_calls: u64,
    /// Direct-fetch invocations that failed outright.
    pub fetch_failures: u64,
    /// Refreshes a caller waited on.
    pub blocking_refreshes: u64,
    /// Refreshes that ran detached.
    pub background_refreshes: u64,
    /// Records written back to the store.
    pub records_written: u64,
    /// Records that failed to encode or write.
    pub write_failures: u64,
}

impl HalfCacheStats {
    /// Fraction of requested keys answered from the store (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fresh_hits + self.stale_hits;
        let total = hits + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    decode_failures: AtomicU64,
    read_errors: AtomicU64,
    fetch_calls: AtomicU64,
    fetch_failures: AtomicU64,
    blocking_refreshes: AtomicU64,
    background_refreshes: AtomicU64,
    records_written: AtomicU64,
    write_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl CacheCounters {
    pub(crate) fn record_freshness(&self, freshness: &Freshness) {
        match freshness {
            Freshness::Fresh(_) => bump(&self.fresh_hits),
            Freshness::Stale(_) => bump(&self.stale_hits),
            Freshness::Expired => bump(&self.expired),
            Freshness::Absent => bump(&self.misses),
        }
    }

    pub(crate) fn record_decode_failure(&self) {
        bump(&self.decode_failures);
    }

    pub(crate) fn record_read_error(&self) {
        bump(&self.read_errors);
    }

    pub(crate) fn record_fetch(&self, mode: RefreshMode) {
        bump(&self.fetch_calls);
        match mode {
            RefreshMode::Blocking => bump(&self.blocking_refreshes),
            RefreshMode::Background => bump(&self.background_refreshes),
        }
    }

    pub(crate) fn record_fetch_failure(&self) {
        bump(&self.fetch_failures);
    }

    pub(crate) fn record_written(&self) {
        bump(&self.records_written);
    }

    pub(crate) fn record_write_failure(&self) {
        bump(&self.write_failures);
    }

    pub(crate) fn snapshot(&self) -> HalfCacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        HalfCacheStats {
            fresh_hits: load(&self.fresh_hits),
            stale_hits: load(&self.stale_hits),
            misses: load(&self.misses),
            expired: load(&self.expired),
            decode_failures: load(&self.decode_failures),
            read_errors: load(&self.read_errors),
            fetch_calls: load(&self.fetch_calls),
            fetch_failures: load(&self.fetch_failures),
            blocking_refreshes: load(&self.blocking_refreshes),
            background_refreshes: load(&self.background_refreshes),
            records_written: load(&self.records_written),
            write_failures: load(&self.write_failures),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = HalfCacheStats {
            fresh_hits: 6,
            stale_hits: 2,
            misses: 1,
            expired: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = HalfCacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = CacheCounters::default();
        counters.record_freshness(&Freshness::Fresh(vec![]));
        counters.record_freshness(&Freshness::Stale(vec![]));
        counters.record_freshness(&Freshness::Absent);
        counters.record_freshness(&Freshness::Expired);
        counters.record_fetch(RefreshMode::Blocking);
        counters.record_fetch(RefreshMode::Background);
        counters.record_fetch_failure();
        counters.record_written();
        counters.record_write_failure();

        let stats = counters.snapshot();
        assert_eq!(stats.fresh_hits, 1);
        assert_eq!(stats.stale_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.fetch_calls, 2);
        assert_eq!(stats.blocking_refreshes, 1);
        assert_eq!(stats.background_refreshes, 1);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.records_written, 1);
        assert_eq!(stats.write_failures, 1);
    }
}
