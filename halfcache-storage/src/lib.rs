//! halfcache storage - stale-while-revalidate orchestration
//!
//! Puts a bounded byte store in front of an expensive bulk fetch. A request
//! is planned against the store, answered immediately when every key has a
//! servable record, and otherwise handed to a single refresh task that the
//! caller either waits on (missing or expired keys) or leaves running in the
//! background (stale keys only).

pub mod executor;
pub mod fetcher;
pub mod half_cache;
pub mod merge;
pub mod planner;
pub mod stats;
pub mod store;

pub use executor::{RefreshMode, WriteReport};
pub use fetcher::{DirectFetcher, FetchResult, FnFetcher};
pub use half_cache::{HalfCache, MultiGet};
pub use merge::merge_fetched;
pub use planner::BatchPlan;
pub use stats::HalfCacheStats;
pub use store::{ByteStore, LmdbStore, LmdbStoreError, MemoryStore, StoreStats};

pub use halfcache_core::{
    Clock, FetchError, HalfCacheConfig, HalfCacheError, HalfCacheResult, ManualClock, StoreError,
    SystemClock,
};
