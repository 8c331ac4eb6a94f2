//! Refresh execution.
//!
//! One executor run is one direct fetch for one batch, followed by writing
//! every returned value back to the store as a new record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use halfcache_core::{Clock, RecordCodec, StoredRecord};

use crate::fetcher::{DirectFetcher, FetchResult};
use crate::stats::CacheCounters;
use crate::store::ByteStore;

/// Whether a caller is waiting on the refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// A caller is suspended until the refresh completes.
    Blocking,
    /// Nobody waits; the outcome is only logged.
    Background,
}

impl RefreshMode {
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Blocking)
    }
}

/// Outcome of writing a batch of fetched values back to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub failed: usize,
}

/// Runs direct fetches and writes the results back to the store.
pub(crate) struct RefreshExecutor<S, F> {
    pub(crate) store: Arc<S>,
    pub(crate) fetcher: Arc<F>,
    pub(crate) codec: Arc<dyn RecordCodec>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) counters: Arc<CacheCounters>,
    pub(crate) update_ttl: Duration,
    pub(crate) final_ttl: Duration,
}

impl<S, F> RefreshExecutor<S, F>
where
    S: ByteStore,
    F: DirectFetcher,
{
    /// Fetch `keys` once and store whatever comes back.
    ///
    /// A failed fetch writes nothing. In [`RefreshMode::Background`] the
    /// failure is logged here since no caller will see it.
    pub(crate) async fn run(&self, keys: Vec<String>, mode: RefreshMode) -> FetchResult {
        self.counters.record_fetch(mode);

        match self.fetcher.fetch(&keys).await {
            Ok(fetched) => {
                let report = self.write_back(&fetched).await;
                tracing::debug!(
                    requested = keys.len(),
                    resolved = fetched.len(),
                    written = report.written,
                    failed = report.failed,
                    blocking = mode.is_blocking(),
                    "Refresh completed"
                );
                Ok(fetched)
            }
            Err(e) => {
                self.counters.record_fetch_failure();
                match mode {
                    RefreshMode::Background => tracing::warn!(
                        key_count = keys.len(),
                        error = %e,
                        "Background refresh failed, keeping stale records"
                    ),
                    RefreshMode::Blocking => tracing::debug!(
                        key_count = keys.len(),
                        error = %e,
                        "Blocking refresh failed"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Store a fresh record for every pair.
    ///
    /// Per-key failures are counted and logged; they never stop the rest of
    /// the batch.
    pub(crate) async fn write_back(&self, fetched: &HashMap<String, Vec<u8>>) -> WriteReport {
        let now = self.clock.now();
        let mut report = WriteReport::default();

        for (key, value) in fetched {
            let record =
                StoredRecord::fetched_at(value.clone(), now, self.update_ttl, self.final_ttl);

            let bytes = match self.codec.encode(&record) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.counters.record_write_failure();
                    report.failed += 1;
                    tracing::warn!(key = %key, error = %e, "Failed to encode record");
                    continue;
                }
            };

            match self.store.set(key, bytes, self.final_ttl).await {
                Ok(()) => {
                    self.counters.record_written();
                    report.written += 1;
                }
                Err(e) => {
                    self.counters.record_write_failure();
                    report.failed += 1;
                    tracing::warn!(key = %key, error = %e, "Failed to write record to store");
                }
            }
        }

        report
    }
}
