//! Batch lookup planning.
//!
//! Reads the store once per distinct requested key, classifies each record
//! and splits the request into what can be answered now and what has to be
//! fetched, plus whether the caller has to wait for that fetch.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use halfcache_core::{classify, Freshness, RecordCodec};

use crate::stats::CacheCounters;
use crate::store::ByteStore;

/// Outcome of planning one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Values answerable without waiting (fresh and stale keys).
    pub served: HashMap<String, Vec<u8>>,
    /// Keys to hand to the direct fetcher, in first-request order.
    pub to_fetch: Vec<String>,
    /// At least one key in `to_fetch` has no servable value.
    pub must_block: bool,
}

impl BatchPlan {
    /// Nothing to fetch; `served` is the whole answer.
    pub fn is_settled(&self) -> bool {
        self.to_fetch.is_empty()
    }

    fn absorb(&mut self, key: &str, freshness: Freshness) {
        if freshness.must_block() {
            self.must_block = true;
        }
        if freshness.needs_fetch() {
            self.to_fetch.push(key.to_string());
        }
        if let Some(value) = freshness.into_value() {
            self.served.insert(key.to_string(), value);
        }
    }
}

/// Plan a request.
///
/// Duplicate keys are collapsed to their first occurrence. Store read
/// errors and undecodable records are logged, counted and planned as
/// [`Freshness::Absent`].
pub(crate) async fn plan_batch<S, K>(
    store: &S,
    codec: &dyn RecordCodec,
    counters: &CacheCounters,
    keys: &[K],
    now: DateTime<Utc>,
) -> BatchPlan
where
    S: ByteStore + ?Sized,
    K: AsRef<str> + Sync,
{
    let mut plan = BatchPlan::default();
    let mut seen = HashSet::with_capacity(keys.len());

    for key in keys {
        let key = key.as_ref();
        if !seen.insert(key) {
            continue;
        }

        let raw = match store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                counters.record_read_error();
                tracing::warn!(key = %key, error = %e, "Store read failed, treating key as absent");
                None
            }
        };

        let freshness = match classify(codec, raw.as_deref(), now) {
            Ok(freshness) => freshness,
            Err(e) => {
                counters.record_decode_failure();
                tracing::warn!(key = %key, error = %e, "Undecodable record, treating key as absent");
                Freshness::Absent
            }
        };

        tracing::trace!(key = %key, freshness = freshness.label(), "Classified key");
        counters.record_freshness(&freshness);
        plan.absorb(key, freshness);
    }

    plan
}
