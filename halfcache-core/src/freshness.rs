//! Freshness classification of stored records.
//!
//! Every requested key lands in exactly one of four states. Only
//! [`Freshness::Fresh`] and [`Freshness::Stale`] carry a value that may be
//! served; everything except `Fresh` asks for a direct fetch, and only
//! `Absent` and `Expired` make the caller wait for it.

use chrono::{DateTime, Utc};

use crate::error::CodecError;
use crate::record::{RecordCodec, StoredRecord};

/// Classification of one key's stored record at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// No entry in the store, or the entry could not be decoded.
    Absent,
    /// Past hard expiry. Never served.
    Expired,
    /// Past soft expiry but still valid. Served, and refreshed behind the caller.
    Stale(Vec<u8>),
    /// Within soft expiry. Served as is.
    Fresh(Vec<u8>),
}

impl Freshness {
    /// Classify a decoded record against `now`.
    pub fn of_record(record: StoredRecord, now: DateTime<Utc>) -> Self {
        let now_secs = now.timestamp();
        if record.is_expired(now_secs) {
            Self::Expired
        } else if record.needs_refresh(now_secs) {
            Self::Stale(record.value)
        } else {
            Self::Fresh(record.value)
        }
    }

    /// Whether a direct fetch should be issued for this key.
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Self::Fresh(_))
    }

    /// Whether the caller has nothing valid to serve and must wait.
    pub fn must_block(&self) -> bool {
        matches!(self, Self::Absent | Self::Expired)
    }

    /// The servable value, if any.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::Stale(v) | Self::Fresh(v) => Some(v),
            Self::Absent | Self::Expired => None,
        }
    }

    /// Consume and return the servable value, if any.
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            Self::Stale(v) | Self::Fresh(v) => Some(v),
            Self::Absent | Self::Expired => None,
        }
    }

    /// Short label, used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Expired => "expired",
            Self::Stale(_) => "stale",
            Self::Fresh(_) => "fresh",
        }
    }
}

/// Classify the raw bytes a store returned for a key.
///
/// `None` is [`Freshness::Absent`]. A decode failure comes back as `Err` so
/// the caller can count it; the caller must then treat the key exactly like
/// `Absent`.
pub fn classify(
    codec: &dyn RecordCodec,
    raw: Option<&[u8]>,
    now: DateTime<Utc>,
) -> Result<Freshness, CodecError> {
    match raw {
        None => Ok(Freshness::Absent),
        Some(bytes) => Ok(Freshness::of_record(codec.decode(bytes)?, now)),
    }
}
