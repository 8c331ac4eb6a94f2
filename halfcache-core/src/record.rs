//! Stored record and its binary layout.
//!
//! A record is what the underlying byte store actually holds for a key:
//!
//! ```text
//! [refresh_at: i64 LE][expire_at: i64 LE][value bytes ...]
//! ```
//!
//! Both timestamps are absolute Unix seconds. There is no length prefix;
//! the value runs to the end of the byte extent returned by the store.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::io::Write;
use std::time::Duration;

use crate::clock::add_saturating;
use crate::error::CodecError;

/// Size of the fixed timestamp header.
pub const HEADER_LEN: usize = 16;

/// A cached value together with its soft and hard expiry instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// The cached payload.
    pub value: Vec<u8>,
    /// Unix second after which the record is stale.
    pub refresh_at: i64,
    /// Unix second after which the record must not be served.
    pub expire_at: i64,
}

impl StoredRecord {
    pub fn new(value: Vec<u8>, refresh_at: i64, expire_at: i64) -> Self {
        Self {
            value,
            refresh_at,
            expire_at,
        }
    }

    /// Build the record written right after a successful direct fetch.
    ///
    /// `update_ttl <= final_ttl` is a caller precondition; it is what keeps
    /// `refresh_at <= expire_at`.
    pub fn fetched_at(
        value: Vec<u8>,
        now: DateTime<Utc>,
        update_ttl: Duration,
        final_ttl: Duration,
    ) -> Self {
        Self {
            value,
            refresh_at: add_saturating(now, update_ttl).timestamp(),
            expire_at: add_saturating(now, final_ttl).timestamp(),
        }
    }

    /// Past soft expiry at `now_secs`.
    pub fn needs_refresh(&self, now_secs: i64) -> bool {
        now_secs > self.refresh_at
    }

    /// Past hard expiry at `now_secs`.
    pub fn is_expired(&self, now_secs: i64) -> bool {
        now_secs > self.expire_at
    }

    /// Encoded length of this record.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.value.len()
    }
}

/// Converts records to and from the bytes handed to the store.
pub trait RecordCodec: Debug + Send + Sync {
    fn encode(&self, record: &StoredRecord) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<StoredRecord, CodecError>;
}

/// The fixed 16-byte header layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedHeaderCodec;

impl RecordCodec for FixedHeaderCodec {
    fn encode(&self, record: &StoredRecord) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(record.encoded_len());
        write_record(&mut buf, record).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredRecord, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                len: bytes.len(),
                needed: HEADER_LEN,
            });
        }

        let (refresh, rest) = bytes.split_at(8);
        let (expire, value) = rest.split_at(8);

        Ok(StoredRecord {
            refresh_at: i64::from_le_bytes(le_word(refresh)?),
            expire_at: i64::from_le_bytes(le_word(expire)?),
            value: value.to_vec(),
        })
    }
}

fn write_record<W: Write>(w: &mut W, record: &StoredRecord) -> std::io::Result<()> {
    w.write_all(&record.refresh_at.to_le_bytes())?;
    w.write_all(&record.expire_at.to_le_bytes())?;
    w.write_all(&record.value)
}

fn le_word(bytes: &[u8]) -> Result<[u8; 8], CodecError> {
    bytes.try_into().map_err(|_| CodecError::Truncated {
        len: bytes.len(),
        needed: 8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout_is_little_endian_header_then_value() {
        let record = StoredRecord::new(b"abc".to_vec(), 0x0102, -1);
        let bytes = FixedHeaderCodec.encode(&record).expect("encode should succeed");

        assert_eq!(bytes.len(), HEADER_LEN + 3);
        assert_eq!(&bytes[0..8], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..16], &[0xff; 8]);
        assert_eq!(&bytes[16..], b"abc");
    }

    #[test]
    fn test_decode_reads_back_encoded_record() {
        let record = StoredRecord::new(b"payload".to_vec(), 1_700_000_000, 1_700_000_060);
        let bytes = FixedHeaderCodec.encode(&record).expect("encode should succeed");
        let decoded = FixedHeaderCodec.decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_header_only_gives_empty_value() {
        let mut bytes = 7i64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&9i64.to_le_bytes());

        let decoded = FixedHeaderCodec.decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded.refresh_at, 7);
        assert_eq!(decoded.expire_at, 9);
        assert!(decoded.value.is_empty());
    }

    #[test]
    fn test_decode_rejects_short_input() {
        for len in [0usize, 1, 8, 15] {
            let bytes = vec![0u8; len];
            let err = FixedHeaderCodec.decode(&bytes).expect_err("short input must fail");
            assert_eq!(err, CodecError::Truncated { len, needed: HEADER_LEN });
        }
    }

    #[test]
    fn test_fetched_at_offsets_from_now() {
        let now = DateTime::from_timestamp(1_000, 0).expect("valid timestamp");
        let record = StoredRecord::fetched_at(
            b"v".to_vec(),
            now,
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        assert_eq!(record.refresh_at, 1_001);
        assert_eq!(record.expire_at, 1_005);
        assert!(record.refresh_at <= record.expire_at);
    }

    #[test]
    fn test_fetched_at_truncates_subsecond_deadlines() {
        let now = DateTime::from_timestamp(1_000, 600_000_000).expect("valid timestamp");
        let record = StoredRecord::fetched_at(
            Vec::new(),
            now,
            Duration::from_millis(300),
            Duration::from_millis(500),
        );
        assert_eq!(record.refresh_at, 1_000);
        assert_eq!(record.expire_at, 1_001);
    }

    #[test]
    fn test_expiry_predicates_are_strict() {
        let record = StoredRecord::new(Vec::new(), 10, 20);
        assert!(!record.needs_refresh(10));
        assert!(record.needs_refresh(11));
        assert!(!record.is_expired(20));
        assert!(record.is_expired(21));
    }
}
