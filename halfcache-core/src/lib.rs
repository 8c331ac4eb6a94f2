//! halfcache core - record, freshness and configuration types
//!
//! Pure data types and leaf logic with no I/O: the binary record layout,
//! the four-way freshness classification, configuration, clocks and the
//! error taxonomy. The orchestration lives in `halfcache-storage`.

pub mod clock;
pub mod config;
pub mod error;
pub mod freshness;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::HalfCacheConfig;
pub use error::{
    CodecError, ConfigError, FetchError, HalfCacheError, HalfCacheResult, StoreError,
};
pub use freshness::{classify, Freshness};
pub use record::{FixedHeaderCodec, RecordCodec, StoredRecord, HEADER_LEN};
