//! Fuzz test for the fixed-header record codec
//!
//! Feeds arbitrary bytes to the decoder to find panics on malformed records.
//! Anything that decodes must re-encode to the same bytes.
//!
//! Run with: cargo +nightly fuzz run record_decode_fuzz -- -max_total_time=60

#![no_main]

use halfcache_core::{FixedHeaderCodec, RecordCodec, HEADER_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match FixedHeaderCodec.decode(data) {
        Ok(record) => {
            assert!(data.len() >= HEADER_LEN);
            assert_eq!(record.value.len(), data.len() - HEADER_LEN);

            let encoded = FixedHeaderCodec
                .encode(&record)
                .expect("decoded record should re-encode");
            assert_eq!(encoded, data, "re-encoding should be lossless");
        }
        Err(_) => {
            assert!(data.len() < HEADER_LEN, "only short input may fail to decode");
        }
    }
});
