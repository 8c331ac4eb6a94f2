//! Fuzz test for freshness classification
//!
//! Classifies arbitrary stored bytes at an arbitrary instant and checks the
//! classification agrees with the decoded deadlines.
//!
//! Run with: cargo +nightly fuzz run classify_fuzz -- -max_total_time=60

#![no_main]

use chrono::DateTime;
use halfcache_core::{classify, FixedHeaderCodec, Freshness, RecordCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (i32, &[u8])| {
    let (now_secs, raw) = input;
    let Some(now) = DateTime::from_timestamp(i64::from(now_secs), 0) else {
        return;
    };

    let Ok(freshness) = classify(&FixedHeaderCodec, Some(raw), now) else {
        return;
    };
    let record = FixedHeaderCodec
        .decode(raw)
        .expect("classified input should decode");
    let now = now.timestamp();

    match freshness {
        Freshness::Fresh(value) => {
            assert!(now <= record.refresh_at);
            assert_eq!(value, record.value);
        }
        Freshness::Stale(value) => {
            assert!(record.refresh_at < now && now <= record.expire_at);
            assert_eq!(value, record.value);
        }
        Freshness::Expired => assert!(now > record.expire_at),
        Freshness::Absent => panic!("decodable record classified as absent"),
    }
});
