//! Byte stores the cache keeps its records in.
//!
//! [`MemoryStore`] is the default fixed-capacity in-process store;
//! [`LmdbStore`] keeps records in a memory-mapped LMDB file.

pub mod lmdb;
pub mod memory;
pub mod traits;

pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::MemoryStore;
pub use traits::{ByteStore, StoreStats};
