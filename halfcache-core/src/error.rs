//! Error types for halfcache operations

use thiserror::Error;

/// Record codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Record truncated: got {len} bytes, header needs {needed}")]
    Truncated { len: usize, needed: usize },

    #[error("Record encode failed: {reason}")]
    Encode { reason: String },
}

/// Underlying byte store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Store write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Entry for key {key} is {size} bytes, store capacity is {capacity}")]
    EntryTooLarge {
        key: String,
        size: usize,
        capacity: usize,
    },

    #[error("Store backend error: {reason}")]
    Backend { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Direct-fetch collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Direct fetch of {key_count} keys failed: {reason}")]
    Failed { key_count: usize, reason: String },

    #[error("Refresh task aborted: {reason}")]
    Aborted { reason: String },
}

impl FetchError {
    /// Shorthand for a collaborator failure.
    pub fn failed(key_count: usize, reason: impl Into<String>) -> Self {
        Self::Failed {
            key_count,
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all halfcache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HalfCacheError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for halfcache operations.
pub type HalfCacheResult<T> = Result<T, HalfCacheError>;

// =============================================================================
// TESTS
// =============================================================================
