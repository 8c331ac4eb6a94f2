//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, HalfCacheError, HalfCacheResult};

/// Construction configuration for a halfcache.
///
/// `update_ttl <= final_ttl` is a precondition of the cache itself.
/// `HalfCache::new` trusts the caller; the loaders here
/// ([`from_toml_str`](Self::from_toml_str), [`from_env`](Self::from_env))
/// run [`validate`](Self::validate) before handing a config back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HalfCacheConfig {
    /// Capacity of the in-memory store, in bytes.
    pub capacity_bytes: usize,
    /// Age after which a record becomes stale and is refreshed in the background.
    #[serde(rename = "update_ttl_secs", with = "duration_secs")]
    pub update_ttl: Duration,
    /// Age after which a record is expired; also the store-level TTL.
    #[serde(rename = "final_ttl_secs", with = "duration_secs")]
    pub final_ttl: Duration,
}

impl Default for HalfCacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 * 1024 * 1024,
            update_ttl: Duration::from_secs(60),
            final_ttl: Duration::from_secs(600),
        }
    }
}

impl HalfCacheConfig {
    pub fn new(capacity_bytes: usize, update_ttl: Duration, final_ttl: Duration) -> Self {
        Self {
            capacity_bytes,
            update_ttl,
            final_ttl,
        }
    }

    /// Set the store capacity.
    pub fn with_capacity(mut self, capacity_bytes: usize) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    /// Set the soft expiry.
    pub fn with_update_ttl(mut self, ttl: Duration) -> Self {
        self.update_ttl = ttl;
        self
    }

    /// Set the hard expiry.
    pub fn with_final_ttl(mut self, ttl: Duration) -> Self {
        self.final_ttl = ttl;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - capacity_bytes > 0
    /// - final_ttl is positive
    /// - update_ttl <= final_ttl
    pub fn validate(&self) -> HalfCacheResult<()> {
        if self.capacity_bytes == 0 {
            return Err(HalfCacheError::Config(ConfigError::InvalidValue {
                field: "capacity_bytes".to_string(),
                value: self.capacity_bytes.to_string(),
                reason: "capacity_bytes must be greater than 0".to_string(),
            }));
        }

        if self.final_ttl.is_zero() {
            return Err(HalfCacheError::Config(ConfigError::InvalidValue {
                field: "final_ttl".to_string(),
                value: format!("{:?}", self.final_ttl),
                reason: "final_ttl must be positive".to_string(),
            }));
        }

        if self.update_ttl > self.final_ttl {
            return Err(HalfCacheError::Config(ConfigError::IncompatibleOptions {
                option_a: format!("update_ttl={:?}", self.update_ttl),
                option_b: format!("final_ttl={:?}", self.final_ttl),
            }));
        }

        Ok(())
    }

    /// Parse and validate a TOML document.
    ///
    /// ```toml
    /// capacity_bytes = 1048576
    /// update_ttl_secs = 30
    /// final_ttl_secs = 300
    /// ```
    pub fn from_toml_str(input: &str) -> HalfCacheResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `HALFCACHE_CAPACITY_BYTES`: store capacity (default: 64 MiB)
    /// - `HALFCACHE_UPDATE_TTL_SECS`: soft expiry in seconds (default: 60)
    /// - `HALFCACHE_FINAL_TTL_SECS`: hard expiry in seconds (default: 600)
    pub fn from_env() -> HalfCacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> HalfCacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            capacity_bytes: parse_var(&lookup, "HALFCACHE_CAPACITY_BYTES")?
                .unwrap_or(defaults.capacity_bytes),
            update_ttl: parse_var(&lookup, "HALFCACHE_UPDATE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.update_ttl),
            final_ttl: parse_var(&lookup, "HALFCACHE_FINAL_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.final_ttl),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Durations as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// =============================================================================
// TESTS
// =============================================================================
