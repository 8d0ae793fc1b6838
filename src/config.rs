//! Configuration Module
//!
//! Holds the per-instance cache settings. The cache reads no environment
//! variables or files itself; embedding processes deserialize `CacheConfig`
//! from whatever configuration source they already use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Largest accepted TTL (roughly 100 years), keeps deadline math in range.
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Default TTL in seconds when none is configured.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Cache configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Sliding TTL in whole seconds; also the sweep interval
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Creates a config with the given TTL in seconds.
    pub fn new(ttl_secs: u64) -> Self {
        Self { ttl_secs }
    }

    /// Replaces the TTL.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Checks that the TTL is usable.
    ///
    /// # Errors
    /// - `CacheError::InvalidTtl` if the TTL is zero
    /// - `CacheError::TtlOverflow` if the TTL exceeds `MAX_TTL_SECS`
    pub fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(CacheError::InvalidTtl(self.ttl_secs));
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(CacheError::TtlOverflow(self.ttl_secs));
        }
        Ok(())
    }

    /// TTL as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}
