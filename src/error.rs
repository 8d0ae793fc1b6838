//! Error types for the cache
//!
//! Cache operations themselves never fail; errors only surface while building
//! a cache or starting its sweeper.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// TTL must be at least one second
    #[error("Invalid TTL: {0}s (must be a positive number of seconds)")]
    InvalidTtl(u64),

    /// TTL cannot be added to a Unix timestamp without overflowing
    #[error("TTL too large: {0}s")]
    TtlOverflow(u64),

    /// The sweeper needs a Tokio runtime to be spawned on
    #[error("No Tokio runtime available to run the sweeper")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
