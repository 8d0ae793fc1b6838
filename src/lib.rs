//! Timecache - A thread-safe in-memory cache with sliding TTL expiration
//!
//! Values live in a concurrent map; a separate expiry index tracks each key's
//! next eviction deadline. Every hit pushes the deadline forward by one TTL, and
//! a background sweeper reclaims keys nobody has touched for a full TTL.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, TimeCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::SweeperHandle;
