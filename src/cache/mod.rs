//! Cache Module
//!
//! Provides the concurrent value store, the expiry index, and the
//! `TimeCache` facade that keeps them in step.

mod deadline;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use deadline::current_timestamp_secs;
pub use stats::CacheStats;
pub use store::TimeCache;

pub(crate) use store::CacheInner;
