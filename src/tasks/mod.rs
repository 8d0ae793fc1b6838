//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - TTL Sweeper: Evicts keys whose sliding deadline has passed, once per TTL

mod sweeper;

pub(crate) use sweeper::spawn_sweeper;
pub use sweeper::SweeperHandle;
