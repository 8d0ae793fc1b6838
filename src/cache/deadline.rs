//! Deadline Module
//!
//! Wall-clock helpers for the expiry index. Deadlines are absolute Unix
//! timestamps in whole seconds.

use chrono::Utc;

// == Utility Functions ==
/// Returns current Unix timestamp in seconds.
pub fn current_timestamp_secs() -> i64 {
    Utc::now().timestamp()
}

/// Returns the deadline for a key touched now: `now + ttl_secs`.
///
/// `ttl_secs` is bounded by `MAX_TTL_SECS` at construction, so the addition
/// saturates only on a wildly wrong system clock.
pub fn deadline_from_now(ttl_secs: u64) -> i64 {
    deadline_from(current_timestamp_secs(), ttl_secs)
}

/// Returns `now + ttl_secs`, saturating at `i64::MAX`.
pub fn deadline_from(now: i64, ttl_secs: u64) -> i64 {
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    now.saturating_add(ttl)
}

/// A deadline has passed once it is strictly older than `now`.
pub fn is_expired(deadline: i64, now: i64) -> bool {
    deadline < now
}
