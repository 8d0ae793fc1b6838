//! Cache Store Module
//!
//! The `TimeCache` facade over two concurrent maps: the value store and the
//! expiry index. The maps are updated one after the other with no lock
//! spanning both, so a key can briefly be present in one and absent from the
//! other. Callers must not rely on a read and its TTL refresh being atomic.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::cache::deadline::{current_timestamp_secs, deadline_from_now, is_expired};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweeper, SweeperHandle};

// == Cache Internals ==
/// State shared by every handle of one cache and by its sweepers.
pub(crate) struct CacheInner<T> {
    /// Key-value storage
    entries: DashMap<String, T>,
    /// Key to next eviction deadline (Unix seconds)
    deadlines: DashMap<String, i64>,
    /// Sliding TTL in seconds
    ttl_secs: u64,
    /// Activity counters
    stats: StatsRecorder,
    /// Sweepers currently running against this cache
    sweepers: AtomicUsize,
}

impl<T> CacheInner<T> {
    fn new(ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            deadlines: DashMap::new(),
            ttl_secs,
            stats: StatsRecorder::default(),
            sweepers: AtomicUsize::new(0),
        }
    }

    // == Sweep ==
    /// Evicts every key whose deadline is strictly older than the wall-clock
    /// time sampled at the start of the pass.
    ///
    /// An index entry is only removed if it is still expired at removal
    /// time. The matching value is removed in a second, separate step, so a
    /// `store` racing with the sweep can still lose its fresh value.
    ///
    /// Returns the number of values evicted.
    pub(crate) fn sweep_expired(&self) -> usize {
        let now = current_timestamp_secs();

        let expired_keys: Vec<String> = self
            .deadlines
            .iter()
            .filter(|entry| is_expired(*entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in expired_keys {
            let removed = self
                .deadlines
                .remove_if(&key, |_, deadline| is_expired(*deadline, now));
            if removed.is_some() && self.entries.remove(&key).is_some() {
                trace!(key = %key, "Evicted expired entry");
                evicted += 1;
            }
        }

        self.stats.record_evictions(evicted);
        evicted
    }

    pub(crate) fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Registers a new sweeper, returning how many were already running.
    fn sweeper_started(&self) -> usize {
        self.sweepers.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn sweeper_exited(&self) {
        self.sweepers.fetch_sub(1, Ordering::SeqCst);
    }

    fn running_sweepers(&self) -> usize {
        self.sweepers.load(Ordering::SeqCst)
    }
}

// == Time Cache ==
/// Thread-safe key-value cache with sliding TTL expiration.
///
/// Cloning is cheap and every clone operates on the same maps. Reclamation of
/// expired keys only happens once [`TimeCache::start`] has launched a sweeper
/// (or when [`TimeCache::sweep_expired`] is called directly); until then a
/// key stays readable past its deadline.
///
/// # Example
/// ```ignore
/// let sessions: TimeCache<Session> = TimeCache::new(60)?;
/// let _sweeper = sessions.start()?;
///
/// sessions.store("abc", session);
/// sessions.get(
///     "abc",
///     |key, session| println!("{key} -> {session:?}"),
///     |key| println!("{key} not found"),
/// );
/// ```
pub struct TimeCache<T> {
    inner: Arc<CacheInner<T>>,
}

impl<T> Clone for TimeCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for TimeCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeCache")
            .field("ttl_secs", &self.inner.ttl_secs)
            .field("entries", &self.inner.entries.len())
            .field("sweepers", &self.inner.running_sweepers())
            .finish()
    }
}

impl<T> TimeCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache with the given sliding TTL in seconds.
    ///
    /// The TTL doubles as the sweep interval.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidTtl` for a TTL of zero and
    /// `CacheError::TtlOverflow` for an absurdly large one.
    pub fn new(ttl_secs: u64) -> Result<Self> {
        Self::from_config(&CacheConfig::new(ttl_secs))
    }

    /// Creates an empty cache from a validated configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(CacheInner::new(config.ttl_secs)),
        })
    }

    // == Get ==
    /// Looks up `key` and invokes exactly one of the callbacks on the
    /// caller's thread.
    ///
    /// On a hit the key's deadline is pushed to now + TTL before `on_hit`
    /// runs, and `on_hit` receives a clone of the stored value. No map lock is held while a
    /// callback runs, so callbacks may call back into the cache.
    ///
    /// Presence alone decides a hit: a key past its deadline is still
    /// returned until a sweep removes it.
    pub fn get<H, M>(&self, key: &str, on_hit: H, on_miss: M)
    where
        H: FnOnce(&str, T),
        M: FnOnce(&str),
    {
        let value = self.inner.entries.get(key).map(|entry| entry.value().clone());

        match value {
            Some(value) => {
                self.inner.stats.record_hit();
                self.inner
                    .deadlines
                    .insert(key.to_string(), deadline_from_now(self.inner.ttl_secs));
                trace!(key, "Cache hit");
                on_hit(key, value);
            }
            None => {
                self.inner.stats.record_miss();
                trace!(key, "Cache miss");
                on_miss(key);
            }
        }
    }

    /// Returns a clone of the value for `key`, refreshing its deadline on a
    /// hit. Same semantics as [`TimeCache::get`].
    pub fn lookup(&self, key: &str) -> Option<T> {
        let mut found = None;
        self.get(key, |_, value| found = Some(value), |_| {});
        found
    }

    // == Store ==
    /// Inserts or overwrites `key` and resets its deadline to now + TTL.
    pub fn store(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        trace!(key = %key, "Storing entry");

        self.inner.entries.insert(key.clone(), value);
        self.inner
            .deadlines
            .insert(key, deadline_from_now(self.inner.ttl_secs));
        self.inner.stats.record_store();
    }

    // == Delete ==
    /// Removes `key` from the store and the expiry index. Deleting an absent
    /// key is a no-op.
    pub fn delete(&self, key: &str) {
        trace!(key, "Deleting entry");

        self.inner.entries.remove(key);
        self.inner.deadlines.remove(key);
        self.inner.stats.record_delete();
    }

    // == Start ==
    /// Launches the background sweeper on the current Tokio runtime.
    ///
    /// The sweeper sleeps one TTL, evicts expired keys, and repeats until
    /// [`SweeperHandle::stop`] is called or every handle to this cache has
    /// been dropped. Dropping the returned handle leaves it running.
    ///
    /// Calling this more than once starts redundant sweepers; each one works
    /// correctly but they duplicate effort. A warning is logged when that
    /// happens.
    ///
    /// # Errors
    /// Returns `CacheError::NoRuntime` when called outside a Tokio runtime.
    pub fn start(&self) -> Result<SweeperHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let already_running = self.inner.sweeper_started();
        if already_running > 0 {
            warn!(
                already_running,
                "Starting another sweeper for a cache that already has one"
            );
        }

        Ok(spawn_sweeper(&runtime, Arc::downgrade(&self.inner)))
    }

    // == Sweep Expired ==
    /// Runs one sweep pass synchronously and returns how many values were
    /// evicted.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    // == Introspection ==
    /// Returns true if `key` currently has a value. Does not refresh its
    /// deadline and is not counted as a hit or miss.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Returns the recorded deadline for `key` in Unix seconds, if any.
    pub fn deadline(&self, key: &str) -> Option<i64> {
        self.inner.deadlines.get(key).map(|deadline| *deadline)
    }

    /// Returns the configured sliding TTL.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl()
    }

    /// Returns the number of values currently stored.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns true if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns the number of sweepers currently running for this cache.
    pub fn running_sweepers(&self) -> usize {
        self.inner.running_sweepers()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.inner.entries.len())
    }

    #[cfg(test)]
    pub(crate) fn set_deadline(&self, key: &str, deadline: i64) {
        self.inner.deadlines.insert(key.to_string(), deadline);
    }
}
