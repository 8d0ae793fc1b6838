//! TTL Sweeper Task
//!
//! Background task that periodically evicts cache entries whose sliding
//! deadline has passed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheInner;

// == Stop Signal ==
/// Shared between a sweeper and its handle. The flag is set before waking
/// the task so a wake-up without it never ends the loop.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    fn request(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Stores a permit if the task is between sleeps
        self.notify.notify_one();
    }

    fn is_requested(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

// == Sweeper Handle ==
/// Controls a running sweeper.
///
/// Dropping the handle detaches it: the sweeper keeps running until the
/// process exits or every handle to its cache is gone.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
    stop: Arc<StopSignal>,
}

impl SweeperHandle {
    /// Asks the sweeper to exit. It wakes immediately if sleeping and never
    /// starts another sweep pass.
    pub fn stop(&self) {
        self.stop.request();
    }

    /// Cancels the sweeper task outright.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Returns true once the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the sweeper task to exit. Pair with [`SweeperHandle::stop`].
    ///
    /// An aborted sweeper counts as exited; a panic inside the sweeper is
    /// resumed on the caller.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }
}

/// Keeps the cache's running-sweeper count accurate however the task ends,
/// including abort before its first poll. Built before the task is spawned
/// and moved into its future.
struct RunningGuard<T>(Weak<CacheInner<T>>);

impl<T> Drop for RunningGuard<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.0.upgrade() {
            inner.sweeper_exited();
        }
    }
}

/// Spawns a sweeper for `cache` on `runtime`.
///
/// The task holds only a weak reference, so it never keeps the cache alive.
/// Each cycle sleeps one TTL, then evicts every key whose deadline is older
/// than the time sampled on waking.
pub(crate) fn spawn_sweeper<T>(runtime: &Handle, cache: Weak<CacheInner<T>>) -> SweeperHandle
where
    T: Send + Sync + 'static,
{
    let stop = Arc::new(StopSignal::default());
    let guard = RunningGuard(cache.clone());
    let task_stop = Arc::clone(&stop);

    let task = runtime.spawn(async move {
        let _guard = guard;
        run_sweeper(cache, task_stop).await
    });

    SweeperHandle { task, stop }
}

async fn run_sweeper<T>(cache: Weak<CacheInner<T>>, stop: Arc<StopSignal>)
where
    T: Send + Sync + 'static,
{
    let interval = match cache.upgrade() {
        Some(inner) => inner.ttl(),
        None => return,
    };

    info!(
        "Starting TTL sweeper with interval of {} seconds",
        interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.notify.notified() => {}
        }

        if stop.is_requested() {
            info!("TTL sweeper stopped");
            return;
        }

        let Some(inner) = cache.upgrade() else {
            debug!("Cache dropped, TTL sweeper exiting");
            return;
        };
        let removed = inner.sweep_expired();
        drop(inner);

        if removed > 0 {
            info!("TTL sweep: evicted {} expired entries", removed);
        } else {
            debug!("TTL sweep: no expired entries found");
        }
    }
}
