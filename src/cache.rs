use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

use crate::error::CacheError;
use crate::persist::SnapshotStore;
use crate::producer::Producer;
use crate::refresh::{lock, RefreshEngine};
use crate::state::CacheState;

/// Construction-time options, validated once and immutable afterwards.
pub struct CacheConfig<T> {
    interval: Duration,
    snapshot: Option<Box<dyn SnapshotStore<T>>>,
}

impl<T> CacheConfig<T> {
    pub fn new(interval: Duration) -> Result<Self, CacheError> {
        if interval.is_zero() {
            return Err(CacheError::InvalidInterval);
        }

        Ok(CacheConfig {
            interval,
            snapshot: None,
        })
    }

    /// Persist each successful refresh to `store`, and reload the last
    /// persisted value at construction so reads can serve a stale snapshot
    /// from a previous run while the first live refresh is still under way.
    pub fn with_snapshot_store(mut self, store: Box<dyn SnapshotStore<T>>) -> Self {
        self.snapshot = Some(store);
        self
    }
}

/// A non-blocking view onto the result of a slow or failing call, refreshed
/// on a fixed period by a dedicated background worker.
///
/// Readers get the latest successful snapshot, the latest failure, or
/// "nothing yet"; they never wait on the producer itself. The worker keeps
/// ticking through producer failures and is stopped by [`stop`](Self::stop)
/// or by dropping the cache; cached state stays readable after a stop.
pub struct RefreshingCache<T: Send + Sync + 'static> {
    engine: Arc<RefreshEngine<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> RefreshingCache<T> {
    /// Start a cache that invokes `producer` immediately and then every
    /// `interval`, measured from the end of the previous invocation.
    pub fn new<P>(interval: Duration, producer: P) -> Result<Self, CacheError>
    where
        P: Producer<Output = T> + 'static,
    {
        Self::with_config(CacheConfig::new(interval)?, producer)
    }

    pub fn with_config<P>(config: CacheConfig<T>, producer: P) -> Result<Self, CacheError>
    where
        P: Producer<Output = T> + 'static,
    {
        let CacheConfig { interval, snapshot } = config;
        let state = match snapshot.as_ref().and_then(|store| store.load()) {
            Some(value) => CacheState::seeded(value),
            None => CacheState::new(),
        };

        let engine = Arc::new(RefreshEngine::new(
            interval,
            Box::new(producer),
            state,
            snapshot,
        ));
        let worker = {
            let engine = Arc::clone(&engine);
            thread::Builder::new()
                .name("cache-refresh".into())
                .spawn(move || engine.run())?
        };

        Ok(RefreshingCache {
            engine,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Latest completed outcome, without blocking on the producer:
    /// the last good snapshot, `StillAwaitingValue` before the first
    /// completed invocation, or the stored failure if the latest invocation
    /// failed.
    pub fn read(&self) -> Result<Arc<T>, CacheError> {
        self.engine.read()
    }

    /// Invoke the producer once on the calling thread and wait for it to
    /// complete. Serializes with the background worker's ticks; a tick in
    /// flight finishes first, then this invocation runs. The outcome is
    /// stored for later reads as well as returned.
    pub fn force_refresh(&self) -> Result<(), CacheError> {
        self.engine.refresh_once()
    }

    /// Number of completed producer invocations.
    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }

    pub fn interval(&self) -> Duration {
        self.engine.interval()
    }

    /// Takes effect for the next scheduled wait, not one already in
    /// progress.
    pub fn set_interval(&self, interval: Duration) -> Result<(), CacheError> {
        self.engine.set_interval(interval)
    }

    /// Signal the worker to exit and wait until it has fully terminated.
    /// Idempotent and safe to call concurrently; every caller returns only
    /// once the worker is gone. An in-flight producer invocation is allowed
    /// to finish, and cached state remains readable indefinitely.
    pub fn stop(&self) {
        self.engine.request_stop();

        // Holding the handle lock across the join makes a concurrent stop
        // block until the worker has actually terminated, not just been
        // signalled.
        let mut worker = lock(&self.worker);
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                warn!("refresh worker terminated by panic");
            }
        }
    }
}

impl<T: Send + Sync + 'static> Drop for RefreshingCache<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
