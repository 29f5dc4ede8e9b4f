use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{CacheError, SharedProducerError};
use crate::persist::SnapshotStore;
use crate::producer::{Producer, ProducerPanicked};
use crate::state::{CacheState, Slot};

// A panicking producer must not poison the cache for every later caller, so
// lock acquisition always recovers the guard.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// The shared heart of a refreshing cache: the producer behind its
/// invocation lock, the published result slot, and the shutdown signal the
/// worker thread sleeps on.
///
/// Two critical sections, never held across each other's slow parts:
/// owning `producer` keeps at most one invocation in flight (ticks and
/// forced refreshes included), while `state` is held only long enough to
/// swap the slot or clone a snapshot out of it.
pub(crate) struct RefreshEngine<T> {
    producer: Mutex<Box<dyn Producer<Output = T>>>,
    state: RwLock<CacheState<T>>,
    interval: Mutex<Duration>,
    shutdown: Shutdown,
    snapshot: Option<Box<dyn SnapshotStore<T>>>,
}

impl<T> RefreshEngine<T> {
    pub fn new(
        interval: Duration,
        producer: Box<dyn Producer<Output = T>>,
        state: CacheState<T>,
        snapshot: Option<Box<dyn SnapshotStore<T>>>,
    ) -> Self {
        RefreshEngine {
            producer: Mutex::new(producer),
            state: RwLock::new(state),
            interval: Mutex::new(interval),
            shutdown: Shutdown::new(),
            snapshot,
        }
    }

    /// Worker loop: refresh, then wait out the interval, until stopped. The
    /// wait is measured from the end of the previous invocation, so a slow
    /// producer delays ticks rather than skipping them.
    pub fn run(&self) {
        debug!("refresh worker started");

        loop {
            if self.shutdown.is_requested() {
                break;
            }

            let _ = self.refresh_once();

            if self.pause_between_ticks() {
                break;
            }
        }

        debug!("refresh worker stopped");
    }

    /// Invoke the producer exactly once on the calling thread and publish
    /// its outcome. Publication happens while the invocation lock is still
    /// held, so a tick and a forced refresh can never interleave writes.
    pub fn refresh_once(&self) -> Result<(), CacheError> {
        let mut producer = lock(&self.producer);

        match panic::catch_unwind(AssertUnwindSafe(|| producer.produce())) {
            Ok(Ok(value)) => {
                let published = write_lock(&self.state).publish_value(value);

                if let Some(store) = &self.snapshot {
                    store.save(&published);
                }

                Ok(())
            }
            Ok(Err(error)) => Err(self.publish_failure(Arc::from(error))),
            Err(payload) => {
                Err(self.publish_failure(Arc::new(ProducerPanicked(panic_message(payload)))))
            }
        }
    }

    fn publish_failure(&self, error: SharedProducerError) -> CacheError {
        warn!(error = %error, "refresh failed");
        write_lock(&self.state).publish_failure(Arc::clone(&error));

        CacheError::RefreshFailed(error)
    }

    /// Non-blocking view of the latest completed invocation.
    pub fn read(&self) -> Result<Arc<T>, CacheError> {
        match read_lock(&self.state).slot() {
            Slot::Empty => Err(CacheError::StillAwaitingValue),
            Slot::Value(value) => Ok(Arc::clone(value)),
            Slot::Failed(error) => Err(CacheError::RefreshFailed(Arc::clone(error))),
        }
    }

    pub fn generation(&self) -> u64 {
        read_lock(&self.state).generation()
    }

    pub fn interval(&self) -> Duration {
        *lock(&self.interval)
    }

    pub fn set_interval(&self, interval: Duration) -> Result<(), CacheError> {
        if interval.is_zero() {
            return Err(CacheError::InvalidInterval);
        }

        *lock(&self.interval) = interval;
        Ok(())
    }

    pub fn request_stop(&self) {
        self.shutdown.request();
    }

    /// Returns true if shutdown was requested during the wait. The interval
    /// is sampled once here: a runtime change applies to the next wait, not
    /// one already in progress.
    fn pause_between_ticks(&self) -> bool {
        let interval = self.interval();
        self.shutdown.wait_until(Instant::now() + interval)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Latch the worker sleeps on between ticks. A condvar rather than sliced
/// polling sleeps: stop requests interrupt a wait of any length immediately,
/// and sub-second intervals are honored exactly.
struct Shutdown {
    requested: Mutex<bool>,
    signal: Condvar,
}

impl Shutdown {
    fn new() -> Self {
        Shutdown {
            requested: Mutex::new(false),
            signal: Condvar::new(),
        }
    }

    fn request(&self) {
        *lock(&self.requested) = true;
        self.signal.notify_all();
    }

    fn is_requested(&self) -> bool {
        *lock(&self.requested)
    }

    /// Block until the deadline passes or shutdown is requested, whichever
    /// comes first. Returns true if shutdown was requested.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut requested = lock(&self.requested);

        while !*requested {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let (guard, _) = self
                .signal
                .wait_timeout(requested, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            requested = guard;
        }

        true
    }
}
