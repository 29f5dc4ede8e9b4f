use std::sync::Arc;

use crate::error::SharedProducerError;

/// What the most recent completed invocation left behind. A completed
/// invocation publishes exactly one arm; a torn value/failure pair is
/// unrepresentable.
#[derive(Debug, Clone)]
pub(crate) enum Slot<T> {
    /// No invocation has completed yet.
    Empty,

    /// Latest invocation succeeded.
    Value(Arc<T>),

    /// Latest invocation failed. Replaces any previously cached value.
    Failed(SharedProducerError),
}

/// The single shared slot plus a count of completed invocations. Guarded by
/// the cache's result-state lock; writers hold it only long enough to swap
/// the slot, readers only long enough to clone an `Arc` out of it.
pub(crate) struct CacheState<T> {
    slot: Slot<T>,
    generation: u64,
}

impl<T> CacheState<T> {
    pub fn new() -> Self {
        CacheState {
            slot: Slot::Empty,
            generation: 0,
        }
    }

    /// Start from a previously persisted value. Generations count completed
    /// invocations, so a seeded state is still generation zero.
    pub fn seeded(value: T) -> Self {
        CacheState {
            slot: Slot::Value(Arc::new(value)),
            generation: 0,
        }
    }

    pub fn publish_value(&mut self, value: T) -> Arc<T> {
        let published = Arc::new(value);
        self.slot = Slot::Value(Arc::clone(&published));
        self.generation += 1;

        published
    }

    pub fn publish_failure(&mut self, error: SharedProducerError) {
        self.slot = Slot::Failed(error);
        self.generation += 1;
    }

    pub fn slot(&self) -> &Slot<T> {
        &self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
