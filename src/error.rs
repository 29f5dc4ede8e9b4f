use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Failure from the most recent producer invocation, shared between the
/// worker that stored it and every reader that observes it.
pub type SharedProducerError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The refresh interval was zero. Intervals are `std::time::Duration`,
    /// so negative values are unrepresentable.
    #[error("refresh interval must be greater than zero")]
    InvalidInterval,

    /// No producer invocation has completed yet. Retry shortly, or call
    /// `force_refresh` to populate the cache synchronously.
    #[error("the first refresh has not completed yet")]
    StillAwaitingValue,

    /// The most recent completed invocation failed; the underlying producer
    /// failure is carried verbatim until a later invocation supersedes it.
    #[error("most recent refresh failed: {0}")]
    RefreshFailed(SharedProducerError),

    /// The background worker thread could not be spawned.
    #[error("failed to spawn refresh worker: {0}")]
    WorkerSpawn(#[from] io::Error),
}
