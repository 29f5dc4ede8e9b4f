//! A self-refreshing, non-blocking cache for slow or flaky calls.
//!
//! [`RefreshingCache`] wraps a producer (any slow or failure-prone call,
//! such as an HTTP fetch, a subprocess, or a sensor read) and re-invokes it
//! on a background schedule. Readers never wait on the producer: a read
//! returns the latest successful snapshot, the latest failure, or "nothing
//! yet", in O(1).
//!
//! ```
//! use std::time::Duration;
//! use refreshing_cache::{ProducerError, RefreshingCache};
//!
//! let cache = RefreshingCache::new(Duration::from_millis(500), || {
//!     Ok::<_, ProducerError>(2 + 2)
//! })
//! .unwrap();
//!
//! // The first refresh runs in the background; force one instead of waiting.
//! cache.force_refresh().unwrap();
//! assert_eq!(*cache.read().unwrap(), 4);
//! cache.stop();
//! ```

pub mod cache;
pub mod error;
pub mod persist;
pub mod producer;

mod refresh;
mod state;

pub use cache::{CacheConfig, RefreshingCache};
pub use error::{CacheError, SharedProducerError};
pub use persist::{
    BincodeSnapshotFile, BincodeSnapshotFormat, JsonSnapshotFile, JsonSnapshotFormat, SnapshotFile,
    SnapshotFormat, SnapshotStore,
};
pub use producer::{Producer, ProducerError, ProducerPanicked};
