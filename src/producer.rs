use thiserror::Error;

/// Failure raised by a [`Producer`]. Boxed so producers can surface whatever
/// error type their underlying call (network client, subprocess, ...) uses.
pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

/// The slow or flaky call whose result is being cached.
///
/// A producer is invoked off the reader path: on the background refresh
/// schedule and on explicit forced refreshes. It takes `&mut self` so it may
/// own connections, counters, or other caller state; the cache guarantees at
/// most one invocation is in flight at a time, so that state is never
/// entered concurrently.
pub trait Producer: Send {
    type Output;

    fn produce(&mut self) -> Result<Self::Output, ProducerError>;
}

/// Plain closures are producers. `FnMut` rather than `Fn` so closures can
/// mutate captured state between invocations.
impl<T, F> Producer for F
where
    F: FnMut() -> Result<T, ProducerError> + Send,
{
    type Output = T;

    fn produce(&mut self) -> Result<T, ProducerError> {
        (*self)()
    }
}

/// Stored failure of a producer invocation that panicked instead of
/// returning an error. The panic payload's message is preserved.
#[derive(Debug, Error)]
#[error("producer panicked: {0}")]
pub struct ProducerPanicked(pub String);
