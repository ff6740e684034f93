//! Error types for the worker pool.
//!
//! ## Error Cases
//! - `PoolNotRunning`: work was submitted to a pool that has been closed.
//! - `WorkerClosed`: a payload was handed to an agent that has already stopped.
//! - `NoWorkers`: a pool was constructed without any workers.
//! - `Spawn`: the OS refused to start an agent thread.
//! - `WorkerPanicked`: a worker panicked while processing a payload.

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `handoff` can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The pool has been closed and no agent is left to accept work.
    ///
    /// Submitting to a closed pool is a usage bug, which is why
    /// [`Pool::process`] panics with this error rather than returning it.
    ///
    /// [`Pool::process`]: crate::Pool::process
    #[error("the pool is not running")]
    PoolNotRunning,

    /// The agent behind a claimed offer stopped before it took the payload.
    ///
    /// The pool absorbs this by claiming the next offer, so it never escapes
    /// [`Pool::try_process`].
    ///
    /// [`Pool::try_process`]: crate::Pool::try_process
    #[error("worker was closed")]
    WorkerClosed,

    /// A pool with no workers could never accept a payload.
    #[error("a pool needs at least one worker")]
    NoWorkers,

    /// Spawning an agent thread failed.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A worker panicked inside [`Worker::process`], ending its agent.
    ///
    /// [`Worker::process`]: crate::Worker::process
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Index of the worker within the pool.
        worker: usize,
        /// The panic message, if it was a string.
        message: String,
    },
}
