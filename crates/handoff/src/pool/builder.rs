use super::{Pool, agent::Agent};
use crate::{Error, Result, Worker};
use core::{fmt, marker::PhantomData};
use std::thread;

/// Default prefix for agent thread names.
pub const DEFAULT_THREAD_PREFIX: &str = "handoff";

/// Configures the threads backing a [`Pool`] of `P` payloads.
///
/// The payload type is usually inferred from the workers passed to
/// [`build`](PoolBuilder::build).
///
/// Agent threads are named `"{prefix}-{index}"`, where `index` is the worker's
/// position in the sequence passed to `build`.
///
/// # Example
///
/// ```
/// use handoff::Pool;
///
/// let pool = Pool::builder()
///     .name("indexer")
///     .stack_size(256 * 1024)
///     .build((0..4).map(|_| |path: String| drop(path)))
///     .unwrap();
///
/// assert_eq!(pool.len(), 4);
/// pool.process(String::from("src/lib.rs"));
/// pool.close().unwrap();
/// ```
pub struct PoolBuilder<P> {
    name: String,
    stack_size: Option<usize>,
    _payload: PhantomData<fn(P)>,
}

impl<P> Default for PoolBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for PoolBuilder<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            stack_size: self.stack_size,
            _payload: PhantomData,
        }
    }
}

impl<P> fmt::Debug for PoolBuilder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("name", &self.name)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

impl<P> PoolBuilder<P> {
    /// Creates a builder with the default thread prefix and the platform's
    /// default stack size.
    pub fn new() -> Self {
        Self {
            name: String::from(DEFAULT_THREAD_PREFIX),
            stack_size: None,
            _payload: PhantomData,
        }
    }

    /// Sets the prefix used to name agent threads.
    pub fn name(mut self, prefix: impl Into<String>) -> Self {
        self.name = prefix.into();
        self
    }

    /// Sets the stack size, in bytes, of each agent thread.
    pub const fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Starts one agent per worker, all sharing a registration channel sized
    /// to the number of workers.
    ///
    /// If an agent fails to spawn, the agents already started are stopped and
    /// joined before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::NoWorkers`] if `workers` is empty.
    /// - [`Error::Spawn`] if an agent thread could not be spawned.
    pub fn build<W, I>(&self, workers: I) -> Result<Pool<P>>
    where
        P: Send + 'static,
        W: Worker<P>,
        I: IntoIterator<Item = W>,
    {
        let workers: Vec<W> = workers.into_iter().collect();
        if workers.is_empty() {
            return Err(Error::NoWorkers);
        }

        let (offers_tx, offers_rx) = crossbeam_channel::bounded(workers.len());
        let mut agents = Vec::with_capacity(workers.len());

        for (index, worker) in workers.into_iter().enumerate() {
            match Agent::start(index, worker, offers_tx.clone(), self.thread(index)) {
                Ok(agent) => agents.push(agent),
                Err(e) => {
                    drop(offers_tx);
                    if let Err(_close) = Pool::from_parts(agents, offers_rx).close() {
                        #[cfg(feature = "tracing")]
                        tracing::error!("Failed to unwind partially built pool: {_close}");
                    }
                    return Err(e);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Started {} workers as {}-*", agents.len(), self.name);

        Ok(Pool::from_parts(agents, offers_rx))
    }

    fn thread(&self, index: usize) -> thread::Builder {
        let builder = thread::Builder::new().name(format!("{}-{index}", self.name));
        match self.stack_size {
            Some(bytes) => builder.stack_size(bytes),
            None => builder,
        }
    }
}
