//! A fixed-size pool of thread workers fed by rendezvous.
//!
//! This module defines the [`Pool`], which owns one agent thread per
//! [`Worker`] and a bounded registration channel shared by all of them. Idle
//! agents post offers on that channel; [`Pool::process`] claims one and hands
//! the payload directly to the agent that posted it.
//!
//! Shutdown happens in two phases: every agent is told to stop, then every
//! agent is joined in the same order. Only then is the registration channel
//! drained, after which every call to [`Pool::process`] fails.

mod agent;
mod builder;
#[cfg(test)]
mod tests;

pub use builder::{DEFAULT_THREAD_PREFIX, PoolBuilder};

use crate::{Error, Result, Worker};
use agent::{Agent, Offer};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

/// A bounded pool of workers, each running on its own thread.
///
/// Producers on any number of threads may call [`process`](Pool::process)
/// concurrently. Each call blocks until some idle worker has accepted the
/// payload. No payload is delivered to more than one worker.
///
/// Dropping the pool closes it.
pub struct Pool<P> {
    /// Emptied by [`close`](Pool::close).
    agents: Mutex<Vec<Agent>>,
    /// Receiving end of the registration channel. The senders live on the
    /// agent threads, so the channel disconnects once every agent has exited.
    offers: Receiver<Offer<P>>,
    size: usize,
}

impl<P: Send + 'static> Pool<P> {
    /// Starts one agent per worker with default thread settings.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is empty or if an agent thread cannot be spawned.
    /// Use [`try_new`](Pool::try_new) to handle these cases.
    pub fn new<W, I>(workers: I) -> Self
    where
        W: Worker<P>,
        I: IntoIterator<Item = W>,
    {
        match Self::try_new(workers) {
            Ok(pool) => pool,
            Err(e) => panic!("failed to start pool: {e}"),
        }
    }

    /// Starts one agent per worker with default thread settings.
    ///
    /// # Errors
    ///
    /// - [`Error::NoWorkers`] if `workers` is empty.
    /// - [`Error::Spawn`] if an agent thread could not be spawned.
    pub fn try_new<W, I>(workers: I) -> Result<Self>
    where
        W: Worker<P>,
        I: IntoIterator<Item = W>,
    {
        PoolBuilder::new().build(workers)
    }
}

impl<P> Pool<P> {
    /// Returns a [`PoolBuilder`] for configuring agent threads.
    ///
    /// The payload type is fixed by the workers given to
    /// [`PoolBuilder::build`].
    pub fn builder() -> PoolBuilder<P> {
        PoolBuilder::new()
    }

    pub(crate) fn from_parts(agents: Vec<Agent>, offers: Receiver<Offer<P>>) -> Self {
        let size = agents.len();
        Self {
            agents: Mutex::new(agents),
            offers,
            size,
        }
    }

    /// Hands `payload` to the next idle worker, blocking until one accepts
    /// it.
    ///
    /// Returns once the worker has taken the payload, not once it has finished
    /// processing it.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::PoolNotRunning`] if the pool has been closed.
    pub fn process(&self, payload: P) {
        if let Err(e) = self.try_process(payload) {
            panic!("{e}");
        }
    }

    /// Fallible form of [`process`](Pool::process).
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolNotRunning`] once no agent is left to accept
    /// work. This includes a call that was already waiting when
    /// [`close`](Pool::close) began.
    pub fn try_process(&self, mut payload: P) -> Result<()> {
        loop {
            let offer = self.offers.recv().map_err(|_| Error::PoolNotRunning)?;
            let _worker = offer.worker();

            match offer.hand_off(payload) {
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Payload handed to worker {_worker}");
                    return Ok(());
                }
                // The agent stopped after posting this offer. Claim another.
                Err((_e, returned)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Skipping offer from worker {_worker}: {_e}");
                    payload = returned;
                }
            }
        }
    }

    /// Stops and joins every worker, then disconnects the registration
    /// channel.
    ///
    /// - Phase 1: signal every agent to stop. Payloads being processed are
    ///   allowed to finish.
    /// - Phase 2: join every agent, in the order signalled.
    /// - Finally, drop offers left behind by agents that stopped while idle.
    ///
    /// Calling `close` again is a no-op returning `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::WorkerPanicked`] observed. Every agent is
    /// joined regardless.
    pub fn close(&self) -> Result<()> {
        let mut agents = core::mem::take(&mut *self.agents.lock());
        if agents.is_empty() {
            return Ok(());
        }

        // === Phase 1: Signal ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Signalling {} workers to stop", agents.len());
        for agent in &mut agents {
            agent.stop();
        }

        // === Phase 2: Join ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Waiting for {} workers to exit", agents.len());
        let mut result = Ok(());
        for agent in &mut agents {
            if let Err(e) = agent.join() {
                #[cfg(feature = "tracing")]
                tracing::error!("{e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        let _stale = self.offers.try_iter().count();
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker pool closed ({_stale} stale offers dropped)");

        result
    }

    /// Number of workers the pool was built with.
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Always `false`: a pool is never built without workers.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of unclaimed offers, i.e. workers currently waiting for a
    /// payload. Never exceeds [`len`](Pool::len).
    ///
    /// While [`close`](Pool::close) is running, an agent that stopped while
    /// idle leaves its offer behind until every agent has been joined, so the
    /// count may include workers that have already exited. It is zero once
    /// `close` returns.
    pub fn idle(&self) -> usize {
        self.offers.len()
    }

    /// Whether [`close`](Pool::close) has not yet been called.
    pub fn is_running(&self) -> bool {
        !self.agents.lock().is_empty()
    }
}

impl<P> Drop for Pool<P> {
    fn drop(&mut self) {
        if let Err(_e) = self.close() {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker pool closed with error: {_e}");
        }
    }
}

impl<P> core::fmt::Debug for Pool<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.size)
            .field("idle", &self.idle())
            .field("running", &self.is_running())
            .finish()
    }
}
