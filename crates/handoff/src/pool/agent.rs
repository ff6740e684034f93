//! The per-worker lifecycle thread and its claim protocol.
//!
//! An [`Agent`] owns one [`Worker`] on a dedicated thread. While idle, the
//! thread posts an [`Offer`] on the pool's shared registration channel and then
//! waits on its private handoff channel. A producer that claims the offer sends
//! its payload straight to that agent, so no payload is ever queued where two
//! agents could race for it.
//!
//! The handoff channel has zero capacity: a send completes only once the agent
//! has taken the payload. If the agent stops first, its receiver is dropped and
//! the producer gets the payload back.

use crate::{Error, Result, Worker};
use core::any::Any;
use crossbeam_channel::{Receiver, SendError, Sender, TryRecvError, select};
use std::thread::{self, JoinHandle};

/// An idle agent's claim ticket, posted on the shared registration channel.
///
/// Each offer is consumed at most once. An offer outliving its agent (left
/// behind when the agent stopped while waiting for a payload) rejects the
/// handoff with [`Error::WorkerClosed`].
pub(crate) struct Offer<P> {
    worker: usize,
    handoff: Sender<P>,
}

impl<P> Offer<P> {
    /// Index of the agent that posted this offer.
    pub(crate) const fn worker(&self) -> usize {
        self.worker
    }

    /// Hands `payload` to the agent behind this offer, blocking until it has
    /// been taken.
    ///
    /// On failure the payload is returned alongside the error so the caller
    /// can hand it to another agent.
    pub(crate) fn hand_off(self, payload: P) -> core::result::Result<(), (Error, P)> {
        self.handoff
            .send(payload)
            .map_err(|SendError(payload)| (Error::WorkerClosed, payload))
    }
}

/// Controller for one running agent thread.
///
/// The worker and the handoff receiver live on the agent's thread; this record
/// only keeps what is needed to stop the thread and wait for it.
pub(crate) struct Agent {
    index: usize,
    /// Dropping this sender is the stop signal.
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Agent {
    /// Spawns the agent thread for `worker` and starts posting offers on
    /// `offers`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread could not be created.
    pub(crate) fn start<P, W>(
        index: usize,
        worker: W,
        offers: Sender<Offer<P>>,
        builder: thread::Builder,
    ) -> Result<Self>
    where
        P: Send + 'static,
        W: Worker<P>,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let handle = builder.spawn(move || run(index, worker, offers, stop_rx))?;

        Ok(Self {
            index,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Asks the agent to stop at its next wait point. Idempotent.
    ///
    /// A payload that is already being processed is allowed to finish.
    pub(crate) fn stop(&mut self) {
        self.stop.take();
    }

    /// Blocks until the agent thread has exited.
    ///
    /// Returns `Ok(())` immediately if the agent was already joined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPanicked`] if the worker panicked.
    pub(crate) fn join(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.join().map_err(|payload| Error::WorkerPanicked {
            worker: self.index,
            message: panic_message(&*payload),
        })
    }
}

fn run<P, W>(index: usize, mut worker: W, offers: Sender<Offer<P>>, stop: Receiver<()>)
where
    W: Worker<P>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Agent {index} started");

    let (handoff_tx, handoff_rx) = crossbeam_channel::bounded::<P>(0);

    loop {
        // Both arms of the select below can be ready at once after a stop, so
        // check first to avoid offering ourselves again.
        if stop_requested(&stop) {
            break;
        }

        select! {
            send(offers, Offer { worker: index, handoff: handoff_tx.clone() }) -> res => {
                if res.is_err() {
                    break;
                }
            }
            recv(stop) -> _ => break,
        }

        select! {
            recv(handoff_rx) -> payload => match payload {
                Ok(payload) => worker.process(payload),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Agent {index} stopped");
}

fn stop_requested(stop: &Receiver<()>) -> bool {
    matches!(stop.try_recv(), Err(TryRecvError::Disconnected))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("non-string panic payload")
    }
}
