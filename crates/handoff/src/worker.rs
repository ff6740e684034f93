/// A unit of processing logic driven by a pool agent.
///
/// Each worker is owned by exactly one agent thread and is only ever handed
/// one payload at a time, so implementations may keep mutable state without
/// synchronization. Nothing is returned to the pool; results must travel
/// through a channel or shared state owned by the implementation.
///
/// Any `FnMut(P) + Send + 'static` closure is a worker.
///
/// # Example
///
/// ```
/// use handoff::{Pool, Worker};
/// use std::sync::mpsc;
///
/// struct Doubler {
///     results: mpsc::Sender<u64>,
/// }
///
/// impl Worker<u64> for Doubler {
///     fn process(&mut self, payload: u64) {
///         let _ = self.results.send(payload * 2);
///     }
/// }
///
/// let (tx, rx) = mpsc::channel();
/// let pool = Pool::new((0..2).map(|_| Doubler { results: tx.clone() }));
/// pool.process(21);
/// assert_eq!(rx.recv().unwrap(), 42);
/// pool.close().unwrap();
/// ```
pub trait Worker<P>: Send + 'static {
    /// Processes a single payload to completion.
    ///
    /// This runs on the agent's thread. The producer that submitted the
    /// payload has already returned by the time this is called.
    fn process(&mut self, payload: P);
}

impl<P, F> Worker<P> for F
where
    F: FnMut(P) + Send + 'static,
{
    fn process(&mut self, payload: P) {
        self(payload);
    }
}
