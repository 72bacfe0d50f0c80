/*!
 * Pending asynchronous writes and the queue that holds them.
 *
 * ```text
 *  ┌──────────────┐  dispatch   ┌──────────────────┐
 *  │ send_async() │ ──────────► │ dispatch worker  │ ── POST /write ──► server
 *  │ (any thread) │             └────────┬─────────┘
 *  └──────┬───────┘                      │ one-shot channel
 *         │ push_back                    ▼
 *  ┌──────▼──────────────────────────────────────┐
 *  │ WriteQueue: Mutex<VecDeque<PendingWrite>>   │ ◄── pop_front ── reaper
 *  └─────────────────────────────────────────────┘
 * ```
 *
 * The write is on the wire as soon as it is dispatched. The queue only
 * tracks who still has to look at the outcome.
 */
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Receiver;

use crate::error::{Error, RequestOutcome, TransportCode};

// ---------------------------------------------------------------------------
// PendingWrite
// ---------------------------------------------------------------------------

/**
 * Handle to one in-flight write.
 *
 * Move-only: it stands for a single network operation and is consumed by
 * `wait`. Dropping it without waiting abandons the outcome, not the
 * request.
 */
pub struct PendingWrite {
    outcome: Receiver<RequestOutcome>,
}

impl PendingWrite {
    /// Handle resolved by whoever holds the sending half of `outcome`.
    pub fn new(outcome: Receiver<RequestOutcome>) -> Self {
        Self { outcome }
    }

    /// Wraps an already known outcome.
    pub fn resolved(outcome: RequestOutcome) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let _ = sender.send(outcome);
        Self { outcome: receiver }
    }

    /// Whether the outcome is available without blocking.
    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        !self.outcome.is_empty()
    }

    /**
     * Blocks until the write completes and returns its classified outcome.
     *
     * A dispatch worker that went away before reporting shows up as a
     * transport failure.
     */
    pub fn wait(self) -> RequestOutcome {
        self.outcome.recv().unwrap_or_else(|_| {
            Err(Error::transport(
                TransportCode::Other,
                "write dispatch terminated without a result",
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// WriteQueue
// ---------------------------------------------------------------------------

/**
 * FIFO of writes whose outcome has not been observed yet.
 *
 * Every access goes through one mutex. Writers append at the tail; only the
 * reaper removes, always from the front. An empty queue is the steady state.
 */
#[derive(Default)]
pub struct WriteQueue {
    inner: Mutex<VecDeque<PendingWrite>>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, write: PendingWrite) {
        self.lock().push_back(write);
    }

    pub fn pop_front(&self) -> Option<PendingWrite> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /**
     * Holds the lock while handing front elements to `f`, until the queue
     * is empty or `f` returns `false`.
     *
     * Writers calling `push` block for as long as this runs. Writes
     * appended by other threads before the lock was taken are part of the
     * batch; nothing can be appended while it runs.
     *
     * Returns how many writes were handed out.
     */
    pub fn drain_visible<F>(&self, mut f: F) -> usize
    where
        F: FnMut(PendingWrite) -> bool,
    {
        let mut queue = self.lock();
        let mut drained = 0;
        while let Some(write) = queue.pop_front() {
            drained += 1;
            if !f(write) {
                break;
            }
        }
        drained
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingWrite>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
