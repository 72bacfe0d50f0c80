/**
 * Background reaper that observes the outcome of asynchronous writes.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌──────────────┐   push_back    ┌────────────┐   pop_front   ┌────────────────┐
 *  │  send_async  │ ─────────────► │ WriteQueue │ ────────────► │ Reaper thread  │
 *  │ (any thread) │                └────────────┘               │ (one per       │
 *  └──────────────┘                                             │  transport)    │
 *                                                               └───────┬────────┘
 *                                                                       │ failures
 *                                                               ┌───────▼────────┐
 *                                                               │ ErrorObserver  │
 *                                                               └────────────────┘
 * ```
 *
 * Every `reap_interval` the reaper wakes up and resolves queued writes in
 * submission order, waiting on each in turn. A slow write at the head
 * delays when later outcomes are observed, not when they are sent.
 *
 * Shutdown goes through a `CancellationToken`. The reaper checks it when it
 * wakes and before every dequeue; anything still queued after cancellation
 * is abandoned without being waited on or reported.
 */
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use super::queue::{PendingWrite, WriteQueue};
use crate::error::{Error, Result};

/**
 * Callback receiving every failed asynchronous write, in submission order.
 *
 * Runs on the reaper thread with the queue unlocked, so it may call back
 * into the transport (including `send_async`). It should still return
 * quickly: the next drain waits for it.
 */
pub type ErrorObserver = Arc<dyn Fn(&Error) + Send + Sync>;

/// Default pause between two drains.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// DrainPolicy
// ---------------------------------------------------------------------------

/**
 * How long the reaper holds the queue lock.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Hold the lock for the whole batch visible when the drain starts.
    /// `send_async` callers wait behind slow writes. Failures are handed to
    /// the observer once the batch is done and the lock released.
    #[default]
    Batch,

    /// Take the lock only to pop one write, wait for it unlocked.
    PerWrite,
}

// ---------------------------------------------------------------------------
// CancellationToken
// ---------------------------------------------------------------------------

/**
 * Shared stop flag the reaper can also sleep on.
 *
 * Uses a `Mutex<bool>` + `Condvar` pair:
 * - The bool starts as `false`.
 * - `cancel()` sets it and wakes every sleeper.
 * - `wait_timeout()` sleeps up to the given duration, returning early on
 *   cancellation.
 */
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        if let Ok(mut cancelled) = flag.lock() {
            *cancelled = true;
            condvar.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        flag.lock().map(|cancelled| *cancelled).unwrap_or(true)
    }

    /**
     * Sleeps for `timeout` or until cancelled, whichever comes first.
     *
     * # Returns
     * `true` if the token is cancelled.
     */
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let Ok(guard) = flag.lock() else {
            return true;
        };

        match condvar.wait_timeout_while(guard, timeout, |cancelled| !*cancelled) {
            Ok((cancelled, _)) => *cancelled,
            Err(_) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

/// Settings the reaper thread runs with.
#[derive(Clone)]
pub struct ReaperConfig {
    pub interval: Duration,
    pub policy: DrainPolicy,
    pub observer: Option<ErrorObserver>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REAP_INTERVAL,
            policy: DrainPolicy::default(),
            observer: None,
        }
    }
}

/**
 * Handle to the reaper thread.
 *
 * Exactly one per asynchronous transport. `stop()` (also run on drop)
 * cancels the token and joins the thread.
 */
pub struct Reaper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /**
     * Spawns the reaper thread over `queue`.
     *
     * # Returns
     * `Err(Error::Configuration)` if the OS refuses to start the thread.
     */
    pub fn spawn(queue: Arc<WriteQueue>, config: ReaperConfig) -> Result<Self> {
        let token = CancellationToken::new();
        let thread_token = token.clone();

        let handle = thread::Builder::new()
            .name("influx-reaper".into())
            .spawn(move || {
                debug!(interval = ?config.interval, policy = ?config.policy, "reaper started");

                /*
                 * A panic inside the loop would otherwise kill the thread
                 * silently and leave writes unobserved forever.
                 */
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_loop(&queue, &thread_token, &config);
                }));

                if result.is_err() {
                    error!("reaper thread panicked, asynchronous write outcomes are no longer observed");
                }

                if !queue.is_empty() {
                    warn!(abandoned = queue.len(), "reaper stopped with unobserved writes");
                }
                debug!("reaper stopped");
            })
            .map_err(|e| Error::configuration(format!("failed to spawn reaper thread: {e}")))?;

        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels and joins. Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(queue: &WriteQueue, token: &CancellationToken, config: &ReaperConfig) {
    let observer = config.observer.as_ref();

    while !token.wait_timeout(config.interval) {
        match config.policy {
            DrainPolicy::Batch => {
                let mut failures = Vec::new();
                queue.drain_visible(|write| {
                    if let Err(err) = settle(write) {
                        failures.push(err);
                    }
                    !token.is_cancelled()
                });
                for err in &failures {
                    notify(observer, err);
                }
            }
            DrainPolicy::PerWrite => {
                while !token.is_cancelled() {
                    let Some(write) = queue.pop_front() else {
                        break;
                    };
                    if let Err(err) = settle(write) {
                        notify(observer, &err);
                    }
                }
            }
        }
    }
}

/// Waits for one write and logs how it went.
fn settle(write: PendingWrite) -> Result<()> {
    match write.wait() {
        Ok(_) => {
            trace!("asynchronous write acknowledged");
            Ok(())
        }
        Err(err) => {
            debug!(error = %err, "asynchronous write failed");
            Err(err)
        }
    }
}

/**
 * Hands one failure to the observer.
 *
 * A panicking observer is contained here; the reaper keeps going.
 */
fn notify(observer: Option<&ErrorObserver>, err: &Error) {
    let Some(observer) = observer else {
        return;
    };
    let result = panic::catch_unwind(AssertUnwindSafe(|| observer(err)));
    if result.is_err() {
        warn!("error observer panicked, continuing");
    }
}
