/**
 * Fixed pool of threads that put asynchronous writes on the wire.
 *
 * ```text
 *  ┌──────────────┐   unbounded channel   ┌──────────────────────┐
 *  │ send_async() │ ──────── Job ───────► │ influx-write-0 .. N  │ ── POST /write ──►
 *  │ (any thread) │                       └──────────┬───────────┘
 *  └──────────────┘                                  │ one-shot reply
 *                                                    ▼
 *                                              PendingWrite
 * ```
 *
 * Submitting never blocks: the channel is unbounded and a burst of writes
 * simply waits in it until a worker is free. The number of writes in flight
 * at once is capped by the pool size.
 *
 * Workers run until the channel disconnects, i.e. until the `Dispatcher` is
 * dropped, and finish the jobs already submitted before exiting.
 */
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, warn};

use super::executor::classify;
use super::http::{HttpClient, HttpRequest};
use super::queue::PendingWrite;
use crate::error::{Error, RequestOutcome, TransportCode};

/// Default number of dispatch workers per transport.
pub const DEFAULT_DISPATCH_WORKERS: usize = 4;

/**
 * One write handed to the pool.
 *
 * Carries its own client clone so the settings in effect at submission
 * (proxy, timeouts) are the ones the write is sent with.
 */
struct Job<C> {
    client: C,
    request: HttpRequest,
    reply: Sender<RequestOutcome>,
}

pub struct Dispatcher<C: HttpClient> {
    jobs: Sender<Job<C>>,
    workers: usize,
}

impl<C: HttpClient> Dispatcher<C> {
    /**
     * Starts `workers` threads (at least one).
     *
     * A worker the OS refuses to start is logged and skipped. With none
     * running, every `submit` resolves to a transport failure.
     */
    pub fn spawn(workers: usize) -> Self {
        let (jobs, receiver) = crossbeam_channel::unbounded::<Job<C>>();

        let mut started = 0;
        for index in 0..workers.max(1) {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("influx-write-{index}"))
                .spawn(move || run_worker(&receiver));

            match spawned {
                Ok(_) => started += 1,
                Err(e) => warn!(error = %e, "failed to spawn write dispatch worker"),
            }
        }

        if started == 0 {
            error!("no write dispatch worker is running, asynchronous writes will fail");
        } else {
            debug!(workers = started, "write dispatch pool started");
        }

        Self {
            jobs,
            workers: started,
        }
    }

    /// Workers that were actually started.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queues `request` for a worker and returns the handle to its outcome.
    pub fn submit(&self, client: C, request: HttpRequest) -> PendingWrite {
        let (reply, outcome) = crossbeam_channel::bounded(1);
        let job = Job {
            client,
            request,
            reply,
        };

        match self.jobs.send(job) {
            Ok(()) => PendingWrite::new(outcome),
            Err(_) => PendingWrite::resolved(Err(Error::transport(
                TransportCode::Other,
                "no write dispatch worker is running",
            ))),
        }
    }
}

fn run_worker<C: HttpClient>(jobs: &Receiver<Job<C>>) {
    while let Ok(job) = jobs.recv() {
        /* A panicking client fails its own write, not the worker. */
        let call = AssertUnwindSafe(|| classify(job.client.call(&job.request)));
        let outcome = panic::catch_unwind(call).unwrap_or_else(|_| {
            Err(Error::transport(
                TransportCode::Other,
                "http client panicked while sending the write",
            ))
        });

        /* The handle may be gone already (write abandoned); nothing to do then. */
        let _ = job.reply.send(outcome);
    }
}
