//! Deadline-bounded collaborator calls on a bounded worker pool

use crate::error::{StegoError, StegoResult};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    jobs: Mutex<Receiver<Job>>,
    live: AtomicUsize,
    idle: AtomicUsize,
}

/// Runs collaborator calls on at most `max_workers` long-lived threads.
///
/// Each call waits at most `timeout` for its result. A call that overruns
/// keeps its worker until it returns; once every worker is occupied and the
/// queue is full, new calls are refused as busy instead of adding threads.
/// Timeouts, panics, refusals and collaborator errors all surface as
/// [`StegoError::ExternalServiceUnavailable`].
pub struct CallGuard {
    label: String,
    timeout: Duration,
    max_workers: usize,
    spawned: Mutex<usize>,
    queue: SyncSender<Job>,
    shared: Arc<Shared>,
}

impl CallGuard {
    pub fn new(label: impl Into<String>, max_workers: usize, timeout: Duration) -> Self {
        let max_workers = max_workers.max(1);
        let (queue, jobs) = mpsc::sync_channel(max_workers);

        Self {
            label: label.into(),
            timeout,
            max_workers,
            spawned: Mutex::new(0),
            queue,
            shared: Arc::new(Shared {
                jobs: Mutex::new(jobs),
                live: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Worker threads currently alive, hung ones included
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Run `call` for `service` and wait for it within the deadline
    pub fn call<T, F>(&self, service: &str, call: F) -> StegoResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> StegoResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(call));
            let _ = tx.send(outcome);
        });

        self.ensure_worker(service)?;

        match self.queue.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(service, workers = self.max_workers, "collaborator pool busy");
                return Err(StegoError::unavailable(
                    service,
                    format!("busy: all {} workers occupied", self.max_workers),
                ));
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(StegoError::unavailable(service, "worker pool stopped"));
            }
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err @ StegoError::ExternalServiceUnavailable { .. }))) => Err(err),
            Ok(Ok(Err(err))) => Err(StegoError::unavailable(service, err.to_string())),
            Ok(Err(_)) => Err(StegoError::unavailable(service, "call panicked")),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    service,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "collaborator timed out"
                );
                Err(StegoError::unavailable(
                    service,
                    format!("no response within {} ms", self.timeout.as_millis()),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => Err(StegoError::unavailable(
                service,
                "call ended without a result",
            )),
        }
    }

    /// Start another worker when none is idle and the cap allows it
    fn ensure_worker(&self, service: &str) -> StegoResult<()> {
        let mut spawned = self.spawned.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shared.idle.load(Ordering::SeqCst) > 0 || *spawned >= self.max_workers {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        shared.live.fetch_add(1, Ordering::SeqCst);
        let spawn = thread::Builder::new()
            .name(format!("{}-worker-{}", self.label, *spawned))
            .spawn(move || worker_loop(shared));

        match spawn {
            Ok(_) => {
                *spawned += 1;
                debug!(label = %self.label, workers = *spawned, "collaborator worker started");
                Ok(())
            }
            Err(e) => {
                self.shared.live.fetch_sub(1, Ordering::SeqCst);
                Err(StegoError::unavailable(service, format!("spawn failed: {}", e)))
            }
        }
    }
}

/// Take jobs until the guard (and with it the queue sender) is dropped
fn worker_loop(shared: Arc<Shared>) {
    loop {
        shared.idle.fetch_add(1, Ordering::SeqCst);
        let job = shared
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        shared.idle.fetch_sub(1, Ordering::SeqCst);

        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
    shared.live.fetch_sub(1, Ordering::SeqCst);
}
