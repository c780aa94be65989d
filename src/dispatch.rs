use crate::client::Siteline;
use crate::constants::SHUTDOWN_TIMEOUT;
use crate::error::SitelineError;
use crate::types::PageviewData;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, warn};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Fire-and-forget front for a [`Siteline`] tracker.
///
/// Events go into a bounded queue drained by a fixed set of worker threads,
/// each calling [`Siteline::track`]. When the queue is full new events are
/// dropped, so callers never block and pending work never grows unbounded.
pub struct Dispatcher {
    tracker: Arc<Siteline>,
    sender: Mutex<Option<SyncSender<PageviewData>>>,
    queue: Arc<Queue>,
    closed: AtomicBool,
    // Worker handles — joined on shutdown, detached on drop
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Queue {
    rx: Mutex<Receiver<PageviewData>>,
    // Set once on close; queued events past it are dropped unsent
    deadline: OnceLock<Instant>,
}

impl Queue {
    fn expired(&self) -> bool {
        self.deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }
}

impl Dispatcher {
    /// Start `workers` threads sharing a queue of `capacity` events.
    pub fn new(
        tracker: Arc<Siteline>,
        capacity: usize,
        workers: usize,
    ) -> Result<Self, SitelineError> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let queue = Arc::new(Queue {
            rx: Mutex::new(rx),
            deadline: OnceLock::new(),
        });

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let queue = Arc::clone(&queue);
            let tracker = Arc::clone(&tracker);
            let handle = thread::Builder::new()
                .name(format!("siteline-dispatch-{i}"))
                .spawn(move || worker_loop(&queue, &tracker))
                .map_err(SitelineError::Spawn)?;
            handles.push(handle);
        }

        Ok(Self {
            tracker,
            sender: Mutex::new(Some(tx)),
            queue,
            closed: AtomicBool::new(false),
            workers: Mutex::new(handles),
        })
    }

    /// Queue an event for sending. Returns `false` if it was dropped because
    /// the queue is full or the dispatcher is shut down.
    pub fn dispatch(&self, data: PageviewData) -> bool {
        if self.closed.load(Ordering::Relaxed) {
            return false;
        }

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return false;
        };

        match tx.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(data)) => {
                if self.tracker.debug() {
                    warn!(target: "siteline", url = %data.url, "Dispatch queue full, dropping event");
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn tracker(&self) -> &Arc<Siteline> {
        &self.tracker
    }

    /// Stop accepting events and send what is queued, for at most
    /// [`SHUTDOWN_TIMEOUT`].
    pub fn shutdown(&self) {
        self.shutdown_timeout(SHUTDOWN_TIMEOUT);
    }

    /// Like [`shutdown`](Dispatcher::shutdown) with a caller-chosen budget.
    ///
    /// Returns once every worker has exited or `budget` has elapsed. Events
    /// still queued at that point are dropped; a worker blocked in a send is
    /// left to finish it in the background.
    pub fn shutdown_timeout(&self, budget: Duration) {
        let Some(deadline) = self.close(budget) else {
            return; // Already closed
        };

        let mut handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                handles.into_iter().partition(JoinHandle::is_finished);
            for handle in finished {
                let _ = handle.join();
            }
            handles = running;

            if handles.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        if self.tracker.debug() {
            warn!(
                target: "siteline",
                workers = handles.len(),
                "Shutdown timed out, detaching dispatch workers"
            );
        }
    }

    /// Refuse new events and start the drain deadline. `None` if the
    /// dispatcher was already closed.
    fn close(&self, budget: Duration) -> Option<Instant> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return None;
        }

        let deadline = Instant::now() + budget;
        let _ = self.queue.deadline.set(deadline);

        // Dropping the sender ends each worker once the queue is empty
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        Some(deadline)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Workers finish the queue (up to the deadline) without blocking the dropper
        self.close(SHUTDOWN_TIMEOUT);
    }
}

fn worker_loop(queue: &Queue, tracker: &Siteline) {
    let mut expired = 0usize;
    loop {
        let next = queue.rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(data) = next else {
            break; // sender dropped and queue drained
        };

        if queue.expired() {
            expired += 1;
            continue;
        }

        // A panicking transport must not take the worker down with it
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| tracker.track(data))) {
            error!(
                target: "siteline",
                "Tracking panicked: {}",
                panic_message(&*payload)
            );
        }
    }

    if expired > 0 && tracker.debug() {
        warn!(target: "siteline", dropped = expired, "Shutdown deadline passed, dropping queued events");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
