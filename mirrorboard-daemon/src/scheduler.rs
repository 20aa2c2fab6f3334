//! Debounced executor for reconciliation passes.
//!
//! At most one batch is in flight (whatever the single worker is running) and
//! at most one is pending. Triggers that arrive while a batch is pending fold
//! into it: the newest arguments win and every caller waiting on the folded
//! triggers receives the result of the one run that serves them.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use crate::error::DaemonError;

struct Pending<A, R> {
    args: A,
    waiters: Vec<oneshot::Sender<R>>,
}

struct State<A, R> {
    pending: Option<Pending<A, R>>,
    closed: bool,
}

struct Shared<A, R> {
    state: Mutex<State<A, R>>,
    wake: Notify,
}

impl<A, R> Shared<A, R> {
    fn close(&self) {
        let dropped = {
            let mut state = self.state.lock();
            state.closed = true;
            state.pending.take()
        };
        if let Some(pending) = dropped {
            tracing::debug!(waiters = pending.waiters.len(), "scheduler closed with pending batch");
        }
        self.wake.notify_one();
    }
}

/// Producer handle. Cheap to clone; every trigger source holds one.
pub struct Scheduler<A, R> {
    shared: Arc<Shared<A, R>>,
}

impl<A, R> Clone for Scheduler<A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, R> Scheduler<A, R>
where
    A: Send,
    R: Clone + Send,
{
    /// Create a scheduler and the worker half that drains it.
    pub fn new() -> (Self, SchedulerWorker<A, R>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                pending: None,
                closed: false,
            }),
            wake: Notify::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            SchedulerWorker { shared },
        )
    }

    /// Register a trigger without waiting for it.
    ///
    /// The returned receiver resolves with the result of the run that serves
    /// this trigger, or errors if the scheduler closes first. Dropping it is
    /// fine for fire-and-forget sources such as the timer.
    pub fn enqueue(&self, args: A) -> oneshot::Receiver<R> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return rx;
            }
            match state.pending.as_mut() {
                Some(pending) => {
                    pending.args = args;
                    pending.waiters.push(tx);
                }
                None => {
                    state.pending = Some(Pending {
                        args,
                        waiters: vec![tx],
                    });
                }
            }
        }
        self.shared.wake.notify_one();
        rx
    }

    /// Register a trigger and wait for the run that serves it.
    pub async fn trigger(&self, args: A) -> Result<R, DaemonError> {
        self.enqueue(args)
            .await
            .map_err(|_| DaemonError::ChannelClosed("pass scheduler"))
    }

    /// Stop accepting triggers. Pending waiters are released with an error.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Whether a batch is waiting for the worker.
    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }
}

/// Consumer half. Exactly one exists per scheduler; dropping it closes the
/// scheduler.
pub struct SchedulerWorker<A, R> {
    shared: Arc<Shared<A, R>>,
}

impl<A, R> SchedulerWorker<A, R> {
    /// Wait for the next batch. `None` once the scheduler is closed.
    pub async fn next(&mut self) -> Option<Batch<A, R>> {
        loop {
            {
                let mut state = self.shared.state.lock();
                if let Some(pending) = state.pending.take() {
                    return Some(Batch {
                        args: pending.args,
                        waiters: pending.waiters,
                    });
                }
                if state.closed {
                    return None;
                }
            }
            self.shared.wake.notified().await;
        }
    }
}

impl<A, R> Drop for SchedulerWorker<A, R> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Triggers folded into one run.
#[derive(Debug)]
pub struct Batch<A, R> {
    pub args: A,
    waiters: Vec<oneshot::Sender<R>>,
}

impl<A, R: Clone> Batch<A, R> {
    /// Number of callers this run will release.
    pub fn waiters(&self) -> usize {
        self.waiters.len()
    }

    /// Hand `result` to every folded caller.
    pub fn complete(self, result: R) {
        for waiter in self.waiters {
            let _ = waiter.send(result.clone());
        }
    }
}
