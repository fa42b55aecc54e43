//! Deferred task execution for relaygate.
//!
//! A [`TaskRunner`] posts closures onto a FIFO queue; a [`TaskQueue`] runs
//! them later, one at a time, in posting order. The main use is
//! [`TaskRunner::delete_soon`]: handing an object to the queue so that it is
//! dropped on a later turn instead of inside the call that decided it was no
//! longer needed.
//!
//! # Driving the queue
//!
//! - [`TaskQueue::run`] is an async loop meant for a dedicated tokio task
//!   ([`TaskRunner::spawn`] sets that up).
//! - [`TaskQueue::run_until_idle`] drains synchronously. Tests use it to
//!   decide exactly when deferred work happens.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use relaygate_task::TaskRunner;
//!
//! let (runner, mut queue) = TaskRunner::new();
//! let ran = Arc::new(AtomicBool::new(false));
//!
//! let flag = Arc::clone(&ran);
//! runner.post_task(move || flag.store(true, Ordering::SeqCst));
//! assert!(!ran.load(Ordering::SeqCst), "nothing runs inline");
//!
//! queue.run_until_idle();
//! assert!(ran.load(Ordering::SeqCst));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Posts work to be run later on a [`TaskQueue`].
///
/// Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct TaskRunner {
    tx: mpsc::UnboundedSender<Task>,
    /// Deletions that found neither the queue nor a runtime. Dropped with
    /// the last runner clone.
    parked: Arc<Mutex<Vec<Task>>>,
}

/// The receiving side of a [`TaskRunner`].
pub struct TaskQueue {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl TaskRunner {
    /// Creates a runner and the queue it feeds.
    ///
    /// Nothing runs until the queue is driven.
    pub fn new() -> (Self, TaskQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Self {
            tx,
            parked: Arc::new(Mutex::new(Vec::new())),
        };
        (runner, TaskQueue { rx })
    }

    /// Creates a runner whose queue is driven by a new tokio task.
    ///
    /// The worker exits once every clone of the runner is dropped and the
    /// queue is empty.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (runner, queue) = Self::new();
        let handle = tokio::spawn(queue.run());
        (runner, handle)
    }

    /// Queues `task` to run after everything posted before it.
    ///
    /// Returns `false` if the queue is gone. The task is then dropped
    /// without running.
    pub fn post_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.tx.send(Box::new(task)) {
            Ok(()) => true,
            Err(_) => {
                debug!("task queue closed, dropping posted task");
                false
            }
        }
    }

    /// Drops `object` on a later turn of the queue.
    ///
    /// Never drops `object` before returning. If the queue is already gone,
    /// the drop goes to a task on the current tokio runtime instead; with no
    /// runtime either, `object` is parked until the last clone of this
    /// runner is dropped.
    pub fn delete_soon<T>(&self, object: T)
    where
        T: Send + 'static,
    {
        let Err(mpsc::error::SendError(task)) = self.tx.send(Box::new(move || drop(object)))
        else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("task queue closed, deleting on a runtime task");
                runtime.spawn(async move { task() });
            }
            Err(_) => {
                error!("task queue closed outside a runtime, parking object until the runner drops");
                self.parked
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(task);
            }
        }
    }

    /// Whether the queue side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl TaskQueue {
    /// Runs queued tasks until the queue is empty, including tasks posted by
    /// the tasks being run. Returns how many ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        trace!(ran, "task queue idle");
        ran
    }

    /// Runs tasks as they arrive until every [`TaskRunner`] is dropped.
    pub async fn run(mut self) {
        debug!("task queue started");
        while let Some(task) = self.rx.recv().await {
            task();
        }
        debug!("task queue stopped, all runners dropped");
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
