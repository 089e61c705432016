#![forbid(unsafe_code)]

//! Dedicated reconcile thread for asynchronous buffers.
//!
//! One [`ReconcileWorker`] is owned by each asynchronous [`Buffer`] and
//! reused for every cycle, instead of spawning a thread per publish.
//!
//! # Coalescing Rules
//!
//! - **Reconcile** signals are coalesced: if several arrive before the
//!   worker wakes, the job runs once.
//! - The signal channel holds a single message. The buffer only signals
//!   when no cycle is in flight, so the slot is normally free.
//! - **Shutdown** ends the loop after any pending reconcile has run.
//!
//! # Failure
//!
//! A panic inside the job is caught and logged; the worker keeps serving.
//! If the thread has exited anyway, signals fail with `SendError` and the
//! buffer starts a new worker.
//!
//! [`Buffer`]: crate::Buffer

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Capacity of the signal queue.
const SIGNAL_CAPACITY: usize = 1;

/// Messages sent from the buffer to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerMsg {
    /// Run reconciliation cycles until none is pending.
    Reconcile,
    /// Exit the loop.
    Shutdown,
}

/// Handle to a running reconcile thread.
pub(crate) struct ReconcileWorker {
    sender: mpsc::SyncSender<WorkerMsg>,
    handle: Option<JoinHandle<()>>,
}

impl ReconcileWorker {
    /// Spawn the worker thread. `job` runs once per (coalesced) signal.
    pub(crate) fn start<F>(name: &str, job: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<WorkerMsg>(SIGNAL_CAPACITY);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || reconcile_loop(rx, job))?;

        tracing::debug!(worker = name, "reconcile worker started");

        Ok(Self {
            sender: tx,
            handle: Some(handle),
        })
    }

    /// Ask the worker to reconcile.
    ///
    /// Returns `Err` if the worker has exited.
    pub(crate) fn signal(&self) -> Result<(), mpsc::SendError<WorkerMsg>> {
        self.sender.send(WorkerMsg::Reconcile)
    }

    fn stop(&mut self) {
        let _ = self.sender.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            // The last buffer handle can be dropped from inside a callback
            // running on this very worker; joining would wait on ourselves.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for ReconcileWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The worker's main loop.
///
/// Blocks for a message, drains whatever else is queued, runs the job once
/// if any reconcile was requested, and exits after a shutdown.
fn reconcile_loop<F: Fn()>(rx: mpsc::Receiver<WorkerMsg>, job: F) {
    loop {
        let first = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => return, // Sender dropped, exit cleanly.
        };

        let mut reconcile = false;
        let mut shutdown = false;
        for msg in std::iter::once(first).chain(rx.try_iter()) {
            match msg {
                WorkerMsg::Reconcile => reconcile = true,
                WorkerMsg::Shutdown => shutdown = true,
            }
        }

        if reconcile && panic::catch_unwind(AssertUnwindSafe(&job)).is_err() {
            tracing::warn!("reconcile job panicked; worker continues");
        }
        if shutdown {
            return;
        }
    }
}
