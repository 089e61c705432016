//! A subscriber that holds a cycle open until the test lets it go.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use flipbuf_diff::DiffType;
use flipbuf_runtime::Subscriber;

#[derive(Debug, Default)]
struct GateState {
    entered: usize,
    open: bool,
}

/// Blocks inside `will_change` while closed.
///
/// Typical use with an asynchronous buffer:
///
/// ```ignore
/// let gate = Arc::new(GateSubscriber::closed());
/// buffer.register_subscriber(&gate);
/// buffer.set_collection(a)?;                 // worker parks in will_change
/// assert!(gate.wait_entered(1, timeout));
/// buffer.set_collection(b)?;                 // coalesced
/// gate.open();
/// ```
///
/// Once opened the gate stays open. Never register a closed gate on a
/// synchronous buffer: the publishing thread would park on itself.
#[derive(Debug, Default)]
pub struct GateSubscriber {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GateSubscriber {
    #[must_use]
    pub fn closed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn opened() -> Self {
        let gate = Self::default();
        gate.open();
        gate
    }

    /// Let current and future cycles through.
    pub fn open(&self) {
        self.state().open = true;
        self.changed.notify_all();
    }

    /// Number of `will_change` calls seen so far.
    pub fn entered(&self) -> usize {
        self.state().entered
    }

    /// Wait until at least `count` cycles have reached the gate.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        while state.entered < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Subscriber<T> for GateSubscriber {
    fn will_change(&self) {
        let mut state = self.state();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        tracing::trace!(entered = state.entered, "gate passed");
    }

    fn on_change(&self, _: DiffType, _: usize, _: &T) {}
}
