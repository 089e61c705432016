//! Controllable thread identity.

use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use flipbuf_core::ThreadIdentity;

/// Reports whatever thread the test last pointed it at.
///
/// Starts out reporting the constructing thread, so a buffer built with it
/// (`Buffer::with_thread_identity`) has that thread as home.
#[derive(Debug)]
pub struct MockThreadIdentity {
    current: Mutex<ThreadId>,
    origin: ThreadId,
}

impl Default for MockThreadIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MockThreadIdentity {
    #[must_use]
    pub fn new() -> Self {
        let origin = thread::current().id();
        Self {
            current: Mutex::new(origin),
            origin,
        }
    }

    pub fn set(&self, id: ThreadId) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    /// Report a thread that is neither the origin nor any live thread.
    /// Returns the id now being reported.
    pub fn impersonate_foreign(&self) -> ThreadId {
        let foreign = thread::scope(|s| s.spawn(|| thread::current().id()).join())
            .unwrap_or(self.origin);
        self.set(foreign);
        foreign
    }

    /// Report the constructing thread again.
    pub fn restore(&self) {
        self.set(self.origin);
    }

    #[must_use]
    pub fn origin(&self) -> ThreadId {
        self.origin
    }
}

impl ThreadIdentity for MockThreadIdentity {
    fn current(&self) -> ThreadId {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
