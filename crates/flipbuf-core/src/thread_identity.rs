#![forbid(unsafe_code)]

//! Home-thread identity for single-writer contracts.
//!
//! A [`HomeThread`] records which thread created its owner and answers
//! whether the calling thread is that thread. The identity source is a
//! trait object so tests can substitute a controllable implementation
//! instead of spawning real threads.
//!
//! # Invariants
//!
//! 1. The home thread is captured exactly once, at construction.
//! 2. [`HomeThread::check`] never panics; a mismatch is reported as
//!    [`BufferError::WrongThread`].

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::error::{BufferError, Result};
#[cfg(feature = "tracing")]
use crate::logging::warn;
#[cfg(not(feature = "tracing"))]
use crate::warn;

/// Source of "which thread is running this code".
pub trait ThreadIdentity: Send + Sync {
    fn current(&self) -> ThreadId;
}

/// The real identity source: `std::thread::current().id()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentThread;

impl ThreadIdentity for CurrentThread {
    fn current(&self) -> ThreadId {
        thread::current().id()
    }
}

/// The thread allowed to perform mutating calls on its owner.
#[derive(Clone)]
pub struct HomeThread {
    home: ThreadId,
    identity: Arc<dyn ThreadIdentity>,
}

impl HomeThread {
    /// Capture the calling thread as home.
    #[must_use]
    pub fn capture() -> Self {
        Self::capture_with(Arc::new(CurrentThread))
    }

    /// Capture home through a custom identity source.
    #[must_use]
    pub fn capture_with(identity: Arc<dyn ThreadIdentity>) -> Self {
        Self {
            home: identity.current(),
            identity,
        }
    }

    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.home
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.identity.current() == self.home
    }

    /// `Ok(())` on the home thread, [`BufferError::WrongThread`] elsewhere.
    pub fn check(&self) -> Result<()> {
        let caller = self.identity.current();
        if caller == self.home {
            Ok(())
        } else {
            warn!(home = ?self.home, caller = ?caller, "mutating call off the home thread");
            Err(BufferError::wrong_thread(self.home, caller))
        }
    }
}

impl fmt::Debug for HomeThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeThread")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}
