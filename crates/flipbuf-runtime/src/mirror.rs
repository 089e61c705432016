#![forbid(unsafe_code)]

//! A subscriber that keeps a materialized copy of the buffer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flipbuf_diff::{Diff, DiffType, apply};

use crate::buffer::Buffer;
use crate::subscriber::Subscriber;

/// Replays every diff onto a private copy of the collection.
///
/// After each completed batch the copy equals the buffer's front, provided
/// the mirror was seeded with the front it started from. [`Mirror::attach`]
/// does both steps atomically, even while a cycle is being delivered.
///
/// A diff that does not fit the copy marks the mirror as desynced and is
/// skipped; [`Mirror::reseed`] recovers.
#[derive(Debug)]
pub struct Mirror<T> {
    items: Mutex<Vec<T>>,
    desynced: AtomicBool,
    batches: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Mirror<T> {
    #[must_use]
    pub fn new(seed: Vec<T>) -> Self {
        Self {
            items: Mutex::new(seed),
            desynced: AtomicBool::new(false),
            batches: AtomicU64::new(0),
        }
    }

    /// Register with `buffer`, seeded from the collection its next diff
    /// will apply to.
    #[must_use]
    pub fn attach(buffer: &Buffer<T>) -> Arc<Self> {
        let mirror = Arc::new(Self::new(Vec::new()));
        buffer.register_seeded(&mirror, |m, front| m.reseed(front.to_vec()));
        mirror
    }

    /// Copy of the mirrored collection.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items().clone()
    }

    /// Replace the copy and clear the desynced flag.
    pub fn reseed(&self, seed: Vec<T>) {
        *self.items() = seed;
        self.desynced.store(false, Ordering::Release);
    }

    /// True once a diff failed to apply.
    #[must_use]
    pub fn is_desynced(&self) -> bool {
        self.desynced.load(Ordering::Acquire)
    }

    /// Completed batches seen.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    fn items(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Subscriber<T> for Mirror<T> {
    fn on_change(&self, diff_type: DiffType, index: usize, value: &T) {
        let diff = Diff {
            diff_type,
            index,
            value: value.clone(),
        };
        if let Err(err) = apply(&mut self.items(), std::slice::from_ref(&diff)) {
            tracing::warn!(%err, "mirror out of sync with buffer");
            self.desynced.store(true, Ordering::Release);
        }
    }

    fn did_change(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }
}
