#![forbid(unsafe_code)]

//! The double-buffered publisher.
//!
//! ```text
//!  home thread                       reconcile (inline or worker)
//!  ───────────                       ────────────────────────────
//!  set_collection(v) ─▶ back = v
//!                   └─▶ request ──▶  candidate = sort(back)
//!                                    script = diff(front, candidate)
//!                                    will_change*   (if non-empty)
//!                                    front = candidate
//!                                    on_change*     (per diff)
//!                                    did_change*    (if non-empty)
//!                                    repeat while a publish arrived
//! ```
//!
//! # Locks
//!
//! Each piece of state has its own lock, and none is held while another
//! thread could be waiting on user code:
//!
//! - `back`: held only to replace or clone the pending collection.
//! - `front`: an [`ArcSwap`]; readers never block.
//! - `reconcile`: held for the duration of a cycle; serializes cycles.
//! - `flags`: the computing / recompute-requested pair plus the idle
//!   condvar. Decides between starting and coalescing.
//! - `registry`: the subscriber set plus the candidate being announced.
//!   Snapshotted once per cycle, so registration never waits on a diff and
//!   will/did pairs are never split.
//!
//! Poisoned locks (a subscriber panicked mid-cycle) are recovered by taking
//! the inner state.
//!
//! # Failure Modes
//!
//! - A subscriber panic in synchronous mode unwinds out of
//!   [`Buffer::set_collection`]. In asynchronous mode it is caught on the
//!   worker. Either way the in-flight flags are reset, so the next publish
//!   starts a fresh cycle; requests coalesced into the failed cycle are
//!   dropped, but `back` still holds the latest collection.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use arc_swap::ArcSwap;
use flipbuf_core::{BufferError, HomeThread, Result, ThreadIdentity};
use flipbuf_diff::EditScript;

use crate::config::BufferConfig;
use crate::reconcile_worker::ReconcileWorker;
use crate::subscriber::{Subscriber, SubscriberSet};

/// Element equivalence used by the edit-script engine.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Ordering step applied to `back` before diffing.
pub type SortFn<T> = Arc<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>;

/// What a publish did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Synchronous mode: every cycle, including follow-ups, has run and all
    /// subscribers have been notified.
    Completed,
    /// Asynchronous mode: the worker was signalled to start a cycle.
    Scheduled,
    /// A cycle was already in flight; it will run one more cycle against
    /// the latest collection.
    Coalesced,
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Reconciliation cycles run, including those with no changes.
    pub cycles: u64,
    /// Publishes folded into an in-flight cycle.
    pub coalesced_requests: u64,
    /// Diffs delivered (counted once per diff, not per subscriber).
    pub diffs_emitted: u64,
    /// Cycles whose script was empty, so no callbacks ran.
    pub notifications_skipped: u64,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    coalesced_requests: AtomicU64,
    diffs_emitted: AtomicU64,
    notifications_skipped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BufferStats {
        BufferStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            diffs_emitted: self.diffs_emitted.load(Ordering::Relaxed),
            notifications_skipped: self.notifications_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    computing: bool,
    recompute_requested: bool,
}

impl Flags {
    fn busy(&self) -> bool {
        self.computing || self.recompute_requested
    }
}

struct Delegates<T> {
    compare: CompareFn<T>,
    sort: Option<SortFn<T>>,
}

impl<T> Clone for Delegates<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
            sort: self.sort.clone(),
        }
    }
}

struct ReconcileState<T> {
    script: EditScript<T>,
    cycle: u64,
}

struct Registry<T> {
    subscribers: SubscriberSet<T>,
    /// Candidate of the cycle between its subscriber snapshot and the end
    /// of delivery. Late registrants are seeded from it, since they will
    /// not hear that cycle's diffs.
    announcing: Option<Arc<Vec<T>>>,
}

struct Shared<T> {
    back: Mutex<Vec<T>>,
    front: ArcSwap<Vec<T>>,
    reconcile: Mutex<ReconcileState<T>>,
    flags: Mutex<Flags>,
    idle: Condvar,
    delegates: Mutex<Delegates<T>>,
    registry: Mutex<Registry<T>>,
    counters: Counters,
}

fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets the in-flight flags if a cycle unwinds.
struct CycleGuard<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Drop for CycleGuard<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            lock(&self.shared.registry).announcing = None;
            let mut flags = lock(&self.shared.flags);
            *flags = Flags::default();
            drop(flags);
            self.shared.idle.notify_all();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    /// Run cycles until no request is pending, then mark idle.
    ///
    /// Called with `computing` already set by the caller.
    fn run_cycles(&self) {
        let _guard = CycleGuard { shared: self };
        loop {
            {
                let mut flags = lock(&self.flags);
                if !flags.recompute_requested {
                    flags.computing = false;
                    drop(flags);
                    self.idle.notify_all();
                    return;
                }
                flags.recompute_requested = false;
            }
            self.reconcile_once();
        }
    }

    fn reconcile_once(&self) {
        let mut state = lock(&self.reconcile);
        state.cycle += 1;
        let cycle = state.cycle;
        let _span = tracing::debug_span!("reconcile", cycle).entered();

        let Delegates { compare, sort } = lock(&self.delegates).clone();
        let back = lock(&self.back).clone();
        let candidate = Arc::new(match sort {
            Some(sort) => sort(back),
            None => back,
        });
        let front = self.front.load_full();
        tracing::debug!(
            cycle,
            front_len = front.len(),
            candidate_len = candidate.len(),
            "cycle started"
        );

        state
            .script
            .compute_by_into(&front, &candidate, |a, b| compare(a, b));
        let subscribers = {
            let mut registry = lock(&self.registry);
            registry.announcing = Some(Arc::clone(&candidate));
            registry.subscribers.snapshot()
        };
        let changed = !state.script.is_empty();
        let front_len = candidate.len();

        if changed {
            for subscriber in &subscribers {
                subscriber.will_change();
            }
        }

        self.front.store(Arc::clone(&candidate));

        for diff in &state.script {
            for subscriber in &subscribers {
                subscriber.on_change(diff.diff_type, diff.index, &diff.value);
            }
        }

        if changed {
            for subscriber in &subscribers {
                subscriber.did_change();
            }
        }
        lock(&self.registry).announcing = None;
        if !changed {
            self.counters
                .notifications_skipped
                .fetch_add(1, Ordering::Relaxed);
        }

        let diffs = state.script.len();
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        self.counters
            .diffs_emitted
            .fetch_add(diffs as u64, Ordering::Relaxed);
        tracing::debug!(
            cycle,
            diffs,
            front_len,
            subscribers = subscribers.len(),
            "cycle finished"
        );
    }
}

/// Double-buffered collection publisher.
///
/// The producer (the *home* thread, whichever thread built the buffer)
/// publishes whole collections with [`set_collection`](Self::set_collection).
/// Each publish is reconciled against the last announced version and the
/// difference is delivered to every registered [`Subscriber`] as an ordered
/// batch of positional diffs.
///
/// Share a buffer across threads with `Arc<Buffer<T>>`; every method takes
/// `&self`.
///
/// ```ignore
/// let buffer = Buffer::new();
/// let mirror = Mirror::attach(&buffer);
/// buffer.set_collection(vec![3, 1, 2])?;
/// assert_eq!(mirror.snapshot(), vec![3, 1, 2]);
/// ```
pub struct Buffer<T> {
    shared: Arc<Shared<T>>,
    home: HomeThread,
    asynchronous: AtomicBool,
    worker_name: String,
    worker: Mutex<Option<ReconcileWorker>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Buffer<T> {
    /// Synchronous buffer comparing elements with `==`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Buffer comparing elements with `==`.
    #[must_use]
    pub fn with_config(config: BufferConfig) -> Self {
        Self::with_compare(|a: &T, b: &T| a == b, config)
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Default for Buffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Buffer<T> {
    /// Buffer using a custom equivalence predicate. The calling thread
    /// becomes the home thread.
    #[must_use]
    pub fn with_compare(
        compare: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
        config: BufferConfig,
    ) -> Self {
        let shared = Shared {
            back: Mutex::new(Vec::new()),
            front: ArcSwap::from_pointee(Vec::new()),
            reconcile: Mutex::new(ReconcileState {
                script: EditScript::new(),
                cycle: 0,
            }),
            flags: Mutex::new(Flags::default()),
            idle: Condvar::new(),
            delegates: Mutex::new(Delegates {
                compare: Arc::new(compare),
                sort: None,
            }),
            registry: Mutex::new(Registry {
                subscribers: SubscriberSet::new(),
                announcing: None,
            }),
            counters: Counters::default(),
        };
        Self {
            shared: Arc::new(shared),
            home: HomeThread::capture(),
            asynchronous: AtomicBool::new(config.asynchronous),
            worker_name: config.worker_name,
            worker: Mutex::new(None),
        }
    }

    /// Re-capture the home thread through `identity`.
    #[must_use]
    pub fn with_thread_identity(mut self, identity: Arc<dyn ThreadIdentity>) -> Self {
        self.home = HomeThread::capture_with(identity);
        self
    }

    // ── Subscribers ─────────────────────────────────────────────────────

    /// Register `subscriber` for future cycles. Returns false if it was
    /// already registered.
    ///
    /// The buffer keeps only a weak handle: dropping the last `Arc`
    /// unsubscribes. A subscriber registered while a cycle runs first hears
    /// from the next cycle.
    pub fn register_subscriber<S>(&self, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber<T> + 'static,
    {
        let handle: Arc<dyn Subscriber<T>> = subscriber.clone();
        self.register_dyn(&handle)
    }

    /// [`register_subscriber`](Self::register_subscriber) for an already
    /// type-erased handle.
    pub fn register_dyn(&self, subscriber: &Arc<dyn Subscriber<T>>) -> bool {
        lock(&self.shared.registry).subscribers.insert(subscriber)
    }

    /// Register `subscriber` and hand `seed` the collection it starts from.
    ///
    /// Seeding and registration are atomic with respect to cycles: every
    /// diff the subscriber later receives applies to what `seed` was given.
    /// `seed` is not called if the subscriber was already registered. It
    /// runs under the registry lock and must not call back into the buffer.
    pub fn register_seeded<S, F>(&self, subscriber: &Arc<S>, seed: F) -> bool
    where
        S: Subscriber<T> + 'static,
        F: FnOnce(&S, &[T]),
    {
        let handle: Arc<dyn Subscriber<T>> = subscriber.clone();
        let mut registry = lock(&self.shared.registry);
        if !registry.subscribers.insert(&handle) {
            return false;
        }
        let start = registry
            .announcing
            .clone()
            .unwrap_or_else(|| self.shared.front.load_full());
        seed(subscriber, &start);
        true
    }

    /// Returns false if `subscriber` was not registered.
    pub fn unregister_subscriber<S>(&self, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber<T> + 'static,
    {
        let handle: Arc<dyn Subscriber<T>> = subscriber.clone();
        lock(&self.shared.registry).subscribers.remove(&handle)
    }

    /// Live registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.registry).subscribers.len()
    }

    // ── Collection ──────────────────────────────────────────────────────

    /// The last collection announced to subscribers. Never blocks on a
    /// cycle.
    #[must_use]
    pub fn collection(&self) -> Arc<Vec<T>> {
        self.shared.front.load_full()
    }

    /// Replace the pending collection and reconcile.
    ///
    /// Only the home thread may publish; any other caller gets
    /// [`BufferError::WrongThread`] and the buffer is left untouched.
    pub fn set_collection(&self, collection: Vec<T>) -> Result<Dispatch> {
        self.home.check()?;
        *lock(&self.shared.back) = collection;
        self.request()
    }

    /// Reconcile the current pending collection again, e.g. after changing
    /// the sort or compare function.
    pub fn refresh(&self) -> Result<Dispatch> {
        self.home.check()?;
        self.request()
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Choose between inline and worker-thread reconciliation. Takes effect
    /// with the next publish.
    pub fn set_asynchronous(&self, asynchronous: bool) {
        self.asynchronous.store(asynchronous, Ordering::Release);
    }

    #[must_use]
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous.load(Ordering::Acquire)
    }

    /// Used from the next cycle on.
    pub fn set_compare_function(&self, compare: impl Fn(&T, &T) -> bool + Send + Sync + 'static) {
        lock(&self.shared.delegates).compare = Arc::new(compare);
    }

    /// Used from the next cycle on.
    pub fn set_sort_function(&self, sort: impl Fn(Vec<T>) -> Vec<T> + Send + Sync + 'static) {
        lock(&self.shared.delegates).sort = Some(Arc::new(sort));
    }

    pub fn clear_sort_function(&self) {
        lock(&self.shared.delegates).sort = None;
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// True while a cycle runs or one is pending.
    #[must_use]
    pub fn is_reconciling(&self) -> bool {
        lock(&self.shared.flags).busy()
    }

    /// Block until no cycle is running or pending, or `timeout` elapses.
    /// Returns true if the buffer is idle.
    ///
    /// Calling this from a subscriber callback waits on the cycle that is
    /// delivering the callback, and so always times out.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let flags = lock(&self.shared.flags);
        let (flags, _) = self
            .shared
            .idle
            .wait_timeout_while(flags, timeout, |flags| flags.busy())
            .unwrap_or_else(PoisonError::into_inner);
        !flags.busy()
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.shared.counters.snapshot()
    }

    #[must_use]
    pub fn home_thread(&self) -> ThreadId {
        self.home.id()
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    fn request(&self) -> Result<Dispatch> {
        {
            let mut flags = lock(&self.shared.flags);
            flags.recompute_requested = true;
            if flags.computing {
                self.shared
                    .counters
                    .coalesced_requests
                    .fetch_add(1, Ordering::Relaxed);
                tracing::trace!("publish coalesced into in-flight cycle");
                return Ok(Dispatch::Coalesced);
            }
            flags.computing = true;
        }

        if !self.is_asynchronous() {
            self.shared.run_cycles();
            return Ok(Dispatch::Completed);
        }

        if let Err(err) = self.signal_worker() {
            *lock(&self.shared.flags) = Flags::default();
            self.shared.idle.notify_all();
            return Err(err);
        }
        Ok(Dispatch::Scheduled)
    }

    /// Signal the worker, starting one if none is running.
    fn signal_worker(&self) -> Result<()> {
        let mut slot = lock(&self.worker);
        if let Some(worker) = slot.as_ref()
            && worker.signal().is_ok()
        {
            return Ok(());
        }
        if slot.is_some() {
            tracing::warn!(worker = %self.worker_name, "reconcile worker exited; respawning");
        }

        let shared = Arc::clone(&self.shared);
        let worker = ReconcileWorker::start(&self.worker_name, move || shared.run_cycles())?;
        worker.signal().map_err(|_| {
            BufferError::WorkerSpawn(std::io::Error::other(
                "reconcile worker exited before its first signal",
            ))
        })?;
        *slot = Some(worker);
        Ok(())
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("front_len", &self.shared.front.load().len())
            .field("home", &self.home)
            .field("asynchronous", &self.asynchronous.load(Ordering::Relaxed))
            .field("worker_name", &self.worker_name)
            .finish_non_exhaustive()
    }
}
