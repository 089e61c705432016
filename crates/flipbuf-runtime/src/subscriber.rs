#![forbid(unsafe_code)]

//! Subscriber protocol.
//!
//! A [`Subscriber`] receives three callbacks per non-empty reconciliation
//! cycle:
//!
//! ```text
//! will_change()
//! on_change(type, index, value)   // once per diff, emission order
//! ...
//! did_change()
//! ```
//!
//! Cycles whose edit script is empty produce no callbacks at all.
//!
//! Two ways to subscribe:
//!
//! - implement [`Subscriber`] on your own (stateful) type;
//! - wrap closures in [`FnSubscriber`].
//!
//! Buffers hold subscribers by `Weak` reference. Dropping the last `Arc`
//! to a subscriber unsubscribes it; dead entries are pruned lazily.
//!
//! # Threading
//!
//! Callbacks run on the thread executing the cycle: the publishing thread
//! in synchronous mode, the buffer's worker in asynchronous mode. Hence the
//! `Send + Sync` bound; stateful subscribers use interior mutability.

use std::fmt;
use std::sync::{Arc, Weak};

use flipbuf_diff::DiffType;

/// Receiver of reconciliation callbacks.
pub trait Subscriber<T>: Send + Sync {
    /// A non-empty batch of diffs is about to be delivered. The buffer's
    /// front has not advanced yet.
    fn will_change(&self) {}

    /// One diff, in emission order.
    fn on_change(&self, diff_type: DiffType, index: usize, value: &T);

    /// The batch announced by `will_change` is complete.
    fn did_change(&self) {}
}

type ChangeFn<T> = Box<dyn Fn(DiffType, usize, &T) + Send + Sync>;
type NotifyFn = Box<dyn Fn() + Send + Sync>;

/// Closure-backed subscriber. Each callback is optional; missing ones are
/// no-ops.
///
/// ```ignore
/// let sub = Arc::new(
///     FnSubscriber::new(|kind, index, value: &u32| println!("{kind} {index} {value}"))
///         .on_did_change(|| println!("batch done")),
/// );
/// buffer.register_subscriber(&sub);
/// ```
pub struct FnSubscriber<T> {
    will_change: Option<NotifyFn>,
    on_change: Option<ChangeFn<T>>,
    did_change: Option<NotifyFn>,
}

impl<T> FnSubscriber<T> {
    /// Forward `on_change` to `f`.
    #[must_use]
    pub fn new(f: impl Fn(DiffType, usize, &T) + Send + Sync + 'static) -> Self {
        Self {
            will_change: None,
            on_change: Some(Box::new(f)),
            did_change: None,
        }
    }

    /// A subscriber that ignores every callback until closures are attached.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            will_change: None,
            on_change: None,
            did_change: None,
        }
    }

    #[must_use]
    pub fn on_will_change(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.will_change = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_did_change(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.did_change = Some(Box::new(f));
        self
    }
}

impl<T> Subscriber<T> for FnSubscriber<T> {
    fn will_change(&self) {
        if let Some(f) = &self.will_change {
            f();
        }
    }

    fn on_change(&self, diff_type: DiffType, index: usize, value: &T) {
        if let Some(f) = &self.on_change {
            f(diff_type, index, value);
        }
    }

    fn did_change(&self) {
        if let Some(f) = &self.did_change {
            f();
        }
    }
}

impl<T> fmt::Debug for FnSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubscriber")
            .field("will_change", &self.will_change.is_some())
            .field("on_change", &self.on_change.is_some())
            .field("did_change", &self.did_change.is_some())
            .finish()
    }
}

// ── Subscriber set ──────────────────────────────────────────────────────

/// Address of the subscriber allocation. Stable while any `Weak` to it is
/// alive, so it doubles as the identity key.
fn identity_of<T>(subscriber: &Arc<dyn Subscriber<T>>) -> usize {
    Arc::as_ptr(subscriber).cast::<()>() as usize
}

struct Entry<T> {
    key: usize,
    handle: Weak<dyn Subscriber<T>>,
}

/// Registration-ordered, identity-deduplicated set of non-owning
/// subscriber handles.
pub(crate) struct SubscriberSet<T> {
    entries: Vec<Entry<T>>,
}

impl<T> SubscriberSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns false if `subscriber` was already registered.
    pub(crate) fn insert(&mut self, subscriber: &Arc<dyn Subscriber<T>>) -> bool {
        self.prune();
        let key = identity_of(subscriber);
        if self.entries.iter().any(|e| e.key == key) {
            return false;
        }
        self.entries.push(Entry {
            key,
            handle: Arc::downgrade(subscriber),
        });
        true
    }

    /// Returns false if `subscriber` was not registered.
    pub(crate) fn remove(&mut self, subscriber: &Arc<dyn Subscriber<T>>) -> bool {
        let key = identity_of(subscriber);
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }

    /// Live subscribers in registration order. Dead handles are dropped.
    pub(crate) fn snapshot(&mut self) -> Vec<Arc<dyn Subscriber<T>>> {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|e| match e.handle.upgrade() {
            Some(strong) => {
                live.push(strong);
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    fn prune(&mut self) {
        self.entries.retain(|e| e.handle.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Log(Mutex<Vec<String>>);

    impl Subscriber<char> for Log {
        fn will_change(&self) {
            self.0.lock().unwrap().push("will".into());
        }
        fn on_change(&self, diff_type: DiffType, index: usize, value: &char) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{diff_type}@{index}={value}"));
        }
        fn did_change(&self) {
            self.0.lock().unwrap().push("did".into());
        }
    }

    fn dyn_arc<S: Subscriber<char> + 'static>(s: &Arc<S>) -> Arc<dyn Subscriber<char>> {
        s.clone()
    }

    #[test]
    fn fn_subscriber_forwards_all_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (seen.clone(), seen.clone(), seen.clone());
        let sub = FnSubscriber::new(move |t, i, v: &char| a.lock().unwrap().push(format!("{t}@{i}={v}")))
            .on_will_change(move || b.lock().unwrap().push("will".to_string()))
            .on_did_change(move || c.lock().unwrap().push("did".to_string()));

        sub.will_change();
        sub.on_change(DiffType::Insert, 0, &'x');
        sub.did_change();

        assert_eq!(*seen.lock().unwrap(), vec!["will", "insert@0=x", "did"]);
    }

    #[test]
    fn silent_subscriber_ignores_everything() {
        let sub: FnSubscriber<char> = FnSubscriber::silent();
        sub.will_change();
        sub.on_change(DiffType::Delete, 3, &'q');
        sub.did_change();
        assert_eq!(
            format!("{sub:?}"),
            "FnSubscriber { will_change: false, on_change: false, did_change: false }"
        );
    }

    #[test]
    fn default_bracket_methods_are_noops() {
        struct ChangesOnly(Mutex<usize>);
        impl Subscriber<char> for ChangesOnly {
            fn on_change(&self, _: DiffType, _: usize, _: &char) {
                *self.0.lock().unwrap() += 1;
            }
        }
        let sub = ChangesOnly(Mutex::new(0));
        sub.will_change();
        sub.on_change(DiffType::Substitute, 0, &'a');
        sub.did_change();
        assert_eq!(*sub.0.lock().unwrap(), 1);
    }

    #[test]
    fn set_deduplicates_by_identity() {
        let mut set = SubscriberSet::new();
        let first = Arc::new(Log(Mutex::new(Vec::new())));
        let twin = Arc::new(Log(Mutex::new(Vec::new())));

        assert!(set.insert(&dyn_arc(&first)));
        assert!(!set.insert(&dyn_arc(&first)));
        assert!(set.insert(&dyn_arc(&twin)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut set = SubscriberSet::new();
        let sub = Arc::new(Log(Mutex::new(Vec::new())));
        set.insert(&dyn_arc(&sub));

        assert!(set.remove(&dyn_arc(&sub)));
        assert!(!set.remove(&dyn_arc(&sub)));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn snapshot_keeps_registration_order_and_drops_dead() {
        let mut set = SubscriberSet::new();
        let a = Arc::new(Log(Mutex::new(Vec::new())));
        let b = Arc::new(Log(Mutex::new(Vec::new())));
        let c = Arc::new(Log(Mutex::new(Vec::new())));
        for s in [&a, &b, &c] {
            set.insert(&dyn_arc(s));
        }
        drop(b);

        let live = set.snapshot();
        assert_eq!(live.len(), 2);
        assert_eq!(identity_of(&live[0]), identity_of(&dyn_arc(&a)));
        assert_eq!(identity_of(&live[1]), identity_of(&dyn_arc(&c)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn set_does_not_keep_subscribers_alive() {
        let mut set = SubscriberSet::new();
        let sub = Arc::new(Log(Mutex::new(Vec::new())));
        set.insert(&dyn_arc(&sub));
        assert_eq!(Arc::strong_count(&sub), 1);
    }
}
