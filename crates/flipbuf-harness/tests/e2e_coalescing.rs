//! E2E: coalescing of publishes that arrive while a cycle is in flight.
//!
//! Uses a [`GateSubscriber`] to park the worker inside cycle 1, publishes
//! more collections, then releases the gate and checks that:
//! 1. Exactly one follow-up cycle ran, against the latest collection.
//! 2. That cycle diffed the first front against the latest candidate.
//! 3. Readers were never blocked by the parked cycle.
//! 4. The subscriber list is snapshotted per cycle.
//! 5. A mirror attached mid-cycle starts from that cycle's candidate.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use flipbuf_diff::diff;
use flipbuf_harness::{GateSubscriber, Recorder};
use flipbuf_runtime::{Buffer, BufferConfig, Dispatch, Mirror};

const TIMEOUT: Duration = Duration::from_secs(5);

fn sorted_async_buffer(name: &str) -> Buffer<u32> {
    let buffer = Buffer::with_config(
        BufferConfig::default()
            .with_asynchronous(true)
            .with_worker_name(name),
    );
    buffer.set_sort_function(|mut v: Vec<u32>| {
        v.sort_unstable();
        v
    });
    buffer
}

/// Simple LCG for deterministic test data.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    fn vec(&mut self, max_len: u32, max_val: u32) -> Vec<u32> {
        let len = self.next_u32() % (max_len + 1);
        (0..len).map(|_| self.next_u32() % max_val).collect()
    }
}

// ── A in flight, B and C coalesced ──────────────────────────────────────

#[test]
fn two_publishes_during_cycle_yield_one_follow_up() {
    let buffer = sorted_async_buffer("e2e-coalesce");
    let gate = Arc::new(GateSubscriber::closed());
    let recorder = Arc::new(Recorder::new());
    buffer.register_subscriber(&gate);
    buffer.register_subscriber(&recorder);

    let a = vec![3, 1, 2];
    let b = vec![9, 8, 7];
    let c = vec![5, 1, 4, 2];

    assert_eq!(buffer.set_collection(a).unwrap(), Dispatch::Scheduled);
    assert!(gate.wait_entered(1, TIMEOUT), "cycle 1 never reached the gate");

    assert_eq!(buffer.set_collection(b).unwrap(), Dispatch::Coalesced);
    assert_eq!(buffer.set_collection(c).unwrap(), Dispatch::Coalesced);
    assert!(buffer.is_reconciling());

    gate.open();
    assert!(buffer.wait_idle(TIMEOUT), "buffer never went idle");

    let stats = buffer.stats();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.coalesced_requests, 2);

    let batches = recorder.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], diff::<u32>(&[], &[1, 2, 3]));
    assert_eq!(batches[1], diff::<u32>(&[1, 2, 3], &[1, 2, 4, 5]));
    assert_eq!(recorder.check_bracketing(), Ok(2));
    assert_eq!(*buffer.collection(), vec![1, 2, 4, 5]);
    assert_eq!(gate.entered(), 2);
}

#[test]
fn follow_up_against_unchanged_front_is_silent() {
    let buffer = sorted_async_buffer("e2e-coalesce-silent");
    let gate = Arc::new(GateSubscriber::closed());
    let recorder = Arc::new(Recorder::new());
    buffer.register_subscriber(&gate);
    buffer.register_subscriber(&recorder);

    buffer.set_collection(vec![2, 1]).unwrap();
    assert!(gate.wait_entered(1, TIMEOUT));
    // Same content, different order; sorts to the candidate of cycle 1.
    assert_eq!(buffer.set_collection(vec![1, 2]).unwrap(), Dispatch::Coalesced);
    gate.open();
    assert!(buffer.wait_idle(TIMEOUT));

    let stats = buffer.stats();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.notifications_skipped, 1);
    assert_eq!(recorder.batches().len(), 1);
}

// ── Readers and registration during a parked cycle ──────────────────────

#[test]
fn readers_see_previous_front_without_blocking() {
    let buffer = sorted_async_buffer("e2e-readers");
    buffer.set_collection(vec![10]).unwrap();
    assert!(buffer.wait_idle(TIMEOUT));

    let gate = Arc::new(GateSubscriber::closed());
    buffer.register_subscriber(&gate);
    buffer.set_collection(vec![30, 20]).unwrap();
    assert!(gate.wait_entered(1, TIMEOUT));

    let started = Instant::now();
    assert_eq!(*buffer.collection(), vec![10]);
    assert!(started.elapsed() < TIMEOUT);

    gate.open();
    assert!(buffer.wait_idle(TIMEOUT));
    assert_eq!(*buffer.collection(), vec![20, 30]);
}

#[test]
fn subscriber_list_is_fixed_per_cycle() {
    let buffer = sorted_async_buffer("e2e-snapshot");
    let gate = Arc::new(GateSubscriber::closed());
    let early = Arc::new(Recorder::new());
    buffer.register_subscriber(&gate);
    buffer.register_subscriber(&early);

    buffer.set_collection(vec![1]).unwrap();
    assert!(gate.wait_entered(1, TIMEOUT));

    // Registration does not wait for the parked cycle.
    let late = Arc::new(Recorder::new());
    assert!(buffer.register_subscriber(&late));
    // Unregistering mid-cycle does not cut the current batch short.
    assert!(buffer.unregister_subscriber(&early));
    buffer.set_collection(vec![1, 2]).unwrap();

    gate.open();
    assert!(buffer.wait_idle(TIMEOUT));

    assert_eq!(early.check_bracketing(), Ok(1));
    assert_eq!(early.batches(), vec![diff::<u32>(&[], &[1])]);
    assert_eq!(late.check_bracketing(), Ok(1));
    assert_eq!(late.batches(), vec![diff::<u32>(&[1], &[1, 2])]);
}

#[test]
fn mirror_attached_mid_cycle_starts_from_candidate() {
    let buffer = sorted_async_buffer("e2e-attach");
    let gate = Arc::new(GateSubscriber::closed());
    buffer.register_subscriber(&gate);

    buffer.set_collection(vec![2, 1]).unwrap();
    assert!(gate.wait_entered(1, TIMEOUT));
    // Parked in will_change: subscribers are fixed, front not yet stored.
    assert!(buffer.collection().is_empty());
    let mirror = Mirror::attach(&buffer);
    assert_eq!(mirror.snapshot(), vec![1, 2]);

    gate.open();
    assert!(buffer.wait_idle(TIMEOUT));
    assert_eq!(mirror.snapshot(), vec![1, 2]);
    assert_eq!(mirror.batches(), 0);
    assert!(!mirror.is_desynced());

    buffer.set_collection(vec![3]).unwrap();
    assert!(buffer.wait_idle(TIMEOUT));
    assert_eq!(mirror.snapshot(), vec![3]);
    assert_eq!(mirror.batches(), 1);
    assert!(!mirror.is_desynced());
}

// ── Storm ───────────────────────────────────────────────────────────────

#[test]
fn publish_storm_settles_on_latest_collection() {
    let buffer = sorted_async_buffer("e2e-storm");
    let mirror = Mirror::attach(&buffer);
    let recorder = Arc::new(Recorder::new());
    buffer.register_subscriber(&recorder);

    let mut rng = Lcg(0x5eed);
    let publishes: Vec<Vec<u32>> = (0..300).map(|_| rng.vec(16, 8)).collect();
    let mut scheduled = 0u64;
    let mut coalesced = 0u64;
    for next in &publishes {
        match buffer.set_collection(next.clone()).unwrap() {
            Dispatch::Scheduled => scheduled += 1,
            Dispatch::Coalesced => coalesced += 1,
            Dispatch::Completed => unreachable!("asynchronous buffer completed inline"),
        }
    }
    assert!(buffer.wait_idle(TIMEOUT));

    let mut last = publishes.last().cloned().unwrap_or_default();
    last.sort_unstable();
    assert_eq!(*buffer.collection(), last);
    assert_eq!(mirror.snapshot(), last);
    assert!(!mirror.is_desynced());

    let stats = buffer.stats();
    assert_eq!(stats.coalesced_requests, coalesced);
    assert!(stats.cycles >= scheduled);
    assert!(stats.cycles <= 300);
    assert!(
        recorder.check_bracketing().is_ok(),
        "bracketing broken:\n{}",
        recorder.to_jsonl()
    );
    assert_eq!(recorder.callback_threads().len(), 1);
}
