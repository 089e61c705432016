#![forbid(unsafe_code)]

//! Publication pipeline for ordered collections.
//!
//! A [`Buffer`] keeps two copies of a collection: the *front* (last version
//! announced to subscribers) and the *back* (latest version requested by the
//! producer). Publishing a new back triggers a reconciliation cycle that
//! diffs front against back, brackets the resulting edits with
//! `will_change` / `did_change`, and advances the front.
//!
//! - [`Buffer`]: the pipeline itself.
//! - [`Subscriber`] / [`FnSubscriber`]: the callback protocol and its
//!   closure-backed adapter.
//! - [`Mirror`]: a subscriber that keeps a materialized copy.
//! - [`BufferConfig`]: construction-time settings with env overrides.
//!
//! # Invariants
//!
//! 1. At most one reconciliation cycle runs per buffer at any time.
//! 2. Publishes that arrive during a cycle collapse into exactly one
//!    follow-up cycle against the latest back.
//! 3. Cycle N's notifications complete before cycle N+1's begin.
//! 4. An empty edit script produces no callbacks at all.
//! 5. Only the thread that built the buffer may publish.

pub mod buffer;
pub mod config;
pub mod mirror;
mod reconcile_worker;
pub mod subscriber;

pub use buffer::{Buffer, BufferStats, CompareFn, Dispatch, SortFn};
pub use config::BufferConfig;
pub use flipbuf_core::{BufferError, Result};
pub use flipbuf_diff::{Diff, DiffType};
pub use mirror::Mirror;
pub use subscriber::{FnSubscriber, Subscriber};
