#![forbid(unsafe_code)]

//! Test fixtures for flipbuf buffers.
//!
//! - [`Recorder`]: captures every callback as a [`BufferEvent`], groups them
//!   into batches, checks bracketing, and exports JSONL evidence.
//! - [`GateSubscriber`]: parks a cycle inside `will_change` until the test
//!   opens the gate. Makes "publish while a cycle is in flight" scenarios
//!   deterministic.
//! - [`MockThreadIdentity`]: a [`ThreadIdentity`](flipbuf_core::ThreadIdentity)
//!   the test can point at any thread, for exercising the home-thread
//!   contract without real threads.

pub mod gate;
pub mod mock_identity;
pub mod recorder;

pub use gate::GateSubscriber;
pub use mock_identity::MockThreadIdentity;
pub use recorder::{BracketError, BufferEvent, Recorder};
