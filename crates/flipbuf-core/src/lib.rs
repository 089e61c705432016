#![forbid(unsafe_code)]

//! Core: error taxonomy, home-thread identity, and logging setup shared by
//! the flipbuf crates.

pub mod error;
pub mod logging;
pub mod thread_identity;

pub use error::{BufferError, Result};
pub use thread_identity::{CurrentThread, HomeThread, ThreadIdentity};
