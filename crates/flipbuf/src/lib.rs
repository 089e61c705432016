#![forbid(unsafe_code)]

//! flipbuf public facade crate.
//!
//! Re-exports the edit-script engine and, with the default `runtime`
//! feature, the double-buffered publisher.

pub use flipbuf_core::{BufferError, Result};
pub use flipbuf_diff::{Diff, DiffType, EditScript, apply, diff, diff_by, edit_distance};
#[cfg(feature = "runtime")]
pub use flipbuf_runtime::{Buffer, BufferConfig, Dispatch, FnSubscriber, Mirror, Subscriber};

pub mod prelude {
    pub use flipbuf_core as core;
    pub use flipbuf_diff as diff;
    #[cfg(feature = "runtime")]
    pub use flipbuf_runtime as runtime;
}
