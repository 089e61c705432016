#![forbid(unsafe_code)]

//! Edit-script engine: minimal typed diffs between two ordered sequences.
//!
//! [`EditScript::compute`] (or the free functions [`diff`] / [`diff_by`])
//! returns the insertions, deletions and substitutions that turn `old` into
//! `new`. Diffs are emitted from the tail of both sequences toward the head,
//! so applying them one by one, in order, to a live copy of `old` never
//! invalidates a later index. [`apply`] does exactly that.

pub mod apply;
pub mod edit_script;

pub use apply::{ApplyError, apply};
pub use edit_script::{
    Diff, DiffType, EditScript, diff, diff_by, edit_distance, edit_distance_by,
};
