//! Positional application of edit scripts.

use thiserror::Error;

use crate::edit_script::{Diff, DiffType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Diff number `position` addresses an index the live sequence does not
    /// have at that point. The script was computed against a different
    /// sequence.
    #[error("diff #{position} ({diff_type} at {index}) is out of bounds for length {len}")]
    IndexOutOfBounds {
        position: usize,
        diff_type: DiffType,
        index: usize,
        len: usize,
    },
}

/// Apply `diffs` to `target` in emission order.
///
/// The script is validated against `target`'s length before anything is
/// touched, so on error `target` is unchanged.
pub fn apply<T: Clone>(target: &mut Vec<T>, diffs: &[Diff<T>]) -> Result<(), ApplyError> {
    validate(target.len(), diffs)?;
    for d in diffs {
        match d.diff_type {
            DiffType::Insert => target.insert(d.index, d.value.clone()),
            DiffType::Delete => {
                target.remove(d.index);
            }
            DiffType::Substitute => target[d.index] = d.value.clone(),
        }
    }
    Ok(())
}

/// Replay only the length changes of `diffs` and reject the first index
/// that would be out of bounds.
fn validate<T>(mut len: usize, diffs: &[Diff<T>]) -> Result<(), ApplyError> {
    for (position, d) in diffs.iter().enumerate() {
        let in_bounds = match d.diff_type {
            DiffType::Insert => d.index <= len,
            DiffType::Delete | DiffType::Substitute => d.index < len,
        };
        if !in_bounds {
            return Err(ApplyError::IndexOutOfBounds {
                position,
                diff_type: d.diff_type,
                index: d.index,
                len,
            });
        }
        match d.diff_type {
            DiffType::Insert => len += 1,
            DiffType::Delete => len -= 1,
            DiffType::Substitute => {}
        }
    }
    Ok(())
}
