#![forbid(unsafe_code)]

//! Minimal edit scripts via the classic edit-distance table.
//!
//! # Algorithm
//!
//! An `(m+1) x (n+1)` cost table holds, at `(i, j)`, the edit distance
//! between the first `i` elements of `old` and the first `j` elements of
//! `new`:
//!
//! ```text
//! cost(i, 0) = i
//! cost(0, j) = j
//! cost(i, j) = cost(i-1, j-1)                                   if old[i-1] ~ new[j-1]
//!            = 1 + min(cost(i-1, j), cost(i, j-1), cost(i-1, j-1))  otherwise
//! ```
//!
//! The script is recovered by walking back from `(m, n)` to `(0, 0)`. At
//! each cell the three predecessors are compared in a fixed order:
//!
//! 1. insertion `(i, j-1)` if strictly cheaper than both others;
//! 2. deletion `(i-1, j)` if strictly cheaper than both others;
//! 3. a free diagonal step when the diagonal costs the same as the current
//!    cell and the elements are equivalent;
//! 4. a substitution when the diagonal is exactly one cheaper;
//! 5. otherwise insertion (insertion and deletion tie below the diagonal
//!    while the elements differ).
//!
//! Each step emits at most one diff before moving, so diffs come out in
//! tail-to-head order. That order is the contract: consumers apply diffs
//! sequentially and every index stays valid.
//!
//! # Invariants
//!
//! 1. Applying the script in emission order to a copy of `old` yields a
//!    sequence equivalent to `new`.
//! 2. `script.len() == cost(m, n)`.
//! 3. The same inputs always produce the same script.
//! 4. `compute(x, x)` is empty.
//!
//! Time and space are `O(m * n)`.

use std::fmt;

/// Kind of a single edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffType {
    /// `value` (from the new sequence) is inserted at `index`.
    Insert,
    /// The element at `index` (carried in `value`) is removed.
    Delete,
    /// The element at `index` is replaced by `value` (from the new sequence).
    Substitute,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Substitute => "substitute",
        })
    }
}

/// One positional edit.
///
/// `index` is relative to the live sequence at the moment the diff is
/// applied in emission order. For deletions and substitutions that is also
/// the element's position in the old sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T> {
    pub diff_type: DiffType,
    pub index: usize,
    pub value: T,
}

impl<T> Diff<T> {
    #[must_use]
    pub fn insert(index: usize, value: T) -> Self {
        Self {
            diff_type: DiffType::Insert,
            index,
            value,
        }
    }

    #[must_use]
    pub fn delete(index: usize, value: T) -> Self {
        Self {
            diff_type: DiffType::Delete,
            index,
            value,
        }
    }

    #[must_use]
    pub fn substitute(index: usize, value: T) -> Self {
        Self {
            diff_type: DiffType::Substitute,
            index,
            value,
        }
    }
}

// ── Cost table ──────────────────────────────────────────────────────────

/// Row-major `(rows x cols)` edit-distance table.
struct CostTable {
    cols: usize,
    cells: Vec<usize>,
}

impl CostTable {
    fn build<T, F>(old: &[T], new: &[T], equals: &F) -> Self
    where
        F: Fn(&T, &T) -> bool,
    {
        let rows = old.len() + 1;
        let cols = new.len() + 1;
        let mut cells = vec![0usize; rows * cols];

        for i in 1..rows {
            cells[i * cols] = i;
        }
        for (j, cell) in cells.iter_mut().enumerate().take(cols).skip(1) {
            *cell = j;
        }

        for i in 1..rows {
            for j in 1..cols {
                let diagonal = cells[(i - 1) * cols + (j - 1)];
                cells[i * cols + j] = if equals(&old[i - 1], &new[j - 1]) {
                    diagonal
                } else {
                    let deletion = cells[(i - 1) * cols + j];
                    let insertion = cells[i * cols + (j - 1)];
                    1 + deletion.min(insertion).min(diagonal)
                };
            }
        }

        Self { cols, cells }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> usize {
        self.cells[i * self.cols + j]
    }

    fn distance(&self) -> usize {
        self.cells.last().copied().unwrap_or(0)
    }
}

/// Walk the table back from `(m, n)`, pushing diffs tail-to-head.
fn backtrack<T, F>(table: &CostTable, old: &[T], new: &[T], equals: &F, out: &mut Vec<Diff<T>>)
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let mut i = old.len();
    let mut j = new.len();

    while i > 0 || j > 0 {
        let current = table.get(i, j);
        let insertion = if j > 0 { table.get(i, j - 1) } else { usize::MAX };
        let deletion = if i > 0 { table.get(i - 1, j) } else { usize::MAX };
        let diagonal = if i > 0 && j > 0 {
            table.get(i - 1, j - 1)
        } else {
            usize::MAX
        };

        if insertion < deletion && insertion < diagonal {
            out.push(Diff::insert(i, new[j - 1].clone()));
            j -= 1;
        } else if deletion < insertion && deletion < diagonal {
            out.push(Diff::delete(i - 1, old[i - 1].clone()));
            i -= 1;
        } else if diagonal == current && equals(&old[i - 1], &new[j - 1]) {
            i -= 1;
            j -= 1;
        } else if diagonal + 1 == current {
            out.push(Diff::substitute(i - 1, new[j - 1].clone()));
            i -= 1;
            j -= 1;
        } else {
            // Insertion and deletion tie below an unequal diagonal.
            out.push(Diff::insert(i, new[j - 1].clone()));
            j -= 1;
        }
    }
}

// ── EditScript ──────────────────────────────────────────────────────────

/// An ordered, minimal list of diffs turning one sequence into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditScript<T> {
    diffs: Vec<Diff<T>>,
    distance: usize,
}

impl<T> Default for EditScript<T> {
    fn default() -> Self {
        Self {
            diffs: Vec::new(),
            distance: 0,
        }
    }
}

impl<T: Clone> EditScript<T> {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the script from `old` to `new` using `PartialEq`.
    #[must_use]
    pub fn compute(old: &[T], new: &[T]) -> Self
    where
        T: PartialEq,
    {
        Self::compute_by(old, new, |a, b| a == b)
    }

    /// Compute the script from `old` to `new` using a caller-supplied
    /// equivalence predicate.
    #[must_use]
    pub fn compute_by<F>(old: &[T], new: &[T], equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut script = Self::new();
        script.compute_by_into(old, new, equals);
        script
    }

    /// Like [`compute`](Self::compute), reusing this script's allocation.
    pub fn compute_into(&mut self, old: &[T], new: &[T])
    where
        T: PartialEq,
    {
        self.compute_by_into(old, new, |a, b| a == b);
    }

    /// Like [`compute_by`](Self::compute_by), reusing this script's
    /// allocation.
    pub fn compute_by_into<F>(&mut self, old: &[T], new: &[T], equals: F)
    where
        F: Fn(&T, &T) -> bool,
    {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!(
            "edit_script",
            old_len = old.len(),
            new_len = new.len()
        )
        .entered();

        self.diffs.clear();
        let table = CostTable::build(old, new, &equals);
        self.distance = table.distance();
        self.diffs.reserve(self.distance);
        backtrack(&table, old, new, &equals, &mut self.diffs);
        debug_assert_eq!(self.diffs.len(), self.distance);

        #[cfg(feature = "tracing")]
        tracing::trace!(distance = self.distance, "edit script computed");
    }
}

impl<T> EditScript<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// The edit distance between the two inputs. Always equals `len()`.
    #[must_use]
    pub fn distance(&self) -> usize {
        self.distance
    }

    /// Diffs in emission (tail-to-head) order.
    #[must_use]
    pub fn diffs(&self) -> &[Diff<T>] {
        &self.diffs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diff<T>> {
        self.diffs.iter()
    }

    #[must_use]
    pub fn into_diffs(self) -> Vec<Diff<T>> {
        self.diffs
    }
}

impl<T> IntoIterator for EditScript<T> {
    type Item = Diff<T>;
    type IntoIter = std::vec::IntoIter<Diff<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a EditScript<T> {
    type Item = &'a Diff<T>;
    type IntoIter = std::slice::Iter<'a, Diff<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.iter()
    }
}

// ── Free functions ──────────────────────────────────────────────────────

/// Diffs turning `old` into `new`, using `PartialEq`.
#[must_use]
pub fn diff<T: Clone + PartialEq>(old: &[T], new: &[T]) -> Vec<Diff<T>> {
    EditScript::compute(old, new).into_diffs()
}

/// Diffs turning `old` into `new`, using `equals` for element equivalence.
#[must_use]
pub fn diff_by<T, F>(old: &[T], new: &[T], equals: F) -> Vec<Diff<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    EditScript::compute_by(old, new, equals).into_diffs()
}

/// Edit distance between `old` and `new`, using `PartialEq`.
#[must_use]
pub fn edit_distance<T: PartialEq>(old: &[T], new: &[T]) -> usize {
    edit_distance_by(old, new, |a, b| a == b)
}

/// Edit distance between `old` and `new`, using `equals`.
#[must_use]
pub fn edit_distance_by<T, F>(old: &[T], new: &[T], equals: F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    CostTable::build(old, new, &equals).distance()
}
