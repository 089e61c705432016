//! Property-based invariant tests for the flipbuf edit-script engine.
//!
//! These tests verify properties that must hold for **any** pair of
//! sequences:
//!
//! 1. Identical sequences produce an empty script.
//! 2. Applying the script in emission order reproduces `new`.
//! 3. Script length equals the edit distance.
//! 4. Computation is deterministic.
//! 5. No diff references an index invalidated by an earlier diff.
//! 6. Round-trip holds under a custom equivalence predicate.
//! 7. `compute` and `compute_into` agree.
//! 8. The distance is symmetric and bounded by `max(m, n)`.

use flipbuf_diff::{Diff, DiffType, EditScript, apply, diff, diff_by, edit_distance};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Small alphabet so matches are frequent and tie-breaks get exercised.
fn seq() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..6, 0..24)
}

/// Pair of sequences where `new` is a light mutation of `old`.
fn related_pair() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (seq(), proptest::collection::vec((0usize..32, 0u8..6, 0u8..3), 0..8)).prop_map(
        |(old, edits)| {
            let mut new = old.clone();
            for (pos, value, op) in edits {
                match op {
                    0 => {
                        let at = pos % (new.len() + 1);
                        new.insert(at, value);
                    }
                    1 if !new.is_empty() => {
                        let at = pos % new.len();
                        new.remove(at);
                    }
                    _ if !new.is_empty() => {
                        let at = pos % new.len();
                        new[at] = value;
                    }
                    _ => {}
                }
            }
            (old, new)
        },
    )
}

/// Apply diffs one at a time, checking each index against the live length.
fn replay_checked(old: &[u8], diffs: &[Diff<u8>]) -> Result<Vec<u8>, String> {
    let mut live = old.to_vec();
    for (n, d) in diffs.iter().enumerate() {
        let ok = match d.diff_type {
            DiffType::Insert => d.index <= live.len(),
            DiffType::Delete | DiffType::Substitute => d.index < live.len(),
        };
        if !ok {
            return Err(format!(
                "diff #{n} {:?} at {} invalid for live length {}",
                d.diff_type,
                d.index,
                live.len()
            ));
        }
        match d.diff_type {
            DiffType::Insert => live.insert(d.index, d.value),
            DiffType::Delete => {
                live.remove(d.index);
            }
            DiffType::Substitute => live[d.index] = d.value,
        }
    }
    Ok(live)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Identity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn identical_sequences_produce_empty_script(x in seq()) {
        prop_assert!(diff(&x, &x).is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn script_round_trips_arbitrary_pairs(old in seq(), new in seq()) {
        let mut live = old.clone();
        apply(&mut live, &diff(&old, &new)).unwrap();
        prop_assert_eq!(live, new);
    }

    #[test]
    fn script_round_trips_related_pairs((old, new) in related_pair()) {
        let mut live = old.clone();
        apply(&mut live, &diff(&old, &new)).unwrap();
        prop_assert_eq!(live, new);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Minimality
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn length_equals_edit_distance(old in seq(), new in seq()) {
        let script = EditScript::compute(&old, &new);
        prop_assert_eq!(script.len(), edit_distance(&old, &new));
        prop_assert_eq!(script.len(), script.distance());
    }

    #[test]
    fn related_pairs_stay_within_edit_budget((old, new) in related_pair()) {
        // Never worse than rewriting everything.
        let script = EditScript::compute(&old, &new);
        prop_assert!(script.len() <= old.len().max(new.len()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn computation_is_deterministic(old in seq(), new in seq()) {
        prop_assert_eq!(diff(&old, &new), diff(&old, &new));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Emission order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn no_index_is_invalidated_by_earlier_diffs(old in seq(), new in seq()) {
        let script = diff(&old, &new);
        let replayed = replay_checked(&old, &script);
        prop_assert!(replayed.is_ok(), "{}", replayed.unwrap_err());
    }

    #[test]
    fn values_come_from_the_right_side(old in seq(), new in seq()) {
        for d in diff(&old, &new) {
            match d.diff_type {
                DiffType::Delete => {
                    prop_assert!(old.contains(&d.value));
                }
                DiffType::Insert | DiffType::Substitute => {
                    prop_assert!(new.contains(&d.value));
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Custom equivalence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn round_trip_holds_under_parity_equivalence(old in seq(), new in seq()) {
        let same_parity = |a: &u8, b: &u8| a % 2 == b % 2;
        let mut live = old.clone();
        apply(&mut live, &diff_by(&old, &new, same_parity)).unwrap();
        prop_assert_eq!(live.len(), new.len());
        for (got, want) in live.iter().zip(&new) {
            prop_assert!(same_parity(got, want));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. compute and compute_into agree
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn compute_into_matches_compute(a in seq(), b in seq(), c in seq()) {
        let mut reused = EditScript::new();
        reused.compute_into(&a, &b);
        reused.compute_into(&b, &c);
        prop_assert_eq!(reused, EditScript::compute(&b, &c));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Distance bounds
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn distance_is_symmetric_and_bounded(old in seq(), new in seq()) {
        let d = edit_distance(&old, &new);
        prop_assert_eq!(d, edit_distance(&new, &old));
        prop_assert!(d <= old.len().max(new.len()));
        prop_assert!(d >= old.len().abs_diff(new.len()));
    }
}
