#![no_main]

use arbitrary::Arbitrary;
use flipbuf_diff::{DiffType, EditScript, apply, edit_distance};
use libfuzzer_sys::fuzz_target;

/// Keeps the quadratic table small.
const MAX_LEN: usize = 256;

#[derive(Arbitrary, Debug)]
struct Pair {
    old: Vec<u8>,
    new: Vec<u8>,
    /// Compare under `x % modulus`, so non-trivial equivalence classes get
    /// exercised too.
    modulus: u8,
}

fuzz_target!(|input: Pair| {
    let old = &input.old[..input.old.len().min(MAX_LEN)];
    let new = &input.new[..input.new.len().min(MAX_LEN)];

    // Plain equality: exact round-trip and minimal length.
    let script = EditScript::compute(old, new);
    assert_eq!(script.len(), edit_distance(old, new));
    assert!(script.len() <= old.len().max(new.len()));
    let mut live = old.to_vec();
    apply(&mut live, script.diffs()).expect("script must fit its own source");
    assert_eq!(live, new);

    // Coarse predicate: round-trip up to equivalence.
    let m = input.modulus.max(1);
    let script = EditScript::compute_by(old, new, |a, b| a % m == b % m);
    for d in &script {
        if d.diff_type == DiffType::Delete {
            continue;
        }
        assert!(new.contains(&d.value));
    }
    let mut live = old.to_vec();
    apply(&mut live, script.diffs()).expect("script must fit its own source");
    assert_eq!(live.len(), new.len());
    assert!(live.iter().zip(new).all(|(a, b)| a % m == b % m));
});
