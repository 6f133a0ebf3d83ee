//! Uniform winner sampling.
//!
//! Winner selection must not be biased toward entry order, so drawing goes
//! through `rand`'s partial Fisher-Yates sampling rather than any
//! comparator-based shuffle.

use rand::seq::SliceRandom;
use std::collections::BTreeSet;

/// Draws `count` distinct members from `pool` uniformly, without
/// replacement. Returns all members when `count >= pool.len()`.
pub fn sample_without_replacement(pool: &BTreeSet<String>, count: usize) -> Vec<String> {
    let candidates: Vec<&String> = pool.iter().collect();
    let mut rng = rand::thread_rng();
    candidates
        .choose_multiple(&mut rng, count.min(candidates.len()))
        .map(|s| (*s).clone())
        .collect()
}
