//! Chord grammar walk.
//!
//! Chord slot `i` of a section uses rule `i % rules.len()`. A rule offers its
//! primary chord and then its alternatives; with `n` options, option `k`
//! has weight `n - k`, so the primary is always the most likely pick and
//! later branches are progressively rarer.

use super::stream::SeedStream;
use crate::score::{Chord, Key};
use crate::template::{ChordGrammar, ChordRule};

/// Selection weights for `n` ordered options: `n, n-1, ..., 1`.
pub fn variation_weights(n: usize) -> Vec<u32> {
    (0..n).map(|k| (n - k) as u32).collect()
}

/// Draws one chord from a rule.
pub fn choose_chord(rule: &ChordRule, key: &Key, stream: &mut SeedStream) -> Chord {
    let options: Vec<_> = rule.options().collect();
    let picked = stream.weighted(&variation_weights(options.len()));
    let choice = options.get(picked).copied().unwrap_or(&rule.primary);
    Chord::new(key, choice.degree, choice.voicing)
}

/// The rule governing chord slot `slot` (counted from the section start).
pub fn rule_for_slot(grammar: &ChordGrammar, slot: usize) -> &ChordRule {
    &grammar.rules[slot % grammar.rules.len()]
}
