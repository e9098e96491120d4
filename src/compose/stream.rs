//! Deterministic random streams.
//!
//! Generation never touches a global generator. Every choice is drawn from
//! an explicit [`SeedStream`] built from the score seed and the prompt hash,
//! so the same inputs give the same Score on any thread, in any order.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit FNV-1a hash of the prompt text.
///
/// ```
/// use songsmith::compose::prompt_hash;
///
/// assert_eq!(prompt_hash(""), 0xcbf2_9ce4_8422_2325);
/// assert_ne!(prompt_hash("rainy evening"), prompt_hash("rainy morning"));
/// ```
pub fn prompt_hash(prompt: &str) -> u64 {
    prompt.as_bytes().iter().fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// SplitMix64 finalizer, used to combine seed material.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A re-seedable PCG-64 stream.
#[derive(Debug, Clone)]
pub struct SeedStream {
    rng: Pcg64,
}

impl SeedStream {
    /// Song-level stream: tempo, layout offsets.
    pub fn new(seed: u64, prompt_hash: u64) -> Self {
        Self::from_material(mix(seed) ^ prompt_hash)
    }

    /// Independent stream for one section, keyed by its layout ordinal.
    pub fn for_section(seed: u64, prompt_hash: u64, ordinal: usize) -> Self {
        let salt = mix((ordinal as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        Self::from_material(mix(seed) ^ prompt_hash ^ salt)
    }

    /// Stream for a named purpose (titles, vocal melody) that must not
    /// disturb the section streams.
    pub fn for_purpose(seed: u64, prompt_hash: u64, purpose: &str) -> Self {
        Self::from_material(mix(seed) ^ prompt_hash ^ mix(self::prompt_hash(purpose)))
    }

    fn from_material(material: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(material),
        }
    }

    /// Uniform integer in `min..=max`.
    pub fn range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Uniform index in `0..len`. Returns 0 for an empty range.
    pub fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.random_range(0..len)
    }

    /// True with probability `numerator / denominator`.
    pub fn chance(&mut self, numerator: u32, denominator: u32) -> bool {
        self.rng.random_range(0..denominator.max(1)) < numerator
    }

    /// Index drawn with probability proportional to `weights[i]`.
    pub fn weighted(&mut self, weights: &[u32]) -> usize {
        let total: u64 = weights.iter().map(|&w| w as u64).sum();
        if total == 0 {
            return 0;
        }
        let mut target = self.rng.random_range(0..total);
        for (i, &weight) in weights.iter().enumerate() {
            if target < weight as u64 {
                return i;
            }
            target -= weight as u64;
        }
        weights.len() - 1
    }

    /// Picks one element uniformly.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.index(items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_are_reproducible() {
        let mut a = SeedStream::new(42, prompt_hash("rainy evening"));
        let mut b = SeedStream::new(42, prompt_hash("rainy evening"));
        let xs: Vec<u32> = (0..32).map(|_| a.range(0, 1000)).collect();
        let ys: Vec<u32> = (0..32).map(|_| b.range(0, 1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_streams_are_independent() {
        let hash = prompt_hash("x");
        let draw = |mut s: SeedStream| (0..16).map(|_| s.range(0, u32::MAX - 1)).collect::<Vec<_>>();
        assert_ne!(
            draw(SeedStream::for_section(1, hash, 0)),
            draw(SeedStream::for_section(1, hash, 1))
        );
        assert_ne!(draw(SeedStream::new(1, hash)), draw(SeedStream::new(2, hash)));
        assert_ne!(
            draw(SeedStream::new(1, hash)),
            draw(SeedStream::new(1, prompt_hash("y")))
        );
    }

    #[test]
    fn test_range_bounds() {
        let mut stream = SeedStream::new(7, 0);
        for _ in 0..200 {
            let v = stream.range(70, 90);
            assert!((70..=90).contains(&v));
        }
        assert_eq!(stream.range(5, 5), 5);
        assert_eq!(stream.index(0), 0);
    }

    #[test]
    fn test_index_covers_whole_range() {
        let mut stream = SeedStream::new(11, 0);
        let mut seen = [false; 5];
        for _ in 0..500 {
            let i = stream.index(5);
            assert!(i < 5);
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(stream.index(1), 0);
    }

    #[test]
    fn test_weighted_prefers_heavier_options() {
        let mut stream = SeedStream::new(3, 0);
        let mut counts = [0u32; 3];
        for _ in 0..3000 {
            counts[stream.weighted(&[3, 2, 1])] += 1;
        }
        assert!(counts[0] > counts[1] && counts[1] > counts[2]);
        assert_eq!(stream.weighted(&[0, 0]), 0);
        assert_eq!(stream.weighted(&[0, 5]), 1);
    }
}
