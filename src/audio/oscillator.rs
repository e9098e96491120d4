//! Oscillators and waveform generators.
//!
//! Waveforms are evaluated from an explicit phase (in cycles), never from
//! hidden state, so a rendered note depends only on its inputs.

use std::f64::consts::TAU;

/// Waveform types for synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Pure sine wave - smooth, fundamental tone
    Sine,
    /// Triangle wave - soft, odd harmonics
    Triangle,
    /// Sawtooth wave - bright, all harmonics
    Saw,
    /// Square wave - hollow, odd harmonics
    Square,
    /// Deterministic white noise for percussive kinds
    Noise,
}

impl Waveform {
    /// Evaluates the waveform at `phase` cycles.
    ///
    /// `index` and `seed` only matter for [`Waveform::Noise`], which hashes
    /// them instead of drawing from a generator.
    pub fn sample(self, phase: f64, index: usize, seed: u64) -> f64 {
        let t = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (TAU * t).sin(),
            Waveform::Triangle => 4.0 * (t - 0.5).abs() - 1.0,
            Waveform::Saw => 2.0 * t - 1.0,
            Waveform::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Noise => white_noise(index as u64, seed),
        }
    }
}

/// Stateless white noise in [-1, 1): a SplitMix64 hash of (index, seed).
pub fn white_noise(index: u64, seed: u64) -> f64 {
    let mut z = index
        .wrapping_add(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
}

/// Generates `frames` samples of a fixed-frequency waveform.
///
/// # Arguments
/// * `waveform` - The type of waveform to generate
/// * `frequency` - Frequency in Hz
/// * `frames` - Number of samples
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// Samples in the -1.0 to 1.0 range
pub fn oscillator(waveform: Waveform, frequency: f64, frames: usize, sample_rate: u32) -> Vec<f64> {
    let step = frequency / sample_rate as f64;
    (0..frames)
        .map(|i| waveform.sample(step * i as f64, i, frequency.to_bits()))
        .collect()
}
