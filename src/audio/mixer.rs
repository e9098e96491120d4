//! Stereo mixdown of rendered parts.
//!
//! Parts are brought to a common rate and length, leveled, placed with an
//! equal-power pan law and summed in role order. The master is then peak
//! normalized and hard-clamped so no sample leaves [-1, 1].

use super::buffer::AudioBuffer;
use crate::score::{InstrumentRole, DEFAULT_SAMPLE_RATE};
use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_4;
use tracing::debug;

/// Peak level the master is scaled down to when it would exceed it.
pub const NORMALIZE_CEILING: f64 = 0.98;

/// Below this peak the master is treated as silence and left untouched.
pub const SILENCE_FLOOR: f64 = 1e-4;

/// Default gain of the vocal layer.
pub const VOCAL_LEVEL: f32 = 0.6;

/// Highest vocal gain a caller may ask for.
pub const MAX_VOCAL_LEVEL: f32 = 2.0;

/// Stereo position of the vocal layer.
pub const VOCAL_PAN: f32 = 0.0;

/// Equal-power pan gains for a position in [-1, 1].
///
/// θ = (pan + 1)·π/4, left = cos θ, right = sin θ. Center gives -3 dB on
/// each side.
pub fn pan_gains(pan: f32) -> (f64, f64) {
    let theta = (pan.clamp(-1.0, 1.0) as f64 + 1.0) * FRAC_PI_4;
    (theta.cos(), theta.sin())
}

/// Mixes role tracks and an optional vocal into a stereo master at unit
/// master gain.
///
/// Roles missing from `levels` use their default level.
pub fn mix(
    tracks: &BTreeMap<InstrumentRole, AudioBuffer>,
    levels: &BTreeMap<InstrumentRole, f32>,
    vocal: Option<&AudioBuffer>,
) -> AudioBuffer {
    mix_with_gain(tracks, levels, vocal.map(|v| (v, VOCAL_LEVEL)), 1.0)
}

/// Same as [`mix`] with the vocal at its own level and a master gain
/// applied before normalization.
pub fn mix_with_gain(
    tracks: &BTreeMap<InstrumentRole, AudioBuffer>,
    levels: &BTreeMap<InstrumentRole, f32>,
    vocal: Option<(&AudioBuffer, f32)>,
    master_gain: f32,
) -> AudioBuffer {
    let sample_rate = tracks
        .values()
        .next()
        .or(vocal.map(|(v, _)| v))
        .map(|b| b.sample_rate)
        .unwrap_or(DEFAULT_SAMPLE_RATE);

    // (buffer at the common rate, level, pan), in role order then vocal
    let mut layers: Vec<(AudioBuffer, f32, f32)> = tracks
        .iter()
        .map(|(role, buffer)| {
            let level = levels.get(role).copied().unwrap_or(role.default_level());
            (buffer.resampled(sample_rate), level, role.pan())
        })
        .collect();
    if let Some((vocal, level)) = vocal {
        layers.push((vocal.resampled(sample_rate), level, VOCAL_PAN));
    }

    let frames = layers.iter().map(|(b, _, _)| b.frames()).max().unwrap_or(0);
    let mut master = vec![0.0f64; frames * 2];

    for (buffer, level, pan) in &layers {
        let (left, right) = pan_gains(*pan);
        let channels = buffer.channels.max(1) as usize;
        // Shorter layers simply stop contributing: zero padding, no looping
        for (frame, chunk) in buffer.samples.chunks_exact(channels).enumerate() {
            let sample = chunk.iter().map(|&s| s as f64).sum::<f64>() / channels as f64
                * *level as f64;
            master[frame * 2] += sample * left;
            master[frame * 2 + 1] += sample * right;
        }
    }

    let gain = master_gain as f64;
    if gain != 1.0 {
        master.iter_mut().for_each(|s| *s *= gain);
    }

    let peak = master.iter().fold(0.0f64, |peak, s| peak.max(s.abs()));
    if peak > NORMALIZE_CEILING {
        let scale = NORMALIZE_CEILING / peak;
        master.iter_mut().for_each(|s| *s *= scale);
        debug!(peak, scale, "Normalized master");
    } else if peak < SILENCE_FLOOR {
        debug!(peak, "Master is near silent, skipping normalization");
    }

    AudioBuffer {
        sample_rate,
        channels: 2,
        samples: master
            .into_iter()
            .map(|s| s.clamp(-1.0, 1.0) as f32)
            .collect(),
    }
}
