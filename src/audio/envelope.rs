//! ADSR envelope generator
//!
//! Provides Attack-Decay-Sustain-Release envelope shaping for synthesized
//! notes. The release phase lives inside the note's own duration, so a
//! rendered note never rings past its nominal end.

/// ADSR Envelope parameters
///
/// Controls the amplitude shape of a note over time:
/// - Attack: Time to reach peak amplitude
/// - Decay: Time to fall from peak to sustain level
/// - Sustain: Amplitude level held during the sustain phase (0.0 to 1.0)
/// - Release: Time to fade from the held level to silence
///
/// All times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Attack time in seconds
    pub attack: f64,
    /// Decay time in seconds
    pub decay: f64,
    /// Sustain level (0.0 to 1.0)
    pub sustain: f64,
    /// Release time in seconds
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
        }
    }
}

impl Envelope {
    /// Create a new envelope with custom parameters
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
        }
    }

    /// Returns the envelope adjusted to a note of `duration` seconds.
    ///
    /// If attack + release would exceed the note, both are compressed by the
    /// same factor so they exactly fill it. Decay is cut to whatever time is
    /// left between them.
    pub fn fitted(&self, duration: f64) -> Self {
        let duration = duration.max(0.0);
        let edges = self.attack + self.release;
        let (attack, release) = if edges > duration && edges > 0.0 {
            let scale = duration / edges;
            (self.attack * scale, self.release * scale)
        } else {
            (self.attack, self.release)
        };
        Self {
            attack,
            decay: self.decay.min((duration - attack - release).max(0.0)),
            sustain: self.sustain,
            release,
        }
    }

    /// Level reached at the end of the attack + decay phases, or earlier if
    /// the release starts first.
    fn level_at(&self, frame: usize, attack_frames: usize, decay_frames: usize) -> f64 {
        if frame < attack_frames {
            frame as f64 / attack_frames as f64
        } else if frame < attack_frames + decay_frames {
            let progress = (frame - attack_frames) as f64 / decay_frames as f64;
            1.0 - progress * (1.0 - self.sustain)
        } else if decay_frames == 0 && attack_frames > 0 && self.sustain < 1.0 {
            // No room to decay: hold the peak
            1.0
        } else {
            self.sustain
        }
    }

    /// Apply the envelope (fitted to the slice length) to samples.
    ///
    /// # Arguments
    /// * `samples` - Audio samples to shape
    /// * `sample_rate` - Sample rate in Hz
    pub fn apply(&self, samples: &mut [f64], sample_rate: u32) {
        if samples.is_empty() {
            return;
        }

        let total = samples.len();
        let rate = sample_rate as f64;
        let fitted = self.fitted(total as f64 / rate);

        let attack_frames = ((fitted.attack * rate) as usize).min(total);
        let release_frames = ((fitted.release * rate) as usize).min(total - attack_frames);
        let decay_frames =
            ((fitted.decay * rate) as usize).min(total - attack_frames - release_frames);
        let release_start = total - release_frames;
        let release_level = fitted.level_at(release_start, attack_frames, decay_frames);

        for (i, sample) in samples.iter_mut().enumerate() {
            let amplitude = if i < release_start {
                fitted.level_at(i, attack_frames, decay_frames)
            } else {
                // Ends exactly at zero on the last frame
                let progress = (i - release_start + 1) as f64 / release_frames as f64;
                release_level * (1.0 - progress)
            };
            *sample *= amplitude;
        }
    }

    /// Generate the envelope curve as samples.
    pub fn generate(&self, frames: usize, sample_rate: u32) -> Vec<f64> {
        let mut samples = vec![1.0; frames];
        self.apply(&mut samples, sample_rate);
        samples
    }
}
