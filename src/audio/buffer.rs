//! Materialized sample buffers.

/// Interleaved f32 samples at a fixed rate and channel count.
///
/// Every stage hands a complete buffer to the next one; there is no
/// streaming or partially written state.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    /// 1 for per-track renders, 2 for the master.
    pub channels: u16,
    /// Interleaved samples, `frames * channels` long.
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    /// Creates a buffer of `frames` frames of silence.
    pub fn silent(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: vec![0.0; frames * channels.max(1) as usize],
        }
    }

    /// Wraps mono samples.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Zero-pads the buffer up to `frames`. Never shortens it.
    pub fn pad_to(&mut self, frames: usize) {
        let len = frames * self.channels as usize;
        if self.samples.len() < len {
            self.samples.resize(len, 0.0);
        }
    }

    /// Cuts the buffer down to `frames`. Never lengthens it.
    pub fn truncate(&mut self, frames: usize) {
        self.samples.truncate(frames * self.channels as usize);
    }

    /// Linear fade to silence over the last `frames` frames.
    pub fn fade_out(&mut self, frames: usize) {
        let total = self.frames();
        let frames = frames.min(total);
        if frames == 0 {
            return;
        }
        let channels = self.channels as usize;
        let start = total - frames;
        for frame in start..total {
            let gain = (total - 1 - frame) as f32 / frames as f32;
            for sample in &mut self.samples[frame * channels..(frame + 1) * channels] {
                *sample *= gain;
            }
        }
    }

    /// Makes the buffer exactly `frames` long.
    ///
    /// Short buffers are zero-padded. Long buffers are truncated and the new
    /// tail is faded over `fade_frames` so the cut does not click.
    pub fn fit_to(&mut self, frames: usize, fade_frames: usize) {
        if self.frames() > frames {
            self.truncate(frames);
            self.fade_out(fade_frames);
        } else {
            self.pad_to(frames);
        }
    }

    /// Returns a copy converted to `target_rate` by linear interpolation.
    pub fn resampled(&self, target_rate: u32) -> Self {
        if target_rate == self.sample_rate || self.is_empty() {
            return Self {
                sample_rate: target_rate,
                ..self.clone()
            };
        }

        let channels = self.channels as usize;
        let source_frames = self.frames();
        let ratio = self.sample_rate as f64 / target_rate as f64;
        let target_frames = (source_frames as f64 / ratio).round() as usize;
        let mut samples = Vec::with_capacity(target_frames * channels);

        for frame in 0..target_frames {
            let position = frame as f64 * ratio;
            let index = (position.floor() as usize).min(source_frames - 1);
            let next = (index + 1).min(source_frames - 1);
            let fraction = (position - index as f64).clamp(0.0, 1.0) as f32;
            for channel in 0..channels {
                let a = self.samples[index * channels + channel];
                let b = self.samples[next * channels + channel];
                samples.push(a + (b - a) * fraction);
            }
        }

        Self {
            sample_rate: target_rate,
            channels: self.channels,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_peak() {
        let buffer = AudioBuffer {
            sample_rate: 8000,
            channels: 2,
            samples: vec![0.1, -0.5, 0.25, 0.0],
        };
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.peak(), 0.5);
        assert_eq!(AudioBuffer::silent(8000, 2, 10).samples.len(), 20);
    }

    #[test]
    fn test_fit_to_pads_and_truncates() {
        let mut buffer = AudioBuffer::mono(1000, vec![1.0; 100]);
        buffer.fit_to(150, 10);
        assert_eq!(buffer.frames(), 150);
        assert_eq!(buffer.samples[120], 0.0);

        buffer.fit_to(50, 10);
        assert_eq!(buffer.frames(), 50);
        assert_eq!(buffer.samples[39], 1.0);
        assert_eq!(buffer.samples[49], 0.0);
        assert!(buffer.samples[45] < 1.0);
    }

    #[test]
    fn test_resample_linear() {
        let buffer = AudioBuffer::mono(2, vec![0.0, 1.0]);
        let up = buffer.resampled(4);
        assert_eq!(up.sample_rate, 4);
        assert_eq!(up.samples, vec![0.0, 0.5, 1.0, 1.0]);

        let same = buffer.resampled(2);
        assert_eq!(same, buffer);
    }
}
