//! Note-event synthesis.
//!
//! Renders one part (a role's note events under one instrument kind) into a
//! mono buffer. Every sample is a pure function of the events, kind, tempo
//! and sample rate: no state survives between calls and noise comes from a
//! hash of the sample index.

use super::buffer::AudioBuffer;
use super::envelope::Envelope;
use super::oscillator::{white_noise, Waveform};
use crate::error::{Result, SongError};
use crate::score::{beats_to_frames, pitch_to_frequency, InstrumentKind, NoteEvent, Voice};
use std::f64::consts::TAU;
use tracing::{debug, warn};

/// Lowest tempo the synthesis engine accepts.
pub const MIN_TEMPO_BPM: f64 = 1.0;
/// Highest tempo the synthesis engine accepts.
pub const MAX_TEMPO_BPM: f64 = 1000.0;
/// Supported sample rates.
pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Percussive pitches below this are kicks.
pub const KICK_MAX_PITCH: u8 = 48;
/// Percussive pitches below this (and not kicks) are snares; the rest are hats.
pub const SNARE_MAX_PITCH: u8 = 72;

/// Drum voice chosen from a percussive note's register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drum {
    Kick,
    Snare,
    Hat,
}

impl Drum {
    pub fn for_pitch(pitch: u8) -> Self {
        if pitch < KICK_MAX_PITCH {
            Drum::Kick
        } else if pitch < SNARE_MAX_PITCH {
            Drum::Snare
        } else {
            Drum::Hat
        }
    }

    fn envelope(self) -> Envelope {
        match self {
            Drum::Kick => Envelope::new(0.001, 0.25, 0.0, 0.04),
            Drum::Snare => Envelope::new(0.001, 0.14, 0.0, 0.04),
            Drum::Hat => Envelope::new(0.0005, 0.05, 0.0, 0.02),
        }
    }
}

/// Highest whole pitch whose frequency stays strictly below Nyquist.
pub fn max_pitch_for_rate(sample_rate: u32) -> f64 {
    let nyquist = sample_rate as f64 / 2.0;
    let mut pitch = (69.0 + 12.0 * (nyquist / 440.0).log2()).floor();
    while pitch_to_frequency(pitch) >= nyquist {
        pitch -= 1.0;
    }
    pitch
}

/// Renders note events with an instrument kind into a mono buffer.
///
/// The buffer ends on the end frame of the latest event. Overlapping notes
/// are summed.
///
/// # Arguments
/// * `events` - Note events with beat-based timing
/// * `kind` - Timbre to render them with
/// * `tempo_bpm` - Tempo used to place beats on the sample grid
/// * `sample_rate` - Output sample rate in Hz
///
/// # Errors
///
/// Returns `OutOfRange` for a non-positive or non-finite tempo, or a sample
/// rate outside the supported range.
pub fn render(
    events: &[NoteEvent],
    kind: InstrumentKind,
    tempo_bpm: f64,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    SongError::check_range("tempo_bpm", tempo_bpm, MIN_TEMPO_BPM, MAX_TEMPO_BPM)?;
    SongError::check_range(
        "sample_rate",
        sample_rate as f64,
        MIN_SAMPLE_RATE as f64,
        MAX_SAMPLE_RATE as f64,
    )?;

    let voice = kind.voice();
    let total_frames = events
        .iter()
        .map(|e| beats_to_frames(e.end_beat(), tempo_bpm, sample_rate))
        .max()
        .unwrap_or(0);
    let mut output = vec![0.0f64; total_frames];

    for event in events {
        let start = beats_to_frames(event.onset_beat, tempo_bpm, sample_rate);
        let end = beats_to_frames(event.end_beat(), tempo_bpm, sample_rate);
        if end <= start {
            continue;
        }

        let note = if voice.percussive {
            render_drum(event, start, end - start, sample_rate)
        } else {
            render_tone(event, &voice, end - start, sample_rate)
        };
        let gain = event.velocity as f64 * voice.gain;
        for (out, sample) in output[start..end].iter_mut().zip(note) {
            *out += sample * gain;
        }
    }

    debug!(
        kind = %kind,
        events = events.len(),
        frames = total_frames,
        "Rendered part"
    );

    Ok(AudioBuffer::mono(
        sample_rate,
        output.into_iter().map(|s| s as f32).collect(),
    ))
}

/// Renders one pitched note, enveloped, at unit velocity.
fn render_tone(event: &NoteEvent, voice: &Voice, frames: usize, sample_rate: u32) -> Vec<f64> {
    let nyquist = sample_rate as f64 / 2.0;
    let mut pitch = event.pitch as f64 + 12.0 * voice.octave_shift as f64;
    if pitch_to_frequency(pitch) >= nyquist {
        let clamped = max_pitch_for_rate(sample_rate);
        warn!(
            pitch,
            clamped, sample_rate, "Pitch at or beyond Nyquist, clamping"
        );
        pitch = clamped;
    }
    let frequency = pitch_to_frequency(pitch);

    let mut samples = vec![0.0f64; frames];
    for partial in voice.partials {
        let partial_frequency = frequency * partial.ratio;
        // Upper partials that would alias are dropped, the note still sounds
        if partial_frequency >= nyquist {
            continue;
        }
        let step = partial_frequency / sample_rate as f64;
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample += partial.amplitude
                * partial
                    .waveform
                    .sample(step * i as f64, i, event.pitch as u64);
        }
    }

    voice.envelope.apply(&mut samples, sample_rate);
    samples
}

/// Renders one percussive hit. `start` keys the noise so repeated hits differ.
fn render_drum(event: &NoteEvent, start: usize, frames: usize, sample_rate: u32) -> Vec<f64> {
    let drum = Drum::for_pitch(event.pitch);
    let rate = sample_rate as f64;
    let seed = event.pitch as u64;

    let mut samples: Vec<f64> = match drum {
        Drum::Kick => {
            // Exponential pitch drop from 150 Hz to 45 Hz
            let mut phase = 0.0;
            (0..frames)
                .map(|i| {
                    let t = i as f64 / rate;
                    let frequency = 45.0 + 105.0 * (-t * 30.0).exp();
                    phase += frequency / rate;
                    (TAU * phase).sin()
                })
                .collect()
        }
        Drum::Snare => (0..frames)
            .map(|i| {
                let body = Waveform::Triangle.sample(180.0 * i as f64 / rate, i, seed);
                0.65 * white_noise((start + i) as u64, seed) + 0.35 * body
            })
            .collect(),
        Drum::Hat => {
            // First difference of white noise tilts it toward the top end
            let mut previous = white_noise(start as u64, seed);
            (0..frames)
                .map(|i| {
                    let current = white_noise((start + i + 1) as u64, seed);
                    let sample = 0.5 * (current - previous);
                    previous = current;
                    sample
                })
                .collect()
        }
    };

    drum.envelope().apply(&mut samples, sample_rate);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SAMPLE_RATE: u32 = 8000;

    fn note(onset: f64, duration: f64, pitch: u8) -> NoteEvent {
        NoteEvent::new(onset, duration, pitch, 0.8)
    }

    #[test]
    fn test_length_matches_latest_event() {
        let events = [note(0.0, 1.0, 60), note(2.0, 2.0, 64), note(1.0, 0.5, 67)];
        let buffer = render(&events, InstrumentKind::SineLead, 120.0, TEST_SAMPLE_RATE).unwrap();
        // 4 beats at 120 BPM = 2 seconds
        assert_eq!(buffer.frames(), 16000);
        assert_eq!(buffer.channels, 1);
        assert!(buffer.peak() > 0.1);
    }

    #[test]
    fn test_render_is_deterministic() {
        let events = [note(0.0, 1.0, 40), note(1.0, 1.0, 60), note(1.5, 0.5, 90)];
        for kind in InstrumentKind::ALL {
            let a = render(&events, kind, 97.0, TEST_SAMPLE_RATE).unwrap();
            let b = render(&events, kind, 97.0, TEST_SAMPLE_RATE).unwrap();
            assert_eq!(a, b, "{kind} differs between renders");
        }
    }

    #[test]
    fn test_silence_outside_events() {
        let events = [note(2.0, 1.0, 60)];
        let buffer = render(&events, InstrumentKind::SoftPad, 60.0, TEST_SAMPLE_RATE).unwrap();
        assert_eq!(buffer.frames(), 24000);
        assert!(buffer.samples[..16000].iter().all(|&s| s == 0.0));
        // Release ends inside the note
        assert_eq!(*buffer.samples.last().unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_tempo() {
        let events = [note(0.0, 1.0, 60)];
        for tempo in [0.0, -10.0, f64::NAN] {
            assert!(matches!(
                render(&events, InstrumentKind::SineLead, tempo, TEST_SAMPLE_RATE),
                Err(SongError::OutOfRange {
                    field: "tempo_bpm",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_pitch_beyond_nyquist_is_clamped() {
        // MIDI 127 is about 12.5 kHz, far above 4 kHz Nyquist
        let events = [note(0.0, 1.0, 127)];
        let buffer = render(&events, InstrumentKind::SineLead, 120.0, TEST_SAMPLE_RATE).unwrap();
        assert_eq!(buffer.frames(), 4000);
        assert!(buffer.samples.iter().all(|s| s.is_finite()));
        assert!(buffer.peak() > 0.1);

        let max = max_pitch_for_rate(TEST_SAMPLE_RATE);
        assert!(pitch_to_frequency(max) < 4000.0);
        assert!(pitch_to_frequency(max + 1.0) >= 4000.0);
    }

    #[test]
    fn test_drum_registers() {
        assert_eq!(Drum::for_pitch(36), Drum::Kick);
        assert_eq!(Drum::for_pitch(48), Drum::Snare);
        assert_eq!(Drum::for_pitch(71), Drum::Snare);
        assert_eq!(Drum::for_pitch(72), Drum::Hat);

        let events = [note(0.0, 1.0, 36), note(1.0, 1.0, 60), note(2.0, 0.5, 84)];
        let buffer = render(&events, InstrumentKind::NoiseKit, 120.0, TEST_SAMPLE_RATE).unwrap();
        assert!(buffer.samples.iter().all(|s| s.abs() <= 1.0));
        assert!(buffer.peak() > 0.05);
    }

    #[test]
    fn test_empty_events() {
        let buffer = render(&[], InstrumentKind::Bell, 100.0, TEST_SAMPLE_RATE).unwrap();
        assert!(buffer.is_empty());
    }
}
