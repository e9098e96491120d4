//! Synthetic vocal line.
//!
//! Each syllable is sung as a harmonic buzz: a fundamental plus four
//! decaying harmonics whose balance follows the syllable's vowel, with light
//! vibrato and a short breath of noise for hissing consonants. It is a
//! periodic-tone sketch of a melody, not a singing voice.

use super::buffer::AudioBuffer;
use super::lyrics::{has_fricative_onset, vowel_of, LyricLine};
use super::oscillator::white_noise;
use super::synth::{max_pitch_for_rate, MAX_SAMPLE_RATE, MAX_TEMPO_BPM, MIN_SAMPLE_RATE, MIN_TEMPO_BPM};
use crate::error::{Result, SongError};
use crate::score::{beats_to_frames, pitch_to_frequency, InstrumentKind, NoteEvent};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::{debug, warn};

/// Vibrato rate in Hz.
const VIBRATO_RATE: f64 = 5.5;
/// Vibrato depth in semitones.
const VIBRATO_DEPTH: f64 = 0.2;
/// Length of the consonant noise burst in seconds.
const FRICATIVE_SECONDS: f64 = 0.03;
const FRICATIVE_LEVEL: f64 = 0.25;

/// Frequency of A4 the vocal is tuned to unless asked otherwise.
pub const STANDARD_TUNING_HZ: f64 = 440.0;
/// Accepted tuning references, one octave either side of standard.
pub const MIN_TUNING_HZ: f64 = 220.0;
pub const MAX_TUNING_HZ: f64 = 880.0;

/// Something the aligner had to repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VocalWarning {
    /// More syllables than notes; these were not sung.
    DroppedSyllables { syllables: Vec<String> },
    /// More notes than syllables; the last syllable was re-sung on the rest.
    HeldSyllable { syllable: String, extra_notes: usize },
    /// The lyrics had no syllables, so the take is silent.
    NoSyllables,
}

/// One syllable placed on one melody note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllableAlignment {
    pub syllable: String,
    pub note: NoteEvent,
    /// True when this note re-sings the previous syllable.
    pub held: bool,
}

/// A rendered vocal line with its alignment and any repairs made.
#[derive(Debug, Clone, PartialEq)]
pub struct VocalTake {
    pub buffer: AudioBuffer,
    pub alignment: Vec<SyllableAlignment>,
    pub warnings: Vec<VocalWarning>,
}

/// Relative weights of harmonics 1 to 5 for a vowel.
fn harmonic_weights(vowel: Option<char>) -> [f64; 5] {
    match vowel {
        Some('a') => [1.0, 0.7, 0.5, 0.3, 0.15],
        Some('e') => [1.0, 0.4, 0.6, 0.2, 0.1],
        Some('i') | Some('y') => [1.0, 0.2, 0.3, 0.5, 0.3],
        Some('o') => [1.0, 0.8, 0.3, 0.1, 0.05],
        Some('u') => [1.0, 0.5, 0.15, 0.05, 0.02],
        _ => [1.0, 0.5, 0.25, 0.12, 0.06],
    }
}

/// Aligns syllables to notes in order.
///
/// Extra syllables are dropped; extra notes re-sing the last syllable.
fn align(lyrics: &LyricLine, melody: &[NoteEvent]) -> (Vec<SyllableAlignment>, Vec<VocalWarning>) {
    let mut warnings = Vec::new();
    let Some(last) = lyrics.syllables.last() else {
        warnings.push(VocalWarning::NoSyllables);
        return (Vec::new(), warnings);
    };

    if lyrics.len() > melody.len() {
        warnings.push(VocalWarning::DroppedSyllables {
            syllables: lyrics.syllables[melody.len()..].to_vec(),
        });
    } else if melody.len() > lyrics.len() {
        warnings.push(VocalWarning::HeldSyllable {
            syllable: last.clone(),
            extra_notes: melody.len() - lyrics.len(),
        });
    }

    let alignment = melody
        .iter()
        .enumerate()
        .map(|(i, note)| SyllableAlignment {
            syllable: lyrics.syllables.get(i).unwrap_or(last).clone(),
            note: *note,
            held: i >= lyrics.len(),
        })
        .collect();
    (alignment, warnings)
}

/// Sings `lyrics` over `melody` into a mono buffer.
///
/// The buffer is as long as the melody (the end of its latest note).
///
/// # Errors
///
/// Returns `OutOfRange` for an unusable tempo or sample rate.
pub fn synthesize_vocal(
    lyrics: &LyricLine,
    melody: &[NoteEvent],
    tempo_bpm: f64,
    sample_rate: u32,
) -> Result<VocalTake> {
    synthesize_vocal_tuned(lyrics, melody, tempo_bpm, sample_rate, STANDARD_TUNING_HZ)
}

/// Same as [`synthesize_vocal`] with A4 sung at `tuning_hz` instead of
/// 440 Hz. Every note moves by the same number of (fractional) semitones.
///
/// # Errors
///
/// Also returns `OutOfRange` for a tuning outside 220..=880 Hz.
pub fn synthesize_vocal_tuned(
    lyrics: &LyricLine,
    melody: &[NoteEvent],
    tempo_bpm: f64,
    sample_rate: u32,
    tuning_hz: f64,
) -> Result<VocalTake> {
    SongError::check_range("tuning_hz", tuning_hz, MIN_TUNING_HZ, MAX_TUNING_HZ)?;
    SongError::check_range("tempo_bpm", tempo_bpm, MIN_TEMPO_BPM, MAX_TEMPO_BPM)?;
    SongError::check_range(
        "sample_rate",
        sample_rate as f64,
        MIN_SAMPLE_RATE as f64,
        MAX_SAMPLE_RATE as f64,
    )?;

    let total_frames = melody
        .iter()
        .map(|n| beats_to_frames(n.end_beat(), tempo_bpm, sample_rate))
        .max()
        .unwrap_or(0);
    let mut output = vec![0.0f64; total_frames];

    let (alignment, warnings) = align(lyrics, melody);
    for warning in &warnings {
        warn!(?warning, "Vocal alignment repaired");
    }

    let transpose = 12.0 * (tuning_hz / STANDARD_TUNING_HZ).log2();
    let voice = InstrumentKind::Vocal.voice();
    for placed in &alignment {
        let start = beats_to_frames(placed.note.onset_beat, tempo_bpm, sample_rate);
        let end = beats_to_frames(placed.note.end_beat(), tempo_bpm, sample_rate);
        if end <= start {
            continue;
        }
        let mut samples = sing(placed, transpose, start, end - start, sample_rate);
        voice.envelope.apply(&mut samples, sample_rate);
        let gain = placed.note.velocity as f64 * voice.gain;
        for (out, sample) in output[start..end].iter_mut().zip(samples) {
            *out += sample * gain;
        }
    }

    debug!(
        syllables = lyrics.len(),
        notes = melody.len(),
        frames = total_frames,
        tuning_hz,
        "Rendered vocal take"
    );

    Ok(VocalTake {
        buffer: AudioBuffer::mono(sample_rate, output.into_iter().map(|s| s as f32).collect()),
        alignment,
        warnings,
    })
}

/// Renders one syllable at unit gain, before the envelope.
fn sing(
    placed: &SyllableAlignment,
    transpose: f64,
    start: usize,
    frames: usize,
    sample_rate: u32,
) -> Vec<f64> {
    let rate = sample_rate as f64;
    let nyquist = rate / 2.0;
    let mut pitch = placed.note.pitch as f64 + transpose;
    if pitch_to_frequency(pitch) >= nyquist {
        let clamped = max_pitch_for_rate(sample_rate);
        warn!(pitch, clamped, "Vocal pitch at or beyond Nyquist, clamping");
        pitch = clamped;
    }
    let frequency = pitch_to_frequency(pitch);

    let weights = harmonic_weights(vowel_of(&placed.syllable));
    let norm: f64 = weights.iter().sum();
    let burst_frames = if !placed.held && has_fricative_onset(&placed.syllable) {
        ((FRICATIVE_SECONDS * rate) as usize).min(frames)
    } else {
        0
    };

    let mut phase = 0.0f64;
    (0..frames)
        .map(|i| {
            let t = i as f64 / rate;
            let bend = VIBRATO_DEPTH * (TAU * VIBRATO_RATE * t).sin();
            phase += frequency * 2f64.powf(bend / 12.0) / rate;

            let mut sample = 0.0;
            for (h, weight) in weights.iter().enumerate() {
                let harmonic = (h + 1) as f64;
                if frequency * harmonic >= nyquist {
                    break;
                }
                sample += weight * (TAU * harmonic * phase).sin();
            }
            sample /= norm;

            if i < burst_frames {
                let fade = 1.0 - i as f64 / burst_frames as f64;
                sample += FRICATIVE_LEVEL * fade * white_noise((start + i) as u64, placed.note.pitch as u64);
            }
            sample
        })
        .collect()
}
