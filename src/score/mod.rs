//! Symbolic score data structures.
//!
//! This module provides the non-audio representation of a composition:
//! keys and scales, chords, note events, sections, instrument roles and
//! kinds, and the [`Score`] and [`Project`] containers. Timing is stored in
//! beats so tempo changes never touch note positions.

mod instrument;
mod key;
mod midi_export;
mod note;
mod project;
mod section;
mod song;

pub use instrument::{InstrumentFamily, InstrumentKind, InstrumentRole, Partial, Voice};
pub use key::Key;
pub use midi_export::{encode_midi, export_to_midi, TICKS_PER_BEAT};
pub use note::NoteEvent;
pub use project::{Project, RenderParams, VocalSettings, DEFAULT_SAMPLE_RATE};
pub use section::{Chord, ChordQuality, ChordVoicing, Section};
pub use song::Score;

/// Standard note names for display purposes.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Beats per bar used by every built-in template (4/4 time).
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// ```
/// use songsmith::score::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Converts a pitch to its equal-temperament frequency (A4 = 440 Hz).
pub fn pitch_to_frequency(pitch: f64) -> f64 {
    440.0 * 2f64.powf((pitch - 69.0) / 12.0)
}

/// Converts a duration in beats to seconds at the given tempo.
pub fn beats_to_seconds(beats: f64, tempo_bpm: f64) -> f64 {
    beats * 60.0 / tempo_bpm
}

/// Converts a beat position to a sample frame index.
///
/// Both note starts and note ends go through this function, so adjacent
/// notes meet on the same frame and never leave gaps.
pub fn beats_to_frames(beats: f64, tempo_bpm: f64, sample_rate: u32) -> usize {
    (beats_to_seconds(beats, tempo_bpm) * sample_rate as f64).round() as usize
}
