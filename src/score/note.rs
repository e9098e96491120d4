//! Note event representation.
//!
//! A note event is one pitched sound instruction with a beat-relative onset,
//! a duration in beats, an absolute pitch and a normalized velocity.

use serde::{Deserialize, Serialize};

/// Represents a single pitched note within a section.
///
/// Onsets are relative to the start of the owning section. Overlapping
/// events on the same role are allowed (polyphony).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Start position in beats from the beginning of the section.
    pub onset_beat: f64,

    /// Length in beats. Always positive.
    pub duration_beats: f64,

    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Note velocity in [0, 1]. Scales the rendered amplitude.
    pub velocity: f32,
}

impl NoteEvent {
    /// Creates a new note event, clamping pitch and velocity into range.
    ///
    /// ```
    /// use songsmith::score::NoteEvent;
    ///
    /// // A middle C quarter note on beat 1 at medium velocity
    /// let note = NoteEvent::new(0.0, 1.0, 60, 0.7);
    /// assert_eq!(note.end_beat(), 1.0);
    /// ```
    pub fn new(onset_beat: f64, duration_beats: f64, pitch: u8, velocity: f32) -> Self {
        Self {
            onset_beat: onset_beat.max(0.0),
            duration_beats,
            pitch: pitch.min(127),
            velocity: velocity.clamp(0.0, 1.0),
        }
    }

    /// Returns the end beat of this note (onset + duration).
    pub fn end_beat(&self) -> f64 {
        self.onset_beat + self.duration_beats
    }

    /// Checks that the note fits inside a span of `length_beats`.
    pub fn fits_within(&self, length_beats: f64) -> bool {
        self.onset_beat >= 0.0 && self.duration_beats > 0.0 && self.end_beat() <= length_beats
    }

    /// Returns a copy moved later by `beats`.
    pub fn shifted(&self, beats: f64) -> Self {
        Self {
            onset_beat: self.onset_beat + beats,
            ..*self
        }
    }
}
