//! Keys and scale-degree arithmetic.
//!
//! Every generated pitch goes through [`Key::pitch_for_degree`], which is the
//! reason all pitches in a generated Score are members of its scale.

use serde::{Deserialize, Serialize};

/// A tonic plus the semitone offsets of its scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// MIDI note of the tonic in its reference octave. Pitch class = root % 12.
    pub root: u8,

    /// Semitone offsets from the tonic, starting at 0, strictly increasing, < 12.
    pub intervals: Vec<u8>,
}

impl Key {
    pub fn new(root: u8, intervals: Vec<u8>) -> Self {
        Self { root, intervals }
    }

    /// Number of degrees in the scale.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Pitch class (0-11) of the tonic.
    pub fn root_class(&self) -> u8 {
        self.root % 12
    }

    /// Returns the pitch of an arbitrary scale degree near `octave`.
    ///
    /// `degree` may be negative or exceed the scale length; it wraps into
    /// neighbouring octaves. `octave` uses MIDI numbering (4 = middle C's
    /// octave), and degree 0 lands on the tonic in that octave.
    pub fn pitch_for_degree(&self, degree: i32, octave: i32) -> u8 {
        let len = self.intervals.len().max(1) as i32;
        let octave_shift = degree.div_euclid(len);
        let index = degree.rem_euclid(len) as usize;
        let interval = self.intervals.get(index).copied().unwrap_or(0) as i32;
        let mut pitch = (octave + 1 + octave_shift) * 12 + self.root_class() as i32 + interval;
        // Fold by whole octaves so the pitch class survives.
        while pitch > 127 {
            pitch -= 12;
        }
        while pitch < 0 {
            pitch += 12;
        }
        pitch as u8
    }

    /// Checks whether `pitch` belongs to the scale in any octave.
    pub fn contains(&self, pitch: u8) -> bool {
        let relative = (pitch as i32 - self.root_class() as i32).rem_euclid(12) as u8;
        self.intervals.contains(&relative)
    }

    /// Returns the degree index of `pitch`'s pitch class, if it is in the scale.
    pub fn degree_of(&self, pitch: u8) -> Option<usize> {
        let relative = (pitch as i32 - self.root_class() as i32).rem_euclid(12) as u8;
        self.intervals.iter().position(|&i| i == relative)
    }

    /// Human-readable name such as "A (7-note scale)".
    pub fn describe(&self) -> String {
        format!(
            "{} ({}-note scale)",
            super::NOTE_NAMES[self.root_class() as usize],
            self.intervals.len()
        )
    }
}
