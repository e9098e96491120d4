//! Sections and chords.
//!
//! A section is a labelled run of bars with its own chord sequence and one
//! note list per instrument role.

use super::instrument::InstrumentRole;
use super::key::Key;
use super::note::NoteEvent;
use super::NOTE_NAMES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many scale degrees are stacked on a chord root, and which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordVoicing {
    /// Root, third and fifth degrees.
    Triad,
    /// Triad plus the seventh degree.
    Seventh,
    /// Second replaces the third.
    Sus2,
    /// Fourth replaces the third.
    Sus4,
    /// Root and fifth only.
    Power,
}

impl ChordVoicing {
    /// Scale-degree steps above the root.
    pub fn steps(self) -> &'static [i32] {
        match self {
            Self::Triad => &[0, 2, 4],
            Self::Seventh => &[0, 2, 4, 6],
            Self::Sus2 => &[0, 1, 4],
            Self::Sus4 => &[0, 3, 4],
            Self::Power => &[0, 4],
        }
    }
}

/// Harmonic quality, derived from the semitone content of the stacked tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended,
    Power,
    Other,
}

impl ChordQuality {
    fn suffix(self) -> &'static str {
        match self {
            Self::Major => "",
            Self::Minor => "m",
            Self::Diminished => "dim",
            Self::Augmented => "aug",
            Self::Suspended => "sus",
            Self::Power => "5",
            Self::Other => "?",
        }
    }
}

/// A diatonic chord built on one scale degree of the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    /// Zero-based scale degree of the root.
    pub degree: u8,
    pub voicing: ChordVoicing,
    pub quality: ChordQuality,
    /// Scale degrees (relative to the key tonic) of every chord tone, root first.
    pub tones: Vec<i32>,
}

impl Chord {
    /// Stacks `voicing` on `degree` within `key`.
    pub fn new(key: &Key, degree: u8, voicing: ChordVoicing) -> Self {
        let tones: Vec<i32> = voicing
            .steps()
            .iter()
            .map(|step| degree as i32 + step)
            .collect();
        let quality = Self::classify(key, &tones, voicing);
        Self {
            degree,
            voicing,
            quality,
            tones,
        }
    }

    fn classify(key: &Key, tones: &[i32], voicing: ChordVoicing) -> ChordQuality {
        match voicing {
            ChordVoicing::Sus2 | ChordVoicing::Sus4 => return ChordQuality::Suspended,
            ChordVoicing::Power => return ChordQuality::Power,
            ChordVoicing::Triad | ChordVoicing::Seventh => {}
        }
        let root = key.pitch_for_degree(tones[0], 4) as i32;
        let intervals: Vec<i32> = tones[1..]
            .iter()
            .map(|&t| (key.pitch_for_degree(t, 4) as i32 - root).rem_euclid(12))
            .collect();
        let has = |semitones: i32| intervals.contains(&semitones);
        if has(4) && has(7) {
            ChordQuality::Major
        } else if has(3) && has(7) {
            ChordQuality::Minor
        } else if has(3) && has(6) {
            ChordQuality::Diminished
        } else if has(4) && has(8) {
            ChordQuality::Augmented
        } else {
            ChordQuality::Other
        }
    }

    /// Root pitch in the given octave.
    pub fn root_pitch(&self, key: &Key, octave: i32) -> u8 {
        key.pitch_for_degree(self.degree as i32, octave)
    }

    /// All chord tone pitches, stacked upward from the root in `octave`.
    pub fn pitches(&self, key: &Key, octave: i32) -> Vec<u8> {
        self.tones
            .iter()
            .map(|&t| key.pitch_for_degree(t, octave))
            .collect()
    }

    /// Checks whether a scale degree (any octave) is one of the chord tones.
    pub fn has_degree(&self, key: &Key, degree: i32) -> bool {
        let len = key.len().max(1) as i32;
        self.tones
            .iter()
            .any(|&t| t.rem_euclid(len) == degree.rem_euclid(len))
    }

    /// Chord symbol such as "F#m".
    pub fn symbol(&self, key: &Key) -> String {
        let root = self.root_pitch(key, 4);
        format!("{}{}", NOTE_NAMES[(root % 12) as usize], self.quality.suffix())
    }
}

/// A labelled time-span of the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Display label ("intro", "chorus", ...).
    pub label: String,

    /// Position of this section in the originally generated layout. Selects
    /// the section's own deterministic stream, so it survives reordering.
    pub ordinal: usize,

    /// Length in bars.
    pub bar_count: u32,

    /// Chord per bar subdivision, in order.
    pub chords: Vec<Chord>,

    /// Note events per role, sorted by onset.
    pub note_events: BTreeMap<InstrumentRole, Vec<NoteEvent>>,
}

impl Section {
    /// Nominal length of the section in beats.
    pub fn length_beats(&self, beats_per_bar: u32) -> f64 {
        self.bar_count as f64 * beats_per_bar as f64
    }

    /// Returns the events for a role (empty if the role is not present).
    pub fn events(&self, role: InstrumentRole) -> &[NoteEvent] {
        self.note_events
            .get(&role)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest end beat among a role's events.
    pub fn span_beats(&self, role: InstrumentRole) -> f64 {
        self.events(role)
            .iter()
            .map(NoteEvent::end_beat)
            .fold(0.0, f64::max)
    }

    /// Number of chords per bar in this section.
    pub fn chords_per_bar(&self) -> usize {
        if self.bar_count == 0 {
            0
        } else {
            self.chords.len() / self.bar_count as usize
        }
    }

    /// Checks the timing invariants: every event fits inside the section and
    /// every non-empty role spans exactly the section length.
    pub fn is_consistent(&self, beats_per_bar: u32) -> bool {
        let length = self.length_beats(beats_per_bar);
        self.note_events.iter().all(|(&role, events)| {
            events.iter().all(|e| e.fits_within(length))
                && (events.is_empty() || (self.span_beats(role) - length).abs() < 1e-9)
        })
    }

    /// Total number of note events across all roles.
    pub fn note_count(&self) -> usize {
        self.note_events.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major() -> Key {
        Key::new(60, vec![0, 2, 4, 5, 7, 9, 11])
    }

    #[test]
    fn test_chord_quality() {
        let key = c_major();
        assert_eq!(Chord::new(&key, 0, ChordVoicing::Triad).quality, ChordQuality::Major);
        assert_eq!(Chord::new(&key, 1, ChordVoicing::Triad).quality, ChordQuality::Minor);
        assert_eq!(
            Chord::new(&key, 6, ChordVoicing::Triad).quality,
            ChordQuality::Diminished
        );
        assert_eq!(
            Chord::new(&key, 4, ChordVoicing::Sus4).quality,
            ChordQuality::Suspended
        );
    }

    #[test]
    fn test_chord_pitches_stay_in_key() {
        let key = c_major();
        let chord = Chord::new(&key, 5, ChordVoicing::Seventh);
        assert_eq!(chord.pitches(&key, 4), vec![69, 72, 76, 79]); // A C E G
        assert!(chord.pitches(&key, 2).iter().all(|&p| key.contains(p)));
        assert_eq!(chord.symbol(&key), "Am");
    }

    #[test]
    fn test_has_degree_wraps() {
        let key = c_major();
        let chord = Chord::new(&key, 4, ChordVoicing::Triad); // G B D
        assert!(chord.has_degree(&key, 4));
        assert!(chord.has_degree(&key, 8)); // D an octave up
        assert!(!chord.has_degree(&key, 0));
    }

    #[test]
    fn test_section_consistency() {
        let mut section = Section {
            label: "verse".to_string(),
            ordinal: 0,
            bar_count: 1,
            chords: vec![Chord::new(&c_major(), 0, ChordVoicing::Triad)],
            note_events: BTreeMap::new(),
        };
        section.note_events.insert(
            InstrumentRole::Bass,
            vec![NoteEvent::new(0.0, 2.0, 36, 0.8), NoteEvent::new(2.0, 2.0, 43, 0.8)],
        );
        assert!(section.is_consistent(4));
        assert_eq!(section.span_beats(InstrumentRole::Bass), 4.0);
        assert_eq!(section.chords_per_bar(), 1);

        section
            .note_events
            .insert(InstrumentRole::Lead, vec![NoteEvent::new(3.5, 1.0, 72, 0.5)]);
        assert!(!section.is_consistent(4));
    }
}
