//! The Score container.
//!
//! A Score is the complete symbolic state of a composition. It is treated as
//! an immutable value: editor operations clone it and return a new Score, so
//! a render that holds a reference to an older Score always finishes against
//! the value it was given.

use super::instrument::{InstrumentKind, InstrumentRole};
use super::key::Key;
use super::note::NoteEvent;
use super::section::Section;
use super::{beats_to_frames, beats_to_seconds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbolic representation of a generated piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Name of the template the score was generated from.
    pub template: String,

    /// Stable hash of the prompt text that seeded generation.
    pub prompt_hash: u64,

    /// Tempo in beats per minute.
    pub tempo_bpm: f64,

    /// Tonic and scale.
    pub key: Key,

    /// Beats per bar (4 for every built-in template).
    pub beats_per_bar: u32,

    /// Ordered sections.
    pub sections: Vec<Section>,

    /// Timbre assigned to each role.
    pub instrument_assignment: BTreeMap<InstrumentRole, InstrumentKind>,

    /// Seed of the deterministic generation stream.
    pub seed: u64,
}

impl Score {
    /// Total length in beats.
    pub fn total_beats(&self) -> f64 {
        self.sections
            .iter()
            .map(|s| s.length_beats(self.beats_per_bar))
            .sum()
    }

    /// Total number of bars.
    pub fn total_bars(&self) -> u32 {
        self.sections.iter().map(|s| s.bar_count).sum()
    }

    /// Total length in seconds at the current tempo.
    pub fn duration_seconds(&self) -> f64 {
        beats_to_seconds(self.total_beats(), self.tempo_bpm)
    }

    /// Nominal length in sample frames.
    pub fn total_frames(&self, sample_rate: u32) -> usize {
        beats_to_frames(self.total_beats(), self.tempo_bpm, sample_rate)
    }

    /// Start beat of each section, in order.
    pub fn section_offsets(&self) -> Vec<f64> {
        let mut offset = 0.0;
        self.sections
            .iter()
            .map(|s| {
                let start = offset;
                offset += s.length_beats(self.beats_per_bar);
                start
            })
            .collect()
    }

    /// All of a role's events laid end to end with score-absolute onsets.
    pub fn timeline(&self, role: InstrumentRole) -> Vec<NoteEvent> {
        self.sections
            .iter()
            .zip(self.section_offsets())
            .flat_map(|(section, offset)| {
                section
                    .events(role)
                    .iter()
                    .map(move |event| event.shifted(offset))
            })
            .collect()
    }

    /// Roles in deterministic order.
    pub fn roles(&self) -> impl Iterator<Item = InstrumentRole> + '_ {
        self.instrument_assignment.keys().copied()
    }

    /// Finds the first section with the given label.
    pub fn section_index(&self, label: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.label == label)
    }

    /// Iterates every note event of every section and role.
    pub fn all_events(&self) -> impl Iterator<Item = &NoteEvent> {
        self.sections
            .iter()
            .flat_map(|s| s.note_events.values().flatten())
    }

    /// Checks every section's timing invariants.
    pub fn is_consistent(&self) -> bool {
        self.sections
            .iter()
            .all(|s| s.is_consistent(self.beats_per_bar))
    }

    /// Saves the score to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads a score from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Chord, ChordVoicing};

    fn two_section_score() -> Score {
        let key = Key::new(57, vec![0, 2, 4, 5, 7, 9, 11]);
        let make = |label: &str, ordinal: usize, bars: u32| {
            let mut events = BTreeMap::new();
            events.insert(
                InstrumentRole::Bass,
                (0..bars)
                    .map(|bar| NoteEvent::new(bar as f64 * 4.0, 4.0, 45, 0.8))
                    .collect(),
            );
            Section {
                label: label.to_string(),
                ordinal,
                bar_count: bars,
                chords: vec![Chord::new(&key, 0, ChordVoicing::Triad); bars as usize],
                note_events: events,
            }
        };
        let mut assignment = BTreeMap::new();
        assignment.insert(InstrumentRole::Bass, InstrumentKind::SubBass);
        Score {
            template: "lofi".to_string(),
            prompt_hash: 0,
            tempo_bpm: 120.0,
            key: key.clone(),
            beats_per_bar: 4,
            sections: vec![make("intro", 0, 2), make("verse", 1, 4)],
            instrument_assignment: assignment,
            seed: 7,
        }
    }

    #[test]
    fn test_lengths() {
        let score = two_section_score();
        assert_eq!(score.total_bars(), 6);
        assert_eq!(score.total_beats(), 24.0);
        assert!((score.duration_seconds() - 12.0).abs() < 1e-12);
        assert_eq!(score.total_frames(44100), 529200);
        assert_eq!(score.section_offsets(), vec![0.0, 8.0]);
    }

    #[test]
    fn test_timeline_offsets_sections() {
        let score = two_section_score();
        let timeline = score.timeline(InstrumentRole::Bass);
        assert_eq!(timeline.len(), 6);
        assert_eq!(timeline[2].onset_beat, 8.0);
        assert_eq!(timeline[5].end_beat(), 24.0);
        assert!(score.timeline(InstrumentRole::Lead).is_empty());
    }

    #[test]
    fn test_serialization() {
        let score = two_section_score();
        let json = score.to_json().unwrap();
        let loaded = Score::from_json(&json).unwrap();
        assert_eq!(loaded, score);
        assert!(loaded.is_consistent());
    }
}
