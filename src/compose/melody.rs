//! Melodic contours for the vocal layer.

use super::patterns::{nearest_chord_tone, quantize_velocity, LEAD_OCTAVE};
use super::stream::SeedStream;
use crate::score::{Chord, NoteEvent, Score};

/// Score-absolute (start, end) beat span of every chord.
fn chord_timeline(score: &Score) -> Vec<(f64, f64, &Chord)> {
    let mut timeline = Vec::new();
    for (section, offset) in score.sections.iter().zip(score.section_offsets()) {
        let per_bar = section.chords_per_bar().max(1);
        let slot_beats = score.beats_per_bar as f64 / per_bar as f64;
        for (i, chord) in section.chords.iter().enumerate() {
            let start = offset + i as f64 * slot_beats;
            timeline.push((start, start + slot_beats, chord));
        }
    }
    timeline
}

/// Builds a contiguous melody of `count` notes for the vocal layer.
///
/// Notes last one or two beats, start at beat 0 and follow each other with
/// no gaps. Each note lands on a tone of the chord sounding at its onset
/// (wrapping around the score if the melody is longer than the music). The
/// contour is drawn from its own stream, so it is reproducible and leaves
/// the section streams untouched.
pub fn vocal_melody(score: &Score, count: usize) -> Vec<NoteEvent> {
    let mut stream = SeedStream::for_purpose(score.seed, score.prompt_hash, "vocal");
    let timeline = chord_timeline(score);
    let total = score.total_beats();

    let mut onset = 0.0;
    let mut degree = 0i32;
    let mut melody = Vec::with_capacity(count);
    for _ in 0..count {
        let duration = (stream.index(2) + 1) as f64;
        let step = [-2, -1, 1, 2][stream.index(4)];
        let position = if total > 0.0 { onset % total } else { 0.0 };

        degree += step;
        if let Some((_, _, chord)) = timeline
            .iter()
            .find(|(start, end, _)| position >= *start && position < *end)
        {
            degree = nearest_chord_tone(&score.key, chord, degree);
        }
        let len = score.key.len().max(1) as i32;
        degree = degree.clamp(-len, 2 * len - 1);

        let pitch = score.key.pitch_for_degree(degree, LEAD_OCTAVE);
        melody.push(NoteEvent::new(onset, duration, pitch, quantize_velocity(0.75)));
        onset += duration;
    }
    melody
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::generate;
    use crate::template::Catalog;

    #[test]
    fn test_melody_is_contiguous_and_in_key() {
        let catalog = Catalog::builtin().unwrap();
        let score = generate(catalog.lookup("lofi").unwrap(), "rainy evening", 42);
        let melody = vocal_melody(&score, 12);
        assert_eq!(melody.len(), 12);
        assert_eq!(melody[0].onset_beat, 0.0);
        for pair in melody.windows(2) {
            assert_eq!(pair[0].end_beat(), pair[1].onset_beat);
        }
        assert!(melody
            .iter()
            .all(|n| n.duration_beats == 1.0 || n.duration_beats == 2.0));
        assert!(melody.iter().all(|n| score.key.contains(n.pitch)));
        assert_eq!(melody, vocal_melody(&score, 12));
    }

    #[test]
    fn test_melody_prefix_is_stable() {
        let catalog = Catalog::builtin().unwrap();
        let score = generate(catalog.lookup("jazz").unwrap(), "", 1);
        let long = vocal_melody(&score, 8);
        let short = vocal_melody(&score, 4);
        assert_eq!(&long[..4], &short[..]);
        assert!(vocal_melody(&score, 0).is_empty());
    }
}
