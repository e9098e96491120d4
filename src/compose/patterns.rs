//! Per-role note patterns, one bar at a time.
//!
//! Every pattern writes bar-relative rhythms shifted to the bar start, takes
//! its pitches from [`Key::pitch_for_degree`] and ends its last event exactly
//! on the bar line. A section built from these bars therefore spans its
//! nominal length for every role.

use super::stream::SeedStream;
use crate::score::{Chord, Key, NoteEvent};

/// Octave of pad voicings.
pub const PAD_OCTAVE: i32 = 3;
/// Octave of bass notes.
pub const BASS_OCTAVE: i32 = 2;
/// Octave the lead and vocal lines move around.
pub const LEAD_OCTAVE: i32 = 4;
/// Tonic octaves that land in the kick, snare and hat registers.
pub const KICK_OCTAVE: i32 = 2;
pub const SNARE_OCTAVE: i32 = 4;
pub const HAT_OCTAVE: i32 = 6;

/// Syncopated lead rhythms as eighth-note positions in a 4/4 bar.
pub const RHYTHM_BANK: &[&[u32]] = &[
    &[0, 3, 4, 6],
    &[0, 2, 3, 5, 6],
    &[1, 3, 4, 7],
    &[0, 1, 3, 5, 6, 7],
    &[0, 3, 5],
    &[0, 2, 5, 6],
];

/// Rounds a velocity to a 1/128 step so it survives JSON round trips
/// bit-exactly.
pub fn quantize_velocity(velocity: f32) -> f32 {
    (velocity.clamp(0.0, 1.0) * 128.0).round() / 128.0
}

/// The chord tone of `chord` closest to `degree`, in scale degrees.
/// Ties resolve downward.
pub fn nearest_chord_tone(key: &Key, chord: &Chord, degree: i32) -> i32 {
    let len = key.len().max(1) as i32;
    let mut best = degree;
    let mut best_distance = i32::MAX;
    for &tone in &chord.tones {
        let class = tone.rem_euclid(len);
        let base = degree.div_euclid(len) * len + class;
        for candidate in [base - len, base, base + len] {
            let distance = (candidate - degree).abs();
            if distance < best_distance || (distance == best_distance && candidate < best) {
                best = candidate;
                best_distance = distance;
            }
        }
    }
    best
}

/// What a pattern needs to know about the bar it is filling.
pub struct BarContext<'a> {
    pub key: &'a Key,
    /// This bar's chords, one per slot.
    pub chords: &'a [Chord],
    /// Section-relative beat of the bar's downbeat.
    pub bar_start: f64,
    pub beats_per_bar: u32,
}

impl BarContext<'_> {
    fn bar_beats(&self) -> f64 {
        self.beats_per_bar as f64
    }

    /// Length of one chord slot in beats.
    fn slot_beats(&self) -> f64 {
        self.bar_beats() / self.chords.len().max(1) as f64
    }

    /// Chord sounding at a bar-relative beat.
    fn chord_at(&self, beat: f64) -> &Chord {
        let slot = (beat / self.slot_beats()).floor() as usize;
        &self.chords[slot.min(self.chords.len() - 1)]
    }

    /// Bar-relative (onset, chord) of each slot.
    fn slots(&self) -> impl Iterator<Item = (f64, &Chord)> {
        let slot_beats = self.slot_beats();
        self.chords
            .iter()
            .enumerate()
            .map(move |(i, chord)| (i as f64 * slot_beats, chord))
    }

    fn note(&self, onset: f64, duration: f64, pitch: u8, velocity: f32) -> NoteEvent {
        NoteEvent::new(
            self.bar_start + onset,
            duration,
            pitch,
            quantize_velocity(velocity),
        )
    }
}

/// Sustained chord tones held for each slot.
pub fn pad_bar(ctx: &BarContext<'_>) -> Vec<NoteEvent> {
    let slot_beats = ctx.slot_beats();
    ctx.slots()
        .flat_map(|(onset, chord)| {
            chord
                .pitches(ctx.key, PAD_OCTAVE)
                .into_iter()
                .map(move |pitch| ctx.note(onset, slot_beats, pitch, 0.5))
        })
        .collect()
}

/// Bass rhythm, chosen once per section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassPattern {
    /// Root held for the whole slot.
    Whole,
    /// Root for the first half, fifth for the second.
    RootFifth,
    /// Eighth notes on the root, approaching the next slot from the fifth.
    Driving,
}

impl BassPattern {
    pub const ALL: [BassPattern; 3] = [Self::Whole, Self::RootFifth, Self::Driving];
}

/// Root-on-the-downbeat bass line.
pub fn bass_bar(ctx: &BarContext<'_>, pattern: BassPattern) -> Vec<NoteEvent> {
    let slot_beats = ctx.slot_beats();
    let mut events = Vec::new();
    for (onset, chord) in ctx.slots() {
        let root = chord.root_pitch(ctx.key, BASS_OCTAVE);
        let fifth_degree = chord
            .tones
            .get(2)
            .or(chord.tones.last())
            .copied()
            .unwrap_or(chord.degree as i32);
        let fifth = ctx.key.pitch_for_degree(fifth_degree, BASS_OCTAVE);

        match pattern {
            BassPattern::Whole => events.push(ctx.note(onset, slot_beats, root, 0.75)),
            BassPattern::RootFifth => {
                let half = slot_beats / 2.0;
                events.push(ctx.note(onset, half, root, 0.75));
                events.push(ctx.note(onset + half, half, fifth, 0.62));
            }
            BassPattern::Driving => {
                let eighths = (slot_beats * 2.0).round() as usize;
                for i in 0..eighths {
                    let pitch = if i + 1 == eighths && eighths > 1 {
                        fifth
                    } else {
                        root
                    };
                    let velocity = if i == 0 { 0.75 } else { 0.6 };
                    events.push(ctx.note(onset + i as f64 * 0.5, 0.5, pitch, velocity));
                }
            }
        }
    }
    events
}

/// Running state of the lead line across the bars of a section.
#[derive(Debug, Clone)]
pub struct LeadState {
    /// Current scale degree relative to the tonic in [`LEAD_OCTAVE`].
    pub degree: i32,
    /// Section-level rotation into [`RHYTHM_BANK`].
    pub bank_offset: usize,
}

impl LeadState {
    pub fn new(bank_offset: usize) -> Self {
        Self {
            degree: 0,
            bank_offset,
        }
    }
}

/// Syncopated single-note run. Strong beats snap to chord tones, other
/// notes step through the scale, each note is held to the next onset and
/// the last one to the bar end.
pub fn lead_bar(
    ctx: &BarContext<'_>,
    state: &mut LeadState,
    bar_index: usize,
    stream: &mut SeedStream,
) -> Vec<NoteEvent> {
    let grid = ctx.beats_per_bar * 2;
    let variation = stream.index(2);
    let rhythm = RHYTHM_BANK[(state.bank_offset + 2 * bar_index + variation) % RHYTHM_BANK.len()];
    let mut positions: Vec<u32> = rhythm.iter().copied().filter(|&p| p < grid).collect();
    if positions.is_empty() {
        positions.push(0);
    }

    let len = ctx.key.len().max(1) as i32;
    let (low, high) = (-len, 2 * len - 1);
    let mut events = Vec::with_capacity(positions.len());

    for (i, &position) in positions.iter().enumerate() {
        let onset = position as f64 * 0.5;
        let end = positions
            .get(i + 1)
            .map(|&next| next as f64 * 0.5)
            .unwrap_or(ctx.bar_beats());

        let strong = position % 4 == 0;
        if strong {
            state.degree = nearest_chord_tone(ctx.key, ctx.chord_at(onset), state.degree);
        } else {
            let step = if stream.index(2) == 0 { -1 } else { 1 };
            let next = state.degree + step;
            state.degree = if (low..=high).contains(&next) {
                next
            } else {
                state.degree - step
            };
        }

        let velocity = if strong {
            0.7
        } else {
            0.55 + stream.index(4) as f32 * 0.03
        };
        let pitch = ctx.key.pitch_for_degree(state.degree, LEAD_OCTAVE);
        events.push(ctx.note(onset, end - onset, pitch, velocity));
    }
    events
}

/// Kick on the odd beats, snare on the even beats, eighth-note hats with
/// seeded accents.
pub fn percussion_bar(ctx: &BarContext<'_>, stream: &mut SeedStream) -> Vec<NoteEvent> {
    let kick = ctx.key.pitch_for_degree(0, KICK_OCTAVE);
    let snare = ctx.key.pitch_for_degree(0, SNARE_OCTAVE);
    let hat = ctx.key.pitch_for_degree(0, HAT_OCTAVE);

    let mut events = Vec::new();
    for beat in 0..ctx.beats_per_bar {
        let (pitch, velocity) = if beat % 2 == 0 {
            (kick, 0.9)
        } else {
            (snare, 0.8)
        };
        events.push(ctx.note(beat as f64, 1.0, pitch, velocity));
    }
    for eighth in 0..ctx.beats_per_bar * 2 {
        let base = if eighth % 2 == 0 { 0.5 } else { 0.32 };
        let accent = if stream.chance(1, 4) { 0.15 } else { 0.0 };
        events.push(ctx.note(eighth as f64 * 0.5, 0.5, hat, base + accent));
    }
    events
}
