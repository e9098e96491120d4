//! Standard MIDI File (SMF) export of a Score.
//!
//! Exports the symbolic score so it can be opened in any sequencer.
//!
//! # Limitations (Information Degradation)
//!
//! - Instrument kinds are mapped to the closest General MIDI program
//! - Section labels become marker meta events; chord symbols are not exported
//! - Velocities are quantized to the 7-bit MIDI range
//!
//! # Format Details
//!
//! Exports as SMF Format 1 (multi-track) with:
//! - Track 0: Tempo, time signature and section markers
//! - Tracks 1-N: One track per instrument role (percussion on channel 10)

use super::instrument::{InstrumentKind, InstrumentRole};
use super::song::Score;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;

/// Ticks per beat (quarter note) written to the file header.
pub const TICKS_PER_BEAT: u16 = 480;

/// General MIDI channel reserved for drums (zero-based).
const DRUM_CHANNEL: u8 = 9;

/// Represents a timed event for sorting before delta encoding.
struct TimedEvent<'a> {
    /// Absolute tick position
    tick: u32,
    /// The event payload
    kind: TrackEventKind<'a>,
    /// Priority for sorting events at the same tick (lower = first)
    /// Used to ensure note offs come before the next note on, etc.
    priority: u8,
}

impl<'a> TimedEvent<'a> {
    fn new(tick: u32, kind: TrackEventKind<'a>, priority: u8) -> Self {
        Self {
            tick,
            kind,
            priority,
        }
    }
}

/// Converts a beat position to MIDI ticks.
fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_BEAT as f64).round().max(0.0) as u32
}

/// Closest General MIDI program for an instrument kind.
fn gm_program(kind: InstrumentKind) -> u8 {
    match kind {
        InstrumentKind::SoftPad => 88,
        InstrumentKind::StringPad => 48,
        InstrumentKind::SubBass => 38,
        InstrumentKind::PluckBass => 33,
        InstrumentKind::SineLead => 73,
        InstrumentKind::SawLead => 81,
        InstrumentKind::SquareLead => 80,
        InstrumentKind::Bell => 14,
        InstrumentKind::NoiseKit => 0,
        InstrumentKind::Vocal => 54,
    }
}

/// Sorts events and converts absolute ticks to delta times.
fn build_track(mut events: Vec<TimedEvent<'_>>) -> Vec<TrackEvent<'_>> {
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut last_tick = 0u32;
    events
        .into_iter()
        .map(|timed| {
            let delta = timed.tick.saturating_sub(last_tick);
            last_tick = timed.tick;
            TrackEvent {
                delta: u28::new(delta),
                kind: timed.kind,
            }
        })
        .collect()
}

/// Builds the in-memory SMF for a score.
///
/// `names` must hold one label per section followed by one name per role;
/// the returned file borrows its text meta events from it.
fn build_smf<'a>(score: &Score, names: &'a [String]) -> Smf<'a> {
    let header = Header::new(Format::Parallel, Timing::Metrical(u15::new(TICKS_PER_BEAT)));
    let mut smf = Smf::new(header);
    let end_tick = beats_to_ticks(score.total_beats());
    let (section_names, role_names) = names.split_at(score.sections.len());

    // Track 0: tempo, time signature, section markers
    let mut events = Vec::new();
    // Convert BPM to microseconds per beat: 60,000,000 / BPM
    let microseconds_per_beat = (60_000_000.0 / score.tempo_bpm).round() as u32;
    events.push(TimedEvent::new(
        0,
        TrackEventKind::Meta(MetaMessage::TimeSignature(score.beats_per_bar as u8, 2, 24, 8)),
        0,
    ));
    events.push(TimedEvent::new(
        0,
        TrackEventKind::Meta(MetaMessage::Tempo(u24::new(
            microseconds_per_beat.min(0x00FF_FFFF),
        ))),
        1,
    ));
    for (label, offset) in section_names.iter().zip(score.section_offsets()) {
        events.push(TimedEvent::new(
            beats_to_ticks(offset),
            TrackEventKind::Meta(MetaMessage::Marker(label.as_bytes())),
            2,
        ));
    }
    events.push(TimedEvent::new(
        end_tick,
        TrackEventKind::Meta(MetaMessage::EndOfTrack),
        255,
    ));
    smf.tracks.push(build_track(events));

    // Tracks 1-N: one per role
    let mut melodic_channel = 0u8;
    for ((role, kind), name) in score.instrument_assignment.iter().zip(role_names) {
        let channel = if *role == InstrumentRole::Percussion {
            DRUM_CHANNEL
        } else {
            let channel = melodic_channel;
            melodic_channel += 1;
            if melodic_channel == DRUM_CHANNEL {
                melodic_channel += 1;
            }
            channel
        };
        let channel = u4::new(channel);

        let mut events = vec![TimedEvent::new(
            0,
            TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            0,
        )];
        if *role != InstrumentRole::Percussion {
            events.push(TimedEvent::new(
                0,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::ProgramChange {
                        program: u7::new(gm_program(*kind)),
                    },
                },
                1,
            ));
        }

        for note in score.timeline(*role) {
            let key = u7::new(note.pitch.min(127));
            let vel = u7::new(((note.velocity * 127.0).round() as u8).clamp(1, 127));
            events.push(TimedEvent::new(
                beats_to_ticks(note.onset_beat),
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, vel },
                },
                11,
            ));
            // Note offs sort before note ons at the same tick
            events.push(TimedEvent::new(
                beats_to_ticks(note.end_beat()),
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key,
                        vel: u7::new(0),
                    },
                },
                10,
            ));
        }

        events.push(TimedEvent::new(
            end_tick,
            TrackEventKind::Meta(MetaMessage::EndOfTrack),
            255,
        ));
        smf.tracks.push(build_track(events));
    }

    smf
}

/// Text labels used by [`build_smf`]: section labels, then role/kind names.
fn track_names(score: &Score) -> Vec<String> {
    score
        .sections
        .iter()
        .map(|s| s.label.clone())
        .chain(
            score
                .instrument_assignment
                .iter()
                .map(|(role, kind)| format!("{} ({})", role, kind)),
        )
        .collect()
}

/// Encodes a score as Standard MIDI File bytes.
pub fn encode_midi(score: &Score) -> std::io::Result<Vec<u8>> {
    let names = track_names(score);
    let smf = build_smf(score, &names);
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

/// Exports a score to a Standard MIDI File.
///
/// # Errors
///
/// Returns error if file creation or writing fails
pub fn export_to_midi<P: AsRef<Path>>(score: &Score, path: P) -> std::io::Result<()> {
    let bytes = encode_midi(score)?;
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::generate;
    use crate::template::Catalog;

    #[test]
    fn test_beats_to_ticks() {
        assert_eq!(beats_to_ticks(0.0), 0);
        assert_eq!(beats_to_ticks(1.0), 480);
        assert_eq!(beats_to_ticks(2.5), 1200);
    }

    #[test]
    fn test_encode_parses_back() {
        let catalog = Catalog::builtin().unwrap();
        let score = generate(catalog.lookup("lofi").unwrap(), "rainy evening", 42);
        let bytes = encode_midi(&score).unwrap();

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.tracks.len(), 1 + score.instrument_assignment.len());

        let expected_tempo = (60_000_000.0 / score.tempo_bpm).round() as u32;
        let tempo = smf.tracks[0].iter().find_map(|e| match e.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        });
        assert_eq!(tempo, Some(expected_tempo));

        // Every note on has a matching note off
        for track in &smf.tracks[1..] {
            let ons = track
                .iter()
                .filter(|e| {
                    matches!(
                        e.kind,
                        TrackEventKind::Midi {
                            message: MidiMessage::NoteOn { .. },
                            ..
                        }
                    )
                })
                .count();
            let offs = track
                .iter()
                .filter(|e| {
                    matches!(
                        e.kind,
                        TrackEventKind::Midi {
                            message: MidiMessage::NoteOff { .. },
                            ..
                        }
                    )
                })
                .count();
            assert_eq!(ons, offs);
            assert!(ons > 0);
        }
    }

    #[test]
    fn test_percussion_uses_drum_channel() {
        let catalog = Catalog::builtin().unwrap();
        let score = generate(catalog.lookup("pop").unwrap(), "", 3);
        assert!(score
            .instrument_assignment
            .contains_key(&InstrumentRole::Percussion));
        let bytes = encode_midi(&score).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        // Roles iterate in order, so percussion is the last track
        let drum_track = smf.tracks.last().unwrap();
        assert!(drum_track.iter().all(|e| match e.kind {
            TrackEventKind::Midi { channel, .. } => channel.as_int() == DRUM_CHANNEL,
            _ => true,
        }));
    }
}
