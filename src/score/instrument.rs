//! Instrument roles and instrument kinds.
//!
//! A role is the musical job a part does in the arrangement (pad, bass, lead,
//! percussion) and decides which note pattern the generator writes. A kind is
//! the timbre that renders those notes. Swapping the kind for a role leaves
//! the notes alone and only changes how the next render sounds.

use crate::audio::{Envelope, Waveform};
use crate::error::SongError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The musical job of a part. Ordered so maps keyed by role iterate
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentRole {
    /// Sustained chord tones.
    Pad,
    /// Chord roots on the downbeat.
    Bass,
    /// Syncopated single-note runs.
    Lead,
    /// Kick, snare and hat hits.
    Percussion,
}

impl InstrumentRole {
    pub const ALL: [InstrumentRole; 4] = [Self::Pad, Self::Bass, Self::Lead, Self::Percussion];

    pub fn name(self) -> &'static str {
        match self {
            Self::Pad => "pad",
            Self::Bass => "bass",
            Self::Lead => "lead",
            Self::Percussion => "percussion",
        }
    }

    /// Default mix gain applied before summation.
    pub fn default_level(self) -> f32 {
        match self {
            Self::Pad => 0.35,
            Self::Bass => 0.5,
            Self::Lead => 0.4,
            Self::Percussion => 0.35,
        }
    }

    /// Fixed stereo position in [-1, 1] (-1 = full left).
    pub fn pan(self) -> f32 {
        match self {
            Self::Pad | Self::Bass => 0.0,
            Self::Lead => 0.3,
            Self::Percussion => -0.2,
        }
    }
}

impl fmt::Display for InstrumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstrumentRole {
    type Err = SongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.name() == lowered || (lowered == "drums" && *role == Self::Percussion))
            .ok_or_else(|| {
                SongError::not_found("instrument role", s, Self::ALL.iter().map(|r| r.name()))
            })
    }
}

/// Broad timbre family of an [`InstrumentKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    Pad,
    Bass,
    Lead,
    Percussion,
    Vocal,
}

/// One oscillator layer of a voice, tuned relative to the note frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub waveform: Waveform,
    /// Frequency multiplier relative to the note's fundamental.
    pub ratio: f64,
    /// Relative amplitude of this layer.
    pub amplitude: f64,
}

/// Everything the synthesis engine needs to render a kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub partials: &'static [Partial],
    pub envelope: Envelope,
    /// Whole octaves added to every note pitch.
    pub octave_shift: i32,
    /// Output trim so kinds sit at comparable loudness.
    pub gain: f64,
    /// Percussive kinds map the pitch register onto drum voices.
    pub percussive: bool,
}

const fn partial(waveform: Waveform, ratio: f64, amplitude: f64) -> Partial {
    Partial {
        waveform,
        ratio,
        amplitude,
    }
}

const SOFT_PAD: &[Partial] = &[
    partial(Waveform::Sine, 1.0, 0.6),
    partial(Waveform::Triangle, 2.0, 0.2),
    partial(Waveform::Sine, 0.5, 0.2),
];
const STRING_PAD: &[Partial] = &[
    partial(Waveform::Saw, 1.0, 0.35),
    partial(Waveform::Saw, 1.004, 0.35),
    partial(Waveform::Triangle, 2.0, 0.1),
];
const SUB_BASS: &[Partial] = &[
    partial(Waveform::Sine, 1.0, 0.85),
    partial(Waveform::Triangle, 2.0, 0.15),
];
const PLUCK_BASS: &[Partial] = &[
    partial(Waveform::Saw, 1.0, 0.5),
    partial(Waveform::Square, 1.0, 0.2),
    partial(Waveform::Sine, 0.5, 0.3),
];
const SINE_LEAD: &[Partial] = &[
    partial(Waveform::Sine, 1.0, 0.75),
    partial(Waveform::Sine, 2.0, 0.15),
    partial(Waveform::Sine, 3.0, 0.1),
];
const SAW_LEAD: &[Partial] = &[
    partial(Waveform::Saw, 1.0, 0.6),
    partial(Waveform::Saw, 1.006, 0.4),
];
const SQUARE_LEAD: &[Partial] = &[
    partial(Waveform::Square, 1.0, 0.7),
    partial(Waveform::Sine, 2.0, 0.3),
];
const BELL: &[Partial] = &[
    partial(Waveform::Sine, 1.0, 0.6),
    partial(Waveform::Sine, 2.76, 0.25),
    partial(Waveform::Sine, 5.4, 0.15),
];
const NOISE_KIT: &[Partial] = &[partial(Waveform::Noise, 1.0, 1.0)];
const VOCAL: &[Partial] = &[
    partial(Waveform::Sine, 1.0, 0.5),
    partial(Waveform::Sine, 2.0, 0.25),
    partial(Waveform::Sine, 3.0, 0.12),
    partial(Waveform::Sine, 4.0, 0.08),
    partial(Waveform::Sine, 5.0, 0.05),
];

/// Closed set of instrument timbres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    SoftPad,
    StringPad,
    SubBass,
    PluckBass,
    SineLead,
    SawLead,
    SquareLead,
    Bell,
    NoiseKit,
    Vocal,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 10] = [
        Self::SoftPad,
        Self::StringPad,
        Self::SubBass,
        Self::PluckBass,
        Self::SineLead,
        Self::SawLead,
        Self::SquareLead,
        Self::Bell,
        Self::NoiseKit,
        Self::Vocal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SoftPad => "soft_pad",
            Self::StringPad => "string_pad",
            Self::SubBass => "sub_bass",
            Self::PluckBass => "pluck_bass",
            Self::SineLead => "sine_lead",
            Self::SawLead => "saw_lead",
            Self::SquareLead => "square_lead",
            Self::Bell => "bell",
            Self::NoiseKit => "noise_kit",
            Self::Vocal => "vocal",
        }
    }

    pub fn family(self) -> InstrumentFamily {
        match self {
            Self::SoftPad | Self::StringPad => InstrumentFamily::Pad,
            Self::SubBass | Self::PluckBass => InstrumentFamily::Bass,
            Self::SineLead | Self::SawLead | Self::SquareLead | Self::Bell => InstrumentFamily::Lead,
            Self::NoiseKit => InstrumentFamily::Percussion,
            Self::Vocal => InstrumentFamily::Vocal,
        }
    }

    /// Oscillator layers, envelope and trims for this kind.
    pub fn voice(self) -> Voice {
        let (partials, envelope, octave_shift, gain) = match self {
            Self::SoftPad => (SOFT_PAD, Envelope::new(0.4, 0.3, 0.75, 0.6), 0, 0.8),
            Self::StringPad => (STRING_PAD, Envelope::new(0.3, 0.2, 0.8, 0.5), 0, 0.6),
            Self::SubBass => (SUB_BASS, Envelope::new(0.01, 0.1, 0.85, 0.08), 0, 1.0),
            Self::PluckBass => (PLUCK_BASS, Envelope::new(0.005, 0.2, 0.35, 0.1), 0, 0.8),
            Self::SineLead => (SINE_LEAD, Envelope::new(0.02, 0.1, 0.7, 0.1), 0, 0.9),
            Self::SawLead => (SAW_LEAD, Envelope::new(0.01, 0.12, 0.6, 0.08), 0, 0.55),
            Self::SquareLead => (SQUARE_LEAD, Envelope::new(0.01, 0.1, 0.6, 0.08), 0, 0.5),
            Self::Bell => (BELL, Envelope::new(0.002, 0.6, 0.0, 0.3), 1, 0.8),
            Self::NoiseKit => (NOISE_KIT, Envelope::new(0.001, 0.12, 0.0, 0.05), 0, 0.9),
            Self::Vocal => (VOCAL, Envelope::new(0.04, 0.08, 0.8, 0.12), 0, 0.9),
        };
        Voice {
            partials,
            envelope,
            octave_shift,
            gain,
            percussive: self.family() == InstrumentFamily::Percussion,
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstrumentKind {
    type Err = SongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| {
                SongError::not_found("instrument kind", s, Self::ALL.iter().map(|k| k.name()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("lead".parse::<InstrumentRole>(), Ok(InstrumentRole::Lead));
        assert_eq!("Drums".parse::<InstrumentRole>(), Ok(InstrumentRole::Percussion));
        assert!(matches!(
            "kazoo".parse::<InstrumentRole>(),
            Err(SongError::NotFound { .. })
        ));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in InstrumentKind::ALL {
            assert_eq!(kind.name().parse::<InstrumentKind>(), Ok(kind));
        }
        assert_eq!("saw-lead".parse::<InstrumentKind>(), Ok(InstrumentKind::SawLead));
    }

    #[test]
    fn test_voices_are_well_formed() {
        for kind in InstrumentKind::ALL {
            let voice = kind.voice();
            assert!(!voice.partials.is_empty(), "{kind} has no partials");
            assert!(voice.gain > 0.0);
            assert!((0.0..=1.0).contains(&voice.envelope.sustain));
        }
        assert!(InstrumentKind::NoiseKit.voice().percussive);
        assert!(!InstrumentKind::Bell.voice().percussive);
    }

    #[test]
    fn test_role_serializes_as_snake_case() {
        let json = serde_json::to_string(&InstrumentRole::Percussion).unwrap();
        assert_eq!(json, "\"percussion\"");
        let kind: InstrumentKind = serde_json::from_str("\"string_pad\"").unwrap();
        assert_eq!(kind, InstrumentKind::StringPad);
    }
}
