//! The template catalog and the built-in presets.

use super::{ChordChoice, ChordGrammar, ChordRule, PaletteEntry, SectionPlan, TempoRange, Template};
use crate::error::{Result, SongError};
use crate::score::{ChordVoicing, InstrumentKind, InstrumentRole, Key};
use std::collections::BTreeSet;
use tracing::debug;

use ChordVoicing::{Power, Seventh, Sus2, Sus4, Triad};

const MAJOR: &[u8] = &[0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR: &[u8] = &[0, 2, 3, 5, 7, 8, 10];
const MAJOR_PENTATONIC: &[u8] = &[0, 2, 4, 7, 9];
const MINOR_PENTATONIC: &[u8] = &[0, 3, 5, 7, 10];
const BLUES: &[u8] = &[0, 3, 5, 6, 7, 10];

/// An ordered, validated set of templates.
#[derive(Debug, Clone)]
pub struct Catalog {
    templates: Vec<Template>,
}

impl Catalog {
    /// Builds a catalog, validating every template.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for the first malformed template, for a name
    /// that appears twice, or for an empty list.
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        if templates.is_empty() {
            return Err(SongError::config("", "catalog", "has no templates"));
        }
        let mut names = BTreeSet::new();
        for template in &templates {
            template.validate()?;
            if !names.insert(template.name.as_str()) {
                return Err(SongError::config(
                    &template.name,
                    "name",
                    "is defined more than once",
                ));
            }
        }
        debug!(templates = templates.len(), "Loaded template catalog");
        Ok(Self { templates })
    }

    /// The built-in presets: lofi, pop, cinematic, edm, jazz, ambient.
    pub fn builtin() -> Result<Self> {
        Self::new(vec![lofi(), pop(), cinematic(), edm(), jazz(), ambient()])
    }

    /// Looks a template up by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` listing the available names.
    pub fn lookup(&self, name: &str) -> Result<&Template> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SongError::not_found("template", name, self.names()))
    }

    /// Picks a template for a request.
    ///
    /// The named style wins if it exists. Otherwise the first template whose
    /// keywords appear in `description` is used, and failing that the first
    /// template in the catalog.
    pub fn resolve(&self, style: Option<&str>, description: &str) -> &Template {
        if let Some(template) = style.and_then(|s| self.lookup(s).ok()) {
            return template;
        }
        if let Some(template) = self.templates.iter().find(|t| t.matches(description)) {
            debug!(template = %template.name, "Resolved template by keyword");
            return template;
        }
        &self.templates[0]
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn choice(degree: u8, voicing: ChordVoicing) -> ChordChoice {
    ChordChoice { degree, voicing }
}

fn rule(primary: (u8, ChordVoicing), alternatives: &[(u8, ChordVoicing)]) -> ChordRule {
    ChordRule {
        primary: choice(primary.0, primary.1),
        alternatives: alternatives.iter().map(|&(d, v)| choice(d, v)).collect(),
    }
}

fn palette(entries: &[(InstrumentRole, InstrumentKind)]) -> Vec<PaletteEntry> {
    entries
        .iter()
        .map(|&(role, kind)| PaletteEntry { role, kind })
        .collect()
}

fn layout(plans: &[(&str, u32)]) -> Vec<SectionPlan> {
    plans
        .iter()
        .map(|&(label, bars)| SectionPlan {
            label: label.to_string(),
            bars,
        })
        .collect()
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn lofi() -> Template {
    Template {
        name: "lofi".into(),
        genre: "Lo-Fi".into(),
        mood: "chill".into(),
        keywords: keywords(&["study", "lofi", "relax", "coffee"]),
        // A major
        scale: Key::new(57, MAJOR.to_vec()),
        tempo: TempoRange {
            bpm_min: 70,
            bpm_max: 90,
        },
        grammar: ChordGrammar {
            rules: vec![
                rule((0, Seventh), &[(5, Seventh)]),
                rule((3, Seventh), &[(1, Seventh)]),
                rule((2, Seventh), &[(5, Triad)]),
                rule((4, Sus4), &[(4, Seventh), (3, Triad)]),
            ],
            chords_per_bar: 1,
        },
        palette: palette(&[
            (InstrumentRole::Pad, InstrumentKind::SoftPad),
            (InstrumentRole::Bass, InstrumentKind::SubBass),
            (InstrumentRole::Lead, InstrumentKind::SineLead),
            (InstrumentRole::Percussion, InstrumentKind::NoiseKit),
        ]),
        layout: layout(&[("intro", 4), ("verse", 8), ("chorus", 8), ("outro", 4)]),
    }
}

fn pop() -> Template {
    Template {
        name: "pop".into(),
        genre: "Pop".into(),
        mood: "upbeat".into(),
        keywords: keywords(&["pop", "catchy", "radio"]),
        // C major
        scale: Key::new(60, MAJOR.to_vec()),
        tempo: TempoRange {
            bpm_min: 110,
            bpm_max: 128,
        },
        grammar: ChordGrammar {
            rules: vec![
                rule((0, Triad), &[(5, Triad)]),
                rule((4, Triad), &[(2, Triad)]),
                rule((5, Triad), &[(3, Triad)]),
                rule((3, Triad), &[(1, Seventh), (4, Sus4)]),
            ],
            chords_per_bar: 1,
        },
        palette: palette(&[
            (InstrumentRole::Pad, InstrumentKind::StringPad),
            (InstrumentRole::Bass, InstrumentKind::PluckBass),
            (InstrumentRole::Lead, InstrumentKind::SquareLead),
            (InstrumentRole::Percussion, InstrumentKind::NoiseKit),
        ]),
        layout: layout(&[
            ("intro", 4),
            ("verse", 8),
            ("chorus", 8),
            ("bridge", 4),
            ("chorus", 8),
        ]),
    }
}

fn cinematic() -> Template {
    Template {
        name: "cinematic".into(),
        genre: "Cinematic".into(),
        mood: "epic".into(),
        keywords: keywords(&["film", "orchestra", "cinematic", "epic"]),
        // D natural minor
        scale: Key::new(62, NATURAL_MINOR.to_vec()),
        tempo: TempoRange {
            bpm_min: 80,
            bpm_max: 110,
        },
        grammar: ChordGrammar {
            rules: vec![
                rule((0, Triad), &[(0, Sus2)]),
                rule((5, Triad), &[(3, Triad)]),
                rule((2, Triad), &[(6, Triad)]),
                rule((6, Power), &[(4, Triad)]),
            ],
            chords_per_bar: 1,
        },
        palette: palette(&[
            (InstrumentRole::Pad, InstrumentKind::StringPad),
            (InstrumentRole::Bass, InstrumentKind::SubBass),
            (InstrumentRole::Lead, InstrumentKind::Bell),
        ]),
        layout: layout(&[
            ("intro", 4),
            ("build", 8),
            ("climax", 8),
            ("resolution", 4),
        ]),
    }
}

fn edm() -> Template {
    Template {
        name: "edm".into(),
        genre: "EDM".into(),
        mood: "energetic".into(),
        keywords: keywords(&["club", "dance", "edm", "rave"]),
        // C major pentatonic
        scale: Key::new(60, MAJOR_PENTATONIC.to_vec()),
        tempo: TempoRange {
            bpm_min: 124,
            bpm_max: 132,
        },
        grammar: ChordGrammar {
            rules: vec![
                rule((0, Power), &[(0, Triad)]),
                rule((3, Power), &[(4, Power)]),
                rule((4, Triad), &[(1, Power)]),
                rule((2, Power), &[]),
            ],
            chords_per_bar: 1,
        },
        palette: palette(&[
            (InstrumentRole::Pad, InstrumentKind::StringPad),
            (InstrumentRole::Bass, InstrumentKind::PluckBass),
            (InstrumentRole::Lead, InstrumentKind::SawLead),
            (InstrumentRole::Percussion, InstrumentKind::NoiseKit),
        ]),
        layout: layout(&[("intro", 4), ("build", 8), ("drop", 8), ("breakdown", 4)]),
    }
}

fn jazz() -> Template {
    Template {
        name: "jazz".into(),
        genre: "Jazz".into(),
        mood: "smooth".into(),
        keywords: keywords(&["jazz", "sax", "swing", "smooth"]),
        // C blues
        scale: Key::new(60, BLUES.to_vec()),
        tempo: TempoRange {
            bpm_min: 96,
            bpm_max: 124,
        },
        grammar: ChordGrammar {
            rules: vec![
                rule((0, Seventh), &[(4, Seventh)]),
                rule((2, Seventh), &[(1, Seventh)]),
                rule((4, Seventh), &[(5, Triad)]),
                rule((0, Triad), &[(2, Sus2)]),
            ],
            chords_per_bar: 2,
        },
        palette: palette(&[
            (InstrumentRole::Pad, InstrumentKind::SoftPad),
            (InstrumentRole::Bass, InstrumentKind::PluckBass),
            (InstrumentRole::Lead, InstrumentKind::SineLead),
            (InstrumentRole::Percussion, InstrumentKind::NoiseKit),
        ]),
        layout: layout(&[("intro", 2), ("theme", 8), ("solo", 8), ("theme", 8)]),
    }
}

fn ambient() -> Template {
    Template {
        name: "ambient".into(),
        genre: "Ambient".into(),
        mood: "dreamy".into(),
        keywords: keywords(&["ambient", "relax", "space", "drone"]),
        // A minor pentatonic
        scale: Key::new(57, MINOR_PENTATONIC.to_vec()),
        tempo: TempoRange {
            bpm_min: 55,
            bpm_max: 70,
        },
        grammar: ChordGrammar {
            rules: vec![
                rule((0, Sus2), &[(0, Triad)]),
                rule((3, Triad), &[(2, Sus2)]),
                rule((4, Sus4), &[(1, Triad)]),
            ],
            chords_per_bar: 1,
        },
        palette: palette(&[
            (InstrumentRole::Pad, InstrumentKind::SoftPad),
            (InstrumentRole::Bass, InstrumentKind::SubBass),
            (InstrumentRole::Lead, InstrumentKind::Bell),
        ]),
        layout: layout(&[
            ("drone", 4),
            ("texture", 8),
            ("swells", 8),
            ("release", 4),
        ]),
    }
}
