//! Genre and mood templates.
//!
//! A template is constant data: a scale, a tempo range, a chord grammar, an
//! instrument palette and a default section layout. Templates are validated
//! once when a [`Catalog`] is built and never mutated afterwards.

mod catalog;

pub use catalog::Catalog;

use crate::error::{Result, SongError};
use crate::score::{ChordVoicing, InstrumentKind, InstrumentRole, Key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive range of whole-number tempos a template supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoRange {
    pub bpm_min: u32,
    pub bpm_max: u32,
}

impl TempoRange {
    pub fn contains(&self, bpm: f64) -> bool {
        bpm.is_finite() && bpm >= self.bpm_min as f64 && bpm <= self.bpm_max as f64
    }
}

/// One chord a grammar rule may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordChoice {
    /// Zero-based scale degree of the root.
    pub degree: u8,
    pub voicing: ChordVoicing,
}

/// A grammar step: a primary chord plus ordered variation branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordRule {
    pub primary: ChordChoice,
    #[serde(default)]
    pub alternatives: Vec<ChordChoice>,
}

impl ChordRule {
    /// The primary chord followed by the alternatives, in preference order.
    pub fn options(&self) -> impl Iterator<Item = &ChordChoice> {
        std::iter::once(&self.primary).chain(self.alternatives.iter())
    }
}

/// Ordered chord rules walked cyclically across a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordGrammar {
    pub rules: Vec<ChordRule>,
    /// Chords per bar, 1 or 2.
    pub chords_per_bar: u8,
}

/// Default instrument for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub role: InstrumentRole,
    pub kind: InstrumentKind,
}

/// One entry of the default section layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub label: String,
    pub bars: u32,
}

/// A genre/mood preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Lookup key ("lofi", "jazz", ...).
    pub name: String,
    /// Display genre ("Lo-Fi").
    pub genre: String,
    pub mood: String,
    /// Words that select this template from a free-text description.
    pub keywords: Vec<String>,
    /// Tonic and scale every generated pitch is drawn from.
    pub scale: Key,
    pub tempo: TempoRange,
    pub grammar: ChordGrammar,
    pub palette: Vec<PaletteEntry>,
    pub layout: Vec<SectionPlan>,
}

impl Template {
    /// Checks the template's internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first malformed field.
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(SongError::config(name, "name", "must not be empty"));
        }

        let intervals = &self.scale.intervals;
        if intervals.first() != Some(&0) {
            return Err(SongError::config(name, "scale", "must start at 0"));
        }
        if intervals.windows(2).any(|w| w[0] >= w[1]) || intervals.iter().any(|&i| i >= 12) {
            return Err(SongError::config(
                name,
                "scale",
                "offsets must be strictly increasing and below 12",
            ));
        }
        if self.scale.root > 127 {
            return Err(SongError::config(name, "scale", "root must be a MIDI note"));
        }

        let TempoRange { bpm_min, bpm_max } = self.tempo;
        if bpm_min == 0 || bpm_min > bpm_max {
            return Err(SongError::config(
                name,
                "tempo_range",
                format!("{bpm_min}..={bpm_max} is empty"),
            ));
        }

        if self.grammar.rules.is_empty() {
            return Err(SongError::config(name, "chord_grammar", "has no rules"));
        }
        if !matches!(self.grammar.chords_per_bar, 1 | 2) {
            return Err(SongError::config(
                name,
                "chord_grammar",
                format!("chords_per_bar {} is not 1 or 2", self.grammar.chords_per_bar),
            ));
        }
        if let Some(choice) = self
            .grammar
            .rules
            .iter()
            .flat_map(|rule| rule.options())
            .find(|c| c.degree as usize >= intervals.len())
        {
            return Err(SongError::config(
                name,
                "chord_grammar",
                format!(
                    "degree {} is outside the {}-note scale",
                    choice.degree,
                    intervals.len()
                ),
            ));
        }

        if self.palette.is_empty() {
            return Err(SongError::config(name, "palette", "has no instruments"));
        }
        let mut roles = BTreeSet::new();
        if let Some(entry) = self.palette.iter().find(|e| !roles.insert(e.role)) {
            return Err(SongError::config(
                name,
                "palette",
                format!("role {} appears twice", entry.role),
            ));
        }

        if self.layout.is_empty() {
            return Err(SongError::config(name, "layout", "has no sections"));
        }
        if let Some(plan) = self.layout.iter().find(|p| p.bars == 0) {
            return Err(SongError::config(
                name,
                "layout",
                format!("section `{}` has zero bars", plan.label),
            ));
        }

        Ok(())
    }

    /// Checks whether a free-text description mentions one of the keywords.
    pub fn matches(&self, description: &str) -> bool {
        let lowered = description.to_lowercase();
        self.keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase()))
    }

    /// Number of bars in the default layout.
    pub fn layout_bars(&self) -> u32 {
        self.layout.iter().map(|p| p.bars).sum()
    }
}
