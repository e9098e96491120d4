//! Score editing operations.
//!
//! Every operation borrows a Score and returns a new one. The input is never
//! touched, so a failed edit cannot leave a half-applied state and a render
//! still holding the old Score finishes against it unchanged.

use crate::compose::generate_section;
use crate::error::{Result, SongError};
use crate::score::{InstrumentKind, InstrumentRole, Score};
use crate::template::{Catalog, Template};
use tracing::debug;

/// Largest bar count a section can be resized to.
pub const MAX_SECTION_BARS: u32 = 64;

/// Applies edits to Scores, resolving their templates through a catalog.
#[derive(Debug, Clone, Copy)]
pub struct Editor<'a> {
    catalog: &'a Catalog,
}

impl<'a> Editor<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Template the score was generated from.
    fn template(&self, score: &Score) -> Result<&'a Template> {
        self.catalog.lookup(&score.template)
    }

    /// Changes the tempo. Notes are stored in beats, so nothing else moves.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` naming `tempo_bpm` when `bpm` is outside the
    /// originating template's range, or `NotFound` if that template is gone.
    pub fn set_tempo(&self, score: &Score, bpm: f64) -> Result<Score> {
        let range = self.template(score)?.tempo;
        SongError::check_range(
            "tempo_bpm",
            bpm,
            range.bpm_min as f64,
            range.bpm_max as f64,
        )?;
        debug!(from = score.tempo_bpm, to = bpm, "Set tempo");
        Ok(Score {
            tempo_bpm: bpm,
            ..score.clone()
        })
    }

    /// Assigns a different instrument kind to a role. Notes are unchanged.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the score has no such role.
    pub fn swap_instrument(
        &self,
        score: &Score,
        role: InstrumentRole,
        kind: InstrumentKind,
    ) -> Result<Score> {
        if !score.instrument_assignment.contains_key(&role) {
            return Err(SongError::not_found(
                "instrument role",
                role.name(),
                score.roles().map(InstrumentRole::name),
            ));
        }
        let mut next = score.clone();
        next.instrument_assignment.insert(role, kind);
        debug!(%role, %kind, "Swapped instrument");
        Ok(next)
    }

    /// Reorders sections. `order[i]` is the current index of the section
    /// that moves to position `i`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEdit` unless `order` is a permutation of the section
    /// indices.
    pub fn reorder_sections(&self, score: &Score, order: &[usize]) -> Result<Score> {
        let count = score.sections.len();
        if order.len() != count {
            return Err(SongError::invalid_edit(
                "order",
                format!("expected {count} indices, got {}", order.len()),
            ));
        }
        let mut seen = vec![false; count];
        for &index in order {
            if index >= count {
                return Err(SongError::invalid_edit(
                    "order",
                    format!("index {index} is not in 0..{count}"),
                ));
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(SongError::invalid_edit(
                    "order",
                    format!("index {index} appears more than once"),
                ));
            }
        }

        let sections = order.iter().map(|&i| score.sections[i].clone()).collect();
        debug!(?order, "Reordered sections");
        Ok(Score {
            sections,
            ..score.clone()
        })
    }

    /// Regenerates a section at a new length from its own stream.
    ///
    /// The seed is unchanged, so resizing back and forth always lands on
    /// the same content.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an index past the last section and
    /// `InvalidEdit` for a bar count outside 1..=64.
    pub fn resize_section(&self, score: &Score, index: usize, bars: u32) -> Result<Score> {
        let Some(section) = score.sections.get(index) else {
            return Err(SongError::not_found(
                "section",
                index.to_string(),
                (0..score.sections.len()).map(|i| i.to_string()),
            ));
        };
        if !(1..=MAX_SECTION_BARS).contains(&bars) {
            return Err(SongError::invalid_edit(
                "bar_count",
                format!("{bars} is outside 1..={MAX_SECTION_BARS}"),
            ));
        }
        let template = self.template(score)?;

        let regenerated = generate_section(
            template,
            &score.key,
            score.seed,
            score.prompt_hash,
            section.ordinal,
            &section.label,
            bars,
            score.beats_per_bar,
        );
        let mut next = score.clone();
        next.sections[index] = regenerated;
        debug!(index, from = section.bar_count, to = bars, "Resized section");
        Ok(next)
    }
}
