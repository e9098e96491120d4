//! Project container.
//!
//! A project owns one Score plus the parameters used to render it. Edits go
//! through [`Project::apply_edit`], which swaps in the new Score only when
//! the edit succeeds and records the old one for undo.

use super::song::Score;
use crate::error::{Result, SongError};
use crate::history::{HistoryManager, StateSnapshot};
use crate::audio::mixer::{MAX_VOCAL_LEVEL, VOCAL_LEVEL};
use crate::audio::vocal::{MAX_TUNING_HZ, MIN_TUNING_HZ, STANDARD_TUNING_HZ};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Sample rate for rendering (44.1 kHz standard).
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Parameters applied when a Score is rendered and exported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// Bit depth of the exported PCM (16 or 24 integer, 32 float).
    pub bit_depth: u16,

    /// Gain applied to the summed mix before peak normalization.
    pub master_gain: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bit_depth: 16,
            master_gain: 1.0,
        }
    }
}

impl RenderParams {
    /// Checks every field against its supported range.
    pub fn validate(&self) -> Result<()> {
        SongError::check_range("sample_rate", self.sample_rate as f64, 8000.0, 192_000.0)?;
        SongError::check_range("master_gain", self.master_gain as f64, 0.0, 2.0)?;
        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return Err(SongError::invalid_edit(
                "bit_depth",
                format!("{} is not one of 16, 24, 32", self.bit_depth),
            ));
        }
        Ok(())
    }
}

/// How the vocal layer is produced and mixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocalSettings {
    /// Recorded vocal mixed instead of singing the lyrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<PathBuf>,

    /// Gain of the vocal layer in the mix.
    pub level: f32,

    /// Frequency of A4 for the sung vocal.
    pub tuning_hz: f64,
}

impl Default for VocalSettings {
    fn default() -> Self {
        Self {
            recording: None,
            level: VOCAL_LEVEL,
            tuning_hz: STANDARD_TUNING_HZ,
        }
    }
}

impl VocalSettings {
    /// Checks the level and tuning against the ranges a render accepts.
    pub fn validate(&self) -> Result<()> {
        SongError::check_range("vocal_level", self.level as f64, 0.0, MAX_VOCAL_LEVEL as f64)?;
        SongError::check_range("tuning_hz", self.tuning_hz, MIN_TUNING_HZ, MAX_TUNING_HZ)?;
        Ok(())
    }
}

/// A generated composition with its render settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Display title.
    pub title: String,

    /// Genre of the originating template.
    pub genre: String,

    /// Mood of the originating template.
    pub mood: String,

    /// Prompt the score was generated from.
    #[serde(default)]
    pub prompt: String,

    /// Current Score version.
    pub score: Score,

    /// Render settings.
    #[serde(default)]
    pub render: RenderParams,

    /// Identifier within the workspace.
    pub workspace_id: Uuid,

    /// Lyrics sung over the arrangement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,

    /// Vocal layer settings.
    #[serde(default)]
    pub vocal: VocalSettings,

    /// Undo/redo history of Score versions.
    #[serde(default)]
    history: HistoryManager,
}

impl Project {
    /// Creates a new project around a freshly generated score.
    pub fn new(
        title: impl Into<String>,
        genre: impl Into<String>,
        mood: impl Into<String>,
        prompt: impl Into<String>,
        score: Score,
    ) -> Self {
        Self {
            title: title.into(),
            genre: genre.into(),
            mood: mood.into(),
            prompt: prompt.into(),
            score,
            render: RenderParams::default(),
            workspace_id: Uuid::new_v4(),
            lyrics: None,
            vocal: VocalSettings::default(),
            history: HistoryManager::new(),
        }
    }

    /// Applies an editor operation to the current Score.
    ///
    /// On success the previous Score is pushed onto the undo stack and the
    /// new one replaces it. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns whatever error the edit produced.
    pub fn apply_edit<F>(&mut self, description: impl Into<String>, edit: F) -> Result<()>
    where
        F: FnOnce(&Score) -> Result<Score>,
    {
        let next = edit(&self.score)?;
        let previous = std::mem::replace(&mut self.score, next);
        self.history.record(StateSnapshot {
            score: previous,
            description: description.into(),
        });
        Ok(())
    }

    /// Reverts the most recent edit. Returns its description.
    ///
    /// A snapshot that no longer tiles correctly (a hand-edited file) is
    /// refused and the history dropped.
    pub fn undo(&mut self) -> Option<String> {
        let snapshot = self.history.step_back(&self.score)?;
        if !snapshot.is_valid() {
            self.history.clear();
            return None;
        }
        self.score = snapshot.score;
        Some(snapshot.description)
    }

    /// Re-applies the most recently undone edit. Returns its description.
    pub fn redo(&mut self) -> Option<String> {
        let snapshot = self.history.step_forward(&self.score)?;
        self.score = snapshot.score;
        Some(snapshot.description)
    }

    /// Returns the edit history.
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Filename-safe form of the title.
    pub fn slug(&self) -> String {
        let slug: String = self
            .title
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || *c == ' ')
            .collect::<String>()
            .trim()
            .replace(' ', "_");
        if slug.is_empty() {
            "project".to_string()
        } else {
            slug
        }
    }

    /// Name the project is stored under: the slug plus the first eight hex
    /// digits of its workspace id, so equal titles never share a file.
    pub fn file_stem(&self) -> String {
        let id = self.workspace_id.simple().to_string();
        format!("{}-{}", self.slug(), &id[..8])
    }
}
