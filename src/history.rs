//! Bounded undo/redo of Score versions.
//!
//! Scores are immutable values, so a history entry is simply the Score that
//! an edit replaced, labelled with what the edit did. Stepping back trades
//! the current Score for the newest entry; stepping forward reverses that.

use crate::score::Score;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of edits that can be undone.
pub const MAX_HISTORY_SIZE: usize = 16;

/// A Score together with the edit that moved away from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub score: Score,
    /// E.g. "Set tempo to 84".
    pub description: String,
}

impl StateSnapshot {
    pub fn new(score: &Score, description: impl Into<String>) -> Self {
        Self {
            score: score.clone(),
            description: description.into(),
        }
    }

    /// A snapshot can be restored if its sections still tile correctly.
    /// Hand-edited project files may break that.
    pub fn is_valid(&self) -> bool {
        self.score.is_consistent()
    }
}

/// Undo and redo entries, newest last.
///
/// Recording a new edit discards everything that could have been redone.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HistoryManager {
    #[serde(default)]
    undo: VecDeque<StateSnapshot>,
    #[serde(default)]
    redo: Vec<StateSnapshot>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the Score an edit replaced. Drops the oldest entry when full.
    pub fn record(&mut self, snapshot: StateSnapshot) {
        self.redo.clear();
        self.push_undo(snapshot);
    }

    fn push_undo(&mut self, snapshot: StateSnapshot) {
        if self.undo.len() == MAX_HISTORY_SIZE {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }

    /// Takes the newest undo entry and files `current` for redo under the
    /// same description.
    pub fn step_back(&mut self, current: &Score) -> Option<StateSnapshot> {
        let snapshot = self.undo.pop_back()?;
        self.redo
            .push(StateSnapshot::new(current, snapshot.description.clone()));
        Some(snapshot)
    }

    /// Takes the newest redo entry and files `current` for undo, keeping
    /// the rest of the redo entries.
    pub fn step_forward(&mut self, current: &Score) -> Option<StateSnapshot> {
        let snapshot = self.redo.pop()?;
        self.push_undo(StateSnapshot::new(current, snapshot.description.clone()));
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    /// Descriptions of the undoable edits, oldest first.
    pub fn undo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.undo.iter().map(|s| s.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
