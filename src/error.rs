//! Error types surfaced by the composition core.
//!
//! Problems that only affect a single note (an unplayable pitch, a dropped
//! syllable) are repaired locally and logged. Everything here aborts the
//! operation that raised it and leaves any previously valid Score untouched.

use thiserror::Error;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, SongError>;

/// Errors raised by the catalog, generator, editor and render pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SongError {
    /// A named thing (template, section index, instrument role) does not exist.
    #[error("{what} `{name}` not found (available: {available})")]
    NotFound {
        what: &'static str,
        name: String,
        available: String,
    },

    /// A template definition is malformed.
    #[error("template `{template}` has an invalid {field}: {reason}")]
    ConfigError {
        template: String,
        field: &'static str,
        reason: String,
    },

    /// A numeric parameter lies outside its supported span.
    #[error("{field} = {value} is outside the supported range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Editor arguments are malformed.
    #[error("invalid edit of {field}: {reason}")]
    InvalidEdit { field: &'static str, reason: String },
}

impl SongError {
    /// Builds a [`SongError::NotFound`] listing the allowed names.
    pub fn not_found<I, S>(what: &'static str, name: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let available: Vec<String> = available
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        Self::NotFound {
            what,
            name: name.into(),
            available: if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            },
        }
    }

    /// Builds a [`SongError::ConfigError`] for a template field.
    pub fn config(template: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::ConfigError {
            template: template.to_string(),
            field,
            reason: reason.into(),
        }
    }

    /// Checks `value` against an inclusive range.
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
        if value.is_finite() && value >= min && value <= max {
            Ok(value)
        } else {
            Err(Self::OutOfRange {
                field,
                value,
                min,
                max,
            })
        }
    }

    /// Builds a [`SongError::InvalidEdit`].
    pub fn invalid_edit(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEdit {
            field,
            reason: reason.into(),
        }
    }
}
