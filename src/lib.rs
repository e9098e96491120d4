//! songsmith - A procedural song composer.
//!
//! This library turns a genre template, a text prompt and a seed into a
//! symbolic score, renders that score to audio with simple oscillator
//! voices, and supports edits that re-render deterministically.

pub mod audio;
pub mod compose;
pub mod editor;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod score;
pub mod template;
pub mod workspace;

// Re-export commonly used types
pub use audio::{AudioBuffer, LyricLine, OutputFormat};
pub use compose::{create_project, generate, generate_with, GenerateOptions};
pub use editor::Editor;
pub use error::{Result, SongError};
pub use pipeline::{render, render_cancellable, render_with, RenderOptions, Rendered};
pub use score::{InstrumentKind, InstrumentRole, NoteEvent, Project, RenderParams, Score, VocalSettings};
pub use template::{Catalog, Template};
pub use workspace::Workspace;
