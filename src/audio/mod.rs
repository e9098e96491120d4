//! Audio synthesis, mixing and export.
//!
//! This module turns symbolic note events into sample buffers. It provides:
//! - Oscillators and ADSR envelopes
//! - Per-part synthesis of note events under an instrument kind
//! - A simplified sung vocal layer driven by lyrics
//! - Stereo mixdown with equal-power panning and clip-safe normalization
//! - WAV export and an optional hand-off to an external encoder

pub mod buffer;
pub mod envelope;
pub mod export;
pub mod lyrics;
pub mod mixer;
pub mod oscillator;
pub mod synth;
pub mod vocal;

pub use buffer::AudioBuffer;
pub use envelope::Envelope;
pub use export::{export_compressed, export_midi, export_wav, import_wav, ExportError, OutputFormat};
pub use lyrics::LyricLine;
pub use mixer::{mix, mix_with_gain};
pub use oscillator::Waveform;
pub use synth::render;
pub use vocal::{synthesize_vocal, synthesize_vocal_tuned, SyllableAlignment, VocalTake, VocalWarning};
