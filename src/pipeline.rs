//! Score to master buffer.
//!
//! One rayon task synthesizes each instrument role and one more sings the
//! vocal line. The tasks share nothing mutable; each owns its buffer until
//! the mixer takes them all. A render always completes against the Score it
//! was handed, whatever edits happen meanwhile.

use crate::audio::mixer::{MAX_VOCAL_LEVEL, VOCAL_LEVEL};
use crate::audio::vocal::{MAX_TUNING_HZ, MIN_TUNING_HZ, STANDARD_TUNING_HZ};
use crate::audio::{mix_with_gain, synth, synthesize_vocal_tuned, AudioBuffer, LyricLine};
use crate::audio::{SyllableAlignment, VocalTake, VocalWarning};
use crate::compose::{vocal_melody, MAX_TARGET_SECONDS, MIN_TARGET_SECONDS};
use crate::error::{Result, SongError};
use crate::score::{InstrumentRole, RenderParams, Score};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Fade applied when the master is cut to a requested duration.
const FADE_SECONDS: f64 = 0.01;

/// Optional extras for a render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Fit the master to exactly this many seconds.
    pub duration_seconds: Option<f64>,
    /// Sing these lyrics over a melody generated from the Score.
    pub lyrics: Option<LyricLine>,
    /// Mix this recording as the vocal layer. Takes the place of `lyrics`.
    pub recorded_vocal: Option<AudioBuffer>,
    /// Gain of the vocal layer, 0..=2.
    pub vocal_level: f32,
    /// Frequency of A4 for the sung vocal, 220..=880 Hz.
    pub tuning_hz: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            duration_seconds: None,
            lyrics: None,
            recorded_vocal: None,
            vocal_level: VOCAL_LEVEL,
            tuning_hz: STANDARD_TUNING_HZ,
        }
    }
}

/// Result of a render: the stereo master and what the vocal aligner did.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub master: AudioBuffer,
    pub alignment: Vec<SyllableAlignment>,
    pub warnings: Vec<VocalWarning>,
}

/// Renders a Score to a stereo master at its nominal length.
pub fn render(score: &Score, params: &RenderParams) -> Result<AudioBuffer> {
    render_with(score, params, &RenderOptions::default()).map(|r| r.master)
}

/// Renders a Score with optional duration fitting and vocals.
///
/// # Errors
///
/// Returns `OutOfRange` for invalid render parameters, a duration outside
/// 1..=3600 seconds, a vocal level or tuning out of range, or a Score
/// tempo the synthesizer cannot use.
pub fn render_with(
    score: &Score,
    params: &RenderParams,
    options: &RenderOptions,
) -> Result<Rendered> {
    check_request(params, options)?;
    let stems = synthesize(score, params.sample_rate, options)?;
    Ok(mixdown(score, params, options, stems))
}

/// Same as [`render_with`], but gives up when `cancel` is set.
///
/// The flag is checked before synthesis starts and again before mixing.
/// A cancelled render returns `Ok(None)`; per-role buffers that were
/// already produced are dropped without ever being mixed.
pub fn render_cancellable(
    score: &Score,
    params: &RenderParams,
    options: &RenderOptions,
    cancel: &AtomicBool,
) -> Result<Option<Rendered>> {
    check_request(params, options)?;
    if cancel.load(Ordering::Relaxed) {
        info!("Render cancelled before synthesis");
        return Ok(None);
    }
    let stems = synthesize(score, params.sample_rate, options)?;
    if cancel.load(Ordering::Relaxed) {
        info!("Render cancelled before mixing");
        return Ok(None);
    }
    Ok(Some(mixdown(score, params, options, stems)))
}

/// Per-role buffers and the optional vocal take, before mixing.
struct Stems {
    tracks: BTreeMap<InstrumentRole, AudioBuffer>,
    take: Option<VocalTake>,
}

fn check_request(params: &RenderParams, options: &RenderOptions) -> Result<()> {
    params.validate()?;
    if let Some(seconds) = options.duration_seconds {
        SongError::check_range(
            "duration_seconds",
            seconds,
            MIN_TARGET_SECONDS,
            MAX_TARGET_SECONDS,
        )?;
    }
    SongError::check_range(
        "vocal_level",
        options.vocal_level as f64,
        0.0,
        MAX_VOCAL_LEVEL as f64,
    )?;
    SongError::check_range("tuning_hz", options.tuning_hz, MIN_TUNING_HZ, MAX_TUNING_HZ)?;
    if options.recorded_vocal.is_some() && options.lyrics.is_some() {
        warn!("Recorded vocal given, lyrics will not be sung");
    }
    Ok(())
}

/// Fan-out: instrument roles and the vocal line render concurrently.
fn synthesize(score: &Score, sample_rate: u32, options: &RenderOptions) -> Result<Stems> {
    let (tracks, take) = rayon::join(
        || render_tracks(score, sample_rate),
        || {
            options
                .lyrics
                .as_ref()
                .filter(|_| options.recorded_vocal.is_none())
                .map(|lyrics| render_vocal(score, lyrics, sample_rate, options.tuning_hz))
                .transpose()
        },
    );
    Ok(Stems {
        tracks: tracks?,
        take: take?,
    })
}

/// Fan-in: mixes the stems and fits the master to its length.
fn mixdown(score: &Score, params: &RenderParams, options: &RenderOptions, stems: Stems) -> Rendered {
    let sample_rate = params.sample_rate;
    let Stems { tracks, take } = stems;
    let levels: BTreeMap<InstrumentRole, f32> = tracks
        .keys()
        .map(|role| (*role, role.default_level()))
        .collect();
    let vocal = options
        .recorded_vocal
        .as_ref()
        .or(take.as_ref().map(|t| &t.buffer))
        .map(|buffer| (buffer, options.vocal_level));
    let mut master = mix_with_gain(&tracks, &levels, vocal, params.master_gain);
    master.pad_to(score.total_frames(sample_rate));
    if let Some(seconds) = options.duration_seconds {
        let frames = (seconds * sample_rate as f64).round() as usize;
        let fade = (FADE_SECONDS * sample_rate as f64).round() as usize;
        master.fit_to(frames, fade);
    }

    info!(
        template = %score.template,
        seconds = master.duration_seconds(),
        peak = master.peak(),
        "Rendered master"
    );
    let (alignment, warnings) = take
        .map(|t| (t.alignment, t.warnings))
        .unwrap_or_default();
    Rendered {
        master,
        alignment,
        warnings,
    }
}

/// Synthesizes every assigned role in parallel.
fn render_tracks(score: &Score, sample_rate: u32) -> Result<BTreeMap<InstrumentRole, AudioBuffer>> {
    score
        .instrument_assignment
        .par_iter()
        .map(|(role, kind)| -> Result<(InstrumentRole, AudioBuffer)> {
            let events = score.timeline(*role);
            let buffer = synth::render(&events, *kind, score.tempo_bpm, sample_rate)?;
            debug!(%role, %kind, frames = buffer.frames(), "Rendered track");
            Ok((*role, buffer))
        })
        .collect()
}

/// Generates one melody note per syllable and sings the lyrics over it.
fn render_vocal(
    score: &Score,
    lyrics: &LyricLine,
    sample_rate: u32,
    tuning_hz: f64,
) -> Result<VocalTake> {
    let melody = vocal_melody(score, lyrics.len().max(1));
    synthesize_vocal_tuned(lyrics, &melody, score.tempo_bpm, sample_rate, tuning_hz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{generate, generate_with, GenerateOptions};
    use crate::template::Catalog;

    fn lofi_score(seconds: f64) -> Score {
        let catalog = Catalog::builtin().unwrap();
        let options = GenerateOptions {
            target_seconds: Some(seconds),
            ..Default::default()
        };
        generate_with(catalog.lookup("lofi").unwrap(), "rainy evening", 42, &options)
    }

    #[test]
    fn test_lofi_twenty_second_scenario() {
        let score = lofi_score(20.0);
        let options = RenderOptions {
            duration_seconds: Some(20.0),
            ..Default::default()
        };
        let rendered = render_with(&score, &RenderParams::default(), &options).unwrap();
        let master = rendered.master;
        assert_eq!(master.channels, 2);
        assert_eq!(master.sample_rate, 44100);
        assert_eq!(master.frames(), 882_000);
        assert!(master.peak() <= 0.98);
        assert!(master.peak() > 0.0);
        assert!(rendered.warnings.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let score = lofi_score(6.0);
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        let a = render(&score, &params).unwrap();
        let b = render(&score, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.frames(), score.total_frames(8000));
    }

    #[test]
    fn test_every_template_renders_within_bounds() {
        let catalog = Catalog::builtin().unwrap();
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        let options = GenerateOptions {
            target_seconds: Some(4.0),
            ..Default::default()
        };
        for template in catalog.iter() {
            let score = generate_with(template, "bounds", 3, &options);
            let master = render(&score, &params).unwrap();
            assert!(master.peak() <= 0.98, "{}", template.name);
            assert!(master.samples.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_shorter_duration_truncates_and_fades() {
        let score = lofi_score(8.0);
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        let options = RenderOptions {
            duration_seconds: Some(2.5),
            ..Default::default()
        };
        let master = render_with(&score, &params, &options).unwrap().master;
        assert_eq!(master.frames(), 20_000);
        assert_eq!(master.samples[master.samples.len() - 1], 0.0);
        assert_eq!(master.samples[master.samples.len() - 2], 0.0);
    }

    #[test]
    fn test_vocal_layer() {
        let score = lofi_score(6.0);
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        let options = RenderOptions {
            lyrics: Some(LyricLine::parse("dreams in the neon skyline")),
            ..Default::default()
        };
        let rendered = render_with(&score, &params, &options).unwrap();
        assert_eq!(rendered.alignment.len(), 6);
        assert!(rendered.warnings.is_empty());
        assert!(rendered.master.frames() >= score.total_frames(8000));
        assert_ne!(rendered.master, render(&score, &params).unwrap());
        assert!(rendered.master.peak() <= 0.98);
    }

    #[test]
    fn test_cancelled_render_returns_nothing() {
        let score = lofi_score(4.0);
        let cancel = AtomicBool::new(true);
        let result = render_cancellable(
            &score,
            &RenderParams::default(),
            &RenderOptions::default(),
            &cancel,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_parameters() {
        let catalog = Catalog::builtin().unwrap();
        let score = generate(catalog.lookup("pop").unwrap(), "", 1);
        let params = RenderParams {
            sample_rate: 4000,
            ..Default::default()
        };
        assert!(matches!(
            render(&score, &params),
            Err(SongError::OutOfRange {
                field: "sample_rate",
                ..
            })
        ));
        let options = RenderOptions {
            duration_seconds: Some(-1.0),
            ..Default::default()
        };
        assert!(render_with(&score, &RenderParams::default(), &options).is_err());
        let options = RenderOptions {
            vocal_level: 2.5,
            ..Default::default()
        };
        assert!(matches!(
            render_with(&score, &RenderParams::default(), &options),
            Err(SongError::OutOfRange {
                field: "vocal_level",
                ..
            })
        ));
        let options = RenderOptions {
            tuning_hz: 100.0,
            ..Default::default()
        };
        assert!(matches!(
            render_with(&score, &RenderParams::default(), &options),
            Err(SongError::OutOfRange {
                field: "tuning_hz",
                ..
            })
        ));
    }

    #[test]
    fn test_duration_shares_the_project_lower_bound() {
        let score = lofi_score(4.0);
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        for seconds in [0.0, 0.5] {
            let options = RenderOptions {
                duration_seconds: Some(seconds),
                ..Default::default()
            };
            assert!(matches!(
                render_with(&score, &params, &options),
                Err(SongError::OutOfRange {
                    field: "duration_seconds",
                    ..
                })
            ));
        }
        let options = RenderOptions {
            duration_seconds: Some(MIN_TARGET_SECONDS),
            ..Default::default()
        };
        let master = render_with(&score, &params, &options).unwrap().master;
        assert_eq!(master.frames(), 8000);
    }

    #[test]
    fn test_vocal_level_and_tuning() {
        let score = lofi_score(6.0);
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        let sung = RenderOptions {
            lyrics: Some(LyricLine::parse("dreams in the neon skyline")),
            ..Default::default()
        };
        let base = render_with(&score, &params, &sung).unwrap();

        let louder = RenderOptions {
            vocal_level: 1.2,
            ..sung.clone()
        };
        assert_ne!(render_with(&score, &params, &louder).unwrap().master, base.master);

        let retuned = RenderOptions {
            tuning_hz: 466.16,
            ..sung.clone()
        };
        let rendered = render_with(&score, &params, &retuned).unwrap();
        assert_ne!(rendered.master, base.master);
        // The melody itself is unchanged, only how it is sung
        assert_eq!(rendered.alignment, base.alignment);
    }

    #[test]
    fn test_recorded_vocal_replaces_sung_vocal() {
        let score = lofi_score(4.0);
        let params = RenderParams {
            sample_rate: 8000,
            ..Default::default()
        };
        let recording = AudioBuffer::mono(
            16000,
            (0..16000).map(|i| 0.4 * (i as f32 * 0.03).sin()).collect(),
        );
        let recorded = RenderOptions {
            recorded_vocal: Some(recording),
            ..Default::default()
        };
        let plain = render(&score, &params).unwrap();
        let with_recording = render_with(&score, &params, &recorded).unwrap();
        assert_ne!(with_recording.master, plain);
        assert_eq!(with_recording.master.sample_rate, 8000);
        assert!(with_recording.alignment.is_empty());
        assert!(with_recording.master.peak() <= 0.98);

        let both = RenderOptions {
            lyrics: Some(LyricLine::parse("never sung")),
            ..recorded.clone()
        };
        let rendered = render_with(&score, &params, &both).unwrap();
        assert!(rendered.alignment.is_empty());
        assert_eq!(rendered.master, with_recording.master);
    }
}
