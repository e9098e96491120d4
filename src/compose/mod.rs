//! Rule-based composition generator.
//!
//! Turns a template, a prompt and a seed into a [`Score`]. The whole Score
//! is a pure function of those three inputs:
//! - the song-level stream (tempo, bar-count offsets) is seeded from the seed
//!   and the prompt hash,
//! - every section draws from its own stream keyed by its layout ordinal, so
//!   one section can be regenerated without disturbing the others,
//! - inside a section, section-level choices are drawn before any per-bar
//!   choice, so resizing a section keeps its first bars intact.

mod harmony;
mod melody;
mod patterns;
mod stream;

pub use harmony::variation_weights;
pub use melody::vocal_melody;
pub use patterns::{quantize_velocity, BassPattern, RHYTHM_BANK};
pub use stream::{prompt_hash, SeedStream};

use crate::error::{Result, SongError};
use crate::score::{InstrumentRole, Key, NoteEvent, Project, Score, Section, DEFAULT_BEATS_PER_BAR};
use crate::template::{Catalog, Template};
use patterns::{BarContext, LeadState};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Offsets applied to layout bar counts; zero is twice as likely.
const BAR_OFFSETS: [i32; 4] = [-1, 0, 0, 1];

/// Shortest requested duration accepted by [`create_project`] and a render.
pub const MIN_TARGET_SECONDS: f64 = 1.0;

/// Longest requested duration accepted by [`create_project`] and a render.
pub const MAX_TARGET_SECONDS: f64 = 3600.0;

const TITLE_ADJECTIVES: &[&str] = &[
    "Amber", "Neon", "Silver", "Hollow", "Drifting", "Velvet", "Paper", "Quiet",
];
const TITLE_NOUNS: &[&str] = &[
    "Harbor", "Signal", "Orchard", "Lantern", "Tide", "Circuit", "Meadow", "Static",
];

/// Optional shaping of a generated Score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerateOptions {
    /// Repeat or shrink the layout so the Score lasts about this long.
    pub target_seconds: Option<f64>,
    /// Use this tempo instead of drawing one from the template range.
    pub tempo_bpm: Option<f64>,
}

/// Generates a Score with the template's default layout.
///
/// # Arguments
/// * `template` - Genre/mood preset
/// * `prompt` - Free text; an empty prompt is valid
/// * `seed` - Seed of the deterministic stream
pub fn generate(template: &Template, prompt: &str, seed: u64) -> Score {
    generate_with(template, prompt, seed, &GenerateOptions::default())
}

/// Generates a Score, optionally fitting its structure to a duration.
pub fn generate_with(
    template: &Template,
    prompt: &str,
    seed: u64,
    options: &GenerateOptions,
) -> Score {
    let prompt_hash = prompt_hash(prompt);
    let mut stream = SeedStream::new(seed, prompt_hash);
    // Drawn even when overridden so the bar offsets below stay the same
    let drawn = stream.range(template.tempo.bpm_min, template.tempo.bpm_max) as f64;
    let tempo_bpm = match options.tempo_bpm.filter(|t| t.is_finite()) {
        Some(bpm) => bpm.clamp(template.tempo.bpm_min as f64, template.tempo.bpm_max as f64),
        None => drawn,
    };
    let beats_per_bar = DEFAULT_BEATS_PER_BAR;

    let mut plans: Vec<(String, u32)> = template
        .layout
        .iter()
        .map(|plan| {
            let offset = BAR_OFFSETS[stream.index(BAR_OFFSETS.len())];
            (plan.label.clone(), (plan.bars as i32 + offset).max(1) as u32)
        })
        .collect();

    if let Some(seconds) = options.target_seconds.filter(|s| s.is_finite() && *s > 0.0) {
        let beats = seconds * tempo_bpm / 60.0;
        let bars = (beats / beats_per_bar as f64).ceil().max(1.0) as u32;
        plans = fit_layout(plans, bars);
    }

    let key = template.scale.clone();
    let sections: Vec<Section> = plans
        .iter()
        .enumerate()
        .map(|(ordinal, (label, bars))| {
            generate_section(
                template,
                &key,
                seed,
                prompt_hash,
                ordinal,
                label,
                *bars,
                beats_per_bar,
            )
        })
        .collect();

    let score = Score {
        template: template.name.clone(),
        prompt_hash,
        tempo_bpm,
        key,
        beats_per_bar,
        sections,
        instrument_assignment: template
            .palette
            .iter()
            .map(|entry| (entry.role, entry.kind))
            .collect(),
        seed,
    };
    debug!(
        template = %template.name,
        seed,
        tempo = tempo_bpm,
        bars = score.total_bars(),
        "Generated score"
    );
    score
}

/// Reshapes layout entries so they add up to exactly `bars` bars.
///
/// Longer targets cycle through the layout again (the final entry cut
/// short if needed). Shorter targets scale every entry down, keeping at
/// least one bar each; if there are more entries than bars, the layout is
/// truncated to one-bar sections.
fn fit_layout(plans: Vec<(String, u32)>, bars: u32) -> Vec<(String, u32)> {
    let total: u32 = plans.iter().map(|(_, b)| b).sum();
    if plans.is_empty() || total == bars {
        return plans;
    }

    if bars > total {
        let mut fitted = Vec::new();
        let mut remaining = bars;
        for (label, length) in plans.iter().cycle() {
            if remaining == 0 {
                break;
            }
            let length = (*length).min(remaining);
            fitted.push((label.clone(), length));
            remaining -= length;
        }
        return fitted;
    }

    if (bars as usize) < plans.len() {
        return plans
            .into_iter()
            .take(bars as usize)
            .map(|(label, _)| (label, 1))
            .collect();
    }

    let mut fitted: Vec<(String, u32)> = plans
        .into_iter()
        .map(|(label, length)| {
            let scaled = (length as u64 * bars as u64 / total as u64) as u32;
            (label, scaled.max(1))
        })
        .collect();
    let mut sum: u32 = fitted.iter().map(|(_, b)| b).sum();
    let count = fitted.len();
    let mut i = 0;
    while sum < bars {
        fitted[i % count].1 += 1;
        sum += 1;
        i += 1;
    }
    while sum > bars {
        // Take from the longest entry; never below one bar
        if let Some(entry) = fitted.iter_mut().filter(|(_, b)| *b > 1).max_by_key(|(_, b)| *b) {
            entry.1 -= 1;
            sum -= 1;
        } else {
            break;
        }
    }
    fitted
}

/// Generates one section's chords and notes from its own stream.
///
/// Used both by [`generate_with`] and by the editor when a section is
/// resized. The result depends only on the arguments.
#[allow(clippy::too_many_arguments)]
pub fn generate_section(
    template: &Template,
    key: &Key,
    seed: u64,
    prompt_hash: u64,
    ordinal: usize,
    label: &str,
    bar_count: u32,
    beats_per_bar: u32,
) -> Section {
    let mut stream = SeedStream::for_section(seed, prompt_hash, ordinal);

    // Section-level choices first
    let bass_pattern = BassPattern::ALL[stream.index(BassPattern::ALL.len())];
    let mut lead = LeadState::new(stream.index(RHYTHM_BANK.len()));

    let grammar = &template.grammar;
    let chords_per_bar = grammar.chords_per_bar.max(1) as usize;
    let mut chords = Vec::with_capacity(bar_count as usize * chords_per_bar);
    let mut note_events: BTreeMap<InstrumentRole, Vec<NoteEvent>> = template
        .palette
        .iter()
        .map(|entry| (entry.role, Vec::new()))
        .collect();

    for bar in 0..bar_count as usize {
        let bar_chords: Vec<_> = (0..chords_per_bar)
            .map(|slot| {
                let rule = harmony::rule_for_slot(grammar, bar * chords_per_bar + slot);
                harmony::choose_chord(rule, key, &mut stream)
            })
            .collect();
        let ctx = BarContext {
            key,
            chords: &bar_chords,
            bar_start: (bar as u32 * beats_per_bar) as f64,
            beats_per_bar,
        };

        for (role, events) in note_events.iter_mut() {
            let bar_events = match role {
                InstrumentRole::Pad => patterns::pad_bar(&ctx),
                InstrumentRole::Bass => patterns::bass_bar(&ctx, bass_pattern),
                InstrumentRole::Lead => patterns::lead_bar(&ctx, &mut lead, bar, &mut stream),
                InstrumentRole::Percussion => patterns::percussion_bar(&ctx, &mut stream),
            };
            events.extend(bar_events);
        }
        chords.extend(bar_chords);
    }

    for events in note_events.values_mut() {
        events.sort_by(|a, b| {
            a.onset_beat
                .total_cmp(&b.onset_beat)
                .then(a.pitch.cmp(&b.pitch))
        });
    }

    Section {
        label: label.to_string(),
        ordinal,
        bar_count,
        chords,
        note_events,
    }
}

/// Seed derived from the clock, for requests that do not pin one.
pub fn timestamp_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Display title such as "Neon Harbor (Lo-Fi - chill)", derived from the seed.
pub fn derive_title(template: &Template, seed: u64) -> String {
    let mut stream = SeedStream::for_purpose(seed, 0, "title");
    let adjective = stream.pick(TITLE_ADJECTIVES).copied().unwrap_or("Untitled");
    let noun = stream.pick(TITLE_NOUNS).copied().unwrap_or("Song");
    format!("{adjective} {noun} ({} - {})", template.genre, template.mood)
}

/// Generates a new project.
///
/// With `style` the named template is used; without it the template is
/// resolved from the prompt's keywords. A missing seed falls back to the
/// clock, in which case the result is not reproducible.
///
/// # Errors
///
/// Returns `NotFound` for an unknown style, and `OutOfRange` for a target
/// duration outside 1..=3600 seconds or a tempo outside the template range.
pub fn create_project(
    catalog: &Catalog,
    style: Option<&str>,
    prompt: &str,
    seed: Option<u64>,
    options: &GenerateOptions,
) -> Result<Project> {
    let template = match style {
        Some(name) => catalog.lookup(name)?,
        None => catalog.resolve(None, prompt),
    };
    if let Some(seconds) = options.target_seconds {
        SongError::check_range(
            "duration_seconds",
            seconds,
            MIN_TARGET_SECONDS,
            MAX_TARGET_SECONDS,
        )?;
    }
    if let Some(bpm) = options.tempo_bpm {
        SongError::check_range(
            "tempo_bpm",
            bpm,
            template.tempo.bpm_min as f64,
            template.tempo.bpm_max as f64,
        )?;
    }
    let seed = seed.unwrap_or_else(timestamp_seed);
    let score = generate_with(template, prompt, seed, options);
    let title = derive_title(template, seed);
    info!(title = %title, template = %template.name, seed, "Created project");
    Ok(Project::new(
        title,
        template.genre.clone(),
        template.mood.clone(),
        prompt,
        score,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    #[test]
    fn test_generate_is_deterministic() {
        let catalog = catalog();
        for template in catalog.iter() {
            for seed in [0, 1, 42, u64::MAX] {
                let a = generate(template, "rainy evening", seed);
                let b = generate(template, "rainy evening", seed);
                assert_eq!(a, b, "{} seed {seed}", template.name);
                assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
            }
        }
    }

    #[test]
    fn test_prompt_and_seed_change_the_score() {
        let catalog = catalog();
        let lofi = catalog.lookup("lofi").unwrap();
        let base = generate(lofi, "rainy evening", 42);
        assert_ne!(base, generate(lofi, "rainy evening", 43));
        assert_ne!(base, generate(lofi, "sunny morning", 42));
        // Empty prompt is valid
        assert!(generate(lofi, "", 42).is_consistent());
    }

    #[test]
    fn test_tempo_and_layout_within_template() {
        let catalog = catalog();
        for template in catalog.iter() {
            for seed in 0..20 {
                let score = generate(template, "prompt", seed);
                assert!(template.tempo.contains(score.tempo_bpm));
                assert_eq!(score.tempo_bpm.fract(), 0.0);
                assert_eq!(score.sections.len(), template.layout.len());
                for (section, plan) in score.sections.iter().zip(&template.layout) {
                    assert_eq!(section.label, plan.label);
                    let delta = section.bar_count as i64 - plan.bars as i64;
                    assert!((-1..=1).contains(&delta));
                    assert!(section.bar_count >= 1);
                    assert_eq!(
                        section.chords.len(),
                        section.bar_count as usize * template.grammar.chords_per_bar as usize
                    );
                }
            }
        }
    }

    #[test]
    fn test_pitch_and_duration_containment() {
        let catalog = catalog();
        for template in catalog.iter() {
            for seed in 0..10 {
                let score = generate(template, "containment", seed);
                assert!(score.is_consistent(), "{} seed {seed}", template.name);
                for section in &score.sections {
                    let length = section.length_beats(score.beats_per_bar);
                    for (role, events) in &section.note_events {
                        assert!(!events.is_empty(), "{role} is empty");
                        assert_eq!(section.span_beats(*role), length);
                        for event in events {
                            assert!(score.key.contains(event.pitch));
                            assert!(event.duration_beats > 0.0);
                            assert!(event.end_beat() <= length);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_chords_follow_the_grammar() {
        let catalog = catalog();
        let jazz = catalog.lookup("jazz").unwrap();
        let score = generate(jazz, "smoky bar", 5);
        for section in &score.sections {
            for (slot, chord) in section.chords.iter().enumerate() {
                let rule = &jazz.grammar.rules[slot % jazz.grammar.rules.len()];
                assert!(rule
                    .options()
                    .any(|c| c.degree == chord.degree && c.voicing == chord.voicing));
            }
        }
    }

    #[test]
    fn test_palette_roles_and_percussion() {
        let catalog = catalog();
        let cinematic = generate(catalog.lookup("cinematic").unwrap(), "", 1);
        assert!(!cinematic
            .instrument_assignment
            .contains_key(&InstrumentRole::Percussion));
        let pop = generate(catalog.lookup("pop").unwrap(), "", 1);
        assert_eq!(pop.instrument_assignment.len(), 4);
    }

    #[test]
    fn test_section_prefix_is_stable() {
        let catalog = catalog();
        let template = catalog.lookup("pop").unwrap();
        let key = template.scale.clone();
        let short = generate_section(template, &key, 9, 77, 2, "verse", 4, 4);
        let long = generate_section(template, &key, 9, 77, 2, "verse", 8, 4);
        assert_eq!(&long.chords[..4], &short.chords[..]);
        for (role, events) in &short.note_events {
            assert_eq!(&long.note_events[role][..events.len()], &events[..]);
        }
    }

    #[test]
    fn test_fit_layout() {
        let plans = || {
            vec![
                ("intro".to_string(), 4),
                ("verse".to_string(), 8),
                ("outro".to_string(), 4),
            ]
        };
        let bars = |p: &[(String, u32)]| p.iter().map(|(_, b)| *b).sum::<u32>();

        let longer = fit_layout(plans(), 22);
        assert_eq!(bars(&longer), 22);
        assert_eq!(longer[3].0, "intro");
        assert_eq!(longer[4], ("verse".to_string(), 2));

        let shorter = fit_layout(plans(), 7);
        assert_eq!(bars(&shorter), 7);
        assert_eq!(shorter.len(), 3);
        assert!(shorter.iter().all(|(_, b)| *b >= 1));

        let tiny = fit_layout(plans(), 2);
        assert_eq!(tiny, vec![("intro".to_string(), 1), ("verse".to_string(), 1)]);
    }

    #[test]
    fn test_target_duration_shapes_structure() {
        let catalog = catalog();
        let lofi = catalog.lookup("lofi").unwrap();
        let options = GenerateOptions {
            target_seconds: Some(20.0),
            ..Default::default()
        };
        let score = generate_with(lofi, "rainy evening", 42, &options);
        let bars_needed = (20.0 * score.tempo_bpm / 60.0 / 4.0_f64).ceil() as u32;
        assert_eq!(score.total_bars(), bars_needed);
        assert!(score.duration_seconds() >= 20.0);
        assert!(score.is_consistent());
    }

    #[test]
    fn test_create_project() {
        let catalog = catalog();
        let project =
            create_project(&catalog, Some("jazz"), "late night", Some(7), &Default::default())
                .unwrap();
        assert_eq!(project.genre, "Jazz");
        assert_eq!(project.score.seed, 7);
        assert!(project.title.ends_with("(Jazz - smooth)"));
        assert_eq!(project.title, derive_title(catalog.lookup("jazz").unwrap(), 7));

        let resolved =
            create_project(&catalog, None, "music for the club", Some(1), &Default::default())
                .unwrap();
        assert_eq!(resolved.score.template, "edm");

        assert!(matches!(
            create_project(&catalog, Some("polka"), "", Some(1), &Default::default()),
            Err(SongError::NotFound { .. })
        ));
        let bad = GenerateOptions {
            target_seconds: Some(-3.0),
            ..Default::default()
        };
        assert!(matches!(
            create_project(&catalog, Some("pop"), "", Some(1), &bad),
            Err(SongError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_tempo_override() {
        let catalog = catalog();
        let lofi = catalog.lookup("lofi").unwrap();
        let base = generate(lofi, "rainy evening", 42);
        let options = GenerateOptions {
            tempo_bpm: Some(lofi.tempo.bpm_max as f64),
            ..Default::default()
        };
        let project =
            create_project(&catalog, Some("lofi"), "rainy evening", Some(42), &options).unwrap();
        let score = project.score;
        assert_eq!(score.tempo_bpm, lofi.tempo.bpm_max as f64);
        // Only the tempo differs
        assert_eq!(score.sections, base.sections);
        assert_eq!(
            Score {
                tempo_bpm: base.tempo_bpm,
                ..score
            },
            base
        );
    }

    #[test]
    fn test_tempo_override_outside_template_range() {
        let catalog = catalog();
        let lofi = catalog.lookup("lofi").unwrap();
        for bpm in [lofi.tempo.bpm_min as f64 - 1.0, lofi.tempo.bpm_max as f64 + 1.0, f64::NAN] {
            let options = GenerateOptions {
                tempo_bpm: Some(bpm),
                ..Default::default()
            };
            assert!(matches!(
                create_project(&catalog, Some("lofi"), "", Some(1), &options),
                Err(SongError::OutOfRange {
                    field: "tempo_bpm",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_duration_lower_bound() {
        let catalog = catalog();
        let short = GenerateOptions {
            target_seconds: Some(0.5),
            ..Default::default()
        };
        assert!(create_project(&catalog, Some("pop"), "", Some(1), &short).is_err());
        let minimum = GenerateOptions {
            target_seconds: Some(MIN_TARGET_SECONDS),
            ..Default::default()
        };
        assert!(create_project(&catalog, Some("pop"), "", Some(1), &minimum).is_ok());
    }
}
