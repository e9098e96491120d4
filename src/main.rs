//! songsmith - Procedural song composer.
//!
//! Generates a song from a genre template and a prompt, renders it to a WAV
//! (optionally MP3 through ffmpeg), and edits saved projects so they can be
//! re-rendered.
//!
//! # Usage
//!
//! ```bash
//! songsmith create lofi --prompt "rainy evening" --seed 42 --duration 20
//! songsmith list
//! songsmith tempo Neon_Harbor_Lo-Fi_-_chill-1f0c9a2e 84
//! songsmith render Neon_Harbor_Lo-Fi_-_chill-1f0c9a2e --format mp3
//! songsmith vocals "dreams in the neon skyline" --template pop --pitch 392
//! songsmith vocals --file take.wav --project Neon_Harbor_Lo-Fi_-_chill-1f0c9a2e --mix 0.8
//! ```
//!
//! Projects are addressed by the name `list` prints.
//!
//! Set `RUST_LOG=debug` for generation and render details.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use songsmith::audio::{export_compressed, export_midi, export_wav, import_wav, ExportError};
use songsmith::compose::{create_project, GenerateOptions};
use songsmith::{
    render_with, AudioBuffer, Catalog, Editor, InstrumentKind, InstrumentRole, LyricLine,
    OutputFormat, Project, RenderOptions, Score, Workspace,
};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser)]
#[command(name = "songsmith")]
#[command(about = "Procedural song composer")]
#[command(version)]
struct Cli {
    /// Directory holding saved projects (default: ~/.songsmith)
    #[arg(long, global = true, env = "SONGSMITH_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output settings shared by every command that renders audio.
#[derive(clap::Args)]
struct RenderArgs {
    /// Output file (default: <project>.<format> in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: wav or mp3
    #[arg(short, long, default_value = "wav")]
    format: OutputFormat,

    /// Fit the rendered audio to this many seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Bit depth: 16, 24 or 32 (float)
    #[arg(long)]
    bit_depth: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new song and render it
    Create {
        /// Template name; resolved from the prompt when omitted
        template: Option<String>,

        /// Free text describing the song
        #[arg(short, long, default_value = "")]
        prompt: String,

        /// Seed for reproducible output (default: from the clock)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Tempo in BPM, within the template's range (default: drawn from the seed)
        #[arg(long)]
        tempo: Option<f64>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Generate a song with a sung or recorded vocal line
    Vocals {
        /// Lyrics; hyphens mark syllable breaks ("sky-line")
        #[arg(required_unless_present = "file")]
        lyrics: Option<String>,

        /// Recorded vocal WAV mixed in place of singing the lyrics
        #[arg(long, value_name = "WAV")]
        file: Option<PathBuf>,

        /// Tuning of the sung vocal as the frequency of A4 in Hz (220-880)
        #[arg(long, value_name = "HZ")]
        pitch: Option<f64>,

        /// Level of the vocal in the mix (0-2)
        #[arg(long)]
        mix: Option<f32>,

        /// Template name; resolved from the lyrics when omitted
        #[arg(short, long)]
        template: Option<String>,

        /// Add the vocal to a saved project instead of a new song
        #[arg(long, conflicts_with = "template")]
        project: Option<String>,

        /// Seed for reproducible output
        #[arg(short, long)]
        seed: Option<u64>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Re-render a saved project
    Render {
        /// Project name as shown by `list`
        project: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Change a project's tempo
    Tempo {
        project: String,
        bpm: f64,
    },

    /// Assign an instrument kind to a role
    Instrument {
        project: String,
        /// pad, bass, lead or percussion
        role: InstrumentRole,
        /// e.g. soft_pad, pluck_bass, saw_lead, bell
        kind: InstrumentKind,
    },

    /// Reorder sections by their current indices
    Reorder {
        project: String,
        #[arg(required = true, num_args = 1..)]
        order: Vec<usize>,
    },

    /// Regenerate a section at a new length
    Resize {
        project: String,
        index: usize,
        bars: u32,
    },

    /// Revert the most recent edit
    Undo { project: String },

    /// Re-apply the most recently undone edit
    Redo { project: String },

    /// List saved projects
    List,

    /// Show a project's structure
    Show { project: String },

    /// List the built-in templates
    Templates,

    /// Export a project as a Standard MIDI File
    Midi {
        project: String,

        /// Output file (default: <project>.mid)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = Workspace::open(cli.workspace);
    let catalog = Catalog::builtin().context("Built-in templates are invalid")?;

    match cli.command {
        Commands::Create {
            template,
            prompt,
            seed,
            tempo,
            render,
        } => {
            let options = GenerateOptions {
                target_seconds: render.duration,
                tempo_bpm: tempo,
            };
            let mut project =
                create_project(&catalog, template.as_deref(), &prompt, seed, &options)
                    .context("Failed to create project")?;
            apply_render_args(&mut project, &render)?;
            let saved = workspace.save(&project).context("Failed to save project")?;
            let output = render_project(&project, &render)?;
            println!("Created \"{}\" (seed {})", project.title, project.score.seed);
            println!("  project: {}", saved.display());
            println!("  audio:   {}", output.display());
        }

        Commands::Vocals {
            lyrics,
            file,
            pitch,
            mix,
            template,
            project,
            seed,
            render,
        } => {
            let mut project = match project {
                Some(name) => load(&workspace, &name)?,
                None => {
                    let options = GenerateOptions {
                        target_seconds: render.duration,
                        ..Default::default()
                    };
                    let prompt = lyrics.as_deref().unwrap_or_default();
                    create_project(&catalog, template.as_deref(), prompt, seed, &options)
                        .context("Failed to create project")?
                }
            };
            if let Some(lyrics) = lyrics {
                project.lyrics = Some(lyrics);
            }
            if let Some(file) = file {
                // Stored absolute so later renders work from any directory
                let recording = std::fs::canonicalize(&file)
                    .with_context(|| format!("Recorded vocal {} not found", file.display()))?;
                project.vocal.recording = Some(recording);
            }
            if let Some(hz) = pitch {
                project.vocal.tuning_hz = hz;
            }
            if let Some(level) = mix {
                project.vocal.level = level;
            }
            project.vocal.validate().context("Invalid vocal settings")?;
            apply_render_args(&mut project, &render)?;
            let saved = workspace.save(&project).context("Failed to save project")?;
            let output = render_project(&project, &render)?;
            match &project.vocal.recording {
                Some(recording) => println!(
                    "Mixed {} into \"{}\"",
                    recording.display(),
                    project.title
                ),
                None => println!("Sang over \"{}\"", project.title),
            }
            println!("  project: {}", saved.display());
            println!("  audio:   {}", output.display());
        }

        Commands::Render { project, render } => {
            let mut project = load(&workspace, &project)?;
            apply_render_args(&mut project, &render)?;
            workspace.save(&project).context("Failed to save project")?;
            let output = render_project(&project, &render)?;
            println!("Rendered {}", output.display());
        }

        Commands::Tempo { project, bpm } => {
            edit(&workspace, &catalog, &project, format!("Set tempo to {bpm}"), |e, s| {
                e.set_tempo(s, bpm)
            })?;
        }

        Commands::Instrument {
            project,
            role,
            kind,
        } => {
            edit(&workspace, &catalog, &project, format!("Set {role} to {kind}"), |e, s| {
                e.swap_instrument(s, role, kind)
            })?;
        }

        Commands::Reorder { project, order } => {
            edit(&workspace, &catalog, &project, format!("Reorder sections {order:?}"), |e, s| {
                e.reorder_sections(s, &order)
            })?;
        }

        Commands::Resize {
            project,
            index,
            bars,
        } => {
            edit(
                &workspace,
                &catalog,
                &project,
                format!("Resize section {index} to {bars} bars"),
                |e, s| e.resize_section(s, index, bars),
            )?;
        }

        Commands::Undo { project: name } => {
            let mut project = load(&workspace, &name)?;
            match project.undo() {
                Some(description) => {
                    workspace.save(&project).context("Failed to save project")?;
                    println!("Undone: {description}");
                }
                None => println!("Nothing to undo"),
            }
        }

        Commands::Redo { project: name } => {
            let mut project = load(&workspace, &name)?;
            match project.redo() {
                Some(description) => {
                    workspace.save(&project).context("Failed to save project")?;
                    println!("Redone: {description}");
                }
                None => println!("Nothing to redo"),
            }
        }

        Commands::List => {
            let names = workspace.list().with_context(|| {
                format!("Failed to read workspace {}", workspace.root().display())
            })?;
            if names.is_empty() {
                println!("No projects in {}", workspace.root().display());
            }
            for name in names {
                match workspace.load(&name) {
                    Ok(project) => println!(
                        "{name}  {} [{}, {:.1}s]",
                        project.title,
                        project.score.template,
                        project.score.duration_seconds()
                    ),
                    Err(e) => warn!(project = %name, "Skipping unreadable project: {e}"),
                }
            }
        }

        Commands::Show { project } => {
            let project = load(&workspace, &project)?;
            print_project(&project);
        }

        Commands::Templates => {
            for template in catalog.iter() {
                println!(
                    "{:<10} {} - {} ({}-{} bpm)",
                    template.name,
                    template.genre,
                    template.mood,
                    template.tempo.bpm_min,
                    template.tempo.bpm_max
                );
            }
        }

        Commands::Midi { project, output } => {
            let project = load(&workspace, &project)?;
            let path =
                output.unwrap_or_else(|| PathBuf::from(format!("{}.mid", project.file_stem())));
            export_midi(&project.score, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {}", path.display());
        }
    }

    Ok(())
}

fn load(workspace: &Workspace, name: &str) -> Result<Project> {
    workspace.load(name).with_context(|| {
        format!(
            "Failed to load project `{name}` from {}",
            workspace.root().display()
        )
    })
}

/// Loads a project, applies one editor operation and saves it.
fn edit<F>(
    workspace: &Workspace,
    catalog: &Catalog,
    name: &str,
    description: String,
    operation: F,
) -> Result<()>
where
    F: FnOnce(&Editor, &Score) -> songsmith::Result<Score>,
{
    let editor = Editor::new(catalog);
    let mut project = load(workspace, name)?;
    project
        .apply_edit(description.clone(), |score| operation(&editor, score))
        .with_context(|| format!("{description} failed"))?;
    workspace.save(&project).context("Failed to save project")?;
    println!("{description}");
    Ok(())
}

/// Stores render overrides in the project so later renders reuse them.
fn apply_render_args(project: &mut Project, args: &RenderArgs) -> Result<()> {
    if let Some(rate) = args.sample_rate {
        project.render.sample_rate = rate;
    }
    if let Some(depth) = args.bit_depth {
        project.render.bit_depth = depth;
    }
    project.render.validate().context("Invalid render settings")?;
    Ok(())
}

/// Renders a project (with its vocal, if any) and writes the audio file.
fn render_project(project: &Project, args: &RenderArgs) -> Result<PathBuf> {
    let recorded_vocal = match &project.vocal.recording {
        Some(path) => Some(
            import_wav(path)
                .with_context(|| format!("Failed to read recorded vocal {}", path.display()))?,
        ),
        None => None,
    };
    let options = RenderOptions {
        duration_seconds: args.duration,
        lyrics: project.lyrics.as_deref().map(LyricLine::parse),
        recorded_vocal,
        vocal_level: project.vocal.level,
        tuning_hz: project.vocal.tuning_hz,
    };
    let rendered = render_with(&project.score, &project.render, &options)
        .with_context(|| format!("Failed to render \"{}\"", project.title))?;
    for warning in &rendered.warnings {
        warn!(?warning, "Vocal alignment adjusted");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(project.file_stem()).with_extension(args.format.extension()));
    write_audio(&rendered.master, project.render.bit_depth, &output, args.format)
}

/// Writes a WAV and, for compressed formats, hands it to the encoder.
///
/// A missing encoder is not fatal: the WAV is kept and its path returned.
fn write_audio(
    buffer: &AudioBuffer,
    bit_depth: u16,
    output: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    let wav_path = output.with_extension(OutputFormat::Wav.extension());
    export_wav(buffer, bit_depth, &wav_path)
        .with_context(|| format!("Failed to write {}", wav_path.display()))?;
    if format == OutputFormat::Wav {
        return Ok(wav_path);
    }

    match export_compressed(&wav_path, format) {
        Ok(path) => Ok(path),
        Err(ExportError::EncoderUnavailable { encoder }) => {
            eprintln!("Warning: {encoder} not found, kept {}", wav_path.display());
            Ok(wav_path)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to encode {format}")),
    }
}

fn print_project(project: &Project) {
    let score = &project.score;
    println!("{}", project.title);
    println!("  template: {} ({} - {})", score.template, project.genre, project.mood);
    if !project.prompt.is_empty() {
        println!("  prompt:   {}", project.prompt);
    }
    println!("  seed:     {}", score.seed);
    println!("  tempo:    {} bpm", score.tempo_bpm);
    println!("  key:      {}", score.key.describe());
    println!(
        "  length:   {} bars, {:.1}s",
        score.total_bars(),
        score.duration_seconds()
    );
    println!("  sections:");
    for (index, section) in score.sections.iter().enumerate() {
        let chords: Vec<String> = section
            .chords
            .iter()
            .take(4)
            .map(|c| c.symbol(&score.key))
            .collect();
        println!(
            "    {index}: {:<8} {:>2} bars  {}",
            section.label,
            section.bar_count,
            chords.join(" ")
        );
    }
    println!("  instruments:");
    for (role, kind) in &score.instrument_assignment {
        println!("    {:<10} {kind}", role.name());
    }
    if let Some(lyrics) = &project.lyrics {
        println!("  lyrics:   {lyrics}");
    }
    if let Some(recording) = &project.vocal.recording {
        println!("  vocal:    {}", recording.display());
    }
    if project.lyrics.is_some() || project.vocal.recording.is_some() {
        println!(
            "  vocal mix: level {}, A4 = {} Hz",
            project.vocal.level, project.vocal.tuning_hz
        );
    }
    let history = project.history();
    if history.can_undo() {
        println!("  undo:     {} step(s)", history.undo_count());
    }
}
