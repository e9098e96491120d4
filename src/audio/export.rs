//! Audio export functionality.
//!
//! Writes rendered masters to canonical RIFF/WAVE files and optionally hands
//! a finished WAV to an external encoder for compressed formats. WAV export
//! never depends on the encoder being installed. Recorded vocals come back
//! in through [`import_wav`].

use super::buffer::AudioBuffer;
use crate::score::{export_to_midi, Score};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// External encoder used for compressed formats.
pub const ENCODER: &str = "ffmpeg";

/// Errors raised while writing files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported bit depth {0} (expected 16, 24 or 32)")]
    UnsupportedBitDepth(u16),

    #[error("unsupported output format `{0}` (expected wav or mp3)")]
    UnsupportedFormat(String),

    #[error("external encoder `{encoder}` is not installed")]
    EncoderUnavailable { encoder: &'static str },

    #[error("external encoder `{encoder}` failed: {message}")]
    EncoderFailed {
        encoder: &'static str,
        message: String,
    },
}

/// Output container for the rendered master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Builds the WAV header description for a buffer.
fn wav_spec(buffer: &AudioBuffer, bit_depth: u16) -> Result<WavSpec, ExportError> {
    let sample_format = match bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => return Err(ExportError::UnsupportedBitDepth(other)),
    };
    Ok(WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth,
        sample_format,
    })
}

/// Writes a buffer to a WAV file.
///
/// # Arguments
///
/// * `buffer` - The rendered audio (interleaved)
/// * `bit_depth` - 16 or 24 for integer PCM, 32 for IEEE float
/// * `path` - Path for the output WAV file
///
/// # Errors
///
/// Returns error if:
/// - The bit depth is not supported
/// - Output file cannot be created or written
pub fn export_wav<P: AsRef<Path>>(
    buffer: &AudioBuffer,
    bit_depth: u16,
    path: P,
) -> Result<(), ExportError> {
    let spec = wav_spec(buffer, bit_depth)?;
    let mut writer = WavWriter::create(path.as_ref(), spec)?;

    match bit_depth {
        16 => {
            for &sample in &buffer.samples {
                // Convert f32 (-1.0 to 1.0) to i16
                writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?;
            }
        }
        24 => {
            for &sample in &buffer.samples {
                let scaled = (sample as f64 * 8_388_607.0).clamp(-8_388_608.0, 8_388_607.0);
                writer.write_sample(scaled as i32)?;
            }
        }
        _ => {
            for &sample in &buffer.samples {
                writer.write_sample(sample.clamp(-1.0, 1.0))?;
            }
        }
    }

    writer.finalize()?;
    info!(
        path = %path.as_ref().display(),
        frames = buffer.frames(),
        bit_depth,
        "Exported WAV"
    );
    Ok(())
}

/// Reads a WAV file (e.g. a recorded vocal) into a buffer.
///
/// Integer PCM of any depth is scaled into [-1, 1); float PCM is taken as
/// is. Channels and sample rate are kept.
///
/// # Errors
///
/// Returns error if the file cannot be opened or is not a valid WAV.
pub fn import_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, ExportError> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v as f64 * scale) as f32))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    let buffer = AudioBuffer {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    };
    info!(
        path = %path.as_ref().display(),
        frames = buffer.frames(),
        channels = spec.channels,
        "Imported WAV"
    );
    Ok(buffer)
}

/// Checks whether the external encoder can be started.
pub fn encoder_available() -> bool {
    Command::new(ENCODER)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Converts a finished WAV file into a compressed format.
///
/// The output sits next to the WAV with the format's extension. Returns the
/// path of the compressed file.
///
/// # Errors
///
/// Returns `EncoderUnavailable` when the encoder is not installed and
/// `EncoderFailed` when it exits unsuccessfully.
pub fn export_compressed<P: AsRef<Path>>(
    wav_path: P,
    format: OutputFormat,
) -> Result<PathBuf, ExportError> {
    let wav_path = wav_path.as_ref();
    let output = wav_path.with_extension(format.extension());
    if format == OutputFormat::Wav {
        return Ok(wav_path.to_path_buf());
    }

    let result = Command::new(ENCODER)
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(wav_path)
        .args(["-codec:a", "libmp3lame", "-qscale:a", "2"])
        .arg(&output)
        .output();

    match result {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(encoder = ENCODER, "Encoder not found, keeping WAV only");
            Err(ExportError::EncoderUnavailable { encoder: ENCODER })
        }
        Err(e) => Err(ExportError::Io(e)),
        Ok(out) if !out.status.success() => Err(ExportError::EncoderFailed {
            encoder: ENCODER,
            message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
        Ok(_) => {
            info!(path = %output.display(), %format, "Exported compressed audio");
            Ok(output)
        }
    }
}

/// Writes a score as a Standard MIDI File.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn export_midi<P: AsRef<Path>>(score: &Score, path: P) -> Result<(), ExportError> {
    export_to_midi(score, path.as_ref())?;
    info!(path = %path.as_ref().display(), "Exported MIDI");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_buffer() -> AudioBuffer {
        AudioBuffer {
            sample_rate: 44100,
            channels: 2,
            samples: vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25],
        }
    }

    #[test]
    fn test_wav_16_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        export_wav(&stereo_buffer(), 16, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        // PCM, 2 channels, 44100 Hz, 16 bits
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            44100
        );
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(
            u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]),
            12
        );

        let mut reader = WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16383, -16383, 32767, -32767, 8191]);
    }

    #[test]
    fn test_wav_24_and_float() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("out24.wav");
        export_wav(&stereo_buffer(), 24, &path).unwrap();
        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.len(), 6);

        let path = dir.path().join("out32.wav");
        export_wav(&stereo_buffer(), 32, &path).unwrap();
        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, stereo_buffer().samples);
    }

    #[test]
    fn test_import_recorded_wav() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("take16.wav");
        export_wav(&stereo_buffer(), 16, &path).unwrap();
        let take = import_wav(&path).unwrap();
        assert_eq!((take.sample_rate, take.channels), (44100, 2));
        assert_eq!(take.frames(), 3);
        for (read, written) in take.samples.iter().zip(&stereo_buffer().samples) {
            assert!((read - written).abs() < 1e-4, "{read} vs {written}");
        }

        let path = dir.path().join("take32.wav");
        export_wav(&stereo_buffer(), 32, &path).unwrap();
        assert_eq!(import_wav(&path).unwrap(), stereo_buffer());
    }

    #[test]
    fn test_import_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"not a wave file").unwrap();
        assert!(matches!(import_wav(&path), Err(ExportError::Wav(_))));
        assert!(import_wav(dir.path().join("missing.wav")).is_err());
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let dir = tempfile::tempdir().unwrap();
        let result = export_wav(&stereo_buffer(), 8, dir.path().join("bad.wav"));
        assert!(matches!(result, Err(ExportError::UnsupportedBitDepth(8))));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("WAV".parse::<OutputFormat>().unwrap(), OutputFormat::Wav);
        assert_eq!("mp3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert!("ogg".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_compressed_wav_is_passthrough() {
        let path = Path::new("song.wav");
        assert_eq!(
            export_compressed(path, OutputFormat::Wav).unwrap(),
            PathBuf::from("song.wav")
        );
    }
}
