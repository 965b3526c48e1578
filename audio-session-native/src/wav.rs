//! WAV clip I/O and URI↔path mapping for the native backend.

use std::path::{Path, PathBuf};

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::config::CaptureConfig;
use audio_session_core::models::error::SessionError;

/// Write captured mono samples out at the configured channel count and bit
/// depth. Mono is duplicated across channels; 24/32-bit output shifts the
/// 16-bit capture up to the target width.
pub(crate) fn write_clip(
    path: &Path,
    samples: &[i16],
    sample_rate: u32,
    config: &CaptureConfig,
) -> Result<(), SessionError> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate,
        bits_per_sample: config.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    if config.bits_per_sample == 16 {
        for &sample in samples {
            for _ in 0..config.channels {
                writer.write_sample(sample).map_err(wav_error)?;
            }
        }
    } else {
        let shift = config.bits_per_sample - 16;
        for &sample in samples {
            let widened = (sample as i32) << shift;
            for _ in 0..config.channels {
                writer.write_sample(widened).map_err(wav_error)?;
            }
        }
    }
    writer.finalize().map_err(wav_error)?;
    Ok(())
}

/// Read a clip back as mono f32 plus its sample rate. Multi-channel clips
/// are averaged down; integer formats are scaled to [-1, 1].
pub(crate) fn read_clip(path: &Path) -> Result<(Vec<f32>, u32), SessionError> {
    let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(wav_error)?
        }
    };

    let mono = if channels > 1 {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Ok((mono, spec.sample_rate))
}

/// The native backend hands out plain filesystem paths, but accepts
/// `file://` URIs from callers that round-trip clips through collaborators.
pub(crate) fn uri_to_path(uri: &ClipUri) -> PathBuf {
    let raw = uri.as_str();
    PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))
}

fn wav_error(err: hound::Error) -> SessionError {
    SessionError::IoFailure(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_clip(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio-session-test-{name}-{}.wav", std::process::id()))
    }

    #[test]
    fn clip_round_trips_through_disk() {
        let path = temp_clip("roundtrip");
        let samples = vec![0i16, 1000, -1000, i16::MAX, i16::MIN + 1];

        write_clip(&path, &samples, 48000, &CaptureConfig::default()).unwrap();
        let (read, rate) = read_clip(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(rate, 48000);
        assert_eq!(read.len(), samples.len());
        for (got, want) in read.iter().zip(&samples) {
            assert!((got - *want as f32 / 32768.0).abs() < 1e-3);
        }
    }

    #[test]
    fn stereo_wide_output_reads_back_as_mono() {
        let path = temp_clip("stereo24");
        let config = CaptureConfig {
            channels: 2,
            bits_per_sample: 24,
            ..CaptureConfig::default()
        };
        let samples = vec![500i16, -500];

        write_clip(&path, &samples, 44100, &config).unwrap();
        let (read, rate) = read_clip(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(rate, 44100);
        // Two mono frames, each duplicated across channels then averaged back.
        assert_eq!(read.len(), 2);
        assert!((read[0] - 500.0 / 32768.0).abs() < 1e-3);
        assert!((read[1] + 500.0 / 32768.0).abs() < 1e-3);
    }

    #[test]
    fn missing_clip_is_an_io_failure() {
        let err = read_clip(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, SessionError::IoFailure(_)));
    }

    #[test]
    fn file_scheme_uris_map_to_paths() {
        assert_eq!(
            uri_to_path(&ClipUri::from("file:///tmp/clip.wav")),
            PathBuf::from("/tmp/clip.wav")
        );
        assert_eq!(
            uri_to_path(&ClipUri::from("/tmp/clip.wav")),
            PathBuf::from("/tmp/clip.wav")
        );
    }
}
