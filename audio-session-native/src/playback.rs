//! Native clip playback.
//!
//! `open` decodes the whole clip up front (clips are short), then a
//! dedicated thread owns the cpal output stream and feeds it samples. The
//! active flag drops when the clip ends, which the session layer uses to
//! retire the handle without an explicit stop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::oneshot;

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::backend::RawPlayback;

use crate::capture::f32_to_i16;
use crate::wav;

/// One in-progress native playback.
pub(crate) struct NativePlayback {
    stopped: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl NativePlayback {
    pub(crate) async fn open(uri: &ClipUri) -> Result<Self, SessionError> {
        let path = wav::uri_to_path(uri);
        // Decode first so a missing or corrupt clip fails the open, not the
        // playback thread.
        let (samples, file_rate) = tokio::task::spawn_blocking(move || wav::read_clip(&path))
            .await
            .map_err(|e| SessionError::IoFailure(format!("wav reader task failed: {e}")))??;

        let stopped = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(true));
        let (setup_tx, setup_rx) = oneshot::channel();

        let worker = thread::Builder::new()
            .name("native-playback".into())
            .spawn({
                let stopped = Arc::clone(&stopped);
                let active = Arc::clone(&active);
                move || playback_loop(samples, file_rate, stopped, active, setup_tx)
            })
            .map_err(|e| SessionError::IoFailure(format!("failed to spawn playback thread: {e}")))?;

        match setup_rx.await {
            Ok(Ok(())) => Ok(Self {
                stopped,
                active,
                worker: Some(worker),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                stopped.store(true, Ordering::SeqCst);
                let _ = worker.join();
                Err(SessionError::IoFailure(
                    "playback thread exited during setup".into(),
                ))
            }
        }
    }
}

#[async_trait]
impl RawPlayback for NativePlayback {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn stop(mut self: Box<Self>) -> Result<(), SessionError> {
        self.stopped.store(true, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|e| SessionError::IoFailure(format!("playback join failed: {e}")))?
            .map_err(|_| SessionError::IoFailure("playback thread panicked".into()))
    }
}

impl Drop for NativePlayback {
    fn drop(&mut self) {
        if self.worker.take().is_some() {
            // Finished playbacks are routinely released by drop; the thread
            // exits on its own once the stop flag is set.
            self.stopped.store(true, Ordering::SeqCst);
        }
    }
}

/// Runs on the dedicated playback thread. Owns the (non-Send) cpal stream
/// until the clip ends or a stop arrives.
fn playback_loop(
    samples: Vec<f32>,
    file_rate: u32,
    stopped: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    setup_tx: oneshot::Sender<Result<(), SessionError>>,
) {
    let stream = match build_output_stream(samples, file_rate, Arc::clone(&active)) {
        Ok(stream) => stream,
        Err(err) => {
            active.store(false, Ordering::SeqCst);
            let _ = setup_tx.send(Err(err));
            return;
        }
    };

    if let Err(err) = stream.play() {
        active.store(false, Ordering::SeqCst);
        let _ = setup_tx.send(Err(SessionError::IoFailure(format!(
            "failed to start playback stream: {err}"
        ))));
        return;
    }
    let _ = setup_tx.send(Ok(()));

    while !stopped.load(Ordering::SeqCst) && active.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(25));
    }

    drop(stream);
    active.store(false, Ordering::SeqCst);
}

fn build_output_stream(
    samples: Vec<f32>,
    file_rate: u32,
    active: Arc<AtomicBool>,
) -> Result<cpal::Stream, SessionError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(SessionError::BackendUnavailable)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown output".into());

    let supported = device
        .default_output_config()
        .map_err(|e| SessionError::IoFailure(format!("no usable playback config: {e}")))?;
    let device_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    log::info!("playback device: {device_name} ({device_rate} Hz, {channels} ch)");

    let samples: Arc<Vec<f32>> = Arc::new(if device_rate == file_rate {
        samples
    } else {
        resample_linear(&samples, file_rate, device_rate)
    });
    let position = Arc::new(AtomicUsize::new(0));
    let err_fn = |err| log::error!("playback stream error: {err}");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let active = Arc::clone(&active);
            device.build_output_stream(
                &supported.config(),
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_frames(out, channels, &samples, &position, &active, |v| v);
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let active = Arc::clone(&active);
            device.build_output_stream(
                &supported.config(),
                move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill_frames(out, channels, &samples, &position, &active, f32_to_i16);
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(SessionError::IoFailure(format!(
                "unsupported playback sample format: {other:?}"
            )))
        }
    }
    .map_err(|e| SessionError::IoFailure(format!("failed to open playback stream: {e}")))?;

    Ok(stream)
}

/// Fan mono samples out across the device's channels; zero-fill past the end
/// of the clip and drop the active flag.
fn fill_frames<T: Copy>(
    out: &mut [T],
    channels: usize,
    samples: &[f32],
    position: &AtomicUsize,
    active: &AtomicBool,
    convert: impl Fn(f32) -> T,
) {
    let mut pos = position.load(Ordering::Relaxed);
    for frame in out.chunks_mut(channels.max(1)) {
        let value = if pos < samples.len() {
            pos += 1;
            samples[pos - 1]
        } else {
            0.0
        };
        let converted = convert(value);
        for slot in frame {
            *slot = converted;
        }
    }
    position.store(pos, Ordering::Relaxed);
    if pos >= samples.len() {
        active.store(false, Ordering::SeqCst);
    }
}

/// Linear-interpolation resampling, mono.
fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_count = (samples.len() as f64 * ratio) as usize;
    if output_count == 0 {
        return Vec::new();
    }

    let mut output = vec![0.0f32; output_count];
    for (i, sample) in output.iter_mut().enumerate() {
        let source_index = i as f64 / ratio;
        let index = source_index as usize;
        let fraction = (source_index - index as f64) as f32;

        if index + 1 < samples.len() {
            *sample = samples[index] * (1.0 - fraction) + samples[index + 1] * fraction;
        } else if index < samples.len() {
            *sample = samples[index];
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_is_identity_at_equal_rates() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 48000, 48000), input);
    }

    #[test]
    fn upsampling_doubles_the_length() {
        let input = vec![0.0, 1.0];
        let output = resample_linear(&input, 24000, 48000);
        assert_eq!(output.len(), 4);
        assert_eq!(output[0], 0.0);
        assert!((output[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downsampling_halves_the_length() {
        let input = vec![0.0, 0.25, 0.5, 0.75];
        let output = resample_linear(&input, 48000, 24000);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0], 0.0);
        assert!((output[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fill_zero_fills_past_the_clip_end_and_deactivates() {
        let samples = vec![0.5, -0.5];
        let position = AtomicUsize::new(0);
        let active = AtomicBool::new(true);
        let mut out = [1.0f32; 8]; // 4 stereo frames

        fill_frames(&mut out, 2, &samples, &position, &active, |v| v);

        assert_eq!(out, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
        assert!(!active.load(Ordering::SeqCst));
    }
}
