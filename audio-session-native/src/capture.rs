//! Native microphone capture.
//!
//! A dedicated thread owns the cpal input stream; the audio callback
//! downmixes to mono i16 into a shared buffer, skipping samples while the
//! pause flag is set. Finalization stops the thread and writes the buffer
//! out as a WAV clip.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::config::CaptureConfig;
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::backend::RawCapture;

use crate::wav;

/// One in-progress native capture.
pub(crate) struct NativeCapture {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
    config: CaptureConfig,
    worker: Option<thread::JoinHandle<()>>,
}

impl NativeCapture {
    /// Spawn the capture thread and wait for it to report that the stream is
    /// live. A setup failure joins the thread before surfacing the error, so
    /// no resource outlives a failed open.
    pub(crate) async fn open(config: &CaptureConfig) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::IoFailure)?;

        let running = Arc::new(AtomicBool::new(true));
        let paused = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(Mutex::new(Vec::new()));
        let (setup_tx, setup_rx) = oneshot::channel();

        let worker = thread::Builder::new()
            .name("native-capture".into())
            .spawn({
                let running = Arc::clone(&running);
                let paused = Arc::clone(&paused);
                let samples = Arc::clone(&samples);
                move || capture_loop(running, paused, samples, setup_tx)
            })
            .map_err(|e| SessionError::IoFailure(format!("failed to spawn capture thread: {e}")))?;

        match setup_rx.await {
            Ok(Ok(sample_rate)) => Ok(Self {
                running,
                paused,
                samples,
                sample_rate,
                config: config.clone(),
                worker: Some(worker),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(SessionError::IoFailure(
                    "capture thread exited during setup".into(),
                ))
            }
        }
    }

    /// Stop the stream, join the worker, and hand back the captured buffer.
    async fn shutdown(&mut self) -> Result<Vec<i16>, SessionError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| SessionError::IoFailure(format!("capture join failed: {e}")))?
                .map_err(|_| SessionError::IoFailure("capture thread panicked".into()))?;
        }
        Ok(std::mem::take(&mut *self.samples.lock()))
    }

    fn output_path(&self) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let id = uuid::Uuid::new_v4();
        self.config
            .output_directory
            .join(format!("clip_{stamp}_{id}.wav"))
    }
}

#[async_trait]
impl RawCapture for NativeCapture {
    fn supports_pause(&self) -> bool {
        // The callback gates on the pause flag; the device stays open, so
        // pause/resume is gapless here.
        true
    }

    async fn pause(&mut self) -> Result<(), SessionError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn finalize(mut self: Box<Self>) -> Result<ClipUri, SessionError> {
        let samples = self.shutdown().await?;
        let path = self.output_path();
        let sample_rate = self.sample_rate;
        let config = self.config.clone();

        log::debug!(
            "finalizing capture: {} samples at {} Hz -> {}",
            samples.len(),
            sample_rate,
            path.display()
        );
        tokio::task::spawn_blocking(move || {
            wav::write_clip(&path, &samples, sample_rate, &config)?;
            Ok(ClipUri::new(path.to_string_lossy().into_owned()))
        })
        .await
        .map_err(|e| SessionError::IoFailure(format!("wav writer task failed: {e}")))?
    }

    async fn discard(mut self: Box<Self>) -> Result<(), SessionError> {
        let samples = self.shutdown().await?;
        log::debug!("discarding capture: {} samples dropped", samples.len());
        Ok(())
    }
}

impl Drop for NativeCapture {
    fn drop(&mut self) {
        if self.worker.take().is_some() {
            log::warn!("capture handle dropped without close; releasing the device");
            self.running.store(false, Ordering::SeqCst);
            // The worker exits on its own once the run flag clears.
        }
    }
}

/// Runs on the dedicated capture thread. Owns the (non-Send) cpal stream for
/// its whole lifetime and reports setup success or failure over `setup_tx`.
fn capture_loop(
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<i16>>>,
    setup_tx: oneshot::Sender<Result<u32, SessionError>>,
) {
    let (stream, sample_rate) = match build_input_stream(paused, samples) {
        Ok(built) => built,
        Err(err) => {
            let _ = setup_tx.send(Err(err));
            return;
        }
    };

    if let Err(err) = stream.play() {
        let _ = setup_tx.send(Err(SessionError::IoFailure(format!(
            "failed to start capture stream: {err}"
        ))));
        return;
    }
    let _ = setup_tx.send(Ok(sample_rate));

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(25));
    }

    drop(stream);
}

fn build_input_stream(
    paused: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<(cpal::Stream, u32), SessionError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(SessionError::BackendUnavailable)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown input".into());

    let supported = device
        .default_input_config()
        .map_err(map_default_config_error)?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    log::info!("capture device: {device_name} ({sample_rate} Hz, {channels} ch)");

    let err_fn = |err| log::error!("capture stream error: {err}");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let paused = Arc::clone(&paused);
            let samples = Arc::clone(&samples);
            device.build_input_stream(
                &supported.config(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    push_mono_from_f32(data, channels, &samples);
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let paused = Arc::clone(&paused);
            let samples = Arc::clone(&samples);
            device.build_input_stream(
                &supported.config(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    push_mono_from_i16(data, channels, &samples);
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let paused = Arc::clone(&paused);
            let samples = Arc::clone(&samples);
            device.build_input_stream(
                &supported.config(),
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    let signed: Vec<i16> =
                        data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                    push_mono_from_i16(&signed, channels, &samples);
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(SessionError::IoFailure(format!(
                "unsupported capture sample format: {other:?}"
            )))
        }
    }
    .map_err(map_build_stream_error)?;

    Ok((stream, sample_rate))
}

/// Multi-channel input is averaged down to mono.
fn push_mono_from_f32(data: &[f32], channels: usize, samples: &Mutex<Vec<i16>>) {
    let mut out = samples.lock();
    if channels <= 1 {
        out.extend(data.iter().map(|&s| f32_to_i16(s)));
    } else {
        for frame in data.chunks_exact(channels) {
            let avg = frame.iter().sum::<f32>() / channels as f32;
            out.push(f32_to_i16(avg));
        }
    }
}

fn push_mono_from_i16(data: &[i16], channels: usize, samples: &Mutex<Vec<i16>>) {
    let mut out = samples.lock();
    if channels <= 1 {
        out.extend_from_slice(data);
    } else {
        for frame in data.chunks_exact(channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            out.push((sum / channels as i32) as i16);
        }
    }
}

pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn map_default_config_error(err: cpal::DefaultStreamConfigError) -> SessionError {
    match err {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => SessionError::DeviceBusy,
        other => SessionError::IoFailure(format!("no usable capture config: {other}")),
    }
}

fn map_build_stream_error(err: cpal::BuildStreamError) -> SessionError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => SessionError::DeviceBusy,
        other => SessionError::IoFailure(format!("failed to open capture stream: {other}")),
    }
}
