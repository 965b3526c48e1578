use async_trait::async_trait;
use cpal::traits::HostTrait;

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::config::CaptureConfig;
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::backend::{
    AudioBackend, BackendKind, CaptureHandle, PlaybackHandle,
};

use crate::capture::NativeCapture;
use crate::playback::NativePlayback;

/// Capture and playback over the platform's default audio devices.
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn is_available(&self) -> bool {
        let host = cpal::default_host();
        host.default_input_device().is_some() || host.default_output_device().is_some()
    }

    async fn open_capture(&self, config: &CaptureConfig) -> Result<CaptureHandle, SessionError> {
        let raw = NativeCapture::open(config).await?;
        Ok(CaptureHandle::new(Box::new(raw)))
    }

    async fn open_playback(&self, uri: &ClipUri) -> Result<PlaybackHandle, SessionError> {
        let raw = NativePlayback::open(uri).await?;
        Ok(PlaybackHandle::new(Box::new(raw)))
    }
}
