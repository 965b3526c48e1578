use async_trait::async_trait;

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::config::CaptureConfig;
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::backend::{
    AudioBackend, BackendKind, CaptureHandle, PlaybackHandle,
};

use crate::capture::BrowserCapture;
use crate::playback::BrowserPlayback;
use crate::support::{run_on_js, task_dropped};

/// Capture and playback over the browser's media facilities.
pub struct BrowserBackend;

#[async_trait]
impl AudioBackend for BrowserBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Browser
    }

    fn is_available(&self) -> bool {
        web_sys::window()
            .map(|window| window.navigator().media_devices().is_ok())
            .unwrap_or(false)
    }

    async fn open_capture(&self, config: &CaptureConfig) -> Result<CaptureHandle, SessionError> {
        let config = config.clone();
        let raw = run_on_js(async move { BrowserCapture::open(&config).await })
            .await
            .map_err(|_| task_dropped())??;
        Ok(CaptureHandle::new(Box::new(raw)))
    }

    async fn open_playback(&self, uri: &ClipUri) -> Result<PlaybackHandle, SessionError> {
        let uri = uri.clone();
        let raw = run_on_js(async move { BrowserPlayback::open(&uri).await })
            .await
            .map_err(|_| task_dropped())??;
        Ok(PlaybackHandle::new(Box::new(raw)))
    }
}
