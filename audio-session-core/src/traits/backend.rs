use async_trait::async_trait;

use crate::models::clip::ClipUri;
use crate::models::config::CaptureConfig;
use crate::models::error::SessionError;

/// Which concrete backend the process selected at startup.
///
/// Chosen once at `initialize()`; session code never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Browser,
}

/// Interface for a platform-specific capture/playback facility.
///
/// Implemented by:
/// - `NativeBackend` (cpal streams, WAV files on disk)
/// - `BrowserBackend` (MediaRecorder, in-memory blobs)
///
/// The two variants must be behaviorally indistinguishable to session code:
/// same error kinds, same ownership contract, same idempotency rules.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether the platform has a usable audio facility at all. Probed once
    /// by `AudioSessionManager::initialize`.
    fn is_available(&self) -> bool;

    /// Allocate a capture resource and begin capturing.
    ///
    /// Fails fast with `BackendUnavailable` if the platform has no capture
    /// facility, or `DeviceBusy` if the input device is claimed elsewhere.
    async fn open_capture(&self, config: &CaptureConfig) -> Result<CaptureHandle, SessionError>;

    /// Allocate a playback resource bound to `uri` and begin playback.
    async fn open_playback(&self, uri: &ClipUri) -> Result<PlaybackHandle, SessionError>;
}

/// Backend-specific state behind a [`CaptureHandle`].
///
/// Implementations release the underlying device in `Drop` as a backstop, so
/// a leaked handle never strands a native resource; `finalize`/`discard` are
/// the deliberate paths.
#[async_trait]
pub trait RawCapture: Send {
    /// Whether this capture can pause without reopening the device.
    /// Implementations without a native pause primitive may emulate it by
    /// stopping and reopening capture, which leaves a small audible gap.
    fn supports_pause(&self) -> bool;

    async fn pause(&mut self) -> Result<(), SessionError>;

    async fn resume(&mut self) -> Result<(), SessionError>;

    /// Finalize the capture and release the device, returning where the
    /// audio landed. The device is released whether or not finalization
    /// succeeds; a flush error surfaces as `IoFailure`.
    async fn finalize(self: Box<Self>) -> Result<ClipUri, SessionError>;

    /// Release the device and drop the captured audio.
    async fn discard(self: Box<Self>) -> Result<(), SessionError>;
}

/// Backend-specific state behind a [`PlaybackHandle`].
#[async_trait]
pub trait RawPlayback: Send {
    /// Point-in-time liveness probe; flips false when the clip ends.
    fn is_active(&self) -> bool;

    /// Stop and release. Callers on the teardown path swallow the error
    /// (logging it and reporting it through the observer hook) so playback
    /// teardown never blocks a subsequent operation.
    async fn stop(self: Box<Self>) -> Result<(), SessionError>;
}

/// Exclusively-owned resource representing one in-progress capture.
///
/// At most one exists process-wide at any instant; the owning
/// `RecordingSession` is the only component that may reach it. Consuming
/// `finalize`/`discard` makes the matching close structurally exactly-once.
pub struct CaptureHandle {
    raw: Box<dyn RawCapture>,
}

impl CaptureHandle {
    pub fn new(raw: Box<dyn RawCapture>) -> Self {
        Self { raw }
    }

    pub fn supports_pause(&self) -> bool {
        self.raw.supports_pause()
    }

    pub async fn pause(&mut self) -> Result<(), SessionError> {
        self.raw.pause().await
    }

    pub async fn resume(&mut self) -> Result<(), SessionError> {
        self.raw.resume().await
    }

    pub async fn finalize(self) -> Result<ClipUri, SessionError> {
        self.raw.finalize().await
    }

    pub async fn discard(self) -> Result<(), SessionError> {
        self.raw.discard().await
    }
}

/// Exclusively-owned resource representing one in-progress playback.
pub struct PlaybackHandle {
    raw: Box<dyn RawPlayback>,
}

impl PlaybackHandle {
    pub fn new(raw: Box<dyn RawPlayback>) -> Self {
        Self { raw }
    }

    pub fn is_active(&self) -> bool {
        self.raw.is_active()
    }

    pub async fn stop(self) -> Result<(), SessionError> {
        self.raw.stop().await
    }
}
