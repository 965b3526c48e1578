//! Test doubles for the backend, permission gate, and observer.
//!
//! The stats block asserts the exclusivity invariant at open time: the live
//! handle count may never exceed one, for captures and playbacks alike, no
//! matter how operations interleave. Close counts include releases by drop,
//! so leak checks compare closed against opened at the end of a test.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::models::clip::ClipUri;
use crate::models::config::CaptureConfig;
use crate::models::error::SessionError;
use crate::models::state::{PlaybackState, RecordingState};
use crate::traits::backend::{
    AudioBackend, BackendKind, CaptureHandle, PlaybackHandle, RawCapture, RawPlayback,
};
use crate::traits::observer::SessionObserver;
use crate::traits::permission::{PermissionGate, PermissionStatus};

#[derive(Default)]
pub struct BackendStats {
    pub captures_opened: AtomicUsize,
    pub captures_closed: AtomicUsize,
    pub captures_discarded: AtomicUsize,
    pub captures_live: AtomicUsize,
    pub playbacks_opened: AtomicUsize,
    pub playbacks_closed: AtomicUsize,
    pub playbacks_live: AtomicUsize,
}

impl BackendStats {
    fn capture_opened(&self) {
        self.captures_opened.fetch_add(1, Ordering::SeqCst);
        let live = self.captures_live.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(live <= 1, "exclusivity violated: {live} live capture handles");
    }

    fn capture_closed(&self) {
        self.captures_closed.fetch_add(1, Ordering::SeqCst);
        self.captures_live.fetch_sub(1, Ordering::SeqCst);
    }

    fn playback_opened(&self) {
        self.playbacks_opened.fetch_add(1, Ordering::SeqCst);
        let live = self.playbacks_live.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(live <= 1, "exclusivity violated: {live} live playback handles");
    }

    fn playback_closed(&self) {
        self.playbacks_closed.fetch_add(1, Ordering::SeqCst);
        self.playbacks_live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockBackend {
    pub stats: Arc<BackendStats>,
    pub available: AtomicBool,
    pub supports_pause: AtomicBool,
    fail_open_capture: Mutex<Option<SessionError>>,
    fail_finalize: Arc<Mutex<Option<SessionError>>>,
    fail_open_playback: Mutex<Option<SessionError>>,
    fail_playback_stop: Arc<Mutex<Option<SessionError>>>,
    capture_gate: Mutex<Option<Arc<Notify>>>,
    last_playback_active: Mutex<Option<Arc<AtomicBool>>>,
    clip_counter: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stats: Arc::new(BackendStats::default()),
            available: AtomicBool::new(true),
            supports_pause: AtomicBool::new(true),
            fail_open_capture: Mutex::new(None),
            fail_finalize: Arc::new(Mutex::new(None)),
            fail_open_playback: Mutex::new(None),
            fail_playback_stop: Arc::new(Mutex::new(None)),
            capture_gate: Mutex::new(None),
            last_playback_active: Mutex::new(None),
            clip_counter: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let backend = Self::new();
        backend.available.store(false, Ordering::SeqCst);
        backend
    }

    pub fn fail_next_capture(&self, err: SessionError) {
        *self.fail_open_capture.lock() = Some(err);
    }

    pub fn fail_next_finalize(&self, err: SessionError) {
        *self.fail_finalize.lock() = Some(err);
    }

    pub fn fail_next_playback(&self, err: SessionError) {
        *self.fail_open_playback.lock() = Some(err);
    }

    pub fn fail_next_playback_stop(&self, err: SessionError) {
        *self.fail_playback_stop.lock() = Some(err);
    }

    /// Park the next `open_capture` until the returned notify fires.
    pub fn hold_next_capture(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.capture_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Simulate the most recent playback reaching end-of-clip.
    pub fn end_playback(&self) {
        if let Some(active) = self.last_playback_active.lock().as_ref() {
            active.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn open_capture(&self, _config: &CaptureConfig) -> Result<CaptureHandle, SessionError> {
        let gate = self.capture_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.fail_open_capture.lock().take() {
            return Err(err);
        }

        self.stats.capture_opened();
        let n = self.clip_counter.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureHandle::new(Box::new(MockCapture {
            stats: Arc::clone(&self.stats),
            uri: ClipUri::new(format!("mock://clip-{n}")),
            fail_finalize: Arc::clone(&self.fail_finalize),
            supports_pause: self.supports_pause.load(Ordering::SeqCst),
            closed: false,
        })))
    }

    async fn open_playback(&self, _uri: &ClipUri) -> Result<PlaybackHandle, SessionError> {
        if let Some(err) = self.fail_open_playback.lock().take() {
            return Err(err);
        }

        self.stats.playback_opened();
        let active = Arc::new(AtomicBool::new(true));
        *self.last_playback_active.lock() = Some(Arc::clone(&active));
        Ok(PlaybackHandle::new(Box::new(MockPlayback {
            stats: Arc::clone(&self.stats),
            active,
            fail_stop: Arc::clone(&self.fail_playback_stop),
            closed: false,
        })))
    }
}

struct MockCapture {
    stats: Arc<BackendStats>,
    uri: ClipUri,
    fail_finalize: Arc<Mutex<Option<SessionError>>>,
    supports_pause: bool,
    closed: bool,
}

impl MockCapture {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.capture_closed();
        }
    }
}

#[async_trait]
impl RawCapture for MockCapture {
    fn supports_pause(&self) -> bool {
        self.supports_pause
    }

    async fn pause(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn finalize(mut self: Box<Self>) -> Result<ClipUri, SessionError> {
        self.close();
        match self.fail_finalize.lock().take() {
            Some(err) => Err(err),
            None => Ok(self.uri.clone()),
        }
    }

    async fn discard(mut self: Box<Self>) -> Result<(), SessionError> {
        self.close();
        self.stats.captures_discarded.fetch_add(1, Ordering::SeqCst);
        match self.fail_finalize.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for MockCapture {
    fn drop(&mut self) {
        // Release-by-drop backstop still counts as the close.
        self.close();
    }
}

struct MockPlayback {
    stats: Arc<BackendStats>,
    active: Arc<AtomicBool>,
    fail_stop: Arc<Mutex<Option<SessionError>>>,
    closed: bool,
}

impl MockPlayback {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.playback_closed();
        }
    }
}

#[async_trait]
impl RawPlayback for MockPlayback {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn stop(mut self: Box<Self>) -> Result<(), SessionError> {
        self.close();
        match self.fail_stop.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for MockPlayback {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct MockGate {
    check_status: Mutex<PermissionStatus>,
    request_status: Mutex<PermissionStatus>,
    pub check_calls: AtomicUsize,
    pub request_calls: AtomicUsize,
}

impl MockGate {
    fn with(check: PermissionStatus, request: PermissionStatus) -> Arc<Self> {
        Arc::new(Self {
            check_status: Mutex::new(check),
            request_status: Mutex::new(request),
            check_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
        })
    }

    pub fn granted() -> Arc<Self> {
        Self::with(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    pub fn denied() -> Arc<Self> {
        Self::with(PermissionStatus::Denied, PermissionStatus::Denied)
    }

    pub fn undetermined_then(request: PermissionStatus) -> Arc<Self> {
        Self::with(PermissionStatus::Undetermined, request)
    }
}

#[async_trait]
impl PermissionGate for MockGate {
    async fn check(&self) -> PermissionStatus {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        *self.check_status.lock()
    }

    async fn request(&self) -> PermissionStatus {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        *self.request_status.lock()
    }
}

#[derive(Default)]
pub struct TestObserver {
    pub recording_states: Mutex<Vec<RecordingState>>,
    pub playback_states: Mutex<Vec<PlaybackState>>,
    pub cleanup_errors: Mutex<Vec<SessionError>>,
}

impl SessionObserver for TestObserver {
    fn on_recording_state_changed(&self, state: &RecordingState) {
        self.recording_states.lock().push(state.clone());
    }

    fn on_playback_state_changed(&self, state: &PlaybackState) {
        self.playback_states.lock().push(*state);
    }

    fn on_cleanup_error(&self, error: &SessionError) {
        self.cleanup_errors.lock().push(error.clone());
    }
}
