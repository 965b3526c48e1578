use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::clip::ClipUri;
use crate::models::config::CaptureConfig;
use crate::models::error::SessionError;
use crate::models::state::RecordingState;
use crate::session::guard::ResourceGuard;
use crate::traits::backend::{AudioBackend, CaptureHandle};
use crate::traits::observer::SessionObserver;
use crate::traits::permission::{PermissionGate, PermissionStatus};

/// State machine owning at most one active capture handle.
///
/// Drives the permission gate and the backend to start, pause, resume, and
/// stop captures. Every transition into `Stopping` is followed by exactly one
/// close of the capture handle: the handle is consumed by
/// `finalize`/`discard`, so a second close cannot exist, and the consuming
/// call releases the device on its error path too.
pub struct RecordingSession {
    backend: Arc<dyn AudioBackend>,
    permissions: Arc<dyn PermissionGate>,
    config: CaptureConfig,
    observer: Option<Arc<dyn SessionObserver>>,
    state: Mutex<RecordingState>,
    slot: ResourceGuard<Option<CaptureHandle>>,
}

impl RecordingSession {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        permissions: Arc<dyn PermissionGate>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            backend,
            permissions,
            config,
            observer: None,
            state: Mutex::new(RecordingState::Idle),
            slot: ResourceGuard::new(None),
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn state(&self) -> RecordingState {
        self.state.lock().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().is_paused()
    }

    /// Whether the active capture can pause without reopening the device.
    /// False when nothing is being captured or an operation is in flight.
    pub fn can_pause(&self) -> bool {
        match self.slot.try_claim() {
            Ok(slot) => slot.as_ref().map(CaptureHandle::supports_pause).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Start a new recording.
    ///
    /// Transitions: Idle → AcquiringPermission → Starting → Recording.
    /// Fails with `AlreadyRecording` when not idle, without touching the
    /// permission gate or the backend; fails with `PermissionDenied`,
    /// `BackendUnavailable`, or `DeviceBusy` into the `Failed` state, which
    /// re-arms via [`acknowledge_error`](Self::acknowledge_error).
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.try_claim()?;

        if !self.state().is_idle() {
            return Err(SessionError::AlreadyRecording);
        }

        self.set_state(RecordingState::AcquiringPermission);
        let status = match self.permissions.check().await {
            PermissionStatus::Undetermined => self.permissions.request().await,
            status => status,
        };
        if status != PermissionStatus::Granted {
            self.set_state(RecordingState::Failed(SessionError::PermissionDenied));
            return Err(SessionError::PermissionDenied);
        }

        self.set_state(RecordingState::Starting);
        match self.backend.open_capture(&self.config).await {
            Ok(handle) => {
                *slot = Some(handle);
                self.set_state(RecordingState::Recording);
                Ok(())
            }
            Err(err) => {
                self.set_state(RecordingState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Pause the active recording. A no-op unless currently recording,
    /// mirroring the stop-while-idle rule.
    pub async fn pause(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.try_claim()?;

        if !self.state().is_recording() {
            return Ok(());
        }
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };

        if !handle.supports_pause() {
            log::debug!("no native pause on this backend; expect a gap across the emulated pause");
        }
        handle.pause().await?;
        self.set_state(RecordingState::Paused);
        Ok(())
    }

    /// Resume a paused recording. A no-op unless currently paused.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.try_claim()?;

        if !self.state().is_paused() {
            return Ok(());
        }
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };

        handle.resume().await?;
        self.set_state(RecordingState::Recording);
        Ok(())
    }

    /// Stop the active recording and return the finished clip's location.
    ///
    /// Returns `Ok(None)` when there is no active recording. The handle is
    /// released unconditionally: a finalization failure surfaces as
    /// `IoFailure` but still leaves the session idle and re-attemptable.
    pub async fn stop(&self) -> Result<Option<ClipUri>, SessionError> {
        let mut slot = self.slot.try_claim()?;

        {
            let state = self.state();
            if !state.is_recording() && !state.is_paused() {
                return Ok(None);
            }
        }

        self.set_state(RecordingState::Stopping);
        let Some(handle) = slot.take() else {
            self.set_state(RecordingState::Idle);
            return Ok(None);
        };

        let outcome = handle.finalize().await;
        self.set_state(RecordingState::Idle);
        outcome.map(Some)
    }

    /// Stop the active recording and drop the captured audio.
    ///
    /// Cancellation is a graceful stop plus discard, never an abrupt
    /// abandonment: the same backend-level close runs to release the device.
    /// A close failure cannot matter to a caller that asked for the audio to
    /// be dropped, so it is logged and reported through the observer hook.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.try_claim()?;

        {
            let state = self.state();
            if !state.is_recording() && !state.is_paused() {
                return Ok(());
            }
        }

        self.set_state(RecordingState::Stopping);
        if let Some(handle) = slot.take() {
            if let Err(err) = handle.discard().await {
                log::warn!("capture discard failed during cancel: {err}");
                self.notify_cleanup_error(&err);
            }
        }
        self.set_state(RecordingState::Idle);
        Ok(())
    }

    /// Re-arm a failed session for another attempt: Failed → Idle.
    pub fn acknowledge_error(&self) {
        let acknowledged = {
            let mut state = self.state.lock();
            if state.is_failed() {
                *state = RecordingState::Idle;
                true
            } else {
                false
            }
        };
        if acknowledged {
            self.notify_state(&RecordingState::Idle);
        }
    }

    /// Release any outstanding capture handle unconditionally. Waits for an
    /// in-flight operation instead of rejecting; the captured audio is
    /// discarded.
    pub async fn dispose(&self) {
        let mut slot = self.slot.claim_for_teardown().await;
        if let Some(handle) = slot.take() {
            log::warn!("disposing recording session with an active capture; discarding");
            if let Err(err) = handle.discard().await {
                self.notify_cleanup_error(&err);
            }
        }
        self.set_state(RecordingState::Idle);
    }

    fn set_state(&self, new_state: RecordingState) {
        *self.state.lock() = new_state.clone();
        log::debug!("recording state -> {:?}", new_state);
        self.notify_state(&new_state);
    }

    fn notify_state(&self, state: &RecordingState) {
        if let Some(ref observer) = self.observer {
            observer.on_recording_state_changed(state);
        }
    }

    fn notify_cleanup_error(&self, err: &SessionError) {
        if let Some(ref observer) = self.observer {
            observer.on_cleanup_error(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{MockBackend, MockGate, TestObserver};
    use std::sync::atomic::Ordering;

    fn session(backend: &Arc<MockBackend>, gate: &Arc<MockGate>) -> RecordingSession {
        RecordingSession::new(
            Arc::clone(backend) as Arc<dyn AudioBackend>,
            Arc::clone(gate) as Arc<dyn PermissionGate>,
            CaptureConfig::default(),
        )
    }

    #[tokio::test]
    async fn start_stop_returns_clip_uri() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        session.start().await.unwrap();
        assert!(session.is_recording());

        let uri = session.stop().await.unwrap();
        assert!(uri.is_some());
        assert!(session.state().is_idle());
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stats.captures_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        assert_eq!(session.stop().await.unwrap(), None);
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_start_fails_already_recording() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        session.start().await.unwrap();
        assert_eq!(
            session.start().await.err(),
            Some(SessionError::AlreadyRecording)
        );
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_start_is_rejected_while_first_is_in_flight() {
        let backend = MockBackend::new();
        let gate = backend.hold_next_capture();
        let session = Arc::new(session(&backend, &MockGate::granted()));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.start().await })
        };
        // Let the first call park inside open_capture.
        tokio::task::yield_now().await;

        assert_eq!(
            session.start().await.err(),
            Some(SessionError::OperationInProgress)
        );

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 1);
        assert!(session.is_recording());
    }

    #[tokio::test]
    async fn permission_denied_never_touches_the_backend() {
        let backend = MockBackend::new();
        let gate = MockGate::denied();
        let session = session(&backend, &gate);

        assert_eq!(
            session.start().await.err(),
            Some(SessionError::PermissionDenied)
        );
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 0);
        assert!(session.state().is_failed());
        // No consent re-prompt on a hard denial.
        assert_eq!(gate.request_calls.load(Ordering::SeqCst), 0);

        // Acknowledging re-arms for another attempt.
        session.acknowledge_error();
        assert!(session.state().is_idle());
    }

    #[tokio::test]
    async fn undetermined_permission_triggers_consent_flow() {
        let backend = MockBackend::new();
        let gate = MockGate::undetermined_then(PermissionStatus::Granted);
        let session = session(&backend, &gate);

        session.start().await.unwrap();
        assert_eq!(gate.request_calls.load(Ordering::SeqCst), 1);
        assert!(session.is_recording());
    }

    #[tokio::test]
    async fn open_failure_lands_in_failed_with_no_handle() {
        let backend = MockBackend::new();
        backend.fail_next_capture(SessionError::DeviceBusy);
        let session = session(&backend, &MockGate::granted());

        assert_eq!(session.start().await.err(), Some(SessionError::DeviceBusy));
        assert_eq!(
            session.state(),
            RecordingState::Failed(SessionError::DeviceBusy)
        );
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 0);

        session.acknowledge_error();
        session.start().await.unwrap();
        assert!(session.is_recording());
    }

    #[tokio::test]
    async fn failed_finalize_still_releases_the_handle() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        session.start().await.unwrap();
        backend.fail_next_finalize(SessionError::IoFailure("flush".into()));

        assert_eq!(
            session.stop().await.err(),
            Some(SessionError::IoFailure("flush".into()))
        );
        assert!(session.state().is_idle());
        assert_eq!(backend.stats.captures_closed.load(Ordering::SeqCst), 1);

        // The session is re-attemptable after a failed stop.
        session.start().await.unwrap();
        assert!(session.is_recording());
    }

    #[tokio::test]
    async fn cancel_releases_the_handle_and_returns_no_uri() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        session.start().await.unwrap();
        session.cancel().await.unwrap();

        assert!(session.state().is_idle());
        assert_eq!(backend.stats.captures_opened.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stats.captures_closed.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stats.captures_discarded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_lifecycle_state_sequence() {
        let backend = MockBackend::new();
        let observer = Arc::new(TestObserver::default());
        let mut session = session(&backend, &MockGate::granted());
        session.set_observer(Arc::clone(&observer) as Arc<dyn SessionObserver>);

        session.start().await.unwrap();
        session.pause().await.unwrap();
        session.resume().await.unwrap();
        let uri = session.stop().await.unwrap();
        assert!(uri.is_some());

        assert_eq!(
            *observer.recording_states.lock(),
            vec![
                RecordingState::AcquiringPermission,
                RecordingState::Starting,
                RecordingState::Recording,
                RecordingState::Paused,
                RecordingState::Recording,
                RecordingState::Stopping,
                RecordingState::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn pause_and_resume_outside_their_states_are_noops() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        session.pause().await.unwrap();
        session.resume().await.unwrap();
        assert!(session.state().is_idle());

        session.start().await.unwrap();
        session.resume().await.unwrap();
        assert!(session.is_recording());

        session.pause().await.unwrap();
        session.pause().await.unwrap();
        assert!(session.is_paused());
    }

    #[tokio::test]
    async fn dispose_mid_recording_releases_exactly_once() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        session.start().await.unwrap();
        session.dispose().await;

        assert!(session.state().is_idle());
        assert_eq!(
            backend.stats.captures_opened.load(Ordering::SeqCst),
            backend.stats.captures_closed.load(Ordering::SeqCst)
        );
        assert_eq!(backend.stats.captures_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn can_pause_tracks_the_active_handle() {
        let backend = MockBackend::new();
        let session = session(&backend, &MockGate::granted());

        assert!(!session.can_pause());
        session.start().await.unwrap();
        assert!(session.can_pause());

        backend.supports_pause.store(false, Ordering::SeqCst);
        session.stop().await.unwrap();
        session.start().await.unwrap();
        assert!(!session.can_pause());
    }
}
