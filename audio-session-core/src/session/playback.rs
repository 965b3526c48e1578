use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::clip::ClipUri;
use crate::models::error::SessionError;
use crate::models::state::PlaybackState;
use crate::session::guard::ResourceGuard;
use crate::traits::backend::{AudioBackend, PlaybackHandle};
use crate::traits::observer::SessionObserver;

/// State machine owning at most one active playback handle.
///
/// Exclusivity is enforced here rather than left to callers: starting a new
/// clip first stops and releases any prior handle, awaited, before the new
/// one is opened. Teardown never fails observably: close errors are logged
/// and reported through the observer hook so they stay testable without ever
/// blocking the next operation.
pub struct PlaybackSession {
    backend: Arc<dyn AudioBackend>,
    observer: Option<Arc<dyn SessionObserver>>,
    state: Mutex<PlaybackState>,
    slot: ResourceGuard<Option<PlaybackHandle>>,
}

impl PlaybackSession {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            observer: None,
            state: Mutex::new(PlaybackState::Idle),
            slot: ResourceGuard::new(None),
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// Cheap activity probe. Reconciles against backend-reported completion:
    /// a clip that reached its end retires the handle and transitions to
    /// `Idle` without an explicit stop call.
    pub fn is_playing(&self) -> bool {
        if !self.state().is_playing() {
            return false;
        }
        // An in-flight operation owns the slot; the state cell is the best
        // answer until it settles.
        let Ok(mut slot) = self.slot.try_claim() else {
            return true;
        };
        let still_active = slot.as_ref().map(PlaybackHandle::is_active).unwrap_or(false);
        if still_active {
            return true;
        }
        // Finished naturally. The backend resource is already wound down;
        // dropping the handle is the release.
        *slot = None;
        self.set_state(PlaybackState::Idle);
        false
    }

    /// Start playing `uri`, stopping and releasing any current playback
    /// first.
    pub async fn play(&self, uri: &ClipUri) -> Result<(), SessionError> {
        let mut slot = self.slot.try_claim()?;

        if let Some(previous) = slot.take() {
            self.set_state(PlaybackState::Stopping);
            self.close_handle(previous).await;
        }

        self.set_state(PlaybackState::Loading);
        match self.backend.open_playback(uri).await {
            Ok(handle) => {
                *slot = Some(handle);
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            Err(err) => {
                self.set_state(PlaybackState::Idle);
                Err(err)
            }
        }
    }

    /// Stop and release the current playback, if any. Never fails: teardown
    /// allocates nothing, so it waits for an in-flight operation rather than
    /// rejecting, and close errors are swallowed into the observer hook.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.claim_for_teardown().await;

        if let Some(handle) = slot.take() {
            self.set_state(PlaybackState::Stopping);
            self.close_handle(handle).await;
            self.set_state(PlaybackState::Idle);
        } else if !self.state().is_idle() {
            self.set_state(PlaybackState::Idle);
        }
        Ok(())
    }

    /// Release any outstanding playback handle unconditionally.
    pub async fn dispose(&self) {
        let _ = self.stop().await;
    }

    async fn close_handle(&self, handle: PlaybackHandle) {
        if let Err(err) = handle.stop().await {
            log::warn!("playback close failed (ignored): {err}");
            self.notify_cleanup_error(&err);
        }
    }

    fn set_state(&self, new_state: PlaybackState) {
        *self.state.lock() = new_state;
        log::debug!("playback state -> {:?}", new_state);
        if let Some(ref observer) = self.observer {
            observer.on_playback_state_changed(&new_state);
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
    use crate::session::mock::{MockBackend, TestObserver};
    use std::sync::atomic::Ordering;

    fn session(backend: &Arc<MockBackend>) -> PlaybackSession {
        PlaybackSession::new(Arc::clone(backend) as Arc<dyn AudioBackend>)
    }

    #[tokio::test]
    async fn play_then_stop_releases_the_handle() {
        let backend = MockBackend::new();
        let session = session(&backend);

        session.play(&ClipUri::from("mock://clip-a")).await.unwrap();
        assert!(session.is_playing());

        session.stop().await.unwrap();
        assert!(session.state().is_idle());
        assert_eq!(backend.stats.playbacks_opened.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stats.playbacks_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_ok() {
        let backend = MockBackend::new();
        let session = session(&backend);

        session.stop().await.unwrap();
        assert_eq!(backend.stats.playbacks_closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn playing_a_second_clip_first_closes_the_first() {
        let backend = MockBackend::new();
        let session = session(&backend);

        session.play(&ClipUri::from("mock://clip-a")).await.unwrap();
        session.play(&ClipUri::from("mock://clip-b")).await.unwrap();

        // B's open was preceded by exactly one close of A; the live counter
        // inside the mock asserts the two handles never coexisted.
        assert_eq!(backend.stats.playbacks_opened.load(Ordering::SeqCst), 2);
        assert_eq!(backend.stats.playbacks_closed.load(Ordering::SeqCst), 1);
        assert!(session.is_playing());

        session.stop().await.unwrap();
        assert_eq!(backend.stats.playbacks_closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completion_retires_the_handle_without_a_stop_call() {
        let backend = MockBackend::new();
        let session = session(&backend);

        session.play(&ClipUri::from("mock://clip-a")).await.unwrap();
        backend.end_playback();

        assert!(!session.is_playing());
        assert!(session.state().is_idle());
        assert_eq!(backend.stats.playbacks_closed.load(Ordering::SeqCst), 1);

        // A finished session accepts the next clip as usual.
        session.play(&ClipUri::from("mock://clip-b")).await.unwrap();
        assert!(session.is_playing());
    }

    #[tokio::test]
    async fn stop_swallows_close_errors_into_the_observer() {
        let backend = MockBackend::new();
        let observer = Arc::new(TestObserver::default());
        let mut session = session(&backend);
        session.set_observer(Arc::clone(&observer) as Arc<dyn SessionObserver>);

        session.play(&ClipUri::from("mock://clip-a")).await.unwrap();
        backend.fail_next_playback_stop(SessionError::IoFailure("teardown".into()));

        session.stop().await.unwrap();
        assert!(session.state().is_idle());
        assert_eq!(
            *observer.cleanup_errors.lock(),
            vec![SessionError::IoFailure("teardown".into())]
        );

        // Teardown failure never blocks the next operation.
        session.play(&ClipUri::from("mock://clip-b")).await.unwrap();
        assert!(session.is_playing());
    }

    #[tokio::test]
    async fn failed_open_returns_to_idle() {
        let backend = MockBackend::new();
        let session = session(&backend);

        backend.fail_next_playback(SessionError::IoFailure("missing clip".into()));
        assert_eq!(
            session.play(&ClipUri::from("mock://nope")).await.err(),
            Some(SessionError::IoFailure("missing clip".into()))
        );
        assert!(session.state().is_idle());
        assert!(!session.is_playing());
    }

    #[tokio::test]
    async fn playback_state_sequence_on_replacement() {
        let backend = MockBackend::new();
        let observer = Arc::new(TestObserver::default());
        let mut session = session(&backend);
        session.set_observer(Arc::clone(&observer) as Arc<dyn SessionObserver>);

        session.play(&ClipUri::from("mock://clip-a")).await.unwrap();
        session.play(&ClipUri::from("mock://clip-b")).await.unwrap();
        session.stop().await.unwrap();

        assert_eq!(
            *observer.playback_states.lock(),
            vec![
                PlaybackState::Loading,
                PlaybackState::Playing,
                PlaybackState::Stopping,
                PlaybackState::Loading,
                PlaybackState::Playing,
                PlaybackState::Stopping,
                PlaybackState::Idle,
            ]
        );
    }
}
