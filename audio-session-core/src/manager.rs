use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::clip::ClipUri;
use crate::models::config::CaptureConfig;
use crate::models::error::SessionError;
use crate::session::playback::PlaybackSession;
use crate::session::recording::RecordingSession;
use crate::traits::backend::{AudioBackend, BackendKind};
use crate::traits::observer::SessionObserver;
use crate::traits::permission::PermissionGate;

/// The surface exposed to UI, navigation, and storage collaborators.
///
/// Thin over the two session state machines: recording and playback are
/// independent and may have operations in flight concurrently (recording
/// while an earlier clip plays back); only operations on the same session
/// are mutually exclusive.
pub struct AudioSessionManager {
    backend: Arc<dyn AudioBackend>,
    recording: RecordingSession,
    playback: PlaybackSession,
    initialized: AtomicBool,
}

impl AudioSessionManager {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        permissions: Arc<dyn PermissionGate>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            recording: RecordingSession::new(Arc::clone(&backend), permissions, config),
            playback: PlaybackSession::new(Arc::clone(&backend)),
            backend,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.recording.set_observer(Arc::clone(&observer));
        self.playback.set_observer(observer);
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Probe the backend's capability once. A no-op on repeat calls; every
    /// resource-acquiring operation fails `BackendUnavailable` until this
    /// has succeeded.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.backend.is_available() {
            return Err(SessionError::BackendUnavailable);
        }
        log::info!("audio backend selected: {:?}", self.backend.kind());
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn start_recording(&self) -> Result<(), SessionError> {
        self.ensure_initialized()?;
        self.recording.start().await
    }

    pub async fn pause_recording(&self) -> Result<(), SessionError> {
        self.recording.pause().await
    }

    pub async fn resume_recording(&self) -> Result<(), SessionError> {
        self.recording.resume().await
    }

    pub async fn stop_recording(&self) -> Result<Option<ClipUri>, SessionError> {
        self.recording.stop().await
    }

    pub async fn cancel_recording(&self) -> Result<(), SessionError> {
        self.recording.cancel().await
    }

    /// Re-arm the recording session after a surfaced failure.
    pub fn acknowledge_recording_error(&self) {
        self.recording.acknowledge_error();
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.recording.is_paused()
    }

    pub fn can_pause(&self) -> bool {
        self.recording.can_pause()
    }

    pub async fn play_clip(&self, uri: &ClipUri) -> Result<(), SessionError> {
        self.ensure_initialized()?;
        self.playback.play(uri).await
    }

    /// Never fails observably; see [`PlaybackSession::stop`].
    pub async fn stop_playback(&self) -> Result<(), SessionError> {
        self.playback.stop().await
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Scoped teardown for application or screen exit: releases any
    /// outstanding capture and playback handle unconditionally.
    pub async fn dispose(&self) {
        self.recording.dispose().await;
        self.playback.dispose().await;
    }

    fn ensure_initialized(&self) -> Result<(), SessionError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::BackendUnavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{MockBackend, MockGate};
    use std::sync::atomic::Ordering;

    fn manager(backend: &Arc<MockBackend>) -> AudioSessionManager {
        AudioSessionManager::new(
            Arc::clone(backend) as Arc<dyn AudioBackend>,
            MockGate::granted() as Arc<dyn PermissionGate>,
            CaptureConfig::default(),
        )
    }

    #[tokio::test]
    async fn initialize_fails_when_the_platform_has_no_audio() {
        let backend = MockBackend::unavailable();
        let manager = manager(&backend);

        assert_eq!(
            manager.initialize().await.err(),
            Some(SessionError::BackendUnavailable)
        );
    }

    #[tokio::test]
    async fn operations_require_initialization() {
        let backend = MockBackend::new();
        let manager = manager(&backend);

        assert_eq!(
            manager.start_recording().await.err(),
            Some(SessionError::BackendUnavailable)
        );
        assert_eq!(
            manager.play_clip(&ClipUri::from("mock://clip-0")).await.err(),
            Some(SessionError::BackendUnavailable)
        );

        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap(); // no-op on repeat
        manager.start_recording().await.unwrap();
        assert!(manager.is_recording());
    }

    #[tokio::test]
    async fn recording_and_playback_run_concurrently() {
        let backend = MockBackend::new();
        let manager = manager(&backend);
        manager.initialize().await.unwrap();

        manager.start_recording().await.unwrap();
        let clip = ClipUri::from("mock://previous-clip");
        manager.play_clip(&clip).await.unwrap();

        assert!(manager.is_recording());
        assert!(manager.is_playing());

        let uri = manager.stop_recording().await.unwrap();
        assert!(uri.is_some());
        assert!(manager.is_playing());

        manager.stop_playback().await.unwrap();
        assert!(!manager.is_playing());
    }

    #[tokio::test]
    async fn dispose_releases_both_sessions() {
        let backend = MockBackend::new();
        let manager = manager(&backend);
        manager.initialize().await.unwrap();

        manager.start_recording().await.unwrap();
        manager
            .play_clip(&ClipUri::from("mock://clip-0"))
            .await
            .unwrap();

        manager.dispose().await;

        assert!(!manager.is_recording());
        assert!(!manager.is_playing());
        assert_eq!(
            backend.stats.captures_opened.load(Ordering::SeqCst),
            backend.stats.captures_closed.load(Ordering::SeqCst)
        );
        assert_eq!(
            backend.stats.playbacks_opened.load(Ordering::SeqCst),
            backend.stats.playbacks_closed.load(Ordering::SeqCst)
        );
    }

    /// Drives a long scripted interleaving of operations. The mock asserts
    /// the exclusivity invariant inside every open, so a violation anywhere
    /// in the sequence panics; the final counts catch leaks.
    #[tokio::test]
    async fn interleaved_operations_never_violate_exclusivity() {
        let backend = MockBackend::new();
        let manager = manager(&backend);
        manager.initialize().await.unwrap();

        let clip = ClipUri::from("mock://seed-clip");
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;

        for step in 0..400u32 {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let op = (seed >> 33) % 8;

            if step % 13 == 0 {
                backend.fail_next_capture(SessionError::DeviceBusy);
            }

            match op {
                0 => {
                    if manager.start_recording().await.is_err() {
                        manager.acknowledge_recording_error();
                    }
                }
                1 => {
                    let _ = manager.pause_recording().await;
                }
                2 => {
                    let _ = manager.resume_recording().await;
                }
                3 => {
                    let _ = manager.stop_recording().await;
                }
                4 => {
                    let _ = manager.cancel_recording().await;
                }
                5 => {
                    let _ = manager.play_clip(&clip).await;
                }
                6 => {
                    manager.stop_playback().await.unwrap();
                }
                _ => {
                    backend.end_playback();
                    let _ = manager.is_playing();
                }
            }
        }

        manager.dispose().await;

        let stats = &backend.stats;
        assert_eq!(
            stats.captures_opened.load(Ordering::SeqCst),
            stats.captures_closed.load(Ordering::SeqCst)
        );
        assert_eq!(
            stats.playbacks_opened.load(Ordering::SeqCst),
            stats.playbacks_closed.load(Ordering::SeqCst)
        );
        assert_eq!(stats.captures_live.load(Ordering::SeqCst), 0);
        assert_eq!(stats.playbacks_live.load(Ordering::SeqCst), 0);
    }
}
