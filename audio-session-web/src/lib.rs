//! # audio-session-web
//!
//! Browser backend for audio-session-kit.
//!
//! Provides:
//! - `BrowserBackend` — capture via `getUserMedia` + `MediaRecorder` with
//!   in-memory chunk buffering, playback via a media element; finished clips
//!   are delivered as blob URLs
//! - `BrowserPermissionGate` — microphone permission over the Permissions
//!   API, with a stream probe as the consent prompt
//!
//! JS futures are confined to `spawn_local` tasks and bridged back over
//! `futures-channel` oneshots, so the core's `Send` contracts hold on the
//! single-threaded wasm target; JS objects ride inside `send_wrapper`.

#[cfg(target_arch = "wasm32")]
mod backend;
#[cfg(target_arch = "wasm32")]
mod capture;
#[cfg(target_arch = "wasm32")]
mod permissions;
#[cfg(target_arch = "wasm32")]
mod playback;
#[cfg(target_arch = "wasm32")]
mod support;

#[cfg(target_arch = "wasm32")]
pub use backend::BrowserBackend;
#[cfg(target_arch = "wasm32")]
pub use permissions::BrowserPermissionGate;

#[cfg(target_arch = "wasm32")]
use std::sync::Arc;

#[cfg(target_arch = "wasm32")]
use audio_session_core::models::config::CaptureConfig;
#[cfg(target_arch = "wasm32")]
use audio_session_core::AudioSessionManager;

/// Build a session manager wired to the browser backend and permission gate.
#[cfg(target_arch = "wasm32")]
pub fn create_manager(config: CaptureConfig) -> AudioSessionManager {
    AudioSessionManager::new(
        Arc::new(BrowserBackend),
        Arc::new(BrowserPermissionGate),
        config,
    )
}
