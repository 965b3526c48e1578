//! # audio-session-native
//!
//! Native backend for audio-session-kit.
//!
//! Provides:
//! - `NativeBackend` — capture and playback over cpal streams, each owned by
//!   a dedicated thread for its whole lifetime
//! - `NativePermissionGate` — the no-prompt desktop permission gate
//! - WAV clip I/O via hound; clips land in the configured output directory
//!   as `clip_<timestamp>_<uuid>.wav`
//!
//! ## Usage
//! ```ignore
//! use audio_session_core::CaptureConfig;
//!
//! let manager = audio_session_native::create_manager(CaptureConfig::default());
//! manager.initialize().await?;
//! manager.start_recording().await?;
//! ```

mod backend;
mod capture;
mod permissions;
mod playback;
mod wav;

pub use backend::NativeBackend;
pub use permissions::NativePermissionGate;

use std::sync::Arc;

use audio_session_core::models::config::CaptureConfig;
use audio_session_core::AudioSessionManager;

/// Build a session manager wired to the native backend and permission gate.
pub fn create_manager(config: CaptureConfig) -> AudioSessionManager {
    AudioSessionManager::new(
        Arc::new(NativeBackend::new()),
        Arc::new(NativePermissionGate),
        config,
    )
}
