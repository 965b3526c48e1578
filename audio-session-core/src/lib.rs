//! # audio-session-core
//!
//! Backend-agnostic audio session core.
//!
//! Abstracts two structurally different audio backends (native platform
//! streams, browser media capture) behind one capture/playback contract,
//! gates capture behind microphone permission, and guarantees at-most-one
//! active recording and at-most-one active playback resource at any time.
//! Platform backends implement the `AudioBackend` trait and plug into the
//! session state machines.
//!
//! ## Architecture
//!
//! ```text
//! audio-session-core (this crate)
//! ├── traits/    ← AudioBackend, RawCapture, RawPlayback, PermissionGate, SessionObserver
//! ├── models/    ← SessionError, RecordingState, PlaybackState, CaptureConfig, ClipUri
//! ├── session/   ← RecordingSession, PlaybackSession, ResourceGuard
//! └── manager    ← AudioSessionManager (facade consumed by collaborators)
//! ```
//!
//! Every handle is released exactly once on every path out of its owning
//! state: the consuming `finalize`/`discard`/`stop` calls make a second
//! close unrepresentable, and concrete handles release in `Drop` as a
//! backstop.

pub mod manager;
pub mod models;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use manager::AudioSessionManager;
pub use models::clip::ClipUri;
pub use models::config::CaptureConfig;
pub use models::error::SessionError;
pub use models::state::{PlaybackState, RecordingState};
pub use session::guard::ResourceGuard;
pub use session::playback::PlaybackSession;
pub use session::recording::RecordingSession;
pub use traits::backend::{
    AudioBackend, BackendKind, CaptureHandle, PlaybackHandle, RawCapture, RawPlayback,
};
pub use traits::observer::SessionObserver;
pub use traits::permission::{PermissionGate, PermissionStatus};
