use super::error::SessionError;

/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle → acquiring-permission → starting → recording ↔ paused
///                 ↓                ↓           ↓
///               failed           failed     stopping → idle
/// ```
/// `Failed` re-arms to `Idle` once the caller acknowledges the error.
/// A capture handle exists only while the state is `Starting`, `Recording`,
/// `Paused`, or `Stopping`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    AcquiringPermission,
    Starting,
    Recording,
    Paused,
    Stopping,
    Failed(SessionError),
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether a capture handle may exist in this state.
    pub fn owns_handle(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Recording | Self::Paused | Self::Stopping
        )
    }
}

/// Playback session state machine.
///
/// ```text
/// idle → loading → playing → stopping → idle
/// ```
/// Playback also retires to `Idle` when the backend reports the clip ended,
/// without an explicit stop call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Stopping,
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether a playback handle may exist in this state.
    pub fn owns_handle(&self) -> bool {
        matches!(self, Self::Loading | Self::Playing | Self::Stopping)
    }
}
