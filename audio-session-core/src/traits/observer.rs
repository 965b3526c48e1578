use crate::models::error::SessionError;
use crate::models::state::{PlaybackState, RecordingState};

/// Event hook for session notifications.
///
/// Methods are called from whatever task drove the transition; marshal to the
/// UI thread if needed.
pub trait SessionObserver: Send + Sync {
    /// Called on every recording state transition.
    fn on_recording_state_changed(&self, state: &RecordingState);

    /// Called on every playback state transition.
    fn on_playback_state_changed(&self, state: &PlaybackState);

    /// Called when a cleanup-path failure was swallowed to honor the
    /// never-fail teardown contract. The operation that triggered the
    /// cleanup still reports success.
    fn on_cleanup_error(&self, error: &SessionError);
}
