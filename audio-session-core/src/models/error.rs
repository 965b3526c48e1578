use thiserror::Error;

/// Errors that can occur while driving a capture or playback session.
///
/// `AlreadyRecording` and `OperationInProgress` indicate caller misuse, not a
/// backend fault; everything else maps to a platform condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("audio backend unavailable")]
    BackendUnavailable,

    #[error("audio device busy")]
    DeviceBusy,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("another operation on this session is in flight")]
    OperationInProgress,

    #[error("i/o failure: {0}")]
    IoFailure(String),
}

impl SessionError {
    /// Whether retrying the same call later can reasonably succeed.
    /// Permission denials need a settings change, not a retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::PermissionDenied | Self::BackendUnavailable)
    }
}
