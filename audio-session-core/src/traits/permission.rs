use async_trait::async_trait;

/// Microphone-capture authorization as reported by the host platform.
///
/// Never cached: the host can revoke authorization outside the app's control,
/// so sessions re-query on every permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Queries and requests microphone-capture authorization.
///
/// Stateless beyond what the platform reports.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Live authorization state. Side-effect-free.
    async fn check(&self) -> PermissionStatus;

    /// Run the host consent flow if the status is undetermined; return the
    /// current status immediately if already granted or denied (host UX rules
    /// forbid re-prompting a hard denial). May suspend awaiting user
    /// interaction. Platforms where the OS grants access at stream
    /// acquisition time return `Granted` unconditionally.
    async fn request(&self) -> PermissionStatus;
}
