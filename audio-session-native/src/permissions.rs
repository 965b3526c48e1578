//! Desktop microphone permission.
//!
//! Desktop platforms have no per-app consent dialog for unpackaged apps:
//! access is granted (or refused) by the OS at stream-acquisition time, and
//! a privacy-settings refusal surfaces as a device error on open. The gate
//! therefore reports `Granted` unconditionally and never prompts.

use async_trait::async_trait;

use audio_session_core::traits::permission::{PermissionGate, PermissionStatus};

pub struct NativePermissionGate;

#[async_trait]
impl PermissionGate for NativePermissionGate {
    async fn check(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}
