//! Browser microphone permission.
//!
//! `check` reads the Permissions API without side effects; `request` runs
//! the consent flow by probing `getUserMedia` and immediately releasing the
//! stream. A hard denial is returned as-is; the browser would not re-prompt
//! anyway.

use async_trait::async_trait;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{MediaStream, MediaStreamConstraints, MediaStreamTrack, PermissionState};

use audio_session_core::traits::permission::{PermissionGate, PermissionStatus};

use crate::support::run_on_js;

pub struct BrowserPermissionGate;

#[async_trait]
impl PermissionGate for BrowserPermissionGate {
    async fn check(&self) -> PermissionStatus {
        run_on_js(query_permission())
            .await
            .unwrap_or(PermissionStatus::Undetermined)
    }

    async fn request(&self) -> PermissionStatus {
        let current = self.check().await;
        if current != PermissionStatus::Undetermined {
            return current;
        }
        run_on_js(probe_user_media())
            .await
            .unwrap_or(PermissionStatus::Denied)
    }
}

/// Permissions API query; `Undetermined` when the API or the descriptor is
/// unsupported, since only a prompt can settle the state then.
async fn query_permission() -> PermissionStatus {
    let Some(window) = web_sys::window() else {
        return PermissionStatus::Undetermined;
    };
    let Ok(permissions) = window.navigator().permissions() else {
        return PermissionStatus::Undetermined;
    };

    let descriptor = js_sys::Object::new();
    if js_sys::Reflect::set(
        &descriptor,
        &JsValue::from_str("name"),
        &JsValue::from_str("microphone"),
    )
    .is_err()
    {
        return PermissionStatus::Undetermined;
    }

    let Ok(promise) = permissions.query(&descriptor) else {
        return PermissionStatus::Undetermined;
    };
    let Ok(status) = JsFuture::from(promise).await else {
        return PermissionStatus::Undetermined;
    };
    let status: web_sys::PermissionStatus = status.unchecked_into();
    match status.state() {
        PermissionState::Granted => PermissionStatus::Granted,
        PermissionState::Denied => PermissionStatus::Denied,
        _ => PermissionStatus::Undetermined,
    }
}

/// Consent prompt: acquire and immediately release a microphone stream.
async fn probe_user_media() -> PermissionStatus {
    let Some(window) = web_sys::window() else {
        return PermissionStatus::Denied;
    };
    let Ok(devices) = window.navigator().media_devices() else {
        return PermissionStatus::Denied;
    };

    let constraints = MediaStreamConstraints::new();
    constraints.set_audio(&JsValue::TRUE);
    constraints.set_video(&JsValue::FALSE);
    let Ok(promise) = devices.get_user_media_with_constraints(&constraints) else {
        return PermissionStatus::Denied;
    };

    match JsFuture::from(promise).await {
        Ok(stream) => {
            let stream: MediaStream = stream.unchecked_into();
            for track in stream.get_tracks().iter() {
                track.unchecked_into::<MediaStreamTrack>().stop();
            }
            PermissionStatus::Granted
        }
        Err(_) => PermissionStatus::Denied,
    }
}
