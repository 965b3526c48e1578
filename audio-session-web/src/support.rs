//! Bridging between the core's `Send` async contracts and non-`Send` JS
//! futures on the single-threaded wasm target.

use std::future::Future;

use futures_channel::oneshot;
use wasm_bindgen::{JsCast, JsValue};

use audio_session_core::models::error::SessionError;

/// Run a JS-facing future on the local task queue and hand its (Send)
/// output back through a oneshot. The non-`Send` future is consumed before
/// the caller ever suspends, so the caller's future stays `Send`.
pub(crate) fn run_on_js<T>(fut: impl Future<Output = T> + 'static) -> oneshot::Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    wasm_bindgen_futures::spawn_local(async move {
        let _ = tx.send(fut.await);
    });
    rx
}

pub(crate) fn task_dropped() -> SessionError {
    SessionError::IoFailure("browser task dropped before completion".into())
}

/// Map a `getUserMedia`/stream-acquisition rejection onto the session error
/// taxonomy.
pub(crate) fn map_media_error(err: &JsValue) -> SessionError {
    let name = err
        .dyn_ref::<web_sys::DomException>()
        .map(|e| e.name())
        .unwrap_or_default();
    match name.as_str() {
        "NotAllowedError" | "SecurityError" => SessionError::PermissionDenied,
        "NotFoundError" | "OverconstrainedError" => SessionError::BackendUnavailable,
        "NotReadableError" | "AbortError" => SessionError::DeviceBusy,
        _ => SessionError::IoFailure(format!("media acquisition failed: {name}")),
    }
}
