//! Browser clip playback over a detached media element.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use send_wrapper::SendWrapper;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlAudioElement;

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::backend::RawPlayback;

use crate::support::{map_media_error, run_on_js, task_dropped};

/// One in-progress browser playback.
pub(crate) struct BrowserPlayback {
    inner: SendWrapper<PlaybackInner>,
    active: Arc<AtomicBool>,
}

struct PlaybackInner {
    element: HtmlAudioElement,
    _onended: Closure<dyn FnMut()>,
    _onerror: Closure<dyn FnMut()>,
}

impl BrowserPlayback {
    /// Runs on the JS task queue (inside `spawn_local`). Resolves once the
    /// element has actually started playing, so autoplay-policy rejections
    /// fail the open.
    pub(crate) async fn open(uri: &ClipUri) -> Result<Self, SessionError> {
        let element = HtmlAudioElement::new_with_src(uri.as_str())
            .map_err(|_| SessionError::BackendUnavailable)?;

        let active = Arc::new(AtomicBool::new(true));
        let onended = {
            let active = Arc::clone(&active);
            Closure::<dyn FnMut()>::new(move || {
                active.store(false, Ordering::SeqCst);
            })
        };
        element.set_onended(Some(onended.as_ref().unchecked_ref()));

        let onerror = {
            let active = Arc::clone(&active);
            Closure::<dyn FnMut()>::new(move || {
                log::warn!("media element reported a playback error");
                active.store(false, Ordering::SeqCst);
            })
        };
        element.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        let promise = element
            .play()
            .map_err(|err| map_media_error(&err))?;
        JsFuture::from(promise)
            .await
            .map_err(|err| map_media_error(&err))?;

        Ok(Self {
            inner: SendWrapper::new(PlaybackInner {
                element,
                _onended: onended,
                _onerror: onerror,
            }),
            active,
        })
    }
}

#[async_trait]
impl RawPlayback for BrowserPlayback {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn stop(self: Box<Self>) -> Result<(), SessionError> {
        let BrowserPlayback { inner, active } = *self;
        run_on_js(async move {
            let inner = inner.take();
            let _ = inner.element.pause();
            // Detach the source so the element releases its decoder.
            inner.element.set_src("");
            active.store(false, Ordering::SeqCst);
        })
        .await
        .map_err(|_| task_dropped())
    }
}
