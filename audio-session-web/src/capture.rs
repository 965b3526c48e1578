//! Browser microphone capture.
//!
//! `getUserMedia` acquires the stream, a `MediaRecorder` delivers chunks
//! which are buffered in memory, and finalization assembles them into one
//! blob and hands back its object URL. The stream's tracks are stopped on
//! every close path so the browser's recording indicator clears.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use send_wrapper::SendWrapper;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobEvent, BlobPropertyBag, MediaRecorder, MediaRecorderOptions, MediaStream,
    MediaStreamConstraints, MediaStreamTrack, RecordingState as RecorderState, Url,
};

use audio_session_core::models::clip::ClipUri;
use audio_session_core::models::config::CaptureConfig;
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::backend::RawCapture;

use crate::support::{map_media_error, run_on_js, task_dropped};

/// Chunk delivery interval for the recorder, in milliseconds.
const TIME_SLICE_MS: i32 = 250;

/// One in-progress browser capture.
pub(crate) struct BrowserCapture {
    inner: SendWrapper<CaptureInner>,
}

struct CaptureInner {
    stream: MediaStream,
    recorder: MediaRecorder,
    chunks: Rc<RefCell<Vec<Blob>>>,
    // Kept alive for the recorder's lifetime; dropping it would detach the
    // data callback.
    _ondata: Closure<dyn FnMut(BlobEvent)>,
}

impl BrowserCapture {
    /// Runs on the JS task queue (inside `spawn_local`).
    pub(crate) async fn open(config: &CaptureConfig) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(SessionError::IoFailure)?;

        let window = web_sys::window().ok_or(SessionError::BackendUnavailable)?;
        let devices = window
            .navigator()
            .media_devices()
            .map_err(|_| SessionError::BackendUnavailable)?;

        let constraints = MediaStreamConstraints::new();
        constraints.set_audio(&JsValue::TRUE);
        constraints.set_video(&JsValue::FALSE);
        let promise = devices
            .get_user_media_with_constraints(&constraints)
            .map_err(|err| map_media_error(&err))?;
        let stream: MediaStream = JsFuture::from(promise)
            .await
            .map_err(|err| map_media_error(&err))?
            .unchecked_into();

        let options = MediaRecorderOptions::new();
        options.set_audio_bits_per_second(config.sample_rate * config.bits_per_sample as u32);
        let recorder =
            MediaRecorder::new_with_media_stream_and_media_recorder_options(&stream, &options)
                .map_err(|err| {
                    stop_tracks(&stream);
                    map_media_error(&err)
                })?;

        let chunks: Rc<RefCell<Vec<Blob>>> = Rc::new(RefCell::new(Vec::new()));
        let ondata = {
            let chunks = Rc::clone(&chunks);
            Closure::<dyn FnMut(BlobEvent)>::new(move |event: BlobEvent| {
                if let Some(blob) = event.data() {
                    chunks.borrow_mut().push(blob);
                }
            })
        };
        recorder.set_ondataavailable(Some(ondata.as_ref().unchecked_ref()));

        if let Err(err) = recorder.start_with_time_slice(TIME_SLICE_MS) {
            stop_tracks(&stream);
            return Err(map_media_error(&err));
        }
        log::debug!("browser capture started ({})", recorder.mime_type());

        Ok(Self {
            inner: SendWrapper::new(CaptureInner {
                stream,
                recorder,
                chunks,
                _ondata: ondata,
            }),
        })
    }
}

#[async_trait]
impl RawCapture for BrowserCapture {
    fn supports_pause(&self) -> bool {
        true
    }

    async fn pause(&mut self) -> Result<(), SessionError> {
        self.inner
            .recorder
            .pause()
            .map_err(|_| SessionError::IoFailure("recorder pause failed".into()))
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        self.inner
            .recorder
            .resume()
            .map_err(|_| SessionError::IoFailure("recorder resume failed".into()))
    }

    async fn finalize(self: Box<Self>) -> Result<ClipUri, SessionError> {
        let inner = self.inner;
        let uri = run_on_js(async move { close_capture(inner.take(), false).await })
            .await
            .map_err(|_| task_dropped())??;
        uri.ok_or_else(|| SessionError::IoFailure("clip assembly produced no url".into()))
    }

    async fn discard(self: Box<Self>) -> Result<(), SessionError> {
        let inner = self.inner;
        run_on_js(async move { close_capture(inner.take(), true).await })
            .await
            .map_err(|_| task_dropped())??;
        Ok(())
    }
}

/// Stop the recorder, release the stream, and (unless discarding) assemble
/// the buffered chunks into one deliverable blob URL. The stream is released
/// on every path, including recorder-stop failure.
async fn close_capture(
    inner: CaptureInner,
    discard: bool,
) -> Result<Option<ClipUri>, SessionError> {
    let stop_result = stop_recorder(&inner.recorder).await;
    stop_tracks(&inner.stream);

    if discard {
        inner.chunks.borrow_mut().clear();
        return Ok(None);
    }
    stop_result?;

    let parts = js_sys::Array::new();
    for blob in inner.chunks.borrow().iter() {
        parts.push(blob);
    }
    let bag = BlobPropertyBag::new();
    bag.set_type(&inner.recorder.mime_type());
    let blob = Blob::new_with_blob_sequence_and_options(&parts, &bag)
        .map_err(|_| SessionError::IoFailure("failed to assemble clip blob".into()))?;
    let url = Url::create_object_url_with_blob(&blob)
        .map_err(|_| SessionError::IoFailure("failed to create clip url".into()))?;
    Ok(Some(ClipUri::new(url)))
}

/// Stop the recorder and wait for its `stop` event, which fires after the
/// final `dataavailable` chunk has been delivered.
async fn stop_recorder(recorder: &MediaRecorder) -> Result<(), SessionError> {
    if recorder.state() == RecorderState::Inactive {
        return Ok(());
    }

    let (tx, rx) = futures_channel::oneshot::channel::<()>();
    let mut tx = Some(tx);
    let onstop = Closure::<dyn FnMut()>::new(move || {
        if let Some(tx) = tx.take() {
            let _ = tx.send(());
        }
    });
    recorder.set_onstop(Some(onstop.as_ref().unchecked_ref()));

    recorder
        .stop()
        .map_err(|_| SessionError::IoFailure("recorder stop failed".into()))?;
    let _ = rx.await;
    recorder.set_onstop(None);
    Ok(())
}

fn stop_tracks(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        track.unchecked_into::<MediaStreamTrack>().stop();
    }
}
