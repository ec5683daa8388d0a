//! Element core shared by the audio and video handlers.

use super::{HandlerCallbacks, LoadSignal};
use crate::error::{MediaPlayerError, PlaybackError, Result};
use crate::listeners::ListenerManager;
use crate::resources::ElementPool;
use crate::types::{clamp_playback_rate, clamp_volume, sanitize_duration, MediaItem, TimeUpdate};
use bridge_traits::{
    AttachedNode, DomEvent, DomEventKind, ElementKind, EventDisposition, MediaElement,
    PresentationContainer,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type PendingLoad = Arc<Mutex<Option<oneshot::Sender<LoadSignal>>>>;
type KnownDuration = Arc<RwLock<Option<f64>>>;

pub(crate) struct ElementCore {
    label: &'static str,
    kind: ElementKind,
    pool: Arc<ElementPool>,
    load_timeout: Option<Duration>,
    container: RwLock<Option<Arc<dyn PresentationContainer>>>,
    element: RwLock<Option<Arc<dyn MediaElement>>>,
    listeners: ListenerManager,
    pub(crate) callbacks: Arc<HandlerCallbacks>,
    loading: Arc<AtomicBool>,
    pending: PendingLoad,
    media_id: RwLock<Option<String>>,
    /// Catalog duration of the loaded item, used when the platform has none.
    known_duration: KnownDuration,
    volume: Mutex<f64>,
    playback_rate: Mutex<f64>,
}

impl ElementCore {
    pub fn new(
        label: &'static str,
        kind: ElementKind,
        pool: Arc<ElementPool>,
        load_timeout: Option<Duration>,
    ) -> Self {
        Self {
            label,
            kind,
            pool,
            load_timeout,
            container: RwLock::new(None),
            element: RwLock::new(None),
            listeners: ListenerManager::new(label),
            callbacks: Arc::new(HandlerCallbacks::default()),
            loading: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(None)),
            media_id: RwLock::new(None),
            known_duration: Arc::new(RwLock::new(None)),
            volume: Mutex::new(1.0),
            playback_rate: Mutex::new(1.0),
        }
    }

    pub fn element(&self) -> Option<Arc<dyn MediaElement>> {
        self.element.read().clone()
    }

    pub fn require_element(&self) -> Result<Arc<dyn MediaElement>> {
        self.element().ok_or(PlaybackError::NoMediaLoaded)
    }

    pub fn error_context(&self, error: MediaPlayerError) -> MediaPlayerError {
        let error = error.with_context("handler", self.label);
        match self.media_id.read().as_deref() {
            Some(media_id) => error.with_context("mediaId", media_id),
            None => error,
        }
    }

    /// Report a failure through the error callback and hand it back for the
    /// caller to return.
    pub fn report(&self, error: MediaPlayerError) -> PlaybackError {
        let error = self.error_context(error);
        self.callbacks.emit_error(error.clone());
        PlaybackError::Media(error)
    }

    pub fn initialize(&self, container: Arc<dyn PresentationContainer>) -> Result<()> {
        self.release_element();

        for node in container.attached() {
            if node.kind == self.kind && container.detach(node.id) {
                debug!(handler = self.label, node = %node.id, "Purged stale element from container");
            }
        }

        let element = self.pool.acquire(self.kind)?;
        container.attach(AttachedNode::new(element.target_id(), self.kind))?;
        element.set_volume(*self.volume.lock());
        element.set_playback_rate(*self.playback_rate.lock());
        self.install_listeners(&element);

        *self.container.write() = Some(container);
        *self.element.write() = Some(element);
        debug!(handler = self.label, "Handler initialized");
        Ok(())
    }

    fn install_listeners(&self, element: &Arc<dyn MediaElement>) {
        let callbacks = Arc::clone(&self.callbacks);
        let weak = Arc::downgrade(element);
        let known = Arc::clone(&self.known_duration);
        self.listeners.add(
            element,
            DomEventKind::TimeUpdate,
            Arc::new(move |event: &DomEvent| {
                if let DomEvent::TimeUpdate { current_time } = event {
                    let reported = weak.upgrade().map_or(0.0, |element| element.duration());
                    callbacks.emit_time_update(TimeUpdate {
                        current_time: *current_time,
                        duration: resolve_duration(reported, *known.read()),
                    });
                }
                EventDisposition::Continue
            }),
        );

        let callbacks = Arc::clone(&self.callbacks);
        self.listeners.add(
            element,
            DomEventKind::Ended,
            Arc::new(move |_: &DomEvent| {
                callbacks.emit_ended();
                EventDisposition::Continue
            }),
        );

        // Errors while a load is pending belong to that load.
        let callbacks = Arc::clone(&self.callbacks);
        let loading = Arc::clone(&self.loading);
        let label = self.label;
        self.listeners.add(
            element,
            DomEventKind::Error,
            Arc::new(move |event: &DomEvent| {
                if loading.load(Ordering::Acquire) {
                    return EventDisposition::Continue;
                }
                if let DomEvent::Error { message } = event {
                    callbacks.emit_error(
                        MediaPlayerError::playback_failed(format!(
                            "{} playback error: {}",
                            label, message
                        ))
                        .with_context("handler", label),
                    );
                }
                EventDisposition::Continue
            }),
        );

        if self.kind == ElementKind::Video {
            for (kind, active) in [
                (DomEventKind::EnterPictureInPicture, true),
                (DomEventKind::LeavePictureInPicture, false),
            ] {
                let callbacks = Arc::clone(&self.callbacks);
                self.listeners.add(
                    element,
                    kind,
                    Arc::new(move |_: &DomEvent| {
                        callbacks.emit_picture_in_picture(active);
                        EventDisposition::Continue
                    }),
                );
            }
        }
    }

    pub async fn load(&self, item: &MediaItem) -> Result<()> {
        let element = match self.element() {
            Some(element) => element,
            None => {
                return Err(self.report(MediaPlayerError::load_failed(format!(
                    "{} handler is not initialized",
                    self.label
                ))))
            }
        };
        *self.media_id.write() = Some(item.id.clone());
        *self.known_duration.write() = item.duration.filter(|d| d.is_finite() && *d > 0.0);

        let (sender, receiver) = oneshot::channel();
        *self.pending.lock() = Some(sender);
        self.loading.store(true, Ordering::Release);

        let load_listeners = ListenerManager::new("element-load");
        let pending = Arc::clone(&self.pending);
        load_listeners.add(
            &element,
            DomEventKind::LoadedMetadata,
            Arc::new(move |event: &DomEvent| {
                if let DomEvent::LoadedMetadata { duration } = event {
                    signal(&pending, LoadSignal::Ready(*duration));
                }
                EventDisposition::Continue
            }),
        );
        let pending = Arc::clone(&self.pending);
        load_listeners.add(
            &element,
            DomEventKind::Error,
            Arc::new(move |event: &DomEvent| {
                let message = match event {
                    DomEvent::Error { message } => message.clone(),
                    _ => "unknown media error".to_string(),
                };
                signal(&pending, LoadSignal::Failed(message));
                EventDisposition::Continue
            }),
        );

        let outcome = match element.set_source(&item.source) {
            Ok(()) => wait_for_signal(receiver, self.load_timeout).await,
            Err(e) => LoadSignal::Failed(e.to_string()),
        };

        load_listeners.cleanup();
        self.pending.lock().take();
        self.loading.store(false, Ordering::Release);

        match outcome {
            LoadSignal::Ready(duration) => {
                debug!(
                    handler = self.label,
                    media_id = %item.id,
                    duration = resolve_duration(duration, *self.known_duration.read()),
                    "Media ready"
                );
                Ok(())
            }
            LoadSignal::Failed(reason) => {
                warn!(handler = self.label, media_id = %item.id, "Load failed: {}", reason);
                Err(self.report(MediaPlayerError::load_failed(format!(
                    "Failed to load {}: {}",
                    self.label, reason
                ))))
            }
            LoadSignal::Cancelled => {
                debug!(handler = self.label, media_id = %item.id, "Load cancelled");
                Err(PlaybackError::Superseded)
            }
        }
    }

    pub async fn play(&self) -> Result<()> {
        let element = self.require_element()?;
        if let Err(e) = element.play().await {
            return Err(self.report(MediaPlayerError::playback_failed(format!(
                "Failed to start {} playback: {}",
                self.label, e
            ))));
        }
        Ok(())
    }

    pub fn pause(&self) {
        if let Some(element) = self.element() {
            element.pause();
        }
    }

    pub fn stop(&self) {
        if let Some(element) = self.element() {
            element.pause();
            element.set_current_time(0.0);
        }
    }

    /// Clamp to `[0, duration]` when the duration is known, either from the
    /// platform or from the item.
    pub fn seek(&self, position: f64) {
        if position.is_nan() {
            return;
        }
        if let Some(element) = self.element() {
            let duration = resolve_duration(element.duration(), *self.known_duration.read());
            let target = if duration > 0.0 {
                position.clamp(0.0, duration)
            } else {
                position.max(0.0)
            };
            element.set_current_time(target);
        }
    }

    pub fn set_volume(&self, volume: f64) {
        let volume = clamp_volume(volume);
        *self.volume.lock() = volume;
        if let Some(element) = self.element() {
            element.set_volume(volume);
        }
    }

    pub fn set_playback_rate(&self, rate: f64) {
        let rate = clamp_playback_rate(rate);
        *self.playback_rate.lock() = rate;
        if let Some(element) = self.element() {
            element.set_playback_rate(rate);
        }
    }

    pub fn current_time(&self) -> f64 {
        self.element().map_or(0.0, |element| {
            let time = element.current_time();
            if time.is_finite() {
                time.max(0.0)
            } else {
                0.0
            }
        })
    }

    pub fn duration(&self) -> f64 {
        self.element().map_or(0.0, |element| {
            resolve_duration(element.duration(), *self.known_duration.read())
        })
    }

    pub fn volume(&self) -> f64 {
        *self.volume.lock()
    }

    pub fn playback_rate(&self) -> f64 {
        *self.playback_rate.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.element().map_or(false, |element| !element.is_paused())
    }

    fn release_element(&self) {
        let element = self.element.write().take();
        self.listeners.cleanup();

        if let Some(element) = element {
            if let Some(container) = self.container.read().as_ref() {
                container.detach(element.target_id());
            }
            self.pool.release(element);
        }
    }

    pub fn cleanup(&self) {
        signal(&self.pending, LoadSignal::Cancelled);
        self.release_element();
        self.callbacks.clear();
        self.container.write().take();
        self.media_id.write().take();
        self.known_duration.write().take();
    }
}

/// The platform's duration when usable, else the item's declared one.
fn resolve_duration(reported: f64, known: Option<f64>) -> f64 {
    match sanitize_duration(reported) {
        duration if duration > 0.0 => duration,
        _ => known.map_or(0.0, sanitize_duration),
    }
}

fn signal(pending: &PendingLoad, outcome: LoadSignal) {
    if let Some(sender) = pending.lock().take() {
        let _ = sender.send(outcome);
    }
}

/// Wait for the element's ready/error signal, bounded by `timeout` if set.
pub(crate) async fn wait_for_signal(
    receiver: oneshot::Receiver<LoadSignal>,
    timeout: Option<Duration>,
) -> LoadSignal {
    let received = match timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver).await {
            Ok(received) => received,
            Err(_) => {
                return LoadSignal::Failed(format!("timed out after {}ms", limit.as_millis()))
            }
        },
        None => receiver.await,
    };
    received.unwrap_or(LoadSignal::Cancelled)
}
