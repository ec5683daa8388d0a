//! Paginated document handler.
//!
//! Documents have no native clock. Position is a page index exposed as the
//! ratio `current_page / total_pages` against a fixed duration of 1, so
//! generic progress code treats ebooks like any other media. "Playing"
//! means reading: a heartbeat re-emits the current position periodically.

use super::element::wait_for_signal;
use super::{
    EndedCallback, ErrorCallback, HandlerCallbacks, LoadSignal, MediaHandler, PageNavigator,
    TimeUpdateCallback,
};
use crate::error::{MediaPlayerError, PlaybackError, Result};
use crate::listeners::ListenerManager;
use crate::resources::ResourceManager;
use crate::types::{clamp_playback_rate, clamp_volume, MediaItem, MediaKind, PageInfo, TimeUpdate};
use async_trait::async_trait;
use bridge_traits::{
    AttachedNode, DocumentFrame, DomEvent, DomEventKind, ElementKind, EventCallback,
    EventDisposition, EventTarget, MediaPlatform, PresentationContainer, SandboxPolicy,
};
use core_runtime::PlayerSettings;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Normalized duration reported for every document.
pub const EBOOK_DURATION: f64 = 1.0;

/// Resource name of the reading heartbeat.
pub const HEARTBEAT_TIMER: &str = "ebook-heartbeat";

// floor(0.3 * 10) must land on page 3, not 2.
const PAGE_EPSILON: f64 = 1e-9;

const PROTECTED_EVENTS: [DomEventKind; 7] = [
    DomEventKind::ContextMenu,
    DomEventKind::SelectStart,
    DomEventKind::Copy,
    DomEventKind::Cut,
    DomEventKind::DragStart,
    DomEventKind::BeforePrint,
    DomEventKind::KeyDown,
];

#[derive(Debug, Default, Clone, Copy)]
struct Pages {
    current: u32,
    total: u32,
}

impl Pages {
    fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }

    fn update(&self) -> TimeUpdate {
        TimeUpdate {
            current_time: self.ratio(),
            duration: EBOOK_DURATION,
        }
    }
}

/// Renders documents in a restricted sandboxed frame.
pub struct EbookHandler {
    platform: Arc<dyn MediaPlatform>,
    load_timeout: Option<Duration>,
    heartbeat_interval: Duration,
    container: RwLock<Option<Arc<dyn PresentationContainer>>>,
    frame: RwLock<Option<Arc<dyn DocumentFrame>>>,
    listeners: ListenerManager,
    document_listeners: ListenerManager,
    callbacks: Arc<HandlerCallbacks>,
    pages: Arc<Mutex<Pages>>,
    pending: Arc<Mutex<Option<oneshot::Sender<LoadSignal>>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    resources: Option<Arc<ResourceManager>>,
    reading: AtomicBool,
    media_id: RwLock<Option<String>>,
    volume: Mutex<f64>,
    playback_rate: Mutex<f64>,
}

impl EbookHandler {
    pub fn new(platform: Arc<dyn MediaPlatform>, settings: &PlayerSettings) -> Self {
        Self {
            platform,
            load_timeout: settings.load_timeout(),
            heartbeat_interval: settings.ebook_heartbeat_interval(),
            container: RwLock::new(None),
            frame: RwLock::new(None),
            listeners: ListenerManager::new("ebook"),
            document_listeners: ListenerManager::new("ebook-document"),
            callbacks: Arc::new(HandlerCallbacks::default()),
            pages: Arc::new(Mutex::new(Pages::default())),
            pending: Arc::new(Mutex::new(None)),
            heartbeat: Mutex::new(None),
            resources: None,
            reading: AtomicBool::new(false),
            media_id: RwLock::new(None),
            volume: Mutex::new(1.0),
            playback_rate: Mutex::new(1.0),
        }
    }

    /// Track the heartbeat task in `resources`.
    pub fn with_resources(mut self, resources: Arc<ResourceManager>) -> Self {
        self.resources = Some(resources);
        self
    }

    fn frame(&self) -> Option<Arc<dyn DocumentFrame>> {
        self.frame.read().clone()
    }

    fn report(&self, error: MediaPlayerError) -> PlaybackError {
        let mut error = error.with_context("handler", "ebook");
        if let Some(media_id) = self.media_id.read().as_deref() {
            error = error.with_context("mediaId", media_id);
        }
        self.callbacks.emit_error(error.clone());
        PlaybackError::Media(error)
    }

    fn protect<T>(manager: &ListenerManager, target: &Arc<T>)
    where
        T: EventTarget + ?Sized + 'static,
    {
        let callback = protection_callback();
        for kind in PROTECTED_EVENTS {
            manager.add(target, kind, Arc::clone(&callback));
        }
    }

    fn start_heartbeat(&self) {
        let callbacks = Arc::clone(&self.callbacks);
        let pages = Arc::clone(&self.pages);
        let period = self.heartbeat_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let update = pages.lock().update();
                callbacks.emit_time_update(update);
            }
        });

        let abort = task.abort_handle();
        let previous = self.heartbeat.lock().replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        if let Some(resources) = &self.resources {
            resources.register_timer(HEARTBEAT_TIMER, abort);
        }
    }

    fn stop_heartbeat(&self) {
        let task = self.heartbeat.lock().take();
        if let Some(task) = task {
            task.abort();
            if let Some(resources) = &self.resources {
                resources.forget(HEARTBEAT_TIMER);
            }
        }
    }

    fn release_frame(&self) {
        self.stop_heartbeat();
        self.reading.store(false, Ordering::Release);
        self.document_listeners.cleanup();
        self.listeners.cleanup();

        if let Some(frame) = self.frame.write().take() {
            if let Some(container) = self.container.read().as_ref() {
                container.detach(frame.target_id());
            }
            frame.reset();
        }
        *self.pages.lock() = Pages::default();
    }
}

/// Suppress copy/print/save affordances. Only modified S, P and C key
/// presses are blocked; other keys pass through.
fn protection_callback() -> EventCallback {
    Arc::new(|event: &DomEvent| match event {
        DomEvent::KeyDown { key, ctrl, meta } => {
            let shortcut = matches!(key.to_ascii_lowercase().as_str(), "s" | "p" | "c");
            if (*ctrl || *meta) && shortcut {
                EventDisposition::PreventDefault
            } else {
                EventDisposition::Continue
            }
        }
        _ => EventDisposition::PreventDefault,
    })
}

#[async_trait]
impl MediaHandler for EbookHandler {
    fn name(&self) -> &'static str {
        "ebook"
    }

    fn can_handle(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Ebook
    }

    fn initialize(&self, container: Arc<dyn PresentationContainer>) -> Result<()> {
        self.release_frame();

        for node in container.attached() {
            if node.kind == ElementKind::DocumentFrame {
                container.detach(node.id);
            }
        }

        let frame = self
            .platform
            .create_document_frame(SandboxPolicy::restricted())?;
        container.attach(AttachedNode::new(frame.target_id(), ElementKind::DocumentFrame))?;
        Self::protect(&self.listeners, &frame);

        debug!(sandbox = %frame.sandbox().to_attribute(), "Ebook frame initialized");
        *self.container.write() = Some(container);
        *self.frame.write() = Some(frame);
        Ok(())
    }

    async fn load(&self, item: &MediaItem) -> Result<()> {
        let frame = match self.frame() {
            Some(frame) => frame,
            None => {
                return Err(self.report(MediaPlayerError::load_failed(
                    "ebook handler is not initialized",
                )))
            }
        };
        *self.media_id.write() = Some(item.id.clone());
        self.stop_heartbeat();
        self.document_listeners.cleanup();

        let (sender, receiver) = oneshot::channel();
        *self.pending.lock() = Some(sender);

        let load_listeners = ListenerManager::new("ebook-load");
        for kind in [DomEventKind::Load, DomEventKind::Error] {
            let pending = Arc::clone(&self.pending);
            load_listeners.add(
                &frame,
                kind,
                Arc::new(move |event: &DomEvent| {
                    let outcome = match event {
                        DomEvent::Error { message } => LoadSignal::Failed(message.clone()),
                        _ => LoadSignal::Ready(EBOOK_DURATION),
                    };
                    if let Some(sender) = pending.lock().take() {
                        let _ = sender.send(outcome);
                    }
                    EventDisposition::Continue
                }),
            );
        }

        let outcome = match frame.set_source(&item.source) {
            Ok(()) => wait_for_signal(receiver, self.load_timeout).await,
            Err(e) => LoadSignal::Failed(e.to_string()),
        };
        load_listeners.cleanup();
        self.pending.lock().take();

        match outcome {
            LoadSignal::Ready(_) => {}
            LoadSignal::Failed(reason) => {
                warn!(media_id = %item.id, "Ebook load failed: {}", reason);
                return Err(self.report(MediaPlayerError::load_failed(format!(
                    "Failed to load document: {}",
                    reason
                ))));
            }
            LoadSignal::Cancelled => return Err(PlaybackError::Superseded),
        }

        match frame.content_document() {
            Some(document) => Self::protect(&self.document_listeners, &document),
            None => debug!("Cross-origin document; protections stay on the frame"),
        }

        let total = frame.page_count().or(item.page_count).unwrap_or(0);
        let update = {
            let mut pages = self.pages.lock();
            *pages = Pages { current: 0, total };
            pages.update()
        };
        if total > 0 {
            frame.show_page(0);
        }
        debug!(media_id = %item.id, pages = total, "Ebook ready");
        self.callbacks.emit_time_update(update);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        if self.frame().is_none() {
            return Err(PlaybackError::NoMediaLoaded);
        }
        if !self.reading.swap(true, Ordering::AcqRel) {
            self.start_heartbeat();
        }
        Ok(())
    }

    fn pause(&self) {
        self.reading.store(false, Ordering::Release);
        self.stop_heartbeat();
    }

    fn stop(&self) {
        self.pause();
        let update = {
            let mut pages = self.pages.lock();
            pages.current = 0;
            pages.update()
        };
        if let Some(frame) = self.frame() {
            frame.show_page(0);
        }
        self.callbacks.emit_time_update(update);
    }

    /// Map a normalized position onto a page.
    fn seek(&self, position: f64) {
        if position.is_nan() {
            return;
        }
        let total = self.pages.lock().total;
        if total == 0 {
            return;
        }
        let position = position.clamp(0.0, 1.0);
        let page = ((position * total as f64) + PAGE_EPSILON).floor() as u32;
        self.go_to_page(page.min(total - 1));
    }

    fn set_volume(&self, volume: f64) {
        *self.volume.lock() = clamp_volume(volume);
    }

    fn set_playback_rate(&self, rate: f64) {
        *self.playback_rate.lock() = clamp_playback_rate(rate);
    }

    fn current_time(&self) -> f64 {
        self.pages.lock().ratio()
    }

    fn duration(&self) -> f64 {
        EBOOK_DURATION
    }

    fn volume(&self) -> f64 {
        *self.volume.lock()
    }

    fn playback_rate(&self) -> f64 {
        *self.playback_rate.lock()
    }

    fn is_playing(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    fn on_time_update(&self, callback: TimeUpdateCallback) {
        self.callbacks.set_time_update(callback)
    }

    fn on_ended(&self, callback: EndedCallback) {
        self.callbacks.set_ended(callback)
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.callbacks.set_error(callback)
    }

    fn cleanup(&self) {
        if let Some(sender) = self.pending.lock().take() {
            let _ = sender.send(LoadSignal::Cancelled);
        }
        self.release_frame();
        self.callbacks.clear();
        self.container.write().take();
        self.media_id.write().take();
    }

    fn as_paginated(&self) -> Option<&dyn PageNavigator> {
        Some(self)
    }
}

impl PageNavigator for EbookHandler {
    fn next_page(&self) -> bool {
        let current = self.pages.lock().current;
        self.go_to_page(current.saturating_add(1))
    }

    fn previous_page(&self) -> bool {
        let current = self.pages.lock().current;
        match current.checked_sub(1) {
            Some(page) => self.go_to_page(page),
            None => false,
        }
    }

    fn go_to_page(&self, page: u32) -> bool {
        let (update, last) = {
            let mut pages = self.pages.lock();
            if page >= pages.total {
                return false;
            }
            pages.current = page;
            (pages.update(), page + 1 == pages.total)
        };

        if let Some(frame) = self.frame() {
            frame.show_page(page);
        }
        self.callbacks.emit_time_update(update);
        if last {
            self.callbacks.emit_ended();
        }
        true
    }

    fn page_info(&self) -> PageInfo {
        let pages = self.pages.lock();
        PageInfo {
            current_page: pages.current,
            total_pages: pages.total,
        }
    }
}

impl Drop for EbookHandler {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform};
    use crate::error::MediaErrorCode;

    struct Fixture {
        platform: Arc<HeadlessMediaPlatform>,
        handler: EbookHandler,
    }

    async fn loaded(pages: u32) -> Fixture {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.set_page_count("book.html", pages);
        let handler = EbookHandler::new(platform.clone(), &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::ebook("e-1", "book.html"))
            .await
            .unwrap();
        Fixture { platform, handler }
    }

    #[tokio::test]
    async fn test_position_is_page_ratio() {
        let f = loaded(10).await;
        assert_eq!(f.handler.duration(), 1.0);
        assert_eq!(f.handler.current_time(), 0.0);

        assert!(f.handler.go_to_page(4));
        assert_eq!(f.handler.current_time(), 0.4);
        assert_eq!(f.platform.last_frame().unwrap().shown_page(), Some(4));
    }

    #[tokio::test]
    async fn test_seek_maps_to_floor_page() {
        let f = loaded(10).await;

        f.handler.seek(0.55);
        assert_eq!(f.handler.page_info().current_page, 5);

        f.handler.seek(0.3);
        assert_eq!(f.handler.page_info().current_page, 3);

        f.handler.seek(1.0);
        assert_eq!(f.handler.page_info().current_page, 9);

        f.handler.seek(-2.0);
        assert_eq!(f.handler.page_info().current_page, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_navigation_is_noop() {
        let f = loaded(3).await;

        assert!(!f.handler.previous_page());
        assert!(!f.handler.go_to_page(3));
        assert_eq!(f.handler.page_info().current_page, 0);

        assert!(f.handler.next_page());
        assert!(f.handler.next_page());
        assert!(!f.handler.next_page());
        assert_eq!(f.handler.page_info().current_page, 2);
    }

    #[tokio::test]
    async fn test_last_page_raises_ended_once() {
        let f = loaded(5).await;
        let ended = Arc::new(Mutex::new(0));
        let counter = ended.clone();
        f.handler.on_ended(Arc::new(move || *counter.lock() += 1));

        assert!(!f.handler.go_to_page(5));
        assert_eq!(*ended.lock(), 0);

        assert!(f.handler.go_to_page(4));
        assert_eq!(*ended.lock(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_reports_zero() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        let handler = EbookHandler::new(platform, &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::ebook("e-2", "empty.html"))
            .await
            .unwrap();

        assert_eq!(handler.current_time(), 0.0);
        assert_eq!(handler.duration(), 1.0);
        handler.seek(0.5);
        assert_eq!(handler.page_info().total_pages, 0);
    }

    #[tokio::test]
    async fn test_item_page_count_is_fallback() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        let handler = EbookHandler::new(platform, &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::ebook("e-3", "scan.html").with_page_count(8))
            .await
            .unwrap();

        assert_eq!(handler.page_info().total_pages, 8);
    }

    #[tokio::test]
    async fn test_protections_on_frame_and_document() {
        let f = loaded(2).await;
        let frame = f.platform.last_frame().unwrap();
        let document = frame.document().unwrap();

        for target_emit in [
            frame.emit(DomEvent::ContextMenu),
            document.emit(DomEvent::Copy),
            document.emit(DomEvent::BeforePrint),
            document.emit(DomEvent::KeyDown {
                key: "P".into(),
                ctrl: true,
                meta: false,
            }),
            frame.emit(DomEvent::KeyDown {
                key: "s".into(),
                ctrl: false,
                meta: true,
            }),
        ] {
            assert_eq!(target_emit, EventDisposition::PreventDefault);
        }

        let plain = document.emit(DomEvent::KeyDown {
            key: "ArrowRight".into(),
            ctrl: false,
            meta: false,
        });
        assert_eq!(plain, EventDisposition::Continue);

        let unmodified = document.emit(DomEvent::KeyDown {
            key: "c".into(),
            ctrl: false,
            meta: false,
        });
        assert_eq!(unmodified, EventDisposition::Continue);
    }

    #[tokio::test]
    async fn test_failed_document_reports_load_failed() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.fail_source("broken.html");
        let handler = EbookHandler::new(platform, &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();

        let err = handler
            .load(&MediaItem::ebook("e-4", "broken.html"))
            .await
            .unwrap_err();
        assert_eq!(err.to_media_error().code, MediaErrorCode::LoadFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_runs_while_reading() {
        let f = loaded(4).await;
        let ticks = Arc::new(Mutex::new(0));
        let counter = ticks.clone();
        f.handler
            .on_time_update(Arc::new(move |_: TimeUpdate| *counter.lock() += 1));

        f.handler.play().await.unwrap();
        assert!(f.handler.is_playing());
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(*ticks.lock(), 3);

        f.handler.pause();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*ticks.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_is_tracked_while_reading() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.set_page_count("book.html", 3);
        let resources = Arc::new(ResourceManager::new());
        let handler = EbookHandler::new(platform, &PlayerSettings::default())
            .with_resources(Arc::clone(&resources));
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::ebook("e-5", "book.html"))
            .await
            .unwrap();

        handler.play().await.unwrap();
        assert!(resources.contains(HEARTBEAT_TIMER));
        assert_eq!(resources.stats().timers, 1);

        handler.pause();
        assert!(resources.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_detaches_all_listeners() {
        let f = loaded(2).await;
        let frame = f.platform.last_frame().unwrap();
        let document = frame.document().unwrap();

        f.handler.cleanup();
        f.handler.cleanup();

        assert_eq!(frame.listener_count(), 0);
        assert_eq!(document.listener_count(), 0);
    }
}
