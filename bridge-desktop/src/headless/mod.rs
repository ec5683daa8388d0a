//! Headless media platform.
//!
//! Elements and frames that never touch a decoder or a window. Loading is
//! scripted per source URL and every event is dispatched synchronously on
//! the calling thread, which makes the engine fully drivable from tests and
//! from CLI hosts without a renderer.

mod behavior;
mod container;
mod element;
mod frame;
mod listeners;

pub use container::{HeadlessContainer, HeadlessMarker};
pub use element::HeadlessMediaElement;
pub use frame::{HeadlessDocument, HeadlessDocumentFrame};

use behavior::Behavior;
use bridge_traits::{
    error::Result,
    media::{DocumentFrame, ElementKind, MediaElement, MediaPlatform, SandboxPolicy},
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// [`MediaPlatform`] producing headless elements and frames.
#[derive(Debug, Default)]
pub struct HeadlessMediaPlatform {
    behavior: Arc<RwLock<Behavior>>,
    elements: Mutex<Vec<Arc<HeadlessMediaElement>>>,
    frames: Mutex<Vec<Arc<HeadlessDocumentFrame>>>,
}

impl HeadlessMediaPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration reported for `source` once loaded. Unknown sources report
    /// the default duration.
    pub fn set_duration(&self, source: impl Into<String>, seconds: f64) {
        self.behavior.write().durations.insert(source.into(), seconds);
    }

    pub fn set_default_duration(&self, seconds: f64) {
        self.behavior.write().default_duration = seconds;
    }

    /// Loading `source` fires `Error` instead of metadata.
    pub fn fail_source(&self, source: impl Into<String>) {
        self.behavior.write().failing.insert(source.into());
    }

    /// Loading `source` never completes.
    pub fn stall_source(&self, source: impl Into<String>) {
        self.behavior.write().stalled.insert(source.into());
    }

    /// Page count a document frame reports for `source`.
    pub fn set_page_count(&self, source: impl Into<String>, pages: u32) {
        self.behavior.write().page_counts.insert(source.into(), pages);
    }

    /// Make every `play()` call fail, as an autoplay policy would.
    pub fn reject_play(&self, reject: bool) {
        self.behavior.write().reject_play = reject;
    }

    pub fn set_picture_in_picture(&self, supported: bool) {
        self.behavior.write().picture_in_picture = supported;
    }

    /// Every element created so far, oldest first.
    pub fn elements(&self) -> Vec<Arc<HeadlessMediaElement>> {
        self.elements.lock().clone()
    }

    pub fn last_element(&self, kind: ElementKind) -> Option<Arc<HeadlessMediaElement>> {
        self.elements
            .lock()
            .iter()
            .rev()
            .find(|element| element.kind() == kind)
            .cloned()
    }

    pub fn frames(&self) -> Vec<Arc<HeadlessDocumentFrame>> {
        self.frames.lock().clone()
    }

    pub fn last_frame(&self) -> Option<Arc<HeadlessDocumentFrame>> {
        self.frames.lock().last().cloned()
    }
}

impl MediaPlatform for HeadlessMediaPlatform {
    fn create_media_element(&self, kind: ElementKind) -> Result<Arc<dyn MediaElement>> {
        let element = Arc::new(HeadlessMediaElement::new(kind, self.behavior.clone()));
        debug!(kind = kind.as_str(), "Created headless media element");
        self.elements.lock().push(element.clone());
        Ok(element)
    }

    fn create_document_frame(&self, policy: SandboxPolicy) -> Result<Arc<dyn DocumentFrame>> {
        let frame = Arc::new(HeadlessDocumentFrame::new(policy, self.behavior.clone()));
        debug!(sandbox = %policy.to_attribute(), "Created headless document frame");
        self.frames.lock().push(frame.clone());
        Ok(frame)
    }

    fn supports_picture_in_picture(&self) -> bool {
        self.behavior.read().picture_in_picture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::container::{AttachedNode, Marker, MarkerSlot, PresentationContainer};
    use bridge_traits::dom::{DomEvent, DomEventKind, EventDisposition, EventTarget};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting<T: EventTarget + ?Sized>(kind: DomEventKind, target: &T) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        target.add_event_listener(
            kind,
            Arc::new(move |_: &DomEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                EventDisposition::Continue
            }),
        );
        hits
    }

    #[test]
    fn test_set_source_reports_scripted_duration() {
        let platform = HeadlessMediaPlatform::new();
        platform.set_duration("a.mp3", 42.0);

        let element = platform.create_media_element(ElementKind::Audio).unwrap();
        let loaded = counting(DomEventKind::LoadedMetadata, element.as_ref());
        element.set_source("a.mp3").unwrap();

        assert_eq!(loaded.load(Ordering::SeqCst), 1);
        assert_eq!(element.duration(), 42.0);
    }

    #[test]
    fn test_failing_source_fires_error() {
        let platform = HeadlessMediaPlatform::new();
        platform.fail_source("bad.mp3");

        let element = platform.create_media_element(ElementKind::Audio).unwrap();
        let errors = counting(DomEventKind::Error, element.as_ref());
        element.set_source("bad.mp3").unwrap();

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(element.duration().is_nan());
    }

    #[tokio::test]
    async fn test_advance_reaches_end() {
        let platform = HeadlessMediaPlatform::new();
        platform.set_duration("a.mp3", 10.0);

        let element = platform.create_media_element(ElementKind::Audio).unwrap();
        element.set_source("a.mp3").unwrap();
        element.play().await.unwrap();

        let headless = platform.last_element(ElementKind::Audio).unwrap();
        let ended = counting(DomEventKind::Ended, element.as_ref());
        headless.advance(4.0);
        assert_eq!(element.current_time(), 4.0);
        headless.advance(100.0);

        assert_eq!(element.current_time(), 10.0);
        assert!(element.is_paused());
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_play() {
        let platform = HeadlessMediaPlatform::new();
        platform.reject_play(true);

        let element = platform.create_media_element(ElementKind::Video).unwrap();
        element.set_source("v.mp4").unwrap();
        assert!(element.play().await.is_err());
        assert!(element.is_paused());
    }

    #[tokio::test]
    async fn test_picture_in_picture_only_for_video() {
        let platform = HeadlessMediaPlatform::new();
        let audio = platform.create_media_element(ElementKind::Audio).unwrap();
        let video = platform.create_media_element(ElementKind::Video).unwrap();

        assert!(!audio.supports_picture_in_picture());
        assert!(video.supports_picture_in_picture());

        video.request_picture_in_picture().await.unwrap();
        assert!(video.is_picture_in_picture());
        video.exit_picture_in_picture().await.unwrap();
        assert!(!video.is_picture_in_picture());
    }

    #[test]
    fn test_frame_exposes_same_origin_document() {
        let platform = HeadlessMediaPlatform::new();
        platform.set_page_count("book.html", 12);

        let frame = platform
            .create_document_frame(SandboxPolicy::restricted())
            .unwrap();
        let loads = counting(DomEventKind::Load, frame.as_ref());
        frame.set_source("book.html").unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(frame.page_count(), Some(12));
        assert!(frame.content_document().is_some());

        let cross_origin = platform
            .create_document_frame(SandboxPolicy {
                allow_same_origin: false,
                ..SandboxPolicy::restricted()
            })
            .unwrap();
        cross_origin.set_source("book.html").unwrap();
        assert!(cross_origin.content_document().is_none());
    }

    #[test]
    fn test_document_reports_prevented_default() {
        let platform = HeadlessMediaPlatform::new();
        let frame = platform
            .create_document_frame(SandboxPolicy::restricted())
            .unwrap();
        frame.set_source("book.html").unwrap();

        let document = frame.content_document().unwrap();
        document.add_event_listener(
            DomEventKind::ContextMenu,
            Arc::new(|_: &DomEvent| EventDisposition::PreventDefault),
        );

        let headless = platform.last_frame().unwrap().document().unwrap();
        assert_eq!(
            headless.emit(DomEvent::ContextMenu),
            EventDisposition::PreventDefault
        );
        assert_eq!(headless.emit(DomEvent::Copy), EventDisposition::Continue);
    }

    #[test]
    fn test_container_tracks_nodes_and_markers() {
        let container = HeadlessContainer::with_markers();
        let node = AttachedNode::new(Default::default(), ElementKind::Audio);

        container.attach(node).unwrap();
        assert!(container.attach(node).is_err());
        assert_eq!(container.attached().len(), 1);
        assert!(container.detach(node.id));
        assert!(!container.detach(node.id));

        container.marker(Marker::Progress).unwrap().set_progress(50.0);
        assert_eq!(
            container.headless_marker(Marker::Progress).unwrap().progress(),
            50.0
        );
        assert!(HeadlessContainer::new().marker(Marker::Progress).is_none());
    }
}
