use super::behavior::Behavior;
use super::listeners::ListenerRegistry;
use bridge_traits::{
    dom::{DomEvent, DomEventKind, EventCallback, EventDisposition, EventTarget, ListenerId, TargetId},
    error::Result,
    media::{DocumentFrame, SandboxPolicy},
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// The document rendered inside a [`HeadlessDocumentFrame`].
#[derive(Debug, Default)]
pub struct HeadlessDocument {
    id: TargetId,
    listeners: ListenerRegistry,
}

impl HeadlessDocument {
    /// Simulate a user gesture inside the document. Returns whether any
    /// listener prevented the default action.
    pub fn emit(&self, event: DomEvent) -> EventDisposition {
        self.listeners.dispatch(&event)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventTarget for HeadlessDocument {
    fn target_id(&self) -> TargetId {
        self.id
    }

    fn add_event_listener(&self, kind: DomEventKind, callback: EventCallback) -> ListenerId {
        self.listeners.add(kind, callback)
    }

    fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[derive(Debug, Default)]
struct FrameState {
    source: Option<String>,
    document: Option<Arc<HeadlessDocument>>,
    page_count: Option<u32>,
    shown_page: Option<u32>,
}

/// Sandboxed frame that "renders" a fresh [`HeadlessDocument`] per load.
#[derive(Debug)]
pub struct HeadlessDocumentFrame {
    id: TargetId,
    policy: SandboxPolicy,
    listeners: ListenerRegistry,
    state: Mutex<FrameState>,
    behavior: Arc<RwLock<Behavior>>,
}

impl HeadlessDocumentFrame {
    pub(crate) fn new(policy: SandboxPolicy, behavior: Arc<RwLock<Behavior>>) -> Self {
        Self {
            id: TargetId::new(),
            policy,
            listeners: ListenerRegistry::default(),
            state: Mutex::new(FrameState::default()),
            behavior,
        }
    }

    pub fn emit(&self, event: DomEvent) -> EventDisposition {
        self.listeners.dispatch(&event)
    }

    /// Currently loaded document, regardless of origin policy.
    pub fn document(&self) -> Option<Arc<HeadlessDocument>> {
        self.state.lock().document.clone()
    }

    pub fn shown_page(&self) -> Option<u32> {
        self.state.lock().shown_page
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl EventTarget for HeadlessDocumentFrame {
    fn target_id(&self) -> TargetId {
        self.id
    }

    fn add_event_listener(&self, kind: DomEventKind, callback: EventCallback) -> ListenerId {
        self.listeners.add(kind, callback)
    }

    fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl DocumentFrame for HeadlessDocumentFrame {
    fn set_source(&self, source: &str) -> Result<()> {
        let (failed, stalled, pages) = {
            let behavior = self.behavior.read();
            (
                behavior.failing.contains(source),
                behavior.stalled.contains(source),
                behavior.page_counts.get(source).copied(),
            )
        };

        {
            let mut state = self.state.lock();
            state.source = Some(source.to_string());
            state.shown_page = None;
            state.page_count = None;
            state.document = None;
            if !failed && !stalled {
                state.page_count = pages;
                state.document = Some(Arc::new(HeadlessDocument::default()));
            }
        }

        if failed {
            self.emit(DomEvent::Error {
                message: format!("failed to load document {}", source),
            });
        } else if !stalled {
            self.emit(DomEvent::Load);
        }
        Ok(())
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn sandbox(&self) -> SandboxPolicy {
        self.policy
    }

    fn content_document(&self) -> Option<Arc<dyn EventTarget>> {
        if !self.policy.allow_same_origin {
            return None;
        }
        self.state
            .lock()
            .document
            .clone()
            .map(|doc| doc as Arc<dyn EventTarget>)
    }

    fn page_count(&self) -> Option<u32> {
        self.state.lock().page_count
    }

    fn show_page(&self, page: u32) {
        self.state.lock().shown_page = Some(page);
    }

    fn reset(&self) {
        *self.state.lock() = FrameState::default();
    }
}
