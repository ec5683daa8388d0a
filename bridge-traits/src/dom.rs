//! DOM-like event targets.
//!
//! Media elements, document frames and the inner documents of same-origin
//! frames all expose the same subscription surface: listeners are added per
//! event kind, identified by a [`ListenerId`], and removed by that id. The
//! core never holds onto platform closures directly; it only keeps ids so a
//! subscription can be torn down exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier returned by [`EventTarget::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Stable identity of an event target (element, frame or inner document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(Uuid);

impl TargetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomEventKind {
    LoadedMetadata,
    TimeUpdate,
    Playing,
    Pause,
    Ended,
    Error,
    Load,
    ContextMenu,
    SelectStart,
    Copy,
    Cut,
    DragStart,
    BeforePrint,
    KeyDown,
    EnterPictureInPicture,
    LeavePictureInPicture,
}

/// Event payload delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    /// Media metadata is available; `duration` may be NaN or infinite for live sources.
    LoadedMetadata { duration: f64 },
    TimeUpdate { current_time: f64 },
    Playing,
    Pause,
    Ended,
    Error { message: String },
    /// Document frame finished loading.
    Load,
    ContextMenu,
    SelectStart,
    Copy,
    Cut,
    DragStart,
    BeforePrint,
    KeyDown { key: String, ctrl: bool, meta: bool },
    EnterPictureInPicture,
    LeavePictureInPicture,
}

impl DomEvent {
    pub fn kind(&self) -> DomEventKind {
        match self {
            DomEvent::LoadedMetadata { .. } => DomEventKind::LoadedMetadata,
            DomEvent::TimeUpdate { .. } => DomEventKind::TimeUpdate,
            DomEvent::Playing => DomEventKind::Playing,
            DomEvent::Pause => DomEventKind::Pause,
            DomEvent::Ended => DomEventKind::Ended,
            DomEvent::Error { .. } => DomEventKind::Error,
            DomEvent::Load => DomEventKind::Load,
            DomEvent::ContextMenu => DomEventKind::ContextMenu,
            DomEvent::SelectStart => DomEventKind::SelectStart,
            DomEvent::Copy => DomEventKind::Copy,
            DomEvent::Cut => DomEventKind::Cut,
            DomEvent::DragStart => DomEventKind::DragStart,
            DomEvent::BeforePrint => DomEventKind::BeforePrint,
            DomEvent::KeyDown { .. } => DomEventKind::KeyDown,
            DomEvent::EnterPictureInPicture => DomEventKind::EnterPictureInPicture,
            DomEvent::LeavePictureInPicture => DomEventKind::LeavePictureInPicture,
        }
    }
}

/// What a listener asks the target to do with the event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDisposition {
    #[default]
    Continue,
    PreventDefault,
}

/// Listener callback. Implementations must not hold internal locks while
/// invoking it: listeners are allowed to add or remove listeners.
pub type EventCallback = Arc<dyn Fn(&DomEvent) -> EventDisposition + Send + Sync>;

/// A target that accepts event subscriptions.
pub trait EventTarget: Send + Sync {
    fn target_id(&self) -> TargetId;

    fn add_event_listener(&self, kind: DomEventKind, callback: EventCallback) -> ListenerId;

    /// Returns `false` when the listener was already removed.
    fn remove_event_listener(&self, id: ListenerId) -> bool;
}
