//! Presentation container contract.
//!
//! The host supplies one container per player. The active handler attaches
//! its rendering node into it, and the UI controller looks up optional marker
//! slots inside it to reflect progress, loading and error state.

use crate::dom::TargetId;
use crate::error::Result;
use crate::media::ElementKind;
use std::sync::Arc;

/// A node currently attached to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedNode {
    pub id: TargetId,
    pub kind: ElementKind,
}

impl AttachedNode {
    pub fn new(id: TargetId, kind: ElementKind) -> Self {
        Self { id, kind }
    }
}

/// Optional attachment points inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Progress,
    CurrentTime,
    Duration,
    LoadingOverlay,
    ErrorOverlay,
}

impl Marker {
    /// Attribute selector a DOM host would use to find the slot.
    pub fn selector(&self) -> &'static str {
        match self {
            Marker::Progress => "[data-media-progress]",
            Marker::CurrentTime => "[data-media-current-time]",
            Marker::Duration => "[data-media-duration]",
            Marker::LoadingOverlay => "[data-media-loading]",
            Marker::ErrorOverlay => "[data-media-error]",
        }
    }
}

/// A marker slot located inside the container.
pub trait MarkerSlot: Send + Sync {
    fn set_text(&self, text: &str);

    /// Progress as a percentage in `0.0..=100.0`.
    fn set_progress(&self, percent: f64);

    fn set_visible(&self, visible: bool);
}

pub trait PresentationContainer: Send + Sync {
    fn attach(&self, node: AttachedNode) -> Result<()>;

    /// Returns `false` if the node was not attached.
    fn detach(&self, id: TargetId) -> bool;

    fn attached(&self) -> Vec<AttachedNode>;

    fn set_attribute(&self, name: &str, value: &str);

    /// Absent markers are tolerated by callers.
    fn marker(&self, marker: Marker) -> Option<Arc<dyn MarkerSlot>>;
}
