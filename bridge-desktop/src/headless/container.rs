use bridge_traits::{
    container::{AttachedNode, Marker, MarkerSlot, PresentationContainer},
    dom::TargetId,
    error::{BridgeError, Result},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A marker slot that records what was written to it.
#[derive(Debug)]
pub struct HeadlessMarker {
    text: Mutex<String>,
    progress: Mutex<f64>,
    visible: Mutex<bool>,
}

impl Default for HeadlessMarker {
    fn default() -> Self {
        Self {
            text: Mutex::new(String::new()),
            progress: Mutex::new(0.0),
            visible: Mutex::new(false),
        }
    }
}

impl HeadlessMarker {
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    pub fn progress(&self) -> f64 {
        *self.progress.lock()
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.lock()
    }
}

impl MarkerSlot for HeadlessMarker {
    fn set_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }

    fn set_progress(&self, percent: f64) {
        *self.progress.lock() = percent;
    }

    fn set_visible(&self, visible: bool) {
        *self.visible.lock() = visible;
    }
}

/// In-memory presentation container.
#[derive(Debug, Default)]
pub struct HeadlessContainer {
    nodes: Mutex<Vec<AttachedNode>>,
    attributes: Mutex<HashMap<String, String>>,
    markers: HashMap<Marker, Arc<HeadlessMarker>>,
}

impl HeadlessContainer {
    /// Container without any marker slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container exposing every marker slot.
    pub fn with_markers() -> Self {
        let markers = [
            Marker::Progress,
            Marker::CurrentTime,
            Marker::Duration,
            Marker::LoadingOverlay,
            Marker::ErrorOverlay,
        ]
        .into_iter()
        .map(|marker| (marker, Arc::new(HeadlessMarker::default())))
        .collect();

        Self {
            markers,
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn headless_marker(&self, marker: Marker) -> Option<Arc<HeadlessMarker>> {
        self.markers.get(&marker).cloned()
    }
}

impl PresentationContainer for HeadlessContainer {
    fn attach(&self, node: AttachedNode) -> Result<()> {
        let mut nodes = self.nodes.lock();
        if nodes.iter().any(|existing| existing.id == node.id) {
            return Err(BridgeError::OperationFailed(format!(
                "node {} is already attached",
                node.id
            )));
        }
        nodes.push(node);
        Ok(())
    }

    fn detach(&self, id: TargetId) -> bool {
        let mut nodes = self.nodes.lock();
        let before = nodes.len();
        nodes.retain(|node| node.id != id);
        nodes.len() != before
    }

    fn attached(&self) -> Vec<AttachedNode> {
        self.nodes.lock().clone()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    fn marker(&self, marker: Marker) -> Option<Arc<dyn MarkerSlot>> {
        self.markers
            .get(&marker)
            .map(|slot| slot.clone() as Arc<dyn MarkerSlot>)
    }
}
