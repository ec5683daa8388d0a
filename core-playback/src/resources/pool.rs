//! Reuse of platform media elements across loads.

use super::manager::{ResourceKind, ResourceManager};
use crate::error::Result;
use bridge_traits::{ElementKind, MediaElement, MediaPlatform};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type IdleElements = Arc<Mutex<HashMap<ElementKind, Vec<Arc<dyn MediaElement>>>>>;

fn resource_name(element: &dyn MediaElement) -> String {
    format!("pooled-{}-{}", element.kind().as_str(), element.target_id().as_uuid())
}

/// Per-kind pool of idle media elements.
///
/// Released elements are paused and reset before going back to the pool,
/// so an acquired element never carries a previous source or position.
/// With a [`ResourceManager`] attached, every idle element is tracked there
/// and disposing its entry evicts it from the pool.
pub struct ElementPool {
    platform: Arc<dyn MediaPlatform>,
    max_per_kind: usize,
    idle: IdleElements,
    resources: Option<Arc<ResourceManager>>,
}

impl ElementPool {
    pub fn new(platform: Arc<dyn MediaPlatform>, max_per_kind: usize) -> Self {
        Self {
            platform,
            max_per_kind,
            idle: Arc::new(Mutex::new(HashMap::new())),
            resources: None,
        }
    }

    pub fn with_resources(mut self, resources: Arc<ResourceManager>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Take an idle element of `kind`, or create one.
    pub fn acquire(&self, kind: ElementKind) -> Result<Arc<dyn MediaElement>> {
        let pooled = self.idle.lock().get_mut(&kind).and_then(Vec::pop);
        if let Some(element) = pooled {
            trace!(kind = kind.as_str(), "Reusing pooled element");
            if let Some(resources) = &self.resources {
                resources.forget(&resource_name(element.as_ref()));
            }
            return Ok(element);
        }

        debug!(kind = kind.as_str(), "Creating media element");
        Ok(self.platform.create_media_element(kind)?)
    }

    /// Return an element. It is dropped instead when the pool for its kind
    /// is full.
    pub fn release(&self, element: Arc<dyn MediaElement>) {
        element.pause();
        element.reset();

        let kind = element.kind();
        {
            let mut idle = self.idle.lock();
            let slot = idle.entry(kind).or_default();
            if slot.len() >= self.max_per_kind {
                trace!(kind = kind.as_str(), "Pool full, dropping element");
                return;
            }
            slot.push(Arc::clone(&element));
        }

        if let Some(resources) = &self.resources {
            let idle = Arc::downgrade(&self.idle);
            let target = element.target_id();
            let name = resource_name(element.as_ref());
            resources.register(name, ResourceKind::MediaElement, move || {
                if let Some(idle) = idle.upgrade() {
                    if let Some(slot) = idle.lock().get_mut(&kind) {
                        slot.retain(|pooled| pooled.target_id() != target);
                    }
                }
                Ok(())
            });
        }
    }

    pub fn pooled(&self, kind: ElementKind) -> usize {
        self.idle.lock().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        let dropped: Vec<Arc<dyn MediaElement>> = self
            .idle
            .lock()
            .drain()
            .flat_map(|(_, elements)| elements)
            .collect();
        if dropped.is_empty() {
            return;
        }
        if let Some(resources) = &self.resources {
            for element in &dropped {
                resources.forget(&resource_name(element.as_ref()));
            }
        }
        debug!("Cleared {} pooled elements", dropped.len());
    }
}

impl std::fmt::Debug for ElementPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementPool")
            .field("max_per_kind", &self.max_per_kind)
            .field("audio", &self.pooled(ElementKind::Audio))
            .field("video", &self.pooled(ElementKind::Video))
            .finish()
    }
}
