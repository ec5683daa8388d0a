//! Media playback primitives supplied by the host.
//!
//! The core never decodes audio or video itself. A host hands it a
//! [`MediaPlatform`] that can create playback elements (the platform's
//! `<audio>`/`<video>` equivalents) and sandboxed document frames for
//! paginated content. Everything here is synchronous except the two
//! operations that genuinely wait on the platform: starting playback and
//! toggling picture-in-picture.

use crate::dom::EventTarget;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of node a handler attaches to the presentation container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Audio,
    Video,
    DocumentFrame,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Audio => "audio",
            ElementKind::Video => "video",
            ElementKind::DocumentFrame => "document-frame",
        }
    }
}

/// A platform playback primitive (audio or video element).
///
/// Implementations dispatch [`DomEvent`](crate::dom::DomEvent)s through the
/// [`EventTarget`] surface: `LoadedMetadata` or `Error` after
/// [`set_source`](MediaElement::set_source), `TimeUpdate` while playing and
/// `Ended` at the end of the stream.
#[async_trait]
pub trait MediaElement: EventTarget {
    fn kind(&self) -> ElementKind;

    /// Assign a new source and begin loading it.
    fn set_source(&self, source: &str) -> Result<()>;

    fn source(&self) -> Option<String>;

    /// Start or resume playback. Resolves once the platform acknowledged the start.
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    /// Duration in seconds as reported by the platform. May be NaN or infinite.
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);

    /// Drop the current source and release decoder resources.
    fn reset(&self);

    fn supports_picture_in_picture(&self) -> bool {
        false
    }

    fn is_picture_in_picture(&self) -> bool {
        false
    }

    async fn request_picture_in_picture(&self) -> Result<()> {
        Err(BridgeError::NotAvailable(
            "picture-in-picture is not supported by this element".to_string(),
        ))
    }

    async fn exit_picture_in_picture(&self) -> Result<()> {
        Ok(())
    }
}

/// Sandbox flags for a document frame.
///
/// Anything not explicitly allowed is denied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub allow_scripts: bool,
    pub allow_same_origin: bool,
    pub allow_downloads: bool,
    pub allow_popups: bool,
    pub allow_forms: bool,
    pub allow_modals: bool,
    pub allow_top_navigation: bool,
}

impl SandboxPolicy {
    /// Minimal permissions for rendering documents: the viewer may run its
    /// own scripts against its own origin and nothing else.
    pub fn restricted() -> Self {
        Self {
            allow_scripts: true,
            allow_same_origin: true,
            allow_downloads: false,
            allow_popups: false,
            allow_forms: false,
            allow_modals: false,
            allow_top_navigation: false,
        }
    }

    /// Render the policy as a space separated `sandbox` attribute value.
    pub fn to_attribute(&self) -> String {
        let flags = [
            (self.allow_scripts, "allow-scripts"),
            (self.allow_same_origin, "allow-same-origin"),
            (self.allow_downloads, "allow-downloads"),
            (self.allow_popups, "allow-popups"),
            (self.allow_forms, "allow-forms"),
            (self.allow_modals, "allow-modals"),
            (self.allow_top_navigation, "allow-top-navigation"),
        ];

        flags
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::restricted()
    }
}

/// An isolated presentation surface for paginated documents.
///
/// The frame fires `Load` or `Error` after [`set_source`](DocumentFrame::set_source).
pub trait DocumentFrame: EventTarget {
    fn set_source(&self, source: &str) -> Result<()>;

    fn source(&self) -> Option<String>;

    fn sandbox(&self) -> SandboxPolicy;

    /// Inner document of the frame, only reachable when same-origin.
    fn content_document(&self) -> Option<Arc<dyn EventTarget>>;

    /// Page count reported by the rendered document, if it exposes one.
    fn page_count(&self) -> Option<u32>;

    /// Scroll/navigate the rendered document to a zero-based page.
    fn show_page(&self, page: u32);

    fn reset(&self);
}

/// Factory for platform playback primitives.
pub trait MediaPlatform: Send + Sync {
    fn create_media_element(&self, kind: ElementKind) -> Result<Arc<dyn MediaElement>>;

    fn create_document_frame(&self, policy: SandboxPolicy) -> Result<Arc<dyn DocumentFrame>>;

    /// Whether the host environment offers picture-in-picture at all.
    fn supports_picture_in_picture(&self) -> bool;
}
