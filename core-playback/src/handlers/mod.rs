//! # Media Handlers
//!
//! One capability contract, [`MediaHandler`], with three implementations:
//!
//! - [`AudioHandler`] and [`VideoHandler`] drive a platform media element
//!   through a shared element core.
//! - [`EbookHandler`] renders a document in a sandboxed frame and models
//!   position as a page ratio.
//!
//! Each handler owns at most one platform primitive at a time. Primitive
//! events are translated into the three generic callbacks (time update,
//! ended, error); optional capabilities are exposed through
//! [`MediaHandler::as_picture_in_picture`] and [`MediaHandler::as_paginated`].

mod audio;
mod ebook;
mod element;
mod video;

pub use audio::AudioHandler;
pub use ebook::{EbookHandler, HEARTBEAT_TIMER};
pub use video::VideoHandler;

use crate::error::{MediaPlayerError, Result};
use crate::types::{MediaItem, MediaKind, PageInfo, TimeUpdate};
use async_trait::async_trait;
use bridge_traits::PresentationContainer;
use parking_lot::RwLock;
use std::sync::Arc;

pub type TimeUpdateCallback = Arc<dyn Fn(TimeUpdate) + Send + Sync>;
pub type EndedCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(MediaPlayerError) + Send + Sync>;
pub type PictureInPictureCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Generic control surface over one kind of media.
///
/// Handlers are reusable: `cleanup` releases the primitive and clears the
/// callbacks, and a later `initialize` starts over.
#[async_trait]
pub trait MediaHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, kind: MediaKind) -> bool;

    /// Create the platform primitive and attach it to `container`, purging
    /// any primitive of the same kind left there before.
    fn initialize(&self, container: Arc<dyn PresentationContainer>) -> Result<()>;

    /// Assign the source and wait until it is ready.
    ///
    /// A failure is reported to the error callback and returned.
    async fn load(&self, item: &MediaItem) -> Result<()>;

    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn stop(&self);

    fn seek(&self, position: f64);

    fn set_volume(&self, volume: f64);

    fn set_playback_rate(&self, rate: f64);

    fn current_time(&self) -> f64;

    /// Always finite and non-negative.
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;

    fn playback_rate(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn on_time_update(&self, callback: TimeUpdateCallback);

    fn on_ended(&self, callback: EndedCallback);

    fn on_error(&self, callback: ErrorCallback);

    /// Release the primitive, detach every listener and drop the callbacks.
    fn cleanup(&self);

    fn as_picture_in_picture(&self) -> Option<&dyn PictureInPicture> {
        None
    }

    fn as_paginated(&self) -> Option<&dyn PageNavigator> {
        None
    }
}

/// Picture-in-picture control, offered by video.
#[async_trait]
pub trait PictureInPicture: Send + Sync {
    fn is_picture_in_picture(&self) -> bool;

    async fn enable_picture_in_picture(&self) -> Result<()>;

    async fn disable_picture_in_picture(&self) -> Result<()>;

    /// Notified whenever the platform enters or leaves picture-in-picture,
    /// including when the user closes the floating window.
    fn on_picture_in_picture_change(&self, callback: PictureInPictureCallback);
}

/// Page navigation, offered by ebooks. Out-of-range requests are no-ops
/// returning `false`.
pub trait PageNavigator: Send + Sync {
    fn next_page(&self) -> bool;

    fn previous_page(&self) -> bool;

    fn go_to_page(&self, page: u32) -> bool;

    fn page_info(&self) -> PageInfo;
}

/// Callback slots shared between a handler and its listener closures.
///
/// Callbacks are cloned out of their slot before running, so a callback may
/// replace or clear the slots it was invoked from.
#[derive(Default)]
pub(crate) struct HandlerCallbacks {
    time_update: RwLock<Option<TimeUpdateCallback>>,
    ended: RwLock<Option<EndedCallback>>,
    error: RwLock<Option<ErrorCallback>>,
    picture_in_picture: RwLock<Option<PictureInPictureCallback>>,
}

impl HandlerCallbacks {
    pub fn set_time_update(&self, callback: TimeUpdateCallback) {
        *self.time_update.write() = Some(callback);
    }

    pub fn set_ended(&self, callback: EndedCallback) {
        *self.ended.write() = Some(callback);
    }

    pub fn set_error(&self, callback: ErrorCallback) {
        *self.error.write() = Some(callback);
    }

    pub fn set_picture_in_picture(&self, callback: PictureInPictureCallback) {
        *self.picture_in_picture.write() = Some(callback);
    }

    pub fn emit_time_update(&self, update: TimeUpdate) {
        let callback = self.time_update.read().clone();
        if let Some(callback) = callback {
            callback(update);
        }
    }

    pub fn emit_ended(&self) {
        let callback = self.ended.read().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn emit_error(&self, error: MediaPlayerError) {
        let callback = self.error.read().clone();
        match callback {
            Some(callback) => callback(error),
            None => tracing::debug!(code = %error.code, "No error callback registered: {}", error.message),
        }
    }

    pub fn emit_picture_in_picture(&self, active: bool) {
        let callback = self.picture_in_picture.read().clone();
        if let Some(callback) = callback {
            callback(active);
        }
    }

    pub fn clear(&self) {
        *self.time_update.write() = None;
        *self.ended.write() = None;
        *self.error.write() = None;
        *self.picture_in_picture.write() = None;
    }
}

/// How a pending load ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LoadSignal {
    /// Ready, with the reported duration.
    Ready(f64),
    Failed(String),
    /// The handler was cleaned up while the load was pending.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callbacks_can_clear_themselves() {
        let callbacks = Arc::new(HandlerCallbacks::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&callbacks);
        let counter = calls.clone();
        callbacks.set_ended(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(callbacks) = weak.upgrade() {
                callbacks.clear();
            }
        }));

        callbacks.emit_ended();
        callbacks.emit_ended();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_without_callbacks_is_noop() {
        let callbacks = HandlerCallbacks::default();
        callbacks.emit_time_update(TimeUpdate {
            current_time: 1.0,
            duration: 2.0,
        });
        callbacks.emit_error(MediaPlayerError::unknown("nobody listens"));
    }
}
