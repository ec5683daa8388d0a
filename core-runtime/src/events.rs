//! # Event Bus System
//!
//! Typed engine events broadcast over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The player core publishes what happened (media loaded, playback paused, a
//! view-mode transition, a state received from another instance) without
//! knowing who listens. Hosts subscribe to drive analytics, chrome or tests.
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │ MediaPlayer ├──────────────>│           │     subscribe    ┌────────────┐
//! └─────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//! ┌─────────────┐     emit      │           │                  └────────────┘
//! │ StateManager├──────────────>│           │
//! └─────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! let bus = EventBus::new(32);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Paused {
//!     media_id: "lesson-1".to_string(),
//!     position: 12.5,
//! }))
//! .ok();
//!
//! assert!(matches!(receiver.try_recv(), Ok(CoreEvent::Playback(_))));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    View(ViewEvent),
    Sync(SyncEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::View(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Unavailable { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Loaded { .. })
            | CoreEvent::Playback(PlaybackEvent::Completed { .. })
            | CoreEvent::Playback(PlaybackEvent::Closed { .. }) => EventSeverity::Info,
            CoreEvent::View(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Media id the event refers to, when it refers to one.
    pub fn media_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Playback(e) => e.media_id(),
            CoreEvent::View(_) => None,
            CoreEvent::Sync(SyncEvent::RemoteStateApplied { media_id, .. })
            | CoreEvent::Sync(SyncEvent::StateSaved { media_id, .. }) => Some(media_id),
            CoreEvent::Sync(SyncEvent::Unavailable { .. }) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Lifecycle of the currently loaded media item.
///
/// Positions are in seconds for audio/video and in the normalized 0-1 page
/// ratio for documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A media item finished loading and restored its saved state.
    Loaded {
        media_id: String,
        /// `audio`, `video` or `ebook`.
        kind: String,
        duration: f64,
        /// Whether a previously saved position was applied.
        resumed: bool,
    },
    Started {
        media_id: String,
        position: f64,
    },
    Paused {
        media_id: String,
        position: f64,
    },
    Stopped {
        media_id: String,
    },
    Seeked {
        media_id: String,
        position: f64,
    },
    /// Playback reached the end (or the last page).
    Completed {
        media_id: String,
    },
    Error {
        media_id: Option<String>,
        /// `LOAD_FAILED`, `PLAYBACK_FAILED`, `UNSUPPORTED_FORMAT` or `UNKNOWN_ERROR`.
        code: String,
        message: String,
    },
    /// The player released its media and hid the view.
    Closed {
        media_id: Option<String>,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loaded { .. } => "Media loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::Completed { .. } => "Media completed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::Closed { .. } => "Player closed",
        }
    }

    fn media_id(&self) -> Option<&str> {
        match self {
            PlaybackEvent::Loaded { media_id, .. }
            | PlaybackEvent::Started { media_id, .. }
            | PlaybackEvent::Paused { media_id, .. }
            | PlaybackEvent::Stopped { media_id }
            | PlaybackEvent::Seeked { media_id, .. }
            | PlaybackEvent::Completed { media_id } => Some(media_id),
            PlaybackEvent::Error { media_id, .. } | PlaybackEvent::Closed { media_id } => {
                media_id.as_deref()
            }
        }
    }
}

// ============================================================================
// View Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ViewEvent {
    /// `FULL`, `MINI`, `PICTURE_IN_PICTURE` or `HIDDEN`.
    ModeChanged { from: String, to: String },
}

impl ViewEvent {
    fn description(&self) -> &str {
        match self {
            ViewEvent::ModeChanged { .. } => "View mode changed",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Persistence and cross-instance synchronization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A playback state was written to the local store.
    StateSaved { media_id: String, position: f64 },
    /// A newer state from another instance replaced the local one.
    RemoteStateApplied {
        media_id: String,
        position: f64,
        last_updated: i64,
    },
    /// The broadcast channel could not be opened; running without sync.
    Unavailable { reason: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::StateSaved { .. } => "Playback state saved",
            SyncEvent::RemoteStateApplied { .. } => "Remote playback state applied",
            SyncEvent::Unavailable { .. } => "Cross-instance sync unavailable",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus.
///
/// Cloning shares the underlying channel. Past events are never replayed to
/// new subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Fails only when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Convenience wrapper returning a filterable [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::default();
/// let views_only = bus.stream().filter(|event| matches!(event, CoreEvent::View(_)));
/// # drop(views_only);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next event passing the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when drained.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drain everything currently buffered that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(media_id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Paused {
            media_id: media_id.to_string(),
            position: 3.0,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(4);
        assert!(bus.emit(paused("m")).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.emit(paused("m")).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), paused("m"));
        assert_eq!(b.recv().await.unwrap(), paused("m"));
    }

    #[tokio::test]
    async fn test_stream_filter() {
        let bus = EventBus::default();
        let mut stream = bus
            .stream()
            .filter(|event| matches!(event, CoreEvent::View(_)));

        bus.emit(paused("m")).unwrap();
        bus.emit(CoreEvent::View(ViewEvent::ModeChanged {
            from: "FULL".into(),
            to: "MINI".into(),
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(event.description(), "View mode changed");
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();
        for _ in 0..5 {
            bus.emit(paused("m")).unwrap();
        }
        assert!(matches!(
            receiver.recv().await,
            Err(RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_severity_and_media_id() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            media_id: Some("m".into()),
            code: "LOAD_FAILED".into(),
            message: "unreachable".into(),
        });
        assert_eq!(error.severity(), EventSeverity::Error);
        assert_eq!(error.media_id(), Some("m"));
        assert_eq!(paused("m").severity(), EventSeverity::Debug);

        let unavailable = CoreEvent::Sync(SyncEvent::Unavailable {
            reason: "no channel".into(),
        });
        assert_eq!(unavailable.severity(), EventSeverity::Warning);
        assert_eq!(unavailable.media_id(), None);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(paused("m")).unwrap();
        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "Paused");
        assert_eq!(json["payload"]["media_id"], "m");
    }

    #[test]
    fn test_drain_collects_buffered() {
        let bus = EventBus::default();
        let mut stream = bus.stream();
        bus.emit(paused("a")).unwrap();
        bus.emit(paused("b")).unwrap();
        assert_eq!(stream.drain().len(), 2);
    }
}
