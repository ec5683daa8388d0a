//! # Host Bridge Traits
//!
//! Platform abstraction traits that every host of the playback engine must
//! implement.
//!
//! ## Overview
//!
//! The engine orchestrates playback but owns no platform primitives of its
//! own. Decoding, rendering, durable storage and cross-instance messaging all
//! live on the host side of these traits:
//!
//! ### Presentation
//! - [`EventTarget`](dom::EventTarget) - DOM-like listener registration
//! - [`MediaElement`](media::MediaElement) - audio/video playback primitive
//! - [`DocumentFrame`](media::DocumentFrame) - sandboxed document surface
//! - [`MediaPlatform`](media::MediaPlatform) - factory for the two above
//! - [`PresentationContainer`](container::PresentationContainer) - the node the
//!   active handler renders into, plus its marker slots
//!
//! ### Persistence & Coordination
//! - [`RecordStore`](storage::RecordStore) - durable per-device key-value records
//! - [`BroadcastChannelFactory`](broadcast::BroadcastChannelFactory) - message
//!   channel shared by every engine instance on the device
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to the host
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError).
//! Implementations should convert platform errors into it and keep the
//! message actionable (which source failed, which capability is missing).
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; the engine shares bridge handles across
//! async tasks behind `Arc`.

pub mod broadcast;
pub mod container;
pub mod dom;
pub mod error;
pub mod media;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use broadcast::{BroadcastChannelFactory, BroadcastPort, MessageCallback};
pub use container::{AttachedNode, Marker, MarkerSlot, PresentationContainer};
pub use dom::{
    DomEvent, DomEventKind, EventCallback, EventDisposition, EventTarget, ListenerId, TargetId,
};
pub use media::{DocumentFrame, ElementKind, MediaElement, MediaPlatform, SandboxPolicy};
pub use storage::{RecordStore, StoredRecord};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
