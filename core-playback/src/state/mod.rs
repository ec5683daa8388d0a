//! Playback state: durable storage, cross-instance sync, and the policy
//! that ties them together.

pub mod manager;
pub mod persistence;
pub mod sync;

pub use manager::{PlaybackStateManager, StateSource, AUTO_SAVE_TIMER};
pub use persistence::{ImportSummary, PlaybackPersistence};
pub use sync::{
    RemoteStateCallback, StateProvider, StateSynchronization, SyncMessage, SyncMessageType,
};
