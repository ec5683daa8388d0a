//! Cross-instance state propagation over a named broadcast channel.
//!
//! Every message carries the sender's id; an instance ignores its own
//! broadcasts. When the channel cannot be opened the synchronizer stays
//! inert and every operation is a no-op.

use crate::types::PlaybackState;
use bridge_traits::{BroadcastChannelFactory, BroadcastPort, Clock};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};
use uuid::Uuid;

pub type RemoteStateCallback = Arc<dyn Fn(PlaybackState) + Send + Sync>;
/// Answers peers' state requests for a media id.
pub type StateProvider = Arc<dyn Fn(&str) -> Option<PlaybackState> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMessageType {
    StateChange,
    StateRequest,
    StateResponse,
}

/// Wire format of every message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    #[serde(rename = "type")]
    pub kind: SyncMessageType,
    pub payload: Option<PlaybackState>,
    pub timestamp: i64,
    pub sender_id: String,
    /// Set on requests, which have no payload to name the media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

struct Inbox {
    sender_id: String,
    clock: Arc<dyn Clock>,
    on_state: RwLock<Option<RemoteStateCallback>>,
    provider: RwLock<Option<StateProvider>>,
    reply: RwLock<Option<Weak<dyn BroadcastPort>>>,
}

impl Inbox {
    fn handle(&self, raw: &str) {
        let message: SyncMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed sync message: {}", e);
                return;
            }
        };
        if message.sender_id == self.sender_id {
            return;
        }
        trace!(kind = ?message.kind, sender = %message.sender_id, "Sync message received");

        match message.kind {
            SyncMessageType::StateChange | SyncMessageType::StateResponse => {
                let Some(state) = message.payload else {
                    return;
                };
                let callback = self.on_state.read().clone();
                if let Some(callback) = callback {
                    callback(state);
                }
            }
            SyncMessageType::StateRequest => {
                let Some(media_id) = message.media_id else {
                    return;
                };
                let provider = self.provider.read().clone();
                let Some(state) = provider.and_then(|provider| provider(&media_id)) else {
                    return;
                };
                let port = self.reply.read().as_ref().and_then(Weak::upgrade);
                if let Some(port) = port {
                    let response = SyncMessage {
                        kind: SyncMessageType::StateResponse,
                        media_id: Some(state.media_id.clone()),
                        payload: Some(state),
                        timestamp: self.clock.unix_timestamp_millis(),
                        sender_id: self.sender_id.clone(),
                    };
                    post(port.as_ref(), &response);
                }
            }
        }
    }
}

fn post(port: &dyn BroadcastPort, message: &SyncMessage) -> bool {
    let encoded = match serde_json::to_string(message) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Failed to encode sync message: {}", e);
            return false;
        }
    };
    match port.post_message(encoded) {
        Ok(()) => true,
        Err(e) => {
            warn!(channel = port.name(), "Failed to post sync message: {}", e);
            false
        }
    }
}

pub struct StateSynchronization {
    port: Option<Arc<dyn BroadcastPort>>,
    inbox: Arc<Inbox>,
    unavailable_reason: Option<String>,
}

impl StateSynchronization {
    /// Join `channel`. Failure to open it is logged and leaves the
    /// synchronizer inert.
    pub fn open(factory: &dyn BroadcastChannelFactory, channel: &str, clock: Arc<dyn Clock>) -> Self {
        let inbox = Arc::new(Inbox {
            sender_id: Uuid::new_v4().to_string(),
            clock,
            on_state: RwLock::new(None),
            provider: RwLock::new(None),
            reply: RwLock::new(None),
        });

        match factory.open(channel) {
            Ok(port) => {
                *inbox.reply.write() = Some(Arc::downgrade(&port));
                let receiver = Arc::clone(&inbox);
                port.set_on_message(Arc::new(move |raw: String| receiver.handle(&raw)));
                debug!(channel, sender = %inbox.sender_id, "State sync channel open");
                Self {
                    port: Some(port),
                    inbox,
                    unavailable_reason: None,
                }
            }
            Err(e) => {
                warn!(channel, "State sync unavailable: {}", e);
                Self {
                    port: None,
                    inbox,
                    unavailable_reason: Some(e.to_string()),
                }
            }
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.inbox.sender_id
    }

    pub fn is_available(&self) -> bool {
        self.port.is_some()
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable_reason.as_deref()
    }

    fn send(&self, kind: SyncMessageType, payload: Option<PlaybackState>, media_id: Option<String>) -> bool {
        let Some(port) = &self.port else {
            return false;
        };
        let message = SyncMessage {
            kind,
            payload,
            timestamp: self.inbox.clock.unix_timestamp_millis(),
            sender_id: self.inbox.sender_id.clone(),
            media_id,
        };
        post(port.as_ref(), &message)
    }

    /// Publish a local change. Returns whether it was posted.
    pub fn broadcast_state(&self, state: &PlaybackState) -> bool {
        self.send(
            SyncMessageType::StateChange,
            Some(state.clone()),
            Some(state.media_id.clone()),
        )
    }

    /// Ask peers for their state of `media_id`; answers arrive through the
    /// remote-state callback.
    pub fn request_state(&self, media_id: &str) -> bool {
        self.send(SyncMessageType::StateRequest, None, Some(media_id.to_string()))
    }

    pub fn on_remote_state(&self, callback: RemoteStateCallback) {
        *self.inbox.on_state.write() = Some(callback);
    }

    pub fn set_state_provider(&self, provider: StateProvider) {
        *self.inbox.provider.write() = Some(provider);
    }

    pub fn close(&self) {
        if let Some(port) = &self.port {
            port.close();
        }
        *self.inbox.on_state.write() = None;
        *self.inbox.provider.write() = None;
    }
}

impl Drop for StateSynchronization {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StateSynchronization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSynchronization")
            .field("sender_id", &self.inbox.sender_id)
            .field("available", &self.is_available())
            .finish()
    }
}
