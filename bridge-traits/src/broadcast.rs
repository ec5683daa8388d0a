//! Cross-instance broadcast channel.
//!
//! Mirrors the browser `BroadcastChannel`: every port opened under the same
//! name receives every message posted on that name. Messages are opaque
//! strings; the core serializes its own envelope.

use crate::error::Result;
use std::sync::Arc;

pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

pub trait BroadcastPort: Send + Sync {
    fn name(&self) -> &str;

    fn post_message(&self, message: String) -> Result<()>;

    /// Replace the message callback. Delivery may happen on another task.
    fn set_on_message(&self, callback: MessageCallback);

    /// Stop receiving messages. Calling it again is a no-op.
    fn close(&self);
}

pub trait BroadcastChannelFactory: Send + Sync {
    fn open(&self, name: &str) -> Result<Arc<dyn BroadcastPort>>;
}
