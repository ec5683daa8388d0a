//! In-process broadcast channels.
//!
//! Every engine instance in the same process that opens a port under the same
//! name sees every message posted by the other ports on that name. A port
//! never receives its own messages.

use bridge_traits::{
    broadcast::{BroadcastChannelFactory, BroadcastPort, MessageCallback},
    error::{BridgeError, Result},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Envelope {
    origin: u64,
    message: String,
}

/// Registry of named channels.
#[derive(Debug)]
pub struct LocalBroadcastHub {
    channels: Mutex<HashMap<String, broadcast::Sender<Envelope>>>,
    next_port: AtomicU64,
    capacity: usize,
}

impl LocalBroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how many undelivered messages a slow port may lag behind.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_port: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Process-wide hub shared by every default-configured engine.
    pub fn global() -> Arc<LocalBroadcastHub> {
        static GLOBAL: OnceLock<Arc<LocalBroadcastHub>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(LocalBroadcastHub::new())).clone()
    }

    fn sender_for(&self, name: &str) -> broadcast::Sender<Envelope> {
        let mut channels = self.channels.lock();
        channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalBroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastChannelFactory for LocalBroadcastHub {
    fn open(&self, name: &str) -> Result<Arc<dyn BroadcastPort>> {
        if name.is_empty() {
            return Err(BridgeError::OperationFailed(
                "channel name must not be empty".to_string(),
            ));
        }

        let id = self.next_port.fetch_add(1, Ordering::Relaxed);
        debug!(channel = name, port = id, "Opened broadcast port");

        Ok(Arc::new(LocalBroadcastPort {
            name: name.to_string(),
            id,
            sender: self.sender_for(name),
            listener: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One endpoint on a named channel.
pub struct LocalBroadcastPort {
    name: String,
    id: u64,
    sender: broadcast::Sender<Envelope>,
    listener: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl LocalBroadcastPort {
    fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for LocalBroadcastPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBroadcastPort")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl BroadcastPort for LocalBroadcastPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn post_message(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::ChannelClosed(self.name.clone()));
        }

        // No receivers is not an error: nobody else is listening yet.
        let _ = self.sender.send(Envelope {
            origin: self.id,
            message,
        });
        Ok(())
    }

    fn set_on_message(&self, callback: MessageCallback) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(channel = %self.name, "No async runtime; broadcast listener not started");
                return;
            }
        };

        self.stop_listener();

        let mut receiver = self.sender.subscribe();
        let own_id = self.id;
        let channel = self.name.clone();
        let handle = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) if envelope.origin == own_id => continue,
                    Ok(envelope) => callback(envelope.message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "Broadcast port lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *self.listener.lock() = Some(handle);
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_listener();
        debug!(channel = %self.name, port = self.id, "Closed broadcast port");
    }
}

impl Drop for LocalBroadcastPort {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn collector() -> (MessageCallback, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: MessageCallback = Arc::new(move |message| {
            let _ = tx.send(message);
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn test_delivers_to_other_ports_only() {
        let hub = LocalBroadcastHub::new();
        let a = hub.open("sync").unwrap();
        let b = hub.open("sync").unwrap();

        let (cb_a, mut rx_a) = collector();
        let (cb_b, mut rx_b) = collector();
        a.set_on_message(cb_a);
        b.set_on_message(cb_b);

        a.post_message("hello".to_string()).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx_b.recv())
            .await
            .unwrap();
        assert_eq!(received.as_deref(), Some("hello"));

        let own = tokio::time::timeout(Duration::from_millis(50), rx_a.recv()).await;
        assert!(own.is_err());
    }

    #[tokio::test]
    async fn test_channels_are_isolated_by_name() {
        let hub = LocalBroadcastHub::new();
        let a = hub.open("one").unwrap();
        let b = hub.open("two").unwrap();

        let (cb, mut rx) = collector();
        b.set_on_message(cb);
        a.post_message("ignored".to_string()).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_closed_port_rejects_posts() {
        let hub = LocalBroadcastHub::new();
        let port = hub.open("sync").unwrap();
        port.close();
        port.close();

        assert!(matches!(
            port.post_message("late".to_string()),
            Err(BridgeError::ChannelClosed(_))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(LocalBroadcastHub::new().open("").is_err());
    }
}
