//! # Core Configuration Module
//!
//! Settings and bridge wiring for the playback engine.
//!
//! ## Overview
//!
//! [`PlayerSettings`] holds the tunable behavior (auto-save period, view-mode
//! gates, defaults) and can be deserialized from a host-provided JSON
//! document. [`CoreConfig`] bundles those settings with the bridge handles the
//! engine needs and is built through [`CoreConfigBuilder`], which fails fast
//! when a required bridge is missing.
//!
//! ## Required Dependencies
//!
//! - `MediaPlatform` - creates audio/video elements and document frames
//! - `PresentationContainer` - the node the active handler renders into
//! - `RecordStore` - durable playback positions
//!
//! ## Optional Dependencies
//!
//! - `BroadcastChannelFactory` - cross-instance sync (disabled without it)
//! - `Clock` - defaults to [`SystemClock`]
//! - `EventBus` - engine events are not published without it
//!
//! With the `desktop-shims` feature, a missing record store falls back to an
//! in-memory store and a missing broadcast factory to the process-wide hub.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlayerSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_platform(Arc::new(MyPlatform))
//!     .container(Arc::new(MyContainer))
//!     .record_store(Arc::new(MyStore))
//!     .settings(PlayerSettings::default())
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{
    BroadcastChannelFactory, Clock, MediaPlatform, PresentationContainer, RecordStore,
    SystemClock,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const MIN_VOLUME: f64 = 0.0;
pub const MAX_VOLUME: f64 = 1.0;
pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 2.0;

const MAX_AUTO_SAVE_INTERVAL_MS: u64 = 3_600_000;
const MAX_ELEMENT_POOL_SIZE: usize = 16;

fn default_auto_save_interval() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f64 {
    1.0
}

fn default_playback_rate() -> f64 {
    1.0
}

fn default_heartbeat_interval() -> u64 {
    1_000
}

fn default_pool_size() -> usize {
    3
}

fn default_sync_channel() -> String {
    "media-player-sync".to_string()
}

/// Tunable player behavior.
///
/// Field names serialize in camelCase so hosts can pass the same document
/// their web configuration uses; any missing field takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettings {
    /// Auto-save polling period in milliseconds.
    #[serde(rename = "autoSaveInterval", default = "default_auto_save_interval")]
    pub auto_save_interval_ms: u64,

    #[serde(default = "default_true")]
    pub enable_picture_in_picture: bool,

    /// Gates the minimize transition.
    #[serde(default = "default_true")]
    pub enable_mini_player: bool,

    #[serde(default = "default_volume")]
    pub default_volume: f64,

    #[serde(default = "default_playback_rate")]
    pub default_playback_rate: f64,

    /// Upper bound for waiting on media metadata. `None` waits forever.
    #[serde(rename = "loadTimeout", default)]
    pub load_timeout_ms: Option<u64>,

    /// Period of the document reader's engagement heartbeat.
    #[serde(rename = "ebookHeartbeatInterval", default = "default_heartbeat_interval")]
    pub ebook_heartbeat_interval_ms: u64,

    /// Idle elements retained per media kind for reuse.
    #[serde(default = "default_pool_size")]
    pub element_pool_size: usize,

    #[serde(default = "default_true")]
    pub enable_cross_instance_sync: bool,

    #[serde(default = "default_sync_channel")]
    pub sync_channel_name: String,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            auto_save_interval_ms: default_auto_save_interval(),
            enable_picture_in_picture: true,
            enable_mini_player: true,
            default_volume: default_volume(),
            default_playback_rate: default_playback_rate(),
            load_timeout_ms: None,
            ebook_heartbeat_interval_ms: default_heartbeat_interval(),
            element_pool_size: default_pool_size(),
            enable_cross_instance_sync: true,
            sync_channel_name: default_sync_channel(),
        }
    }
}

impl PlayerSettings {
    /// Parse and validate a JSON settings document.
    pub fn from_json(document: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(document)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_millis(self.auto_save_interval_ms)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    pub fn ebook_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.ebook_heartbeat_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auto_save_interval_ms == 0 {
            return Err(Error::Config(
                "Auto-save interval must be greater than 0ms".to_string(),
            ));
        }

        if self.auto_save_interval_ms > MAX_AUTO_SAVE_INTERVAL_MS {
            return Err(Error::Config(
                "Auto-save interval exceeds maximum of 1 hour (3,600,000ms)".to_string(),
            ));
        }

        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "Default volume {} is outside {}..={}",
                self.default_volume, MIN_VOLUME, MAX_VOLUME
            )));
        }

        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&self.default_playback_rate) {
            return Err(Error::Config(format!(
                "Default playback rate {} is outside {}..={}",
                self.default_playback_rate, MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE
            )));
        }

        if self.load_timeout_ms == Some(0) {
            return Err(Error::Config(
                "Load timeout must be greater than 0ms; omit it to wait indefinitely".to_string(),
            ));
        }

        if self.ebook_heartbeat_interval_ms == 0 {
            return Err(Error::Config(
                "Ebook heartbeat interval must be greater than 0ms".to_string(),
            ));
        }

        if self.element_pool_size > MAX_ELEMENT_POOL_SIZE {
            return Err(Error::Config(format!(
                "Element pool size exceeds maximum of {}",
                MAX_ELEMENT_POOL_SIZE
            )));
        }

        if self.enable_cross_instance_sync && self.sync_channel_name.trim().is_empty() {
            return Err(Error::Config(
                "Sync channel name cannot be empty while cross-instance sync is enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Fully wired engine configuration. Build it with [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    pub media_platform: Arc<dyn MediaPlatform>,
    pub container: Arc<dyn PresentationContainer>,
    pub record_store: Arc<dyn RecordStore>,
    /// `None` disables cross-instance sync.
    pub broadcast: Option<Arc<dyn BroadcastChannelFactory>>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Option<EventBus>,
    pub settings: PlayerSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_platform", &"MediaPlatform { ... }")
            .field("container", &"PresentationContainer { ... }")
            .field("record_store", &"RecordStore { ... }")
            .field(
                "broadcast",
                &self
                    .broadcast
                    .as_ref()
                    .map(|_| "BroadcastChannelFactory { ... }"),
            )
            .field("event_bus", &self.event_bus)
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Whether states should be broadcast to other instances.
    pub fn sync_enabled(&self) -> bool {
        self.settings.enable_cross_instance_sync && self.broadcast.is_some()
    }
}

fn media_platform_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaPlatform".to_string(),
        message: "MediaPlatform implementation is required to create playback elements. \
                  Web: wrap HTMLMediaElement/iframe creation. \
                  Desktop/CLI: use bridge_desktop::HeadlessMediaPlatform or a native player."
            .to_string(),
    }
}

fn container_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PresentationContainer".to_string(),
        message: "PresentationContainer is required: the active handler renders into it. \
                  Supply the host node that owns the player view."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_record_store() -> Result<Arc<dyn RecordStore>> {
    Err(Error::CapabilityMissing {
        capability: "RecordStore".to_string(),
        message: "RecordStore implementation is required to persist playback positions. \
                  Desktop: enable the 'desktop-shims' feature or inject SqliteRecordStore. \
                  Web: inject an IndexedDB-backed store."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_record_store() -> Result<Arc<dyn RecordStore>> {
    warn!("No RecordStore supplied; playback positions will not survive a restart");
    Ok(Arc::new(bridge_desktop::MemoryRecordStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_broadcast() -> Option<Arc<dyn BroadcastChannelFactory>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_broadcast() -> Option<Arc<dyn BroadcastChannelFactory>> {
    Some(bridge_desktop::LocalBroadcastHub::global())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_platform: Option<Arc<dyn MediaPlatform>>,
    container: Option<Arc<dyn PresentationContainer>>,
    record_store: Option<Arc<dyn RecordStore>>,
    broadcast: Option<Arc<dyn BroadcastChannelFactory>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<EventBus>,
    settings: Option<PlayerSettings>,
}

impl CoreConfigBuilder {
    pub fn media_platform(mut self, platform: Arc<dyn MediaPlatform>) -> Self {
        self.media_platform = Some(platform);
        self
    }

    pub fn container(mut self, container: Arc<dyn PresentationContainer>) -> Self {
        self.container = Some(container);
        self
    }

    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }

    /// Channel factory used for cross-instance sync.
    pub fn broadcast(mut self, factory: Arc<dyn BroadcastChannelFactory>) -> Self {
        self.broadcast = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Validate and assemble the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the media platform, container or
    ///   (without desktop shims) record store was not supplied
    /// - [`Error::Config`] when the settings fail validation
    pub fn build(self) -> Result<CoreConfig> {
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let media_platform = self.media_platform.ok_or_else(media_platform_missing_error)?;
        let container = self.container.ok_or_else(container_missing_error)?;

        let record_store = match self.record_store {
            Some(store) => store,
            None => provide_default_record_store()?,
        };

        let broadcast = self.broadcast.or_else(provide_default_broadcast);
        if settings.enable_cross_instance_sync && broadcast.is_none() {
            warn!("Cross-instance sync enabled but no BroadcastChannelFactory supplied; sync disabled");
        }

        Ok(CoreConfig {
            media_platform,
            container,
            record_store,
            broadcast,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_bus: self.event_bus,
            settings,
        })
    }
}
