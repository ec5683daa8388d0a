//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media platform,
//! presentation container, record store, broadcast channels, clock) into a
//! ready [`MediaPlayer`]. Desktop and headless hosts typically enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) and call
//! [`bootstrap_desktop`]; other hosts assemble [`PlayerDependencies`]
//! themselves and call [`bootstrap`].

pub mod error;

pub use error::{CoreError, Result};

pub use core_playback::{
    MediaErrorCode, MediaItem, MediaKind, MediaPlayer, MediaPlayerError, MediaState, PlaybackError,
    ViewMode,
};
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};
pub use core_runtime::PlayerSettings;

use std::sync::Arc;

use bridge_traits::{
    BroadcastChannelFactory, Clock, MediaPlatform, PresentationContainer, RecordStore,
};
use core_runtime::CoreConfig;
use tracing::info;

const EVENT_BUS_CAPACITY: usize = 256;

/// Aggregated handle to all bridge dependencies the player requires.
#[derive(Clone)]
pub struct PlayerDependencies {
    pub media_platform: Arc<dyn MediaPlatform>,
    pub container: Arc<dyn PresentationContainer>,
    pub record_store: Arc<dyn RecordStore>,
    /// `None` disables cross-instance sync.
    pub broadcast: Option<Arc<dyn BroadcastChannelFactory>>,
    /// Defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
}

impl PlayerDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        media_platform: Arc<dyn MediaPlatform>,
        container: Arc<dyn PresentationContainer>,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            media_platform,
            container,
            record_store,
            broadcast: None,
            clock: None,
        }
    }

    pub fn with_broadcast(mut self, factory: Arc<dyn BroadcastChannelFactory>) -> Self {
        self.broadcast = Some(factory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    player: Arc<MediaPlayer>,
    event_bus: EventBus,
}

impl CoreService {
    pub fn player(&self) -> Arc<MediaPlayer> {
        Arc::clone(&self.player)
    }

    /// Stream of every engine event published after this call.
    pub fn events(&self) -> EventStream {
        self.event_bus.stream()
    }

    /// Save the current position and release every platform resource.
    pub async fn shutdown(&self) {
        self.player.cleanup().await;
    }
}

/// Build a service from explicit bridge handles.
///
/// # Errors
///
/// Returns [`CoreError::Config`] when `settings` fail validation.
pub fn bootstrap(settings: PlayerSettings, deps: PlayerDependencies) -> Result<CoreService> {
    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

    let mut builder = CoreConfig::builder()
        .media_platform(deps.media_platform)
        .container(deps.container)
        .record_store(deps.record_store)
        .event_bus(event_bus.clone())
        .settings(settings);
    if let Some(factory) = deps.broadcast {
        builder = builder.broadcast(factory);
    }
    if let Some(clock) = deps.clock {
        builder = builder.clock(clock);
    }
    let config = builder.build()?;

    let player = MediaPlayer::new(config)?;
    info!("Core service ready");
    Ok(CoreService {
        player: Arc::new(player),
        event_bus,
    })
}

/// Convenience bootstrapper for desktop hosts.
///
/// Positions persist in a SQLite file at `db_path` (in memory when `None`)
/// and instances in this process share the global broadcast hub.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform};
/// use core_service::{bootstrap_desktop, MediaItem, PlayerSettings};
/// use std::sync::Arc;
///
/// let core = bootstrap_desktop(
///     PlayerSettings::default(),
///     Arc::new(HeadlessMediaPlatform::new()),
///     Arc::new(HeadlessContainer::new()),
///     None,
/// )
/// .await?;
/// core.player().load(MediaItem::audio("intro", "intro.mp3")).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    settings: PlayerSettings,
    media_platform: Arc<dyn MediaPlatform>,
    container: Arc<dyn PresentationContainer>,
    db_path: Option<std::path::PathBuf>,
) -> Result<CoreService> {
    use bridge_desktop::{LocalBroadcastHub, SqliteRecordStore};

    let store = match db_path {
        Some(path) => SqliteRecordStore::new(path).await?,
        None => SqliteRecordStore::in_memory().await?,
    };
    let deps = PlayerDependencies::new(media_platform, container, Arc::new(store))
        .with_broadcast(LocalBroadcastHub::global());
    bootstrap(settings, deps)
}
