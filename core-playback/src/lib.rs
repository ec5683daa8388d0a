//! # Playback Engine
//!
//! One control surface over continuous audio, continuous video and
//! paginated documents.
//!
//! ## Overview
//!
//! This crate handles:
//! - Media handlers that drive platform primitives (media elements and
//!   sandboxed document frames) behind the [`MediaHandler`] contract
//! - The [`MediaPlayer`] core: aggregate state, one error path, view modes
//! - Durable resume positions with auto-save ([`PlaybackStateManager`])
//! - Cross-instance consistency over a broadcast channel, last write wins
//! - Lifecycle tracking for listeners, timers and pooled elements
//!
//! ## Example
//!
//! ```no_run
//! use core_playback::{MediaItem, MediaPlayer};
//! use core_runtime::CoreConfig;
//!
//! # async fn run(config: CoreConfig) -> core_playback::Result<()> {
//! let player = MediaPlayer::new(config)?;
//! player.load(MediaItem::video("trailer", "media/trailer.mp4")).await?;
//! player.play().await?;
//! player.seek(42.0).await?;
//! player.cleanup().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod listeners;
pub mod player;
pub mod resources;
pub mod state;
pub mod types;
pub mod ui;

pub use error::{ErrorSeverity, MediaErrorCode, MediaPlayerError, PlaybackError, Result};
pub use handlers::{
    AudioHandler, EbookHandler, MediaHandler, PageNavigator, PictureInPicture, VideoHandler,
};
pub use listeners::ListenerManager;
pub use player::MediaPlayer;
pub use resources::{ElementPool, ResourceKind, ResourceManager, ResourceStats};
pub use state::{
    ImportSummary, PlaybackPersistence, PlaybackStateManager, StateSynchronization, SyncMessage,
    SyncMessageType,
};
pub use types::{MediaItem, MediaKind, MediaState, PageInfo, PlaybackState, TimeUpdate};
pub use ui::{MediaUiController, ViewCommand, ViewMode};
