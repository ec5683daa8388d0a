//! Data model shared by handlers, the state stack and the player core.

use crate::error::MediaPlayerError;
use bridge_traits::ElementKind;
use core_runtime::config::{MAX_PLAYBACK_RATE, MAX_VOLUME, MIN_PLAYBACK_RATE, MIN_VOLUME};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media an item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    Audio,
    Video,
    Ebook,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Ebook => "ebook",
        }
    }

    /// The platform node kind that renders this media.
    pub fn element_kind(&self) -> ElementKind {
        match self {
            MediaKind::Audio => ElementKind::Audio,
            MediaKind::Video => ElementKind::Video,
            MediaKind::Ebook => ElementKind::DocumentFrame,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playable item. Owned by the caller; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    /// URL or path handed to the platform primitive.
    pub source: String,
    #[serde(default)]
    pub size: u64,
    /// Container/format tag, e.g. `mp4`, `mp3`, `html`.
    #[serde(default)]
    pub format: String,
    /// Known duration in seconds, if the catalog has one.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Page count for documents whose renderer does not report one.
    #[serde(default)]
    pub page_count: Option<u32>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, kind: MediaKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            size: 0,
            format: String::new(),
            duration: None,
            page_count: None,
        }
    }

    pub fn audio(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, MediaKind::Audio, source)
    }

    pub fn video(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, MediaKind::Video, source)
    }

    pub fn ebook(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, MediaKind::Ebook, source)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = Some(pages);
        self
    }
}

/// The persisted and synchronized snapshot of one item's playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub media_id: String,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub playback_rate: f64,
    pub is_playing: bool,
    /// Unix epoch milliseconds, assigned when the state is saved.
    pub last_updated: i64,
}

impl PlaybackState {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            playback_rate: 1.0,
            is_playing: false,
            last_updated: 0,
        }
    }

    /// Whether `other` is worth writing after `self` was saved: a different
    /// item, more than a second of movement, or a changed flag.
    pub fn differs_meaningfully(&self, other: &PlaybackState) -> bool {
        self.media_id != other.media_id
            || (self.current_time - other.current_time).abs() > 1.0
            || self.is_playing != other.is_playing
            || self.volume != other.volume
            || self.playback_rate != other.playback_rate
    }
}

/// Position report delivered to time-update callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUpdate {
    pub current_time: f64,
    pub duration: f64,
}

/// Page position of a paginated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Zero-based.
    pub current_page: u32,
    pub total_pages: u32,
}

/// UI-facing aggregate owned by the player core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    pub current_media: Option<MediaItem>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub playback_rate: f64,
    pub is_minimized: bool,
    pub is_picture_in_picture: bool,
    pub error: Option<MediaPlayerError>,
}

impl MediaState {
    pub fn new(volume: f64, playback_rate: f64) -> Self {
        Self {
            current_media: None,
            is_playing: false,
            is_loading: false,
            current_time: 0.0,
            duration: 0.0,
            volume: clamp_volume(volume),
            playback_rate: clamp_playback_rate(playback_rate),
            is_minimized: false,
            is_picture_in_picture: false,
            error: None,
        }
    }

    pub fn media_id(&self) -> Option<&str> {
        self.current_media.as_ref().map(|item| item.id.as_str())
    }
}

impl Default for MediaState {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Clamp to `[0, 1]`. NaN becomes 0.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        MIN_VOLUME
    } else {
        volume.clamp(MIN_VOLUME, MAX_VOLUME)
    }
}

/// Clamp to `[0.25, 2.0]`. NaN becomes 1.
pub fn clamp_playback_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
    }
}

/// NaN, infinite and negative durations become 0.
pub fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}
