//! # Playback Error Types
//!
//! Two layers of errors live here:
//!
//! - [`MediaPlayerError`]: the user-visible failure record stored in the
//!   player's aggregate state. It carries one of four codes and a severity
//!   used only for presentation weighting.
//! - [`PlaybackError`]: the `Result` error of every engine operation. Any
//!   variant can be folded into a `MediaPlayerError` with
//!   [`PlaybackError::to_media_error`].

use bridge_traits::BridgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaErrorCode {
    /// Source unreachable or unparseable.
    LoadFailed,
    /// Start/resume failed after a successful load.
    PlaybackFailed,
    /// The media kind or a requested capability is not available.
    UnsupportedFormat,
    UnknownError,
}

impl MediaErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaErrorCode::LoadFailed => "LOAD_FAILED",
            MediaErrorCode::PlaybackFailed => "PLAYBACK_FAILED",
            MediaErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            MediaErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for MediaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A failure as presented to the user.
///
/// Each instance gets a fresh `id`; the player uses it to record a failure
/// that arrives both through a handler's error callback and through the
/// rejected operation exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPlayerError {
    pub id: Uuid,
    pub code: MediaErrorCode,
    pub message: String,
    pub severity: ErrorSeverity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl MediaPlayerError {
    pub fn new(code: MediaErrorCode, message: impl Into<String>, severity: ErrorSeverity) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            context: HashMap::new(),
        }
    }

    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::new(MediaErrorCode::LoadFailed, message, ErrorSeverity::High)
    }

    pub fn playback_failed(message: impl Into<String>) -> Self {
        Self::new(MediaErrorCode::PlaybackFailed, message, ErrorSeverity::Medium)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(MediaErrorCode::UnsupportedFormat, message, ErrorSeverity::Low)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(MediaErrorCode::UnknownError, message, ErrorSeverity::Medium)
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

impl fmt::Display for MediaPlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MediaPlayerError {}

/// Errors returned by engine operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A failure that has already been shaped for the user.
    #[error("{0}")]
    Media(MediaPlayerError),

    #[error("No media loaded")]
    NoMediaLoaded,

    /// The player was cleaned up and can no longer be used.
    #[error("Player has been disposed")]
    Disposed,

    /// A newer load or a close replaced the operation while it was pending.
    #[error("Operation superseded by a newer request")]
    Superseded,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Sync error: {0}")]
    Sync(String),
}

impl PlaybackError {
    /// Fold this error into the user-facing taxonomy.
    ///
    /// `Media` errors are returned as-is (same id), so a failure reported
    /// through both paths is still recognized as one.
    pub fn to_media_error(&self) -> MediaPlayerError {
        match self {
            PlaybackError::Media(error) => error.clone(),
            PlaybackError::NoMediaLoaded => {
                MediaPlayerError::playback_failed("No media loaded").with_severity(ErrorSeverity::Low)
            }
            PlaybackError::Disposed | PlaybackError::Superseded => {
                MediaPlayerError::unknown(self.to_string()).with_severity(ErrorSeverity::Low)
            }
            PlaybackError::Bridge(BridgeError::NotAvailable(message)) => {
                MediaPlayerError::unsupported(message.clone())
            }
            other => MediaPlayerError::unknown(other.to_string()),
        }
    }
}

impl From<MediaPlayerError> for PlaybackError {
    fn from(error: MediaPlayerError) -> Self {
        PlaybackError::Media(error)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
