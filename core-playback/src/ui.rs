//! View-mode state machine and the marker slots that mirror playback.
//!
//! The controller never touches handler state. It only receives values from
//! the player and writes them into the presentation container.

use crate::error::MediaPlayerError;
use crate::types::MediaKind;
use bridge_traits::{Marker, PresentationContainer};
use core_runtime::events::{CoreEvent, EventBus, ViewEvent};
use core_runtime::PlayerSettings;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Attribute on the container that carries the current view mode.
pub const VIEW_MODE_ATTRIBUTE: &str = "data-view-mode";

/// Mutually exclusive presentation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    Full,
    Mini,
    PictureInPicture,
    Hidden,
}

/// Requests that move the view between modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    Minimize,
    Maximize,
    EnterPictureInPicture,
    ExitPictureInPicture,
    Show,
    Hide,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Full => "FULL",
            ViewMode::Mini => "MINI",
            ViewMode::PictureInPicture => "PICTURE_IN_PICTURE",
            ViewMode::Hidden => "HIDDEN",
        }
    }

    /// Target of `command` from this mode, or `None` when the transition is
    /// not allowed.
    pub fn apply(self, command: ViewCommand) -> Option<ViewMode> {
        use ViewCommand::*;
        use ViewMode::*;

        match (self, command) {
            (Full | PictureInPicture, Minimize) => Some(Mini),
            (Mini | PictureInPicture | Hidden, Maximize) => Some(Full),
            (Full | Mini, EnterPictureInPicture) => Some(PictureInPicture),
            (PictureInPicture, ExitPictureInPicture) => Some(Full),
            (Hidden, Show) => Some(Full),
            (Full | Mini | PictureInPicture, Hide) => Some(Hidden),
            _ => None,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render seconds as `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Render a 0-1 ratio as a whole percentage.
pub fn format_percent(ratio: f64) -> String {
    if !ratio.is_finite() {
        return "0%".to_string();
    }
    format!("{:.0}%", (ratio * 100.0).clamp(0.0, 100.0))
}

pub struct MediaUiController {
    container: RwLock<Option<Arc<dyn PresentationContainer>>>,
    mode: Mutex<ViewMode>,
    enable_mini_player: bool,
    enable_picture_in_picture: bool,
    event_bus: Option<EventBus>,
}

impl MediaUiController {
    pub fn new(
        container: Arc<dyn PresentationContainer>,
        settings: &PlayerSettings,
        event_bus: Option<EventBus>,
    ) -> Self {
        container.set_attribute(VIEW_MODE_ATTRIBUTE, ViewMode::Hidden.as_str());
        Self {
            container: RwLock::new(Some(container)),
            mode: Mutex::new(ViewMode::Hidden),
            enable_mini_player: settings.enable_mini_player,
            enable_picture_in_picture: settings.enable_picture_in_picture,
            event_bus,
        }
    }

    pub fn mode(&self) -> ViewMode {
        *self.mode.lock()
    }

    pub fn is_minimized(&self) -> bool {
        self.mode() == ViewMode::Mini
    }

    pub fn is_picture_in_picture(&self) -> bool {
        self.mode() == ViewMode::PictureInPicture
    }

    /// Apply `command`. Returns the new mode, or `None` when the command is
    /// disabled by settings or not valid from the current mode.
    pub fn transition(&self, command: ViewCommand) -> Option<ViewMode> {
        let gated = match command {
            ViewCommand::Minimize => !self.enable_mini_player,
            ViewCommand::EnterPictureInPicture => !self.enable_picture_in_picture,
            _ => false,
        };
        if gated {
            debug!(?command, "View command disabled by settings");
            return None;
        }

        let (from, to) = {
            let mut mode = self.mode.lock();
            let from = *mode;
            let to = from.apply(command)?;
            *mode = to;
            (from, to)
        };

        if let Some(container) = self.container() {
            container.set_attribute(VIEW_MODE_ATTRIBUTE, to.as_str());
        }
        debug!(%from, %to, "View mode changed");
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::View(ViewEvent::ModeChanged {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }));
        }
        Some(to)
    }

    pub fn show(&self) {
        self.transition(ViewCommand::Show);
    }

    pub fn hide(&self) {
        self.transition(ViewCommand::Hide);
    }

    fn container(&self) -> Option<Arc<dyn PresentationContainer>> {
        self.container.read().clone()
    }

    fn with_marker(&self, marker: Marker, apply: impl FnOnce(&dyn bridge_traits::MarkerSlot)) {
        let Some(container) = self.container() else {
            return;
        };
        if let Some(slot) = container.marker(marker) {
            apply(slot.as_ref());
        }
    }

    /// Mirror a progress tick. Ebooks report a 0-1 ratio against a
    /// duration of 1 and render as percentages.
    pub fn update_progress(&self, current: f64, duration: f64, kind: Option<MediaKind>) {
        let percent = if duration.is_finite() && duration > 0.0 && current.is_finite() {
            (current / duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        trace!(current, duration, percent, "Progress");

        self.with_marker(Marker::Progress, |slot| slot.set_progress(percent));
        if kind == Some(MediaKind::Ebook) {
            self.with_marker(Marker::CurrentTime, |slot| {
                slot.set_text(&format_percent(current))
            });
            self.with_marker(Marker::Duration, |slot| slot.set_text("100%"));
        } else {
            self.with_marker(Marker::CurrentTime, |slot| {
                slot.set_text(&format_time(current))
            });
            self.with_marker(Marker::Duration, |slot| {
                slot.set_text(&format_time(duration))
            });
        }
    }

    pub fn set_loading(&self, loading: bool) {
        self.with_marker(Marker::LoadingOverlay, |slot| slot.set_visible(loading));
    }

    /// Show `error`, or hide the overlay when `None`.
    pub fn show_error(&self, error: Option<&MediaPlayerError>) {
        self.with_marker(Marker::ErrorOverlay, |slot| match error {
            Some(error) => {
                slot.set_text(&error.message);
                slot.set_visible(true);
            }
            None => {
                slot.set_text("");
                slot.set_visible(false);
            }
        });
    }

    /// Clear every marker back to its idle state.
    pub fn reset(&self) {
        self.update_progress(0.0, 0.0, None);
        self.set_loading(false);
        self.show_error(None);
    }

    pub fn cleanup(&self) {
        self.reset();
        self.hide();
        *self.container.write() = None;
    }
}

impl fmt::Debug for MediaUiController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaUiController")
            .field("mode", &self.mode())
            .field("enable_mini_player", &self.enable_mini_player)
            .field("enable_picture_in_picture", &self.enable_picture_in_picture)
            .finish()
    }
}
