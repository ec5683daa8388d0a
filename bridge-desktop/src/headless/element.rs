use super::behavior::{Behavior, LoadOutcome};
use super::listeners::ListenerRegistry;
use async_trait::async_trait;
use bridge_traits::{
    dom::{DomEvent, DomEventKind, EventCallback, EventDisposition, EventTarget, ListenerId, TargetId},
    error::{BridgeError, Result},
    media::{ElementKind, MediaElement},
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct ElementState {
    source: Option<String>,
    paused: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    playback_rate: f64,
    picture_in_picture: bool,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            source: None,
            paused: true,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            playback_rate: 1.0,
            picture_in_picture: false,
        }
    }
}

/// A media element that plays nothing and dispatches events synchronously.
///
/// Time only moves when a test calls [`advance`](HeadlessMediaElement::advance).
#[derive(Debug)]
pub struct HeadlessMediaElement {
    id: TargetId,
    kind: ElementKind,
    listeners: ListenerRegistry,
    state: Mutex<ElementState>,
    behavior: Arc<RwLock<Behavior>>,
}

impl HeadlessMediaElement {
    pub(crate) fn new(kind: ElementKind, behavior: Arc<RwLock<Behavior>>) -> Self {
        Self {
            id: TargetId::new(),
            kind,
            listeners: ListenerRegistry::default(),
            state: Mutex::new(ElementState::default()),
            behavior,
        }
    }

    /// Dispatch an arbitrary event to this element's listeners.
    pub fn emit(&self, event: DomEvent) -> EventDisposition {
        trace!(element = %self.id, event = ?event.kind(), "dispatch");
        self.listeners.dispatch(&event)
    }

    /// Move the playhead forward by `seconds` of media time (scaled by the
    /// playback rate). Fires `TimeUpdate`, then `Ended` when the end is reached.
    pub fn advance(&self, seconds: f64) {
        let (time, ended) = {
            let mut state = self.state.lock();
            if state.paused || state.source.is_none() {
                return;
            }
            let mut next = state.current_time + seconds * state.playback_rate;
            let mut ended = false;
            if state.duration.is_finite() && next >= state.duration {
                next = state.duration;
                state.paused = true;
                ended = true;
            }
            state.current_time = next;
            (next, ended)
        };

        self.emit(DomEvent::TimeUpdate { current_time: time });
        if ended {
            self.emit(DomEvent::Ended);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listener_count_for(&self, kind: DomEventKind) -> usize {
        self.listeners.count_for(kind)
    }
}

impl EventTarget for HeadlessMediaElement {
    fn target_id(&self) -> TargetId {
        self.id
    }

    fn add_event_listener(&self, kind: DomEventKind, callback: EventCallback) -> ListenerId {
        self.listeners.add(kind, callback)
    }

    fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[async_trait]
impl MediaElement for HeadlessMediaElement {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn set_source(&self, source: &str) -> Result<()> {
        let outcome = self.behavior.read().outcome_for(source);
        {
            let mut state = self.state.lock();
            state.source = Some(source.to_string());
            state.paused = true;
            state.current_time = 0.0;
            state.duration = f64::NAN;
            if let LoadOutcome::Metadata(duration) = outcome {
                state.duration = duration;
            }
        }

        match outcome {
            LoadOutcome::Metadata(duration) => {
                self.emit(DomEvent::LoadedMetadata { duration });
            }
            LoadOutcome::Failed => {
                self.emit(DomEvent::Error {
                    message: "MEDIA_ERR_SRC_NOT_SUPPORTED".to_string(),
                });
            }
            LoadOutcome::Stalled => {}
        }
        Ok(())
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    async fn play(&self) -> Result<()> {
        if self.behavior.read().reject_play {
            return Err(BridgeError::OperationFailed(
                "play() request was rejected".to_string(),
            ));
        }
        {
            let mut state = self.state.lock();
            if state.source.is_none() {
                return Err(BridgeError::OperationFailed(
                    "no source assigned".to_string(),
                ));
            }
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
        }
        self.emit(DomEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = self.state.lock();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            self.emit(DomEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().current_time = seconds;
        self.emit(DomEvent::TimeUpdate {
            current_time: seconds,
        });
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().volume = volume;
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().playback_rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.state.lock().playback_rate = rate;
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        let volume = state.volume;
        *state = ElementState {
            volume,
            ..ElementState::default()
        };
    }

    fn supports_picture_in_picture(&self) -> bool {
        self.kind == ElementKind::Video && self.behavior.read().picture_in_picture
    }

    fn is_picture_in_picture(&self) -> bool {
        self.state.lock().picture_in_picture
    }

    async fn request_picture_in_picture(&self) -> Result<()> {
        if !self.supports_picture_in_picture() {
            return Err(BridgeError::NotAvailable(
                "picture-in-picture is not supported".to_string(),
            ));
        }
        let entered = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.picture_in_picture, true)
        };
        if entered {
            self.emit(DomEvent::EnterPictureInPicture);
        }
        Ok(())
    }

    async fn exit_picture_in_picture(&self) -> Result<()> {
        let left = std::mem::replace(&mut self.state.lock().picture_in_picture, false);
        if left {
            self.emit(DomEvent::LeavePictureInPicture);
        }
        Ok(())
    }
}
