//! # Media Player Core
//!
//! [`MediaPlayer`] is the single control surface over the three handlers.
//! It owns the aggregate [`MediaState`], routes every failure through one
//! error path, and drives the state manager and the UI controller.
//!
//! ## Load sessions
//!
//! Each `load` and `close` starts a new session. Handler callbacks are bound
//! to the session that installed them, and a load that finds its session
//! replaced stops with [`PlaybackError::Superseded`]. Replacing a load also
//! releases the handler it was waiting on, which cancels the pending wait.

use crate::error::{ErrorSeverity, MediaPlayerError, PlaybackError, Result};
use crate::handlers::{
    AudioHandler, EbookHandler, MediaHandler, PageNavigator, VideoHandler, HEARTBEAT_TIMER,
};
use crate::resources::{ElementPool, ResourceKind, ResourceManager, ResourceStats};
use crate::state::{
    ImportSummary, PlaybackPersistence, PlaybackStateManager, StateSynchronization,
    AUTO_SAVE_TIMER,
};
use crate::types::{
    clamp_playback_rate, clamp_volume, sanitize_duration, MediaItem, MediaKind, MediaState,
    PageInfo, PlaybackState, TimeUpdate,
};
use crate::ui::{MediaUiController, ViewCommand, ViewMode};
use bridge_traits::PresentationContainer;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::{CoreConfig, PlayerSettings};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Resource name under which the active handler is tracked.
const ACTIVE_HANDLER: &str = "active-handler";

/// Resources owned by the current session, never swept by age.
const SESSION_RESOURCES: [&str; 3] = [ACTIVE_HANDLER, AUTO_SAVE_TIMER, HEARTBEAT_TIMER];

struct PlayerInner {
    settings: PlayerSettings,
    container: Arc<dyn PresentationContainer>,
    handlers: Vec<Arc<dyn MediaHandler>>,
    state_manager: PlaybackStateManager,
    ui: MediaUiController,
    resources: Arc<ResourceManager>,
    pool: Arc<ElementPool>,
    event_bus: Option<EventBus>,
    state: Mutex<MediaState>,
    active: RwLock<Option<Arc<dyn MediaHandler>>>,
    /// Serializes load, close and the transport operations.
    op_lock: tokio::sync::Mutex<()>,
    session: AtomicU64,
    last_error: Mutex<Option<Uuid>>,
    disposed: AtomicBool,
}

impl PlayerInner {
    fn ensure_usable(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(PlaybackError::Disposed);
        }
        Ok(())
    }

    fn current_session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    fn begin_session(&self) -> u64 {
        self.session.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, session: u64) -> bool {
        self.current_session() == session
    }

    fn check_session(&self, session: u64) -> Result<()> {
        if self.is_current(session) {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    fn active_handler(&self) -> Option<Arc<dyn MediaHandler>> {
        self.active.read().clone()
    }

    /// Handler and media id, when an item finished loading.
    fn loaded(&self) -> Option<(Arc<dyn MediaHandler>, String)> {
        let handler = self.active_handler()?;
        let media_id = self.state.lock().media_id()?.to_string();
        Some((handler, media_id))
    }

    /// The one place failures become user-visible state.
    fn handle_error(&self, session: u64, error: MediaPlayerError) {
        if !self.is_current(session) {
            debug!(code = %error.code, "Ignoring error from a replaced session");
            return;
        }
        {
            let mut last = self.last_error.lock();
            if *last == Some(error.id) {
                return;
            }
            *last = Some(error.id);
        }

        let media_id = {
            let mut state = self.state.lock();
            state.is_loading = false;
            state.is_playing = false;
            state.error = Some(error.clone());
            state
                .media_id()
                .map(str::to_string)
                .or_else(|| error.context.get("mediaId").cloned())
        };

        if error.severity >= ErrorSeverity::High {
            error!(code = %error.code, severity = ?error.severity, "{}", error.message);
        } else {
            warn!(code = %error.code, severity = ?error.severity, "{}", error.message);
        }

        self.ui.set_loading(false);
        self.ui.show_error(Some(&error));
        self.emit(PlaybackEvent::Error {
            media_id,
            code: error.code.as_str().to_string(),
            message: error.message.clone(),
        });
    }

    /// Funnel a rejected operation into [`handle_error`](Self::handle_error)
    /// and hand the error back to the caller.
    fn fail(&self, session: u64, err: PlaybackError) -> PlaybackError {
        if !matches!(err, PlaybackError::Superseded | PlaybackError::Disposed) {
            self.handle_error(session, err.to_media_error());
        }
        err
    }

    fn require_loaded(&self, session: u64) -> Result<(Arc<dyn MediaHandler>, String)> {
        self.loaded()
            .ok_or_else(|| self.fail(session, PlaybackError::NoMediaLoaded))
    }

    /// What would be saved right now, or `None` while nothing is loaded.
    fn snapshot(&self) -> Option<PlaybackState> {
        let live_time = self.active_handler().map(|handler| handler.current_time());
        let state = self.state.lock();
        if state.is_loading {
            return None;
        }
        let media_id = state.media_id()?.to_string();
        Some(PlaybackState {
            media_id,
            current_time: live_time.unwrap_or(state.current_time),
            duration: state.duration,
            volume: state.volume,
            playback_rate: state.playback_rate,
            is_playing: state.is_playing,
            last_updated: 0,
        })
    }

    async fn save_snapshot(&self, snapshot: Option<PlaybackState>, reason: &'static str) {
        let Some(snapshot) = snapshot else {
            return;
        };
        if let Err(e) = self.state_manager.save_state(snapshot).await {
            warn!(reason, "Failed to save playback state: {}", e);
        }
    }

    async fn save_now(&self, reason: &'static str) {
        let snapshot = self.snapshot();
        self.save_snapshot(snapshot, reason).await;
    }

    /// Stop everything owned by the current session: auto-save, the active
    /// handler, any load waiting on it. Returns what should be saved.
    fn retire_session(&self) -> (u64, Option<PlaybackState>) {
        let snapshot = self.snapshot().map(|state| PlaybackState {
            is_playing: false,
            ..state
        });
        let session = self.begin_session();
        self.state_manager.stop_auto_save();
        self.active.write().take();
        self.resources.release(ACTIVE_HANDLER);
        (session, snapshot)
    }

    fn refresh_progress(&self) {
        let (current, duration, kind) = {
            let state = self.state.lock();
            (
                state.current_time,
                state.duration,
                state.current_media.as_ref().map(|item| item.kind),
            )
        };
        self.ui.update_progress(current, duration, kind);
    }

    /// Wire handler callbacks to this session.
    fn bind_callbacks(self: &Arc<Self>, handler: &Arc<dyn MediaHandler>, session: u64, kind: MediaKind) {
        let weak = Arc::downgrade(self);
        handler.on_time_update(Arc::new(move |update: TimeUpdate| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.is_current(session) {
                return;
            }
            let duration = sanitize_duration(update.duration);
            {
                let mut state = inner.state.lock();
                state.current_time = update.current_time;
                state.duration = duration;
            }
            inner.ui.update_progress(update.current_time, duration, Some(kind));
        }));

        let weak = Arc::downgrade(self);
        handler.on_ended(Arc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.is_current(session) {
                return;
            }
            if let Some(handler) = inner.active_handler() {
                handler.pause();
            }
            let media_id = {
                let mut state = inner.state.lock();
                state.is_playing = false;
                state.media_id().map(str::to_string)
            };
            if let Some(media_id) = media_id {
                info!(media_id = %media_id, "Playback completed");
                inner.emit(PlaybackEvent::Completed { media_id });
            }
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move { inner.save_now("ended").await });
            }
        }));

        let weak = Arc::downgrade(self);
        handler.on_error(Arc::new(move |error: MediaPlayerError| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_error(session, error);
            }
        }));

        if let Some(pip) = handler.as_picture_in_picture() {
            let weak = Arc::downgrade(self);
            pip.on_picture_in_picture_change(Arc::new(move |active: bool| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_current(session) {
                    return;
                }
                let command = if active {
                    ViewCommand::EnterPictureInPicture
                } else {
                    ViewCommand::ExitPictureInPicture
                };
                inner.ui.transition(command);
            }));
        }
    }

    /// A peer saved a newer state. Applied only to the loaded item and
    /// only while it is idle.
    fn apply_remote_state(&self, remote: PlaybackState) {
        let applicable = {
            let state = self.state.lock();
            state.media_id() == Some(remote.media_id.as_str())
                && !state.is_playing
                && !state.is_loading
        };
        if !applicable {
            debug!(media_id = %remote.media_id, "Remote state not applied while busy");
            return;
        }
        let Some(handler) = self.active_handler() else {
            return;
        };

        let volume = clamp_volume(remote.volume);
        let rate = clamp_playback_rate(remote.playback_rate);
        handler.seek(remote.current_time);
        handler.set_volume(volume);
        handler.set_playback_rate(rate);
        let current = handler.current_time();

        {
            let mut state = self.state.lock();
            state.current_time = current;
            state.volume = volume;
            state.playback_rate = rate;
        }
        self.refresh_progress();
        info!(media_id = %remote.media_id, position = current, "Applied remote playback state");
    }

    async fn exit_picture_in_picture(&self, session: u64) -> Result<()> {
        let Some(handler) = self.active_handler() else {
            return Ok(());
        };
        if let Some(pip) = handler.as_picture_in_picture() {
            if pip.is_picture_in_picture() {
                pip.disable_picture_in_picture()
                    .await
                    .map_err(|e| self.fail(session, e))?;
            }
        }
        Ok(())
    }

    async fn close(&self) {
        let (_session, previous) = self.retire_session();
        let _guard = self.op_lock.lock().await;

        self.save_snapshot(previous, "close").await;

        let media_id = {
            let mut state = self.state.lock();
            let media_id = state.media_id().map(str::to_string);
            let (volume, rate) = (state.volume, state.playback_rate);
            *state = MediaState::new(volume, rate);
            media_id
        };
        *self.last_error.lock() = None;
        self.state_manager.set_active_media(None);
        self.ui.reset();
        self.ui.hide();

        info!(media_id = ?media_id, "Player closed");
        self.emit(PlaybackEvent::Closed { media_id });
    }
}

/// Unified player over audio, video and paginated documents.
pub struct MediaPlayer {
    inner: Arc<PlayerInner>,
}

impl MediaPlayer {
    /// Build a player with the audio, video and ebook handlers.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let resources = Arc::new(ResourceManager::new());
        let pool = Arc::new(
            ElementPool::new(
                Arc::clone(&config.media_platform),
                config.settings.element_pool_size,
            )
            .with_resources(Arc::clone(&resources)),
        );
        let handlers: Vec<Arc<dyn MediaHandler>> = vec![
            Arc::new(AudioHandler::new(Arc::clone(&pool), &config.settings)),
            Arc::new(VideoHandler::new(
                Arc::clone(&config.media_platform),
                Arc::clone(&pool),
                &config.settings,
            )),
            Arc::new(
                EbookHandler::new(Arc::clone(&config.media_platform), &config.settings)
                    .with_resources(Arc::clone(&resources)),
            ),
        ];
        Self::assemble(config, resources, pool, handlers)
    }

    /// Build a player over a custom handler set. The first handler that
    /// accepts an item's kind plays it.
    pub fn with_handlers(config: CoreConfig, handlers: Vec<Arc<dyn MediaHandler>>) -> Result<Self> {
        let resources = Arc::new(ResourceManager::new());
        let pool = Arc::new(
            ElementPool::new(
                Arc::clone(&config.media_platform),
                config.settings.element_pool_size,
            )
            .with_resources(Arc::clone(&resources)),
        );
        Self::assemble(config, resources, pool, handlers)
    }

    fn assemble(
        config: CoreConfig,
        resources: Arc<ResourceManager>,
        pool: Arc<ElementPool>,
        handlers: Vec<Arc<dyn MediaHandler>>,
    ) -> Result<Self> {
        config.settings.validate()?;
        let sync_enabled = config.sync_enabled();
        let CoreConfig {
            container,
            record_store,
            broadcast,
            clock,
            event_bus,
            settings,
            ..
        } = config;

        let persistence = PlaybackPersistence::new(record_store, Arc::clone(&clock));
        let sync = broadcast.filter(|_| sync_enabled).map(|factory| {
            StateSynchronization::open(factory.as_ref(), &settings.sync_channel_name, clock)
        });
        let state_manager = PlaybackStateManager::new(persistence, sync, event_bus.clone())
            .with_resources(Arc::clone(&resources));
        let ui = MediaUiController::new(Arc::clone(&container), &settings, event_bus.clone());

        let inner = Arc::new(PlayerInner {
            state: Mutex::new(MediaState::new(
                settings.default_volume,
                settings.default_playback_rate,
            )),
            settings,
            container,
            handlers,
            state_manager,
            ui,
            resources,
            pool,
            event_bus,
            active: RwLock::new(None),
            op_lock: tokio::sync::Mutex::new(()),
            session: AtomicU64::new(0),
            last_error: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let weak: Weak<PlayerInner> = Arc::downgrade(&inner);
        inner
            .state_manager
            .on_remote_state(Arc::new(move |remote: PlaybackState| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_remote_state(remote);
                }
            }));

        info!(
            handlers = inner.handlers.len(),
            sync = inner.state_manager.sync_available(),
            "Media player ready"
        );
        Ok(Self { inner })
    }

    /// Load `item`, replacing whatever was loaded or loading.
    ///
    /// The previous item's position is saved first. After the handler
    /// reports ready, a saved state for `item` is restored.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Superseded`] when another `load` or `close`
    ///   started before this one finished
    /// - [`PlaybackError::Media`] with `UNSUPPORTED_FORMAT` when no handler
    ///   accepts the kind, or `LOAD_FAILED` when the source cannot load
    #[instrument(skip(self, item), fields(media_id = %item.id, kind = %item.kind))]
    pub async fn load(&self, item: MediaItem) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;

        let (session, previous) = inner.retire_session();
        let _guard = inner.op_lock.lock().await;
        inner.check_session(session)?;

        {
            let mut state = inner.state.lock();
            state.is_loading = true;
            state.is_playing = false;
            state.current_media = None;
            state.current_time = 0.0;
            state.duration = 0.0;
            state.error = None;
        }
        inner.ui.set_loading(true);
        inner.ui.update_progress(0.0, 0.0, Some(item.kind));

        inner.save_snapshot(previous, "media switch").await;
        inner.check_session(session)?;

        let Some(handler) = inner
            .handlers
            .iter()
            .find(|handler| handler.can_handle(item.kind))
            .cloned()
        else {
            let error = MediaPlayerError::unsupported(format!("No handler for {} media", item.kind))
                .with_severity(ErrorSeverity::High)
                .with_context("mediaId", &item.id);
            return Err(inner.fail(session, error.into()));
        };
        debug!(handler = handler.name(), "Handler selected");

        *inner.active.write() = Some(Arc::clone(&handler));
        let disposable = Arc::clone(&handler);
        let resource_kind = match item.kind {
            MediaKind::Ebook => ResourceKind::DocumentFrame,
            MediaKind::Audio | MediaKind::Video => ResourceKind::MediaElement,
        };
        inner.resources.register(ACTIVE_HANDLER, resource_kind, move || {
            disposable.stop();
            disposable.cleanup();
            Ok(())
        });

        handler
            .initialize(Arc::clone(&inner.container))
            .map_err(|e| inner.fail(session, e))?;
        inner.bind_callbacks(&handler, session, item.kind);
        inner.state_manager.set_active_media(Some(item.id.clone()));

        handler.load(&item).await.map_err(|e| inner.fail(session, e))?;
        inner.check_session(session)?;

        let saved = match inner.state_manager.load_state(&item.id).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to read saved state: {}", e);
                None
            }
        };
        inner.check_session(session)?;

        let (volume, rate, resumed) = match &saved {
            Some(saved) => {
                handler.seek(saved.current_time);
                (
                    clamp_volume(saved.volume),
                    clamp_playback_rate(saved.playback_rate),
                    saved.current_time > 0.0,
                )
            }
            None => {
                let state = inner.state.lock();
                (state.volume, state.playback_rate, false)
            }
        };
        handler.set_volume(volume);
        handler.set_playback_rate(rate);

        let current_time = handler.current_time();
        let duration = handler.duration();
        {
            let mut state = inner.state.lock();
            state.current_media = Some(item.clone());
            state.is_loading = false;
            state.is_playing = false;
            state.current_time = current_time;
            state.duration = duration;
            state.volume = volume;
            state.playback_rate = rate;
            state.error = None;
        }
        *inner.last_error.lock() = None;

        inner.ui.set_loading(false);
        inner.ui.show_error(None);
        inner.ui.show();
        inner.ui.update_progress(current_time, duration, Some(item.kind));

        let weak = Arc::downgrade(inner);
        inner.state_manager.start_auto_save(
            Arc::new(move || weak.upgrade().and_then(|inner| inner.snapshot())),
            inner.settings.auto_save_interval(),
        );

        info!(duration, resumed, "Media loaded");
        inner.emit(PlaybackEvent::Loaded {
            media_id: item.id,
            kind: item.kind.as_str().to_string(),
            duration,
            resumed,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        let _guard = inner.op_lock.lock().await;
        let session = inner.current_session();
        let (handler, media_id) = inner.require_loaded(session)?;

        handler.play().await.map_err(|e| inner.fail(session, e))?;

        let position = handler.current_time();
        {
            let mut state = inner.state.lock();
            state.is_playing = true;
            state.current_time = position;
        }
        inner.emit(PlaybackEvent::Started { media_id, position });
        Ok(())
    }

    /// Pause and save. A no-op when nothing is loaded.
    pub async fn pause(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        let _guard = inner.op_lock.lock().await;
        let Some((handler, media_id)) = inner.loaded() else {
            return Ok(());
        };

        handler.pause();
        let position = handler.current_time();
        {
            let mut state = inner.state.lock();
            state.is_playing = false;
            state.current_time = position;
        }
        inner.save_now("pause").await;
        inner.emit(PlaybackEvent::Paused { media_id, position });
        Ok(())
    }

    /// Stop, rewind to the start and save.
    pub async fn stop(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        let _guard = inner.op_lock.lock().await;
        let Some((handler, media_id)) = inner.loaded() else {
            return Ok(());
        };

        handler.stop();
        let position = handler.current_time();
        {
            let mut state = inner.state.lock();
            state.is_playing = false;
            state.current_time = position;
        }
        inner.refresh_progress();
        inner.save_now("stop").await;
        inner.emit(PlaybackEvent::Stopped { media_id });
        Ok(())
    }

    /// Seek to `position`: seconds for audio and video, a 0-1 ratio for
    /// documents. Out-of-range positions are clamped by the handler.
    pub async fn seek(&self, position: f64) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        let _guard = inner.op_lock.lock().await;
        let Some((handler, media_id)) = inner.loaded() else {
            return Ok(());
        };

        handler.seek(position);
        let position = handler.current_time();
        inner.state.lock().current_time = position;
        inner.refresh_progress();
        inner.save_now("seek").await;
        inner.emit(PlaybackEvent::Seeked { media_id, position });
        Ok(())
    }

    /// Clamped to `[0, 1]`. Applies to later loads when nothing is loaded.
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.inner.ensure_usable()?;
        let volume = clamp_volume(volume);
        if let Some(handler) = self.inner.active_handler() {
            handler.set_volume(volume);
        }
        self.inner.state.lock().volume = volume;
        Ok(())
    }

    /// Clamped to `[0.25, 2.0]`.
    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.inner.ensure_usable()?;
        let rate = clamp_playback_rate(rate);
        if let Some(handler) = self.inner.active_handler() {
            handler.set_playback_rate(rate);
        }
        self.inner.state.lock().playback_rate = rate;
        Ok(())
    }

    /// Switch to the mini player, leaving picture-in-picture first.
    /// Ignored when the mini player is disabled.
    pub async fn minimize(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        if !inner.settings.enable_mini_player {
            debug!("Mini player disabled");
            return Ok(());
        }
        if inner.ui.is_picture_in_picture() {
            inner.exit_picture_in_picture(inner.current_session()).await?;
        }
        inner.ui.transition(ViewCommand::Minimize);
        Ok(())
    }

    pub async fn maximize(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        if inner.ui.is_picture_in_picture() {
            inner.exit_picture_in_picture(inner.current_session()).await?;
        }
        inner.ui.transition(ViewCommand::Maximize);
        Ok(())
    }

    /// Enter or leave picture-in-picture. Only video supports it, and only
    /// when enabled in the settings.
    pub async fn toggle_picture_in_picture(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        let session = inner.current_session();

        if !inner.settings.enable_picture_in_picture {
            let error = MediaPlayerError::unsupported("Picture-in-picture is disabled");
            return Err(inner.fail(session, error.into()));
        }
        let (handler, media_id) = inner.require_loaded(session)?;
        let Some(pip) = handler.as_picture_in_picture() else {
            let error = MediaPlayerError::unsupported(format!(
                "Picture-in-picture is not available for {}",
                handler.name()
            ))
            .with_context("mediaId", &media_id);
            return Err(inner.fail(session, error.into()));
        };

        if pip.is_picture_in_picture() {
            pip.disable_picture_in_picture()
                .await
                .map_err(|e| inner.fail(session, e))?;
            inner.ui.transition(ViewCommand::ExitPictureInPicture);
        } else {
            pip.enable_picture_in_picture()
                .await
                .map_err(|e| inner.fail(session, e))?;
            inner.ui.transition(ViewCommand::EnterPictureInPicture);
        }
        Ok(())
    }

    /// Save, release the active handler and hide the view.
    pub async fn close(&self) -> Result<()> {
        self.inner.ensure_usable()?;
        self.inner.close().await;
        Ok(())
    }

    /// Snapshot of the aggregate state.
    pub fn get_state(&self) -> MediaState {
        let mut state = self.inner.state.lock().clone();
        let mode = self.inner.ui.mode();
        state.is_minimized = mode == ViewMode::Mini;
        state.is_picture_in_picture = mode == ViewMode::PictureInPicture;
        state
    }

    pub fn view_mode(&self) -> ViewMode {
        self.inner.ui.mode()
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.inner.event_bus.as_ref()
    }

    pub fn resource_stats(&self) -> ResourceStats {
        self.inner.resources.stats()
    }

    /// Dispose tracked resources older than `max_age`, such as elements
    /// idling in the pool. The active handler and its timers are never
    /// swept.
    pub fn sweep_stale_resources(&self, max_age: Duration) -> usize {
        self.inner
            .resources
            .sweep_older_than_except(max_age, &SESSION_RESOURCES)
    }

    async fn turn_page(&self, turn: impl FnOnce(&dyn PageNavigator) -> bool) -> Result<bool> {
        let inner = &self.inner;
        inner.ensure_usable()?;
        let Some((handler, _)) = inner.loaded() else {
            return Ok(false);
        };
        let Some(navigator) = handler.as_paginated() else {
            return Ok(false);
        };
        let moved = turn(navigator);
        if moved {
            inner.save_now("page turn").await;
        }
        Ok(moved)
    }

    /// Returns `false` when already on the last page or the item has no
    /// pages.
    pub async fn next_page(&self) -> Result<bool> {
        self.turn_page(|navigator| navigator.next_page()).await
    }

    pub async fn previous_page(&self) -> Result<bool> {
        self.turn_page(|navigator| navigator.previous_page()).await
    }

    /// Zero-based. Out-of-range pages are ignored.
    pub async fn go_to_page(&self, page: u32) -> Result<bool> {
        self.turn_page(|navigator| navigator.go_to_page(page)).await
    }

    pub fn page_info(&self) -> Option<PageInfo> {
        let handler = self.inner.active_handler()?;
        handler.as_paginated().map(|navigator| navigator.page_info())
    }

    /// Save immediately when the host hides the player.
    pub async fn handle_visibility_change(&self, hidden: bool) {
        if hidden && !self.inner.disposed.load(Ordering::SeqCst) {
            self.inner.save_now("hidden").await;
        }
    }

    pub async fn export_saved_states(&self) -> Result<String> {
        self.inner.state_manager.persistence().export_json().await
    }

    pub async fn import_saved_states(&self, document: &str) -> Result<ImportSummary> {
        self.inner
            .state_manager
            .persistence()
            .import_json(document)
            .await
    }

    pub async fn clear_saved_state(&self, media_id: &str) -> Result<bool> {
        self.inner.state_manager.clear_state(media_id).await
    }

    /// Delete saved states untouched for `days` days.
    pub async fn sweep_saved_states(&self, days: u32) -> Result<usize> {
        self.inner
            .state_manager
            .persistence()
            .sweep_older_than(days)
            .await
    }

    /// Close, then dispose every handler, the UI, the state manager and all
    /// tracked resources. Later calls do nothing.
    pub async fn cleanup(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.close().await;
        for handler in &inner.handlers {
            handler.cleanup();
        }
        inner.ui.cleanup();
        inner.state_manager.cleanup();
        inner.resources.cleanup();
        inner.pool.clear();
        info!("Media player cleaned up");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Media player dropped without cleanup");
        self.inner.begin_session();
        self.inner.state_manager.cleanup();
        self.inner.resources.cleanup();
        for handler in &self.inner.handlers {
            handler.cleanup();
        }
        self.inner.pool.clear();
    }
}

impl std::fmt::Debug for MediaPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("state", &*self.inner.state.lock())
            .field("view_mode", &self.inner.ui.mode())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
