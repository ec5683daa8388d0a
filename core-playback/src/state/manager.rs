//! Save/load/auto-save policy over persistence and synchronization.

use super::persistence::PlaybackPersistence;
use super::sync::{RemoteStateCallback, StateSynchronization};
use crate::error::Result;
use crate::resources::ResourceManager;
use crate::types::PlaybackState;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Produces the state auto-save should consider, or `None` when there is
/// nothing to save.
pub type StateSource = Arc<dyn Fn() -> Option<PlaybackState> + Send + Sync>;

/// Resource name of the auto-save task.
pub const AUTO_SAVE_TIMER: &str = "auto-save";

struct ManagerInner {
    persistence: PlaybackPersistence,
    sync: Option<StateSynchronization>,
    event_bus: Option<EventBus>,
    /// Newest state known per media id, local or remote.
    known: Mutex<HashMap<String, PlaybackState>>,
    active_media: RwLock<Option<String>>,
    remote_listener: RwLock<Option<RemoteStateCallback>>,
    last_saved: Mutex<Option<PlaybackState>>,
}

impl ManagerInner {
    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Sync(event));
        }
    }

    async fn save(&self, state: PlaybackState) -> Result<PlaybackState> {
        let saved = self.persistence.save(&state).await?;

        self.known
            .lock()
            .insert(saved.media_id.clone(), saved.clone());
        *self.last_saved.lock() = Some(saved.clone());

        if let Some(sync) = &self.sync {
            sync.broadcast_state(&saved);
        }
        self.emit(SyncEvent::StateSaved {
            media_id: saved.media_id.clone(),
            position: saved.current_time,
        });
        Ok(saved)
    }

    fn should_save(&self, candidate: &PlaybackState) -> bool {
        match self.last_saved.lock().as_ref() {
            Some(previous) => previous.differs_meaningfully(candidate),
            None => true,
        }
    }

    /// Last-write-wins: accept when nothing is known or strictly newer.
    fn apply_remote(&self, state: PlaybackState) -> bool {
        {
            let mut known = self.known.lock();
            if let Some(current) = known.get(&state.media_id) {
                if state.last_updated <= current.last_updated {
                    debug!(
                        media_id = %state.media_id,
                        incoming = state.last_updated,
                        current = current.last_updated,
                        "Discarding stale remote state"
                    );
                    return false;
                }
            }
            known.insert(state.media_id.clone(), state.clone());
        }

        let event = SyncEvent::RemoteStateApplied {
            media_id: state.media_id.clone(),
            position: state.current_time,
            last_updated: state.last_updated,
        };

        let is_active = self.active_media.read().as_deref() == Some(state.media_id.as_str());
        if is_active {
            let listener = self.remote_listener.read().clone();
            if let Some(listener) = listener {
                listener(state);
            }
        }
        self.emit(event);
        true
    }
}

/// Composes [`PlaybackPersistence`] and [`StateSynchronization`].
pub struct PlaybackStateManager {
    inner: Arc<ManagerInner>,
    auto_save: Mutex<Option<JoinHandle<()>>>,
    resources: Option<Arc<ResourceManager>>,
}

impl PlaybackStateManager {
    /// `sync` is `None` when cross-instance sync is disabled.
    pub fn new(
        persistence: PlaybackPersistence,
        sync: Option<StateSynchronization>,
        event_bus: Option<EventBus>,
    ) -> Self {
        let inner = Arc::new(ManagerInner {
            persistence,
            sync,
            event_bus,
            known: Mutex::new(HashMap::new()),
            active_media: RwLock::new(None),
            remote_listener: RwLock::new(None),
            last_saved: Mutex::new(None),
        });

        if let Some(sync) = &inner.sync {
            if let Some(reason) = sync.unavailable_reason() {
                inner.emit(SyncEvent::Unavailable {
                    reason: reason.to_string(),
                });
            }

            let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
            sync.on_remote_state(Arc::new(move |state| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_remote(state);
                }
            }));

            let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
            sync.set_state_provider(Arc::new(move |media_id: &str| {
                weak.upgrade()
                    .and_then(|inner| inner.known.lock().get(media_id).cloned())
            }));
        }

        Self {
            inner,
            auto_save: Mutex::new(None),
            resources: None,
        }
    }

    /// Track the auto-save task in `resources`.
    pub fn with_resources(mut self, resources: Arc<ResourceManager>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn persistence(&self) -> &PlaybackPersistence {
        &self.inner.persistence
    }

    pub fn sync_available(&self) -> bool {
        self.inner
            .sync
            .as_ref()
            .map_or(false, StateSynchronization::is_available)
    }

    /// Persist `state`, remember it, and broadcast it when sync is on.
    pub async fn save_state(&self, state: PlaybackState) -> Result<PlaybackState> {
        self.inner.save(state).await
    }

    /// Newest of the persisted and the known state. Peers are asked for
    /// theirs; answers arrive later through the remote-state listener.
    pub async fn load_state(&self, media_id: &str) -> Result<Option<PlaybackState>> {
        let persisted = self.inner.persistence.load(media_id).await?;

        if let Some(sync) = &self.inner.sync {
            sync.request_state(media_id);
        }

        let mut known = self.inner.known.lock();
        let newest = match (persisted, known.get(media_id).cloned()) {
            (Some(persisted), Some(remembered)) => {
                if remembered.last_updated > persisted.last_updated {
                    remembered
                } else {
                    persisted
                }
            }
            (Some(state), None) | (None, Some(state)) => state,
            (None, None) => return Ok(None),
        };
        known.insert(media_id.to_string(), newest.clone());
        Ok(Some(newest))
    }

    /// Apply a state received from another instance. Returns whether it won.
    pub fn apply_remote(&self, state: PlaybackState) -> bool {
        self.inner.apply_remote(state)
    }

    pub fn current_state(&self, media_id: &str) -> Option<PlaybackState> {
        self.inner.known.lock().get(media_id).cloned()
    }

    /// Only remote states for the active media reach the listener.
    pub fn set_active_media(&self, media_id: Option<String>) {
        *self.inner.active_media.write() = media_id;
    }

    pub fn on_remote_state(&self, listener: RemoteStateCallback) {
        *self.inner.remote_listener.write() = Some(listener);
    }

    pub async fn clear_state(&self, media_id: &str) -> Result<bool> {
        let removed = self.inner.persistence.delete(media_id).await?;
        self.inner.known.lock().remove(media_id);
        let mut last_saved = self.inner.last_saved.lock();
        if last_saved.as_ref().map(|state| state.media_id.as_str()) == Some(media_id) {
            *last_saved = None;
        }
        Ok(removed)
    }

    /// Poll `source` every `interval` and save when the state moved
    /// meaningfully since the last save. Replaces a running loop.
    pub fn start_auto_save(&self, source: StateSource, interval: Duration) {
        self.stop_auto_save();

        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let Some(candidate) = source() else {
                    continue;
                };
                if !inner.should_save(&candidate) {
                    continue;
                }
                if let Err(e) = inner.save(candidate).await {
                    warn!("Auto-save failed: {}", e);
                }
            }
        });

        if let Some(resources) = &self.resources {
            resources.register_timer(AUTO_SAVE_TIMER, task.abort_handle());
        }
        *self.auto_save.lock() = Some(task);
        debug!(interval_ms = interval.as_millis() as u64, "Auto-save started");
    }

    pub fn stop_auto_save(&self) {
        let task = self.auto_save.lock().take();
        if let Some(task) = task {
            task.abort();
            if let Some(resources) = &self.resources {
                resources.forget(AUTO_SAVE_TIMER);
            }
            debug!("Auto-save stopped");
        }
    }

    pub fn is_auto_saving(&self) -> bool {
        self.auto_save.lock().is_some()
    }

    pub fn cleanup(&self) {
        self.stop_auto_save();
        *self.inner.remote_listener.write() = None;
        *self.inner.active_media.write() = None;
        if let Some(sync) = &self.inner.sync {
            sync.close();
        }
        info!("Playback state manager cleaned up");
    }
}

impl Drop for PlaybackStateManager {
    fn drop(&mut self) {
        self.stop_auto_save();
    }
}

impl std::fmt::Debug for PlaybackStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackStateManager")
            .field("known_states", &self.inner.known.lock().len())
            .field("sync", &self.inner.sync)
            .field("auto_saving", &self.is_auto_saving())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{LocalBroadcastHub, MemoryRecordStore};
    use bridge_traits::{RecordStore, SystemClock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> (PlaybackStateManager, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        let persistence = PlaybackPersistence::new(store.clone(), Arc::new(SystemClock));
        (PlaybackStateManager::new(persistence, None, None), store)
    }

    fn state(media_id: &str, time: f64, stamp: i64) -> PlaybackState {
        PlaybackState {
            current_time: time,
            duration: 100.0,
            last_updated: stamp,
            ..PlaybackState::new(media_id)
        }
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let (manager, _) = manager();
        let original = state("m", 17.0, 0);

        manager.save_state(original.clone()).await.unwrap();
        let loaded = manager.load_state("m").await.unwrap().unwrap();

        assert_eq!(
            PlaybackState {
                last_updated: 0,
                ..loaded
            },
            original
        );
    }

    #[test]
    fn test_last_write_wins_in_either_order() {
        let older = state("m", 10.0, 1_000);
        let newer = state("m", 20.0, 2_000);

        let (forward, _) = manager();
        assert!(forward.apply_remote(older.clone()));
        assert!(forward.apply_remote(newer.clone()));
        assert_eq!(forward.current_state("m"), Some(newer.clone()));

        let (reverse, _) = manager();
        assert!(reverse.apply_remote(newer.clone()));
        assert!(!reverse.apply_remote(older));
        assert_eq!(reverse.current_state("m"), Some(newer));
    }

    #[test]
    fn test_equal_stamp_is_not_newer() {
        let (manager, _) = manager();
        assert!(manager.apply_remote(state("m", 1.0, 500)));
        assert!(!manager.apply_remote(state("m", 2.0, 500)));
        assert_eq!(manager.current_state("m").unwrap().current_time, 1.0);
    }

    #[test]
    fn test_remote_listener_only_for_active_media() {
        let (manager, _) = manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        manager.on_remote_state(Arc::new(move |_: PlaybackState| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        manager.apply_remote(state("other", 1.0, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        manager.set_active_media(Some("mine".into()));
        manager.apply_remote(state("mine", 1.0, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_prefers_newer_remote_state() {
        let (manager, _) = manager();
        let saved = manager.save_state(state("m", 5.0, 0)).await.unwrap();
        manager.apply_remote(state("m", 50.0, saved.last_updated + 10));

        let loaded = manager.load_state("m").await.unwrap().unwrap();
        assert_eq!(loaded.current_time, 50.0);
    }

    #[tokio::test]
    async fn test_clear_state() {
        let (manager, store) = manager();
        manager.save_state(state("m", 5.0, 0)).await.unwrap();

        assert!(manager.clear_state("m").await.unwrap());
        assert!(manager.current_state("m").is_none());
        assert!(store.get("m").await.unwrap().is_none());
        assert!(!manager.clear_state("m").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_save_skips_unchanged_states() {
        let (manager, store) = manager();
        let position = Arc::new(parking_lot::Mutex::new(0.0_f64));

        let source_position = position.clone();
        manager.start_auto_save(
            Arc::new(move || Some(state("m", *source_position.lock(), 0))),
            Duration::from_secs(5),
        );
        assert!(manager.is_auto_saving());

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let first = store.get("m").await.unwrap().unwrap().updated_at;

        // 0.5s of movement is below the threshold
        *position.lock() = 0.5;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("m").await.unwrap().unwrap().updated_at, first);

        *position.lock() = 3.0;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let saved = manager.current_state("m").unwrap();
        assert_eq!(saved.current_time, 3.0);

        manager.stop_auto_save();
        manager.stop_auto_save();
        assert!(!manager.is_auto_saving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_save_task_is_tracked_as_timer() {
        let (manager, store) = manager();
        let resources = Arc::new(ResourceManager::new());
        let manager = manager.with_resources(Arc::clone(&resources));

        manager.start_auto_save(
            Arc::new(|| Some(state("m", 1.0, 0))),
            Duration::from_secs(5),
        );
        assert_eq!(resources.stats().timers, 1);
        assert!(resources.contains(AUTO_SAVE_TIMER));

        // disposing the resource ends the loop
        resources.cleanup();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(store.get("m").await.unwrap().is_none());

        manager.stop_auto_save();
        assert!(resources.is_empty());
    }

    #[tokio::test]
    async fn test_sync_between_managers() {
        let hub = LocalBroadcastHub::new();
        let clock = Arc::new(SystemClock);
        let store = Arc::new(MemoryRecordStore::new());

        let build = || {
            PlaybackStateManager::new(
                PlaybackPersistence::new(store.clone(), clock.clone()),
                Some(StateSynchronization::open(&hub, "sync-test", clock.clone())),
                None,
            )
        };
        let sender = build();
        let receiver = build();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        receiver.set_active_media(Some("shared".into()));
        receiver.on_remote_state(Arc::new(move |state| {
            let _ = tx.send(state);
        }));

        sender.save_state(state("shared", 42.0, 0)).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.current_time, 42.0);
        assert_eq!(receiver.current_state("shared").unwrap().current_time, 42.0);
    }
}
