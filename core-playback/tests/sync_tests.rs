//! Two players in one process, kept consistent over a shared channel.

use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform, LocalBroadcastHub, MemoryRecordStore};
use bridge_traits::RecordStore;
use core_playback::{MediaItem, MediaPlayer};
use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
use core_runtime::{CoreConfig, PlayerSettings};
use std::sync::Arc;
use std::time::Duration;

struct Instance {
    player: MediaPlayer,
    sync_events: EventStream,
}

fn instance(hub: &Arc<LocalBroadcastHub>, store: Arc<dyn RecordStore>) -> Instance {
    let platform = Arc::new(HeadlessMediaPlatform::new());
    platform.set_default_duration(300.0);
    let bus = EventBus::new(64);
    let sync_events = bus
        .stream()
        .filter(|event| matches!(event, CoreEvent::Sync(SyncEvent::RemoteStateApplied { .. })));

    let config = CoreConfig::builder()
        .media_platform(platform)
        .container(Arc::new(HeadlessContainer::new()))
        .record_store(store)
        .broadcast(hub.clone())
        .event_bus(bus)
        .settings(PlayerSettings {
            sync_channel_name: "sync-tests".to_string(),
            ..PlayerSettings::default()
        })
        .build()
        .unwrap();

    Instance {
        player: MediaPlayer::new(config).unwrap(),
        sync_events,
    }
}

async fn next_remote_apply(events: &mut EventStream) {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("remote state within timeout")
        .expect("event bus open");
}

#[tokio::test]
async fn idle_peer_follows_saved_position() {
    let hub = Arc::new(LocalBroadcastHub::new());
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let first = instance(&hub, store.clone());
    let mut second = instance(&hub, store);

    first.player.load(MediaItem::audio("shared", "shared.mp3")).await.unwrap();
    second.player.load(MediaItem::audio("shared", "shared.mp3")).await.unwrap();

    first.player.seek(45.0).await.unwrap();
    next_remote_apply(&mut second.sync_events).await;

    assert_eq!(second.player.get_state().current_time, 45.0);
}

#[tokio::test]
async fn playing_peer_keeps_its_own_position() {
    let hub = Arc::new(LocalBroadcastHub::new());
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let first = instance(&hub, store.clone());
    let mut second = instance(&hub, store);

    first.player.load(MediaItem::audio("shared", "shared.mp3")).await.unwrap();
    second.player.load(MediaItem::audio("shared", "shared.mp3")).await.unwrap();
    second.player.play().await.unwrap();

    first.player.seek(80.0).await.unwrap();
    next_remote_apply(&mut second.sync_events).await;

    let state = second.player.get_state();
    assert!(state.is_playing);
    assert_eq!(state.current_time, 0.0);
}

#[tokio::test]
async fn other_media_is_not_touched() {
    let hub = Arc::new(LocalBroadcastHub::new());
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let first = instance(&hub, store.clone());
    let mut second = instance(&hub, store);

    first.player.load(MediaItem::audio("one", "one.mp3")).await.unwrap();
    second.player.load(MediaItem::audio("two", "two.mp3")).await.unwrap();

    first.player.seek(12.0).await.unwrap();
    next_remote_apply(&mut second.sync_events).await;

    let state = second.player.get_state();
    assert_eq!(state.media_id(), Some("two"));
    assert_eq!(state.current_time, 0.0);
}

#[tokio::test]
async fn newly_loaded_peer_asks_for_state() {
    let hub = Arc::new(LocalBroadcastHub::new());
    let first = instance(&hub, Arc::new(MemoryRecordStore::new()));
    first.player.load(MediaItem::audio("shared", "shared.mp3")).await.unwrap();
    first.player.seek(30.0).await.unwrap();

    // joins after the change was broadcast, with no saved state of its own
    let mut second = instance(&hub, Arc::new(MemoryRecordStore::new()));
    second.player.load(MediaItem::audio("shared", "shared.mp3")).await.unwrap();
    next_remote_apply(&mut second.sync_events).await;

    assert_eq!(second.player.get_state().current_time, 30.0);
}
