//! Invariants that hold for any input.

use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform, MemoryRecordStore};
use bridge_traits::{ElementKind, PresentationContainer, SystemClock};
use core_playback::{
    MediaItem, MediaPlayer, PlaybackPersistence, PlaybackState, PlaybackStateManager,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::{CoreConfig, PlayerSettings};
use std::sync::Arc;

fn player_on(platform: Arc<HeadlessMediaPlatform>, container: Arc<HeadlessContainer>) -> MediaPlayer {
    player_with(platform, container, None)
}

fn player_with(
    platform: Arc<HeadlessMediaPlatform>,
    container: Arc<HeadlessContainer>,
    bus: Option<EventBus>,
) -> MediaPlayer {
    let mut builder = CoreConfig::builder()
        .media_platform(platform)
        .container(container)
        .record_store(Arc::new(MemoryRecordStore::new()))
        .settings(PlayerSettings {
            enable_cross_instance_sync: false,
            ..PlayerSettings::default()
        });
    if let Some(bus) = bus {
        builder = builder.event_bus(bus);
    }
    MediaPlayer::new(builder.build().unwrap()).unwrap()
}

fn player() -> MediaPlayer {
    player_on(
        Arc::new(HeadlessMediaPlatform::new()),
        Arc::new(HeadlessContainer::new()),
    )
}

const VOLUME_INPUTS: [f64; 9] = [
    -10.0,
    -0.5,
    0.0,
    0.3,
    1.0,
    1.7,
    f64::INFINITY,
    f64::NEG_INFINITY,
    f64::NAN,
];

#[tokio::test]
async fn volume_is_always_within_unit_range() {
    let player = player();
    player.load(MediaItem::audio("a", "a.mp3")).await.unwrap();

    for input in VOLUME_INPUTS {
        player.set_volume(input).unwrap();
        let volume = player.get_state().volume;
        assert!((0.0..=1.0).contains(&volume), "{input} -> {volume}");
        if input.is_finite() {
            assert_eq!(volume, input.clamp(0.0, 1.0));
        }
    }
}

#[tokio::test]
async fn playback_rate_is_always_within_bounds() {
    let player = player();

    for input in [-1.0, 0.0, 0.1, 0.25, 1.0, 1.75, 2.0, 8.0, f64::NAN] {
        player.set_playback_rate(input).unwrap();
        let rate = player.get_state().playback_rate;
        assert!((0.25..=2.0).contains(&rate), "{input} -> {rate}");
        if input.is_finite() {
            assert_eq!(rate, input.clamp(0.25, 2.0));
        }
    }
}

#[tokio::test]
async fn unusable_durations_are_exposed_as_zero() {
    let platform = Arc::new(HeadlessMediaPlatform::new());
    platform.set_duration("nan.mp4", f64::NAN);
    platform.set_duration("live.mp4", f64::INFINITY);
    platform.set_duration("negative.mp4", -5.0);
    let player = player_on(platform.clone(), Arc::new(HeadlessContainer::new()));

    for source in ["nan.mp4", "live.mp4", "negative.mp4"] {
        player.load(MediaItem::video(source, source)).await.unwrap();
        assert_eq!(player.get_state().duration, 0.0, "{source}");

        player.play().await.unwrap();
        platform
            .last_element(ElementKind::Video)
            .unwrap()
            .advance(3.0);
        assert_eq!(player.get_state().duration, 0.0, "{source} after progress");
    }
}

#[tokio::test]
async fn cleanup_twice_leaves_nothing_behind() {
    let platform = Arc::new(HeadlessMediaPlatform::new());
    let container = Arc::new(HeadlessContainer::new());
    let player = player_on(platform.clone(), container.clone());

    player.load(MediaItem::video("v", "v.mp4")).await.unwrap();
    player.play().await.unwrap();
    player.cleanup().await;
    player.cleanup().await;

    assert!(container.attached().is_empty());
    assert_eq!(player.resource_stats().total, 0);
    for element in platform.elements() {
        assert_eq!(element.listener_count(), 0);
    }
}

#[tokio::test]
async fn saved_state_round_trips() {
    let store = Arc::new(MemoryRecordStore::new());
    let manager = PlaybackStateManager::new(
        PlaybackPersistence::new(store, Arc::new(SystemClock)),
        None,
        None,
    );
    let original = PlaybackState {
        current_time: 73.25,
        duration: 300.0,
        volume: 0.6,
        playback_rate: 1.25,
        is_playing: true,
        ..PlaybackState::new("round-trip")
    };

    manager.save_state(original.clone()).await.unwrap();
    let loaded = manager.load_state("round-trip").await.unwrap().unwrap();

    assert_eq!(
        PlaybackState {
            last_updated: original.last_updated,
            ..loaded
        },
        original
    );
}

#[test]
fn last_write_wins_regardless_of_arrival_order() {
    let build = || {
        PlaybackStateManager::new(
            PlaybackPersistence::new(Arc::new(MemoryRecordStore::new()), Arc::new(SystemClock)),
            None,
            None,
        )
    };
    let t1 = PlaybackState {
        current_time: 10.0,
        last_updated: 1_000,
        ..PlaybackState::new("m")
    };
    let t2 = PlaybackState {
        current_time: 20.0,
        last_updated: 2_000,
        ..PlaybackState::new("m")
    };

    let in_order = build();
    in_order.apply_remote(t1.clone());
    in_order.apply_remote(t2.clone());

    let reversed = build();
    reversed.apply_remote(t2.clone());
    reversed.apply_remote(t1);

    assert_eq!(in_order.current_state("m"), Some(t2.clone()));
    assert_eq!(reversed.current_state("m"), Some(t2));
}

#[tokio::test]
async fn minimized_and_picture_in_picture_are_exclusive() {
    let player = player();
    player.load(MediaItem::video("v", "v.mp4")).await.unwrap();

    let check = |player: &MediaPlayer| {
        let state = player.get_state();
        assert!(!(state.is_minimized && state.is_picture_in_picture));
    };

    check(&player);
    player.minimize().await.unwrap();
    check(&player);
    player.toggle_picture_in_picture().await.unwrap();
    check(&player);
    player.minimize().await.unwrap();
    check(&player);
    assert!(player.get_state().is_minimized);
    player.toggle_picture_in_picture().await.unwrap();
    check(&player);
    player.maximize().await.unwrap();
    check(&player);
    player.close().await.unwrap();
    check(&player);
}

#[tokio::test]
async fn page_navigation_is_bounds_checked() {
    let platform = Arc::new(HeadlessMediaPlatform::new());
    platform.set_page_count("book.html", 4);
    let bus = EventBus::new(64);
    let mut completed = bus
        .stream()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Completed { .. })));
    let player = player_with(platform, Arc::new(HeadlessContainer::new()), Some(bus));
    player.load(MediaItem::ebook("book", "book.html")).await.unwrap();

    assert!(!player.go_to_page(4).await.unwrap());
    assert!(!player.go_to_page(u32::MAX).await.unwrap());
    assert!(!player.previous_page().await.unwrap());
    assert_eq!(player.page_info().unwrap().current_page, 0);

    assert!(player.go_to_page(3).await.unwrap());
    assert_eq!(completed.drain().len(), 1);
    assert!(!player.next_page().await.unwrap());
    assert!(completed.drain().is_empty());
    assert_eq!(player.get_state().current_time, 0.75);
}
