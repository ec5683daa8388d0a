//! # Playback Engine Demo
//!
//! Drives the player through a video, a document and a failing source on
//! the headless platform, printing the aggregate state along the way.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use anyhow::Result;
use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform, MemoryRecordStore};
use bridge_traits::ElementKind;
use core_playback::{MediaItem, MediaPlayer, MediaState};
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::{CoreConfig, PlayerSettings};
use std::sync::Arc;

fn describe(label: &str, state: &MediaState) {
    println!(
        "{label:<24} media={:<10} time={:>7.2} / {:<7.2} playing={:<5} mini={:<5} pip={:<5} error={}",
        state.media_id().unwrap_or("-"),
        state.current_time,
        state.duration,
        state.is_playing,
        state.is_minimized,
        state.is_picture_in_picture,
        state
            .error
            .as_ref()
            .map(|e| e.code.as_str())
            .unwrap_or("-"),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let platform = Arc::new(HeadlessMediaPlatform::new());
    platform.set_duration("media/trailer.mp4", 120.0);
    platform.set_page_count("books/handbook.html", 10);
    platform.fail_source("media/missing.mp3");

    let bus = EventBus::new(64);
    let mut events = bus.stream();

    let config = CoreConfig::builder()
        .media_platform(platform.clone())
        .container(Arc::new(HeadlessContainer::with_markers()))
        .record_store(Arc::new(MemoryRecordStore::new()))
        .event_bus(bus)
        .settings(PlayerSettings::default())
        .build()?;
    let player = MediaPlayer::new(config)?;

    println!("=== Video ===");
    player
        .load(MediaItem::video("trailer", "media/trailer.mp4"))
        .await?;
    player.play().await?;
    if let Some(element) = platform.last_element(ElementKind::Video) {
        element.advance(12.5);
    }
    describe("after 12.5s", &player.get_state());

    player.seek(500.0).await?;
    describe("seek(500) clamps", &player.get_state());

    player.set_volume(1.7)?;
    player.minimize().await?;
    player.toggle_picture_in_picture().await?;
    describe("minimize + pip", &player.get_state());
    player.maximize().await?;

    println!("\n=== Document ===");
    player
        .load(MediaItem::ebook("handbook", "books/handbook.html"))
        .await?;
    player.seek(0.55).await?;
    if let Some(info) = player.page_info() {
        println!("page {} of {}", info.current_page + 1, info.total_pages);
    }
    player.next_page().await?;
    describe("next page", &player.get_state());

    println!("\n=== Failure ===");
    if let Err(e) = player
        .load(MediaItem::audio("missing", "media/missing.mp3"))
        .await
    {
        println!("load rejected: {e}");
    }
    describe("after failed load", &player.get_state());

    println!("\n=== Saved states ===");
    println!("{}", player.export_saved_states().await?);

    player.cleanup().await;

    println!("\n=== Events ===");
    for event in events.drain() {
        if let CoreEvent::Playback(_) | CoreEvent::View(_) = event {
            println!("{}", event.description());
        }
    }
    Ok(())
}
