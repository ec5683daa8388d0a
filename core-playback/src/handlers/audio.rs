use super::element::ElementCore;
use super::{EndedCallback, ErrorCallback, MediaHandler, TimeUpdateCallback};
use crate::error::Result;
use crate::resources::ElementPool;
use crate::types::{MediaItem, MediaKind};
use async_trait::async_trait;
use bridge_traits::{ElementKind, PresentationContainer};
use core_runtime::PlayerSettings;
use std::sync::Arc;

/// Plays audio through a pooled platform audio element.
pub struct AudioHandler {
    core: ElementCore,
}

impl AudioHandler {
    pub fn new(pool: Arc<ElementPool>, settings: &PlayerSettings) -> Self {
        Self {
            core: ElementCore::new("audio", ElementKind::Audio, pool, settings.load_timeout()),
        }
    }
}

#[async_trait]
impl MediaHandler for AudioHandler {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn can_handle(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Audio
    }

    fn initialize(&self, container: Arc<dyn PresentationContainer>) -> Result<()> {
        self.core.initialize(container)
    }

    async fn load(&self, item: &MediaItem) -> Result<()> {
        self.core.load(item).await
    }

    async fn play(&self) -> Result<()> {
        self.core.play().await
    }

    fn pause(&self) {
        self.core.pause()
    }

    fn stop(&self) {
        self.core.stop()
    }

    fn seek(&self, position: f64) {
        self.core.seek(position)
    }

    fn set_volume(&self, volume: f64) {
        self.core.set_volume(volume)
    }

    fn set_playback_rate(&self, rate: f64) {
        self.core.set_playback_rate(rate)
    }

    fn current_time(&self) -> f64 {
        self.core.current_time()
    }

    fn duration(&self) -> f64 {
        self.core.duration()
    }

    fn volume(&self) -> f64 {
        self.core.volume()
    }

    fn playback_rate(&self) -> f64 {
        self.core.playback_rate()
    }

    fn is_playing(&self) -> bool {
        self.core.is_playing()
    }

    fn on_time_update(&self, callback: TimeUpdateCallback) {
        self.core.callbacks.set_time_update(callback)
    }

    fn on_ended(&self, callback: EndedCallback) {
        self.core.callbacks.set_ended(callback)
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.core.callbacks.set_error(callback)
    }

    fn cleanup(&self) {
        self.core.cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MediaErrorCode, MediaPlayerError, PlaybackError};
    use crate::types::TimeUpdate;
    use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform};
    use bridge_traits::DomEvent;
    use parking_lot::Mutex;

    struct Fixture {
        platform: Arc<HeadlessMediaPlatform>,
        container: Arc<HeadlessContainer>,
        handler: AudioHandler,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        Fixture {
            platform,
            container: Arc::new(HeadlessContainer::new()),
            handler: AudioHandler::new(pool, &PlayerSettings::default()),
        }
    }

    #[tokio::test]
    async fn test_load_and_play() {
        let f = fixture();
        f.platform.set_duration("song.mp3", 200.0);
        f.handler.initialize(f.container.clone()).unwrap();

        f.handler
            .load(&MediaItem::audio("a-1", "song.mp3"))
            .await
            .unwrap();
        assert_eq!(f.handler.duration(), 200.0);

        f.handler.play().await.unwrap();
        assert!(f.handler.is_playing());

        f.handler.pause();
        assert!(!f.handler.is_playing());
    }

    #[tokio::test]
    async fn test_initialize_purges_previous_audio_node() {
        let f = fixture();
        f.handler.initialize(f.container.clone()).unwrap();
        f.handler.initialize(f.container.clone()).unwrap();

        let audio_nodes = f
            .container
            .attached()
            .into_iter()
            .filter(|node| node.kind == ElementKind::Audio)
            .count();
        assert_eq!(audio_nodes, 1);
    }

    #[tokio::test]
    async fn test_load_failure_reports_once_through_both_paths() {
        let f = fixture();
        f.platform.fail_source("missing.mp3");
        f.handler.initialize(f.container.clone()).unwrap();

        let reported = Arc::new(Mutex::new(Vec::<MediaPlayerError>::new()));
        let sink = reported.clone();
        f.handler
            .on_error(Arc::new(move |error| sink.lock().push(error)));

        let err = f
            .handler
            .load(&MediaItem::audio("a-2", "missing.mp3"))
            .await
            .unwrap_err();

        let reported = reported.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].code, MediaErrorCode::LoadFailed);
        match err {
            PlaybackError::Media(error) => assert_eq!(error.id, reported[0].id),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_seek_clamps_to_duration() {
        let f = fixture();
        f.platform.set_duration("clip.mp3", 30.0);
        f.handler.initialize(f.container.clone()).unwrap();
        f.handler
            .load(&MediaItem::audio("a-3", "clip.mp3"))
            .await
            .unwrap();

        f.handler.seek(90.0);
        assert_eq!(f.handler.current_time(), 30.0);
        f.handler.seek(-4.0);
        assert_eq!(f.handler.current_time(), 0.0);
        f.handler.seek(f64::NAN);
        assert_eq!(f.handler.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_time_updates_and_ended_are_forwarded() {
        let f = fixture();
        f.platform.set_duration("short.mp3", 2.0);
        f.handler.initialize(f.container.clone()).unwrap();

        let updates = Arc::new(Mutex::new(Vec::<TimeUpdate>::new()));
        let sink = updates.clone();
        f.handler
            .on_time_update(Arc::new(move |update| sink.lock().push(update)));
        let ended = Arc::new(Mutex::new(0));
        let counter = ended.clone();
        f.handler.on_ended(Arc::new(move || *counter.lock() += 1));

        f.handler
            .load(&MediaItem::audio("a-4", "short.mp3"))
            .await
            .unwrap();
        f.handler.play().await.unwrap();

        let element = f.platform.last_element(ElementKind::Audio).unwrap();
        element.advance(1.0);
        element.advance(5.0);

        let updates = updates.lock();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].current_time, 2.0);
        assert_eq!(updates[1].duration, 2.0);
        assert_eq!(*ended.lock(), 1);
    }

    #[tokio::test]
    async fn test_playback_error_after_load_uses_callback() {
        let f = fixture();
        f.handler.initialize(f.container.clone()).unwrap();
        f.handler
            .load(&MediaItem::audio("a-5", "radio.mp3"))
            .await
            .unwrap();

        let reported = Arc::new(Mutex::new(Vec::<MediaPlayerError>::new()));
        let sink = reported.clone();
        f.handler
            .on_error(Arc::new(move |error| sink.lock().push(error)));

        let element = f.platform.last_element(ElementKind::Audio).unwrap();
        element.emit(DomEvent::Error {
            message: "network dropped".into(),
        });

        let reported = reported.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].code, MediaErrorCode::PlaybackFailed);
    }

    #[tokio::test]
    async fn test_cleanup_releases_element_to_pool() {
        let f = fixture();
        f.handler.initialize(f.container.clone()).unwrap();
        let element = f.platform.last_element(ElementKind::Audio).unwrap();
        assert!(element.listener_count() > 0);

        f.handler.cleanup();
        f.handler.cleanup();

        assert_eq!(element.listener_count(), 0);
        assert!(f.container.attached().is_empty());
        assert!(matches!(
            f.handler.play().await,
            Err(PlaybackError::NoMediaLoaded)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_load_times_out() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.stall_source("slow.mp3");
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        let settings = PlayerSettings {
            load_timeout_ms: Some(2_000),
            ..PlayerSettings::default()
        };
        let handler = AudioHandler::new(pool, &settings);
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();

        let err = handler
            .load(&MediaItem::audio("a-6", "slow.mp3"))
            .await
            .unwrap_err();
        assert_eq!(err.to_media_error().code, MediaErrorCode::LoadFailed);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cleanup_cancels_pending_load() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.stall_source("never.mp3");
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        let handler = Arc::new(AudioHandler::new(pool, &PlayerSettings::default()));
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();

        let loading = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.load(&MediaItem::audio("a-7", "never.mp3")).await })
        };
        tokio::task::yield_now().await;
        handler.cleanup();

        let result = loading.await.unwrap();
        assert!(matches!(result, Err(PlaybackError::Superseded)));
    }
}
