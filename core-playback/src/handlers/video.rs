use super::element::ElementCore;
use super::{
    EndedCallback, ErrorCallback, MediaHandler, PictureInPicture, PictureInPictureCallback,
    TimeUpdateCallback,
};
use crate::error::{MediaPlayerError, Result};
use crate::resources::ElementPool;
use crate::types::{MediaItem, MediaKind};
use async_trait::async_trait;
use bridge_traits::{ElementKind, MediaPlatform, PresentationContainer};
use core_runtime::PlayerSettings;
use std::sync::Arc;
use tracing::debug;

/// Plays video through a pooled platform video element, with optional
/// picture-in-picture.
pub struct VideoHandler {
    core: ElementCore,
    platform: Arc<dyn MediaPlatform>,
}

impl VideoHandler {
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        pool: Arc<ElementPool>,
        settings: &PlayerSettings,
    ) -> Self {
        Self {
            core: ElementCore::new("video", ElementKind::Video, pool, settings.load_timeout()),
            platform,
        }
    }
}

#[async_trait]
impl MediaHandler for VideoHandler {
    fn name(&self) -> &'static str {
        "video"
    }

    fn can_handle(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Video
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

    fn as_picture_in_picture(&self) -> Option<&dyn PictureInPicture> {
        Some(self)
    }
}

#[async_trait]
impl PictureInPicture for VideoHandler {
    fn is_picture_in_picture(&self) -> bool {
        self.core
            .element()
            .map_or(false, |element| element.is_picture_in_picture())
    }

    async fn enable_picture_in_picture(&self) -> Result<()> {
        let element = self.core.require_element()?;
        if !self.platform.supports_picture_in_picture() || !element.supports_picture_in_picture() {
            return Err(self.core.report(MediaPlayerError::unsupported(
                "Picture-in-Picture is not supported on this platform",
            )));
        }
        if element.is_picture_in_picture() {
            debug!("Already in picture-in-picture");
            return Ok(());
        }

        if let Err(e) = element.request_picture_in_picture().await {
            return Err(self.core.report(MediaPlayerError::playback_failed(format!(
                "Failed to enter picture-in-picture: {}",
                e
            ))));
        }
        Ok(())
    }

    async fn disable_picture_in_picture(&self) -> Result<()> {
        let element = self.core.require_element()?;
        if !element.is_picture_in_picture() {
            return Ok(());
        }

        if let Err(e) = element.exit_picture_in_picture().await {
            return Err(self.core.report(MediaPlayerError::playback_failed(format!(
                "Failed to leave picture-in-picture: {}",
                e
            ))));
        }
        Ok(())
    }

    fn on_picture_in_picture_change(&self, callback: PictureInPictureCallback) {
        self.core.callbacks.set_picture_in_picture(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorSeverity, MediaErrorCode, PlaybackError};
    use bridge_desktop::{HeadlessContainer, HeadlessMediaPlatform};
    use parking_lot::Mutex;

    async fn loaded(platform: Arc<HeadlessMediaPlatform>) -> VideoHandler {
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        let handler = VideoHandler::new(platform, pool, &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::video("v-1", "movie.mp4"))
            .await
            .unwrap();
        handler
    }

    #[tokio::test]
    async fn test_picture_in_picture_round_trip() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        let handler = loaded(platform).await;

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        handler.on_picture_in_picture_change(Arc::new(move |active: bool| sink.lock().push(active)));

        handler.enable_picture_in_picture().await.unwrap();
        assert!(handler.is_picture_in_picture());

        // already active: no second transition
        handler.enable_picture_in_picture().await.unwrap();

        handler.disable_picture_in_picture().await.unwrap();
        handler.disable_picture_in_picture().await.unwrap();
        assert!(!handler.is_picture_in_picture());

        assert_eq!(*changes.lock(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_unsupported_picture_in_picture() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.set_picture_in_picture(false);
        let handler = loaded(platform).await;

        let reported = Arc::new(Mutex::new(Vec::<MediaPlayerError>::new()));
        let sink = reported.clone();
        handler.on_error(Arc::new(move |error| sink.lock().push(error)));

        let err = handler.enable_picture_in_picture().await.unwrap_err();
        let error = match err {
            PlaybackError::Media(error) => error,
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(error.code, MediaErrorCode::UnsupportedFormat);
        assert_eq!(error.severity, ErrorSeverity::Low);
        assert_eq!(reported.lock().len(), 1);
        assert!(!handler.is_picture_in_picture());
    }

    #[tokio::test]
    async fn test_declared_duration_bounds_live_source() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.set_duration("live.m3u8", f64::INFINITY);
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        let handler = VideoHandler::new(platform, pool, &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::video("live", "live.m3u8").with_duration(120.0))
            .await
            .unwrap();

        assert_eq!(handler.duration(), 120.0);
        handler.seek(500.0);
        assert_eq!(handler.current_time(), 120.0);
    }

    #[tokio::test]
    async fn test_reported_duration_wins_over_declared() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        platform.set_duration("clip.mp4", 60.0);
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        let handler = VideoHandler::new(platform, pool, &PlayerSettings::default());
        handler
            .initialize(Arc::new(HeadlessContainer::new()))
            .unwrap();
        handler
            .load(&MediaItem::video("clip", "clip.mp4").with_duration(90.0))
            .await
            .unwrap();

        handler.seek(75.0);
        assert_eq!(handler.duration(), 60.0);
        assert_eq!(handler.current_time(), 60.0);
    }

    #[tokio::test]
    async fn test_only_handles_video() {
        let platform = Arc::new(HeadlessMediaPlatform::new());
        let pool = Arc::new(ElementPool::new(platform.clone(), 3));
        let handler = VideoHandler::new(platform, pool, &PlayerSettings::default());

        assert!(handler.can_handle(MediaKind::Video));
        assert!(!handler.can_handle(MediaKind::Audio));
        assert!(handler.as_picture_in_picture().is_some());
        assert!(handler.as_paginated().is_none());
    }
}
