//! Video frame sources.

pub mod ffmpeg;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roadscan_types::{
    vision::{ImageFrame, VideoMetadata},
    Result, RoadscanError,
};
use tokio::time::{sleep, Duration};
use tracing::info;

pub use ffmpeg::FfmpegFrameSource;

/// Aggregated decode counters.
#[derive(Debug, Default, Clone)]
pub struct MediaMetrics {
    pub frames_decoded: u64,
    pub missing_frames: u64,
    pub failures: u64,
    pub last_decode_ms: Option<u64>,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn metadata(&self) -> Result<VideoMetadata>;
    /// Frame closest to `position_ms`, or `None` when the source has nothing there.
    async fn frame_at(&self, position_ms: u64) -> Result<Option<ImageFrame>>;
    fn metrics(&self) -> MediaMetrics;
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Frame(ImageFrame),
    Missing,
    Fail(String),
}

/// In-memory source used for early integration and testing.
pub struct MockFrameSource {
    behavior: MockBehavior,
    metadata: VideoMetadata,
    requests: Arc<Mutex<Vec<u64>>>,
    metrics: Arc<Mutex<MediaMetrics>>,
}

impl MockFrameSource {
    pub fn new(frame: ImageFrame) -> Self {
        let metadata = VideoMetadata {
            width: frame.width,
            height: frame.height,
            duration_ms: Some(10_000),
        };
        Self::with_behavior(MockBehavior::Frame(frame), metadata)
    }

    pub fn missing() -> Self {
        Self::with_behavior(MockBehavior::Missing, Self::default_metadata())
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(message.into()), Self::default_metadata())
    }

    /// Positions requested so far, in call order.
    pub fn requests(&self) -> Vec<u64> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn with_behavior(behavior: MockBehavior, metadata: VideoMetadata) -> Self {
        Self {
            behavior,
            metadata,
            requests: Arc::new(Mutex::new(Vec::new())),
            metrics: Arc::new(Mutex::new(MediaMetrics::default())),
        }
    }

    fn default_metadata() -> VideoMetadata {
        VideoMetadata {
            width: 1280,
            height: 720,
            duration_ms: Some(10_000),
        }
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn metadata(&self) -> Result<VideoMetadata> {
        Ok(self.metadata)
    }

    async fn frame_at(&self, position_ms: u64) -> Result<Option<ImageFrame>> {
        info!("Mock frame request at {}ms", position_ms);
        sleep(Duration::from_millis(1)).await;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(position_ms);
        }
        let mut metrics = self
            .metrics
            .lock()
            .map_err(|_| media_error("failed to lock metrics"))?;
        match &self.behavior {
            MockBehavior::Frame(frame) => {
                metrics.frames_decoded += 1;
                metrics.last_decode_ms = Some(1);
                Ok(Some(frame.clone().at_position(position_ms)))
            }
            MockBehavior::Missing => {
                metrics.missing_frames += 1;
                Ok(None)
            }
            MockBehavior::Fail(message) => {
                metrics.failures += 1;
                Err(media_error(message.clone()))
            }
        }
    }

    fn metrics(&self) -> MediaMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Generate an error aligned with media semantics.
pub fn media_error(message: impl Into<String>) -> RoadscanError {
    RoadscanError::Media(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_serves_frame_at_requested_position() {
        let source = MockFrameSource::new(ImageFrame::solid(4, 4, [1, 2, 3]));
        let frame = source.frame_at(750).await.expect("frame").expect("some");
        assert_eq!(frame.position_ms, Some(750));
        assert_eq!(source.requests(), vec![750]);
        assert_eq!(source.metrics().frames_decoded, 1);
        assert_eq!(source.metadata().await.expect("meta").width, 4);
    }

    #[tokio::test]
    async fn mock_missing_and_failing_behaviours() {
        let missing = MockFrameSource::missing();
        assert!(missing.frame_at(0).await.expect("ok").is_none());
        assert_eq!(missing.metrics().missing_frames, 1);

        let failing = MockFrameSource::failing("decoder gone");
        let err = failing.frame_at(0).await.unwrap_err();
        assert!(matches!(err, RoadscanError::Media(_)));
        assert_eq!(failing.metrics().failures, 1);
    }
}
