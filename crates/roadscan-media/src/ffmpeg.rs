use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Instant,
};

use async_trait::async_trait;
use image::ImageFormat;
use roadscan_types::{
    config::MediaConfig,
    vision::{ImageFrame, VideoMetadata},
    Result,
};
use serde::Deserialize;
use tokio::process::Command;

use crate::{media_error, FrameSource, MediaMetrics};

const DEFAULT_FFMPEG: &str = "ffmpeg";
const DEFAULT_FFPROBE: &str = "ffprobe";

/// Decodes single frames by shelling out to ffmpeg.
pub struct FfmpegFrameSource {
    video_path: PathBuf,
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    metrics: Arc<Mutex<MediaMetrics>>,
}

impl FfmpegFrameSource {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        let video_path = PathBuf::from(&config.video_path);
        if !video_path.is_file() {
            return Err(media_error(format!(
                "video file not found: {}",
                video_path.display()
            )));
        }
        let tool = |configured: &Option<String>, fallback: &str| {
            configured
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(fallback))
        };

        Ok(Self {
            video_path,
            ffmpeg_path: tool(&config.ffmpeg_path, DEFAULT_FFMPEG),
            ffprobe_path: tool(&config.ffprobe_path, DEFAULT_FFPROBE),
            metrics: Arc::new(Mutex::new(MediaMetrics::default())),
        })
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    async fn run_tool(&self, program: &Path, args: &[String]) -> Result<Vec<u8>> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|err| {
                media_error(format!(
                    "failed to run {} {}: {err}",
                    program.display(),
                    args.join(" ")
                ))
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(media_error(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn record(&self, update: impl FnOnce(&mut MediaMetrics)) {
        if let Ok(mut guard) = self.metrics.lock() {
            update(&mut guard);
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn metadata(&self) -> Result<VideoMetadata> {
        let raw = self
            .run_tool(&self.ffprobe_path, &probe_args(&self.video_path))
            .await?;
        let metadata = parse_probe_output(&raw)?;
        tracing::info!(
            "Video {}: {}x{}, duration {:?}ms",
            self.video_path.display(),
            metadata.width,
            metadata.height,
            metadata.duration_ms
        );
        Ok(metadata)
    }

    async fn frame_at(&self, position_ms: u64) -> Result<Option<ImageFrame>> {
        let start = Instant::now();
        let raw = match self
            .run_tool(&self.ffmpeg_path, &frame_args(&self.video_path, position_ms))
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                self.record(|m| m.failures += 1);
                return Err(err);
            }
        };
        if raw.is_empty() {
            tracing::warn!("No frame decoded at {}ms", position_ms);
            self.record(|m| m.missing_frames += 1);
            return Ok(None);
        }

        let img = image::load_from_memory_with_format(&raw, ImageFormat::Png).map_err(|err| {
            self.record(|m| m.failures += 1);
            media_error(format!("frame decode failed: {err}"))
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let elapsed = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Decoded {}x{} frame at {}ms in {}ms",
            width,
            height,
            position_ms,
            elapsed
        );
        self.record(|m| {
            m.frames_decoded += 1;
            m.last_decode_ms = Some(elapsed);
        });
        Ok(Some(
            ImageFrame::from_rgba(width, height, rgba.into_raw()).at_position(position_ms),
        ))
    }

    fn metrics(&self) -> MediaMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// ffmpeg arguments that write the frame nearest `position_ms` as PNG to stdout.
pub fn frame_args(video: &Path, position_ms: u64) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-ss".into(),
        format_seconds(position_ms),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-frames:v".into(),
        "1".into(),
        "-f".into(),
        "image2pipe".into(),
        "-vcodec".into(),
        "png".into(),
        "-".into(),
    ]
}

pub fn probe_args(video: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "v:0".into(),
        "-show_entries".into(),
        "stream=width,height:format=duration".into(),
        "-of".into(),
        "json".into(),
        video.to_string_lossy().into_owned(),
    ]
}

fn format_seconds(position_ms: u64) -> String {
    format!("{}.{:03}", position_ms / 1000, position_ms % 1000)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parses `ffprobe -of json` output into stream metadata.
pub fn parse_probe_output(raw: &[u8]) -> Result<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(raw)
        .map_err(|err| media_error(format!("invalid ffprobe output: {err}")))?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| media_error("ffprobe reported no video stream"))?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(media_error("video stream has no dimensions"));
    };
    let duration_ms = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| (secs * 1000.0).round() as u64);
    Ok(VideoMetadata {
        width,
        height,
        duration_ms,
    })
}
