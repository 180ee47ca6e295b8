use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded raster sampled from the video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel buffer, row-major. Alpha is carried but never read.
    pub data: Vec<u8>,
    /// Playback position the frame was decoded at, when it came from a video.
    pub position_ms: Option<u64>,
    pub captured_at: DateTime<Utc>,
}

impl ImageFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
            position_ms: None,
            captured_at: Utc::now(),
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            position_ms: None,
            captured_at: Utc::now(),
        }
    }

    /// Frame filled with a single opaque color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * Self::BYTES_PER_PIXEL);
        for _ in 0..pixels {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], u8::MAX]);
        }
        Self::from_rgba(width, height, data)
    }

    pub fn at_position(mut self, position_ms: u64) -> Self {
        self.position_ms = Some(position_ms);
        self
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * Self::BYTES_PER_PIXEL
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Stream properties reported by the media probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_ms: Option<u64>,
}
