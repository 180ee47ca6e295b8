//! Frame to input-tensor conversion.
//!
//! The frame is scaled uniformly so its shorter side becomes [`INPUT_SIZE`],
//! then the top-left `INPUT_SIZE x INPUT_SIZE` region is read into a
//! channel-major tensor normalized to `[-1, 1]`. Nothing is cropped or padded,
//! so the overflow of the longer axis is simply never read.

use image::{imageops::FilterType, GenericImageView, ImageBuffer, Rgba};
use roadscan_types::{
    tensor::{InputTensor, INPUT_CHANNELS, INPUT_SIZE, PLANE_LEN},
    vision::ImageFrame,
    Result,
};
use tracing::debug;

use crate::vision_error;

const SIDE: u32 = INPUT_SIZE as u32;
/// Bilinear resampling.
const FILTER: FilterType = FilterType::Triangle;

#[derive(Debug, Clone, Copy, Default)]
pub struct TensorPreprocessor;

impl TensorPreprocessor {
    pub fn preprocess(&self, frame: &ImageFrame) -> Result<InputTensor> {
        if frame.is_empty() {
            return Err(vision_error(format!(
                "frame has no pixels ({}x{})",
                frame.width, frame.height
            )));
        }
        if frame.data.len() != frame.expected_len() {
            return Err(vision_error(format!(
                "frame buffer holds {} bytes, {}x{} RGBA needs {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.expected_len()
            )));
        }
        let source =
            ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(frame.width, frame.height, &frame.data[..])
                .ok_or_else(|| vision_error("failed to wrap frame buffer"))?;

        let (width, height) = scaled_dimensions(frame.width, frame.height);
        let data = if (width, height) == (frame.width, frame.height) {
            extract(&source)
        } else {
            let scaled = image::imageops::resize(&source, width, height, FILTER);
            extract(&scaled)
        };
        debug!(
            "preprocessed {}x{} frame via {}x{} into {} values",
            frame.width,
            frame.height,
            width,
            height,
            data.len()
        );
        InputTensor::from_vec(data)
    }
}

/// Shorthand for [`TensorPreprocessor::preprocess`] with bilinear scaling.
pub fn preprocess(frame: &ImageFrame) -> Result<InputTensor> {
    TensorPreprocessor.preprocess(frame)
}

/// Size after uniform scaling by `INPUT_SIZE / min(width, height)`.
///
/// Each side is clamped to at least `INPUT_SIZE` so float rounding can never
/// leave the read window out of bounds.
pub fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    let shorter = width.min(height).max(1);
    if shorter == SIDE {
        return (width, height);
    }
    let scale = SIDE as f32 / shorter as f32;
    let scale_side = |side: u32| ((side as f32 * scale).round() as u32).max(SIDE);
    (scale_side(width), scale_side(height))
}

fn extract<I>(image: &I) -> Vec<f32>
where
    I: GenericImageView<Pixel = Rgba<u8>>,
{
    let mut data = vec![0.0f32; INPUT_CHANNELS * PLANE_LEN];
    for c in 0..INPUT_CHANNELS {
        let shift = (2 - c) * 8;
        for i in 0..INPUT_SIZE {
            for j in 0..INPUT_SIZE {
                let pixel = pack_argb(image.get_pixel(j as u32, i as u32));
                let value = ((pixel >> shift) & 0xFF) as f32 / 255.0;
                data[c * PLANE_LEN + i * INPUT_SIZE + j] = (value - 0.5) * 2.0;
            }
        }
    }
    data
}

/// Packs a pixel as 0xAARRGGBB.
fn pack_argb(pixel: Rgba<u8>) -> u32 {
    let [r, g, b, a] = pixel.0;
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}
