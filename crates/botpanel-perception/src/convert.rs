//! Message → raster conversion.
//!
//! Supported color encodings: `rgb8`, `bgr8`, `rgba8`, `bgra8`, `mono8`.
//! Alpha is dropped and `mono8` is expanded to gray RGB.
//!
//! [`depth_mask`] ignores the declared encoding: it reinterprets the raw
//! bytes as 4-channel 8-bit pixels (a `32FC1` depth image has exactly four
//! bytes per pixel), converts to intensity and applies a binary threshold.

use botpanel_types::{ImageMsg, PanelError};
use image::{DynamicImage, GrayImage, Rgb, RgbImage, RgbaImage};

fn bytes_per_pixel(encoding: &str) -> Option<u32> {
    match encoding {
        "rgb8" | "bgr8" => Some(3),
        "rgba8" | "bgra8" => Some(4),
        "mono8" => Some(1),
        _ => None,
    }
}

/// Copy the pixel rows of `msg` into a tightly packed buffer, honouring
/// `step` padding.
fn packed_rows(msg: &ImageMsg, bpp: u32) -> Result<Vec<u8>, PanelError> {
    if msg.width == 0 || msg.height == 0 {
        return Err(PanelError::Conversion(format!(
            "image has zero size ({}x{})",
            msg.width, msg.height
        )));
    }

    let row = msg.width as usize * bpp as usize;
    let step = if msg.step == 0 { row } else { msg.step as usize };
    if step < row {
        return Err(PanelError::Conversion(format!(
            "row step {step} is shorter than {row} bytes of pixels"
        )));
    }

    let needed = step * (msg.height as usize - 1) + row;
    if msg.data.len() < needed {
        return Err(PanelError::Conversion(format!(
            "image data has {} bytes, expected at least {needed}",
            msg.data.len()
        )));
    }

    if step == row {
        return Ok(msg.data[..row * msg.height as usize].to_vec());
    }
    Ok(msg
        .data
        .chunks(step)
        .take(msg.height as usize)
        .flat_map(|chunk| &chunk[..row])
        .copied()
        .collect())
}

/// Convert a color or mono image message into an RGB raster.
pub fn image_to_raster(msg: &ImageMsg) -> Result<RgbImage, PanelError> {
    let bpp = bytes_per_pixel(&msg.encoding).ok_or_else(|| {
        PanelError::Conversion(format!("unsupported image encoding `{}`", msg.encoding))
    })?;
    let packed = packed_rows(msg, bpp)?;

    let pixels = packed.chunks_exact(bpp as usize);
    let rgb: Vec<u8> = match msg.encoding.as_str() {
        "rgb8" | "rgba8" => pixels.flat_map(|p| [p[0], p[1], p[2]]).collect(),
        "bgr8" | "bgra8" => pixels.flat_map(|p| [p[2], p[1], p[0]]).collect(),
        _ => pixels.flat_map(|p| [p[0], p[0], p[0]]).collect(),
    };

    RgbImage::from_raw(msg.width, msg.height, rgb)
        .ok_or_else(|| PanelError::Conversion("raster buffer size mismatch".to_string()))
}

/// Binary depth mask: 255 where the intensity is above `threshold`, else 0.
pub fn depth_mask(msg: &ImageMsg, threshold: u8) -> Result<GrayImage, PanelError> {
    let packed = packed_rows(msg, 4)?;
    let rgba = RgbaImage::from_raw(msg.width, msg.height, packed)
        .ok_or_else(|| PanelError::Conversion("depth buffer size mismatch".to_string()))?;

    let mut mask = DynamicImage::ImageRgba8(rgba).to_luma8();
    for pixel in mask.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    Ok(mask)
}

/// Intensity view of a color frame.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Convenience for tests and simulators: a frame filled with one color.
pub fn solid(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}
