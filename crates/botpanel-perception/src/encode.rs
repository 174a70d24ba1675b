//! BMP encoding for rendered rasters.

use std::io::Cursor;

use botpanel_types::PanelError;
use image::{GrayImage, ImageFormat, RgbImage};

pub fn encode_bmp_rgb(image: &RgbImage) -> Result<Vec<u8>, PanelError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
        .map_err(|e| PanelError::Serialization(format!("bmp encode: {e}")))?;
    Ok(bytes)
}

pub fn encode_bmp_gray(image: &GrayImage) -> Result<Vec<u8>, PanelError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
        .map_err(|e| PanelError::Serialization(format!("bmp encode: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_rgb_starts_with_bmp_magic() -> Result<(), PanelError> {
        let bytes = encode_bmp_rgb(&RgbImage::new(4, 3))?;
        assert_eq!(&bytes[..2], b"BM");
        Ok(())
    }

    #[test]
    fn encoded_gray_decodes_to_same_size() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = encode_bmp_gray(&GrayImage::new(5, 2))?;
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Bmp)?;
        assert_eq!((decoded.width(), decoded.height()), (5, 2));
        Ok(())
    }
}
