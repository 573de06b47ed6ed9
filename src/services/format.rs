//! Output encoding service
//!
//! Keeps the encoding step out of the processor so the processor only ever
//! deals in pixels.

use crate::error::Result;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Media type of every successful removal response
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// Service for turning removal results into transferable bytes
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Wrap an RGBA buffer as a `DynamicImage`, keeping the alpha channel
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage) -> DynamicImage {
        DynamicImage::ImageRgba8(rgba_image)
    }

    /// Encode an image as PNG into memory
    ///
    /// # Errors
    /// Returns `BgRemovalError::Image` if the encoder rejects the buffer.
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_convert_format_keeps_alpha() {
        let rgba_image = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 128]));
        let converted = OutputFormatHandler::convert_format(rgba_image);

        assert_eq!(converted.dimensions(), (2, 2));
        assert!(converted.color().has_alpha());
    }

    #[test]
    fn test_encode_png_signature_and_decode() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 5, Rgba([1, 2, 3, 4])));
        let bytes = OutputFormatHandler::encode_png(&image).unwrap();

        assert_eq!(bytes.get(..8), Some(&PNG_SIGNATURE[..]));
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (3, 5));
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0), &Rgba([1, 2, 3, 4]));
    }
}
