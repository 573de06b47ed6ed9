//! Core types for background removal operations

use crate::error::{BgRemovalError, Result};
use crate::services::OutputFormatHandler;
use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, Rgba};
use serde::{Deserialize, Serialize};

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The processed image with background removed (RGBA)
    pub image: DynamicImage,

    /// The segmentation mask used for removal
    pub mask: SegmentationMask,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Per-stage timings
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    #[must_use]
    pub fn new(
        image: DynamicImage,
        mask: SegmentationMask,
        original_dimensions: (u32, u32),
        timings: ProcessingTimings,
    ) -> Self {
        Self {
            image,
            mask,
            original_dimensions,
            timings,
        }
    }

    /// Encode the result as PNG
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        OutputFormatHandler::encode_png(&self.image)
    }

    /// Encode as PNG and record the encode time
    pub fn to_png_bytes_timed(&mut self) -> Result<Vec<u8>> {
        let encode_start = std::time::Instant::now();
        let bytes = self.to_png_bytes()?;
        self.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(bytes)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Alpha matte, one byte per pixel in row-major order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &ImageBuffer<Luma<u8>, Vec<u8>>) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.as_raw().clone(), (width, height))
    }

    /// Convert mask to a grayscale image
    pub fn to_image(&self) -> Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| BgRemovalError::processing("Failed to create image from mask data"))
    }

    /// Set the alpha channel of `image` from this mask.
    ///
    /// Colour is left straight (not premultiplied): partially transparent
    /// pixels keep their original RGB and only the alpha changes. Pixels with
    /// mask value 0 become transparent black. Any alpha already in `image` is
    /// replaced, not multiplied.
    pub fn apply_to_image(&self, image: &mut ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(BgRemovalError::processing(
                "Image and mask dimensions do not match",
            ));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(self.data.iter()) {
            if alpha == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            } else {
                pixel[3] = alpha;
            }
        }

        Ok(())
    }

    /// Resize the mask to new dimensions
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<SegmentationMask> {
        if self.dimensions == (new_width, new_height) {
            return Ok(self.clone());
        }
        let current_image = self.to_image()?;
        let resized = image::imageops::resize(
            &current_image,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        );

        Ok(SegmentationMask::from_image(&resized))
    }

    /// Fraction of pixels considered foreground (alpha > 127)
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&x| x > 127).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Timing breakdown for background removal processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: u64,

    /// Image decoding from bytes
    pub image_decode_ms: u64,

    /// Image preprocessing (resize, normalize, tensor conversion)
    pub preprocessing_ms: u64,

    /// Backend inference execution
    pub inference_ms: u64,

    /// Postprocessing (mask generation, alpha application)
    pub postprocessing_ms: u64,

    /// PNG encoding, when measured
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_to_image_sets_alpha_and_clears_background() {
        let mut image = ImageBuffer::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        let mask = SegmentationMask::new(vec![0, 200], (2, 1));

        mask.apply_to_image(&mut image).unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([10, 20, 30, 200]));
    }

    #[test]
    fn test_apply_to_image_keeps_straight_rgb() {
        let mut image = ImageBuffer::from_pixel(2, 1, Rgba([240, 120, 60, 128]));
        let mask = SegmentationMask::new(vec![1, 255], (2, 1));

        mask.apply_to_image(&mut image).unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgba([240, 120, 60, 1]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([240, 120, 60, 255]));
    }

    #[test]
    fn test_apply_to_image_dimension_mismatch() {
        let mut image = ImageBuffer::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        let mask = SegmentationMask::new(vec![255; 4], (2, 2));
        assert!(mask.apply_to_image(&mut image).is_err());
    }

    #[test]
    fn test_resize_mask() {
        let mask = SegmentationMask::new(vec![255; 16], (4, 4));
        let resized = mask.resize(8, 2).unwrap();
        assert_eq!(resized.dimensions, (8, 2));
        assert_eq!(resized.data.len(), 16);
        assert!(resized.data.iter().all(|&v| v >= 254));
    }

    #[test]
    fn test_to_image_rejects_short_buffer() {
        let mask = SegmentationMask::new(vec![1, 2, 3], (2, 2));
        assert!(mask.to_image().is_err());
    }

    #[test]
    fn test_foreground_ratio() {
        let mask = SegmentationMask::new(vec![0, 100, 128, 255], (2, 2));
        assert!((mask.foreground_ratio() - 0.5).abs() < f32::EPSILON);
        assert_eq!(SegmentationMask::new(vec![], (0, 0)).foreground_ratio(), 0.0);
    }

    #[test]
    fn test_inference_ratio() {
        let timings = ProcessingTimings {
            inference_ms: 30,
            total_ms: 120,
            ..ProcessingTimings::default()
        };
        assert!((timings.inference_ratio() - 0.25).abs() < f64::EPSILON);
        assert_eq!(ProcessingTimings::default().inference_ratio(), 0.0);
    }
}
