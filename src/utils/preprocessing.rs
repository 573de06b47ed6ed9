//! Image preprocessing for model inference

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Smallest divisor used when scaling by the brightest channel value
const MIN_SCALE: f32 = 1e-6;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Resampling filter used to fit the model input
    pub filter: FilterType,
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess image for model inference
    ///
    /// This function handles:
    /// - RGB conversion
    /// - Resize to the model's square input (aspect ratio is not kept)
    /// - Scaling by the brightest channel value
    /// - Mean/std normalization into an NCHW tensor
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::invalid_config(
                "Model target size must be non-zero",
            ));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::processing("Image has zero width or height"));
        }

        let rgb_image = image.to_rgb8();
        let resized = image::imageops::resize(&rgb_image, target_width, target_height, options.filter);

        Self::canvas_to_tensor(&resized, preprocessing_config)
    }

    /// Convert resized canvas to normalized tensor
    fn canvas_to_tensor(
        canvas: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let width: usize = canvas.width().try_into().map_err(|_| {
            BgRemovalError::processing("Target width too large for tensor allocation")
        })?;
        let height: usize = canvas.height().try_into().map_err(|_| {
            BgRemovalError::processing("Target height too large for tensor allocation")
        })?;

        let max_value = canvas.as_raw().iter().copied().max().unwrap_or(0);
        let scale = f32::from(max_value).max(MIN_SCALE);
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        let mut tensor = Array4::<f32>::zeros((1, 3, height, width));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size, channel index < 3
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (f32::from(pixel[c]) / scale - mean[c]) / std[c];
                }
            }
        }

        Ok(tensor)
    }

    /// Tensor-only preprocessing used by the processor
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        Self::preprocess_image(image, preprocessing_config, &PreprocessingOptions::default())
    }
}
