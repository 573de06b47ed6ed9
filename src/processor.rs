//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns an inference backend and runs the whole
//! pipeline for one image: decode, preprocess, infer, build the alpha matte
//! and composite it onto the original pixels.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    services::OutputFormatHandler,
    types::{ProcessingTimings, RemovalResult, SegmentationMask},
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GenericImageView, RgbaImage};
use ndarray::{s, Array4};
use std::time::Instant;
use tracing::{debug, info, instrument, span, Level};

/// Spread below which a prediction is treated as flat and only clamped
const MIN_PREDICTION_RANGE: f32 = 1e-6;

/// Runs background removal for single images on one backend
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    backend: Box<dyn InferenceBackend>,
    initialized: bool,
    /// Model load time not yet reported in a result
    pending_model_load_ms: u64,
}

impl BackgroundRemovalProcessor {
    /// Create a processor around an already constructed backend. No model work happens yet.
    #[must_use]
    pub fn new(config: RemovalConfig, backend: Box<dyn InferenceBackend>) -> Self {
        Self {
            config,
            backend,
            initialized: false,
            pending_model_load_ms: 0,
        }
    }

    /// Create a processor backed by ONNX Runtime, resolving the model file from `config`
    #[cfg(feature = "onnx")]
    pub fn with_onnx(config: RemovalConfig) -> Result<Self> {
        config.validate()?;
        let model_manager = crate::models::ModelManager::from_spec(&config.model_spec)?;
        debug!(model_path = %model_manager.model_path().display(), "Resolved model file");
        let backend = Box::new(crate::backends::OnnxBackend::new(model_manager));
        Ok(Self::new(config, backend))
    }

    /// Load the model into the backend. Calling this more than once is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        info!(
            model = %self.config.model_spec.display_name(),
            provider = %self.config.execution_provider,
            "Initializing background removal processor"
        );

        if let Some(load_time) = self.backend.initialize(&self.config)? {
            self.pending_model_load_ms = load_time.as_millis() as u64;
        }
        self.initialized = true;

        let model_info = self.backend.get_model_info()?;
        info!(
            model = %model_info.name,
            size_bytes = model_info.size_bytes,
            input_shape = ?model_info.input_shape,
            output_shape = ?model_info.output_shape,
            "Background removal processor initialized successfully"
        );
        Ok(())
    }

    /// Decode raw image bytes (JPEG, PNG, WebP, BMP, TIFF, GIF) and remove the background
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<RemovalResult> {
        let decode_start = Instant::now();
        let image = image::load_from_memory(image_bytes).map_err(|e| {
            BgRemovalError::processing(format!("Failed to decode image from bytes: {e}"))
        })?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = decode_ms;
        result.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Remove the background of an already decoded image
    #[instrument(
        skip(self, image),
        fields(
            model = %self.config.model_spec.display_name(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        if !self.initialized {
            self.initialize()?;
        }

        let total_start = Instant::now();
        let original_dimensions = image.dimensions();
        let mut timings = ProcessingTimings {
            model_load_ms: std::mem::take(&mut self.pending_model_load_ms),
            ..ProcessingTimings::default()
        };

        let input_tensor = {
            let _span = span!(Level::DEBUG, "preprocessing").entered();
            let start = Instant::now();
            let preprocessing_config = self.backend.get_preprocessing_config()?;
            let tensor = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        let output_tensor = {
            let _span = span!(Level::DEBUG, "inference").entered();
            let start = Instant::now();
            let output = self.backend.infer(&input_tensor)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            output
        };

        let (mask, result_image) = {
            let _span = span!(Level::DEBUG, "background_removal").entered();
            let start = Instant::now();
            let mask = Self::tensor_to_mask(&output_tensor, original_dimensions)?;
            let result_image = Self::apply_background_removal(image, &mask)?;
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            (mask, result_image)
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64 + timings.model_load_ms;

        debug!(
            preprocessing_ms = timings.preprocessing_ms,
            inference_ms = timings.inference_ms,
            postprocessing_ms = timings.postprocessing_ms,
            foreground_ratio = mask.foreground_ratio(),
            "Image processed"
        );

        Ok(RemovalResult::new(
            OutputFormatHandler::convert_format(result_image),
            mask,
            original_dimensions,
            timings,
        ))
    }

    /// Convert a `[1, 1, H, W]` prediction into an alpha matte at the original size.
    ///
    /// The prediction is min-max normalised; a flat prediction is clamped to
    /// `[0, 1]` instead.
    pub fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        let (batch, channels, height, width) = tensor.dim();
        if batch != 1 || channels != 1 || height == 0 || width == 0 {
            return Err(BgRemovalError::processing(format!(
                "Invalid output tensor shape: {:?}",
                tensor.shape()
            )));
        }

        let prediction = tensor.slice(s![0, 0, .., ..]);
        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        // Row-major iteration matches the mask layout
        let data: Vec<u8> = prediction
            .iter()
            .map(|&v| {
                let normalized = if range > MIN_PREDICTION_RANGE {
                    (v - min) / range
                } else {
                    v
                };
                (normalized.clamp(0.0, 1.0) * 255.0) as u8
            })
            .collect();

        let mask_width = u32::try_from(width)
            .map_err(|_| BgRemovalError::processing("Output tensor width exceeds u32"))?;
        let mask_height = u32::try_from(height)
            .map_err(|_| BgRemovalError::processing("Output tensor height exceeds u32"))?;

        SegmentationMask::new(data, (mask_width, mask_height))
            .resize(original_dimensions.0, original_dimensions.1)
    }

    /// Composite the mask onto the image as its alpha channel
    pub fn apply_background_removal(
        image: &DynamicImage,
        mask: &SegmentationMask,
    ) -> Result<RgbaImage> {
        let mut rgba_image = image.to_rgba8();
        mask.apply_to_image(&mut rgba_image)?;
        Ok(rgba_image)
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
