//! Bytes-in, PNG-out removal seam used by the HTTP layer

use crate::{config::RemovalConfig, error::Result, processor::BackgroundRemovalProcessor};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Removes the background from encoded image bytes and returns an encoded PNG.
///
/// Implementations are shared between request handlers, so they must be
/// `Send + Sync`. Calls are blocking.
pub trait BackgroundRemover: Send + Sync {
    /// # Errors
    /// - Input bytes cannot be decoded as an image
    /// - Model loading or inference failures
    /// - PNG encoding failures
    fn remove(&self, image_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// [`BackgroundRemover`] backed by a single [`BackgroundRemovalProcessor`].
///
/// The processor holds one model session which needs exclusive access while
/// running, so concurrent calls are serialized on a mutex. A lock poisoned by
/// a panicking call is recovered; the processor keeps no per-image state.
pub struct ProcessorRemover {
    processor: Mutex<BackgroundRemovalProcessor>,
}

impl ProcessorRemover {
    #[must_use]
    pub fn new(processor: BackgroundRemovalProcessor) -> Self {
        Self {
            processor: Mutex::new(processor),
        }
    }

    /// Build a remover on the ONNX Runtime backend. The model is loaded lazily
    /// unless [`ProcessorRemover::initialize`] is called.
    #[cfg(feature = "onnx")]
    pub fn with_onnx(config: RemovalConfig) -> Result<Self> {
        BackgroundRemovalProcessor::with_onnx(config).map(Self::new)
    }

    /// Load the model now instead of on the first request
    pub fn initialize(&self) -> Result<()> {
        self.lock().initialize()
    }

    /// Configuration of the wrapped processor
    pub fn config(&self) -> RemovalConfig {
        self.lock().config().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BackgroundRemovalProcessor> {
        self.processor.lock().unwrap_or_else(|poisoned| {
            warn!("Recovering processor after a panic in an earlier request");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl BackgroundRemover for ProcessorRemover {
    fn remove(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut result = self.lock().process_bytes(image_bytes)?;
        // Encoding does not need the model, so it runs outside the lock
        let png = result.to_png_bytes_timed()?;

        debug!(
            width = result.original_dimensions.0,
            height = result.original_dimensions.1,
            total_ms = result.timings.total_ms,
            inference_ratio = format_args!("{:.2}", result.timings.inference_ratio()),
            output_bytes = png.len(),
            "Background removed"
        );
        Ok(png)
    }
}
