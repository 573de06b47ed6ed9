#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal API
//!
//! An HTTP service that removes image backgrounds with U^2-Net family
//! segmentation models running on ONNX Runtime.
//!
//! ## Endpoints
//!
//! - `GET /` returns `{"message": "Background Removal API is running."}`
//! - `POST /remove-bg` takes a multipart upload in the `file` field and
//!   streams back a PNG with a transparent background
//!
//! ## Features
//!
//! - **Models**: `u2net`, `u2netp`, `isnet-general-use` and `silueta`, loaded
//!   from `$U2NET_HOME/<model>.onnx` or `~/.u2net/<model>.onnx`
//! - **Hardware Acceleration**: CUDA, `CoreML`, and CPU execution providers
//! - **Format Support**: JPEG, PNG, WebP, BMP, TIFF and GIF input, PNG output
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `cli` (default): the `bgremove-api` binary
//! - `tracing-json`: JSON log output
//!
//! ## Embedding the router
//!
//! ```rust,no_run
//! use bgremove_api::{server, ProcessorRemover, RemovalConfig, ServerConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let remover = ProcessorRemover::with_onnx(RemovalConfig::default())?;
//! remover.initialize()?;
//! server::serve(&ServerConfig::default(), Arc::new(remover)).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod remover;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use config::{ExecutionProvider, RemovalConfig, ServerConfig};
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelKind, ModelManager, ModelSpec};
pub use processor::BackgroundRemovalProcessor;
pub use remover::{BackgroundRemover, ProcessorRemover};
pub use server::{router, ApiError};
pub use services::OutputFormatHandler;
pub use tracing_config::{TracingConfig, TracingFormat};
pub use types::{ProcessingTimings, RemovalResult, SegmentationMask};
pub use utils::{ImagePreprocessor, PreprocessingOptions};

/// Remove the background from encoded image bytes with a one-off ONNX processor
///
/// Loads the model on every call; long-lived callers should keep a
/// [`ProcessorRemover`] instead.
///
/// ```rust,no_run
/// use bgremove_api::{remove_background_from_bytes, ModelKind, ModelSpec, RemovalConfig};
///
/// # fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::builder()
///     .model_spec(ModelSpec::new(ModelKind::U2netp))
///     .build()?;
/// let result = remove_background_from_bytes(&upload, &config)?;
/// let png = result.to_png_bytes()?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "onnx")]
pub fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::with_onnx(config.clone())?;
    processor.process_bytes(image_bytes)
}
