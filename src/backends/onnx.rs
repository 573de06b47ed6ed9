//! ONNX Runtime backend for segmentation models
//!
//! Implements [`InferenceBackend`] on top of an `ort` session with support for
//! the CPU, CUDA and CoreML execution providers.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
    initialized: bool,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        debug!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            cores = available_cores(1),
            "Probing execution providers"
        );

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    #[must_use]
    pub fn new(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
            initialized: false,
        }
    }

    fn configure_providers(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let providers: Vec<ExecutionProviderDispatch> = match provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                }
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    info!("CoreML execution provider is available and will be used");
                    providers.push(coreml_provider.with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    info!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => {
                info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    info!("Using CUDA execution provider");
                    vec![cuda_provider.build()]
                } else {
                    warn!("CUDA execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    info!("Using CoreML execution provider");
                    vec![coreml_provider.with_subgraphs(true).build()]
                } else {
                    warn!("CoreML execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
        };

        if providers.is_empty() {
            return Ok(session_builder);
        }

        session_builder
            .with_execution_providers(providers)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to set {provider} execution provider: {e}"))
            })
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;

        let session_builder = Session::builder()
            .map_err(|e| BgRemovalError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set optimization level: {e}")))?;

        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available_cores(8)
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available_cores(8) / 4).max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| BgRemovalError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model_error_with_context(
                    "initialize",
                    self.model_manager.model_path(),
                    &e.to_string(),
                    &["check that the file is a valid ONNX export"],
                )
            })?;

        let model_info = self.model_manager.get_info()?;
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        debug!(
            model = %model_info.name,
            size_mb = format_args!("{size_mb:.2}"),
            provider = %config.execution_provider,
            intra_threads,
            inter_threads,
            "ONNX Runtime session created"
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        info!(
            model = %model_info.name,
            elapsed_ms = model_load_time.as_millis() as u64,
            "Model loading complete"
        );

        Ok(model_load_time)
    }
}

fn available_cores(fallback: usize) -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(fallback)
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        debug!(shape = ?input.dim(), "Starting inference");

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs: exported models disagree on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::processing("No output tensors found"))?
            .to_string();
        let output_view = outputs
            .get(first_key.as_str())
            .ok_or_else(|| BgRemovalError::processing("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                BgRemovalError::processing(format!("Failed to extract output tensor: {e}"))
            })?;

        let output_dims = output_view.ndim();
        let result = output_view
            .into_dimensionality::<Ix4>()
            .map_err(|_| {
                BgRemovalError::processing(format!("Expected 4D output tensor, got {output_dims}D"))
            })?
            .to_owned();

        debug!(
            output = %first_key,
            shape = ?result.dim(),
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            "Inference complete"
        );

        Ok(result)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;

    #[test]
    fn test_new_backend_is_uninitialized() {
        let manager = ModelManager::with_model_path(ModelKind::U2netp, "/nonexistent/u2netp.onnx");
        let backend = OnnxBackend::new(manager);

        assert!(!backend.is_initialized());
        let info = backend.get_model_info().unwrap();
        assert_eq!(info.input_shape, (1, 3, 320, 320));
        assert_eq!(info.output_shape, (1, 1, 320, 320));
        assert_eq!(
            backend.get_preprocessing_config().unwrap(),
            ModelKind::U2netp.preprocessing_config()
        );
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let manager = ModelManager::with_model_path(ModelKind::U2net, "/nonexistent/u2net.onnx");
        let mut backend = OnnxBackend::new(manager);

        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        let err = backend.infer(&input).unwrap_err();
        assert!(matches!(err, BgRemovalError::Internal(_)));
    }

    #[test]
    fn test_initialize_with_missing_model_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u2net.onnx");
        let mut backend = OnnxBackend::new(ModelManager::with_model_path(ModelKind::U2net, &path));

        let err = backend.initialize(&RemovalConfig::default()).unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(err.to_string().contains("u2net.onnx"));
        assert!(!backend.is_initialized());
    }
}
