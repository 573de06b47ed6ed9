//! Model specification, metadata and file resolution
//!
//! Models are plain ONNX files. Which preprocessing a model expects is decided
//! by its [`ModelKind`], not by sidecar metadata, so any compatible export of
//! a supported family can be dropped into the model directory.

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the directory that holds model files
pub const MODEL_HOME_ENV: &str = "U2NET_HOME";

/// Directory under the user's home used when [`MODEL_HOME_ENV`] is unset
pub const DEFAULT_MODEL_DIR: &str = ".u2net";

/// Supported segmentation model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// General purpose U^2-Net (176 MB)
    U2net,
    /// Lightweight U^2-Net (4.7 MB)
    U2netp,
    /// IS-Net general use, higher resolution input
    IsnetGeneralUse,
    /// Size-reduced U^2-Net
    Silueta,
}

impl ModelKind {
    /// All supported kinds, in the order they are listed to users
    pub const ALL: [ModelKind; 4] = [
        ModelKind::U2net,
        ModelKind::U2netp,
        ModelKind::IsnetGeneralUse,
        ModelKind::Silueta,
    ];

    /// Canonical model name, also the file stem of the ONNX file
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::IsnetGeneralUse => "isnet-general-use",
            Self::Silueta => "silueta",
        }
    }

    /// Default file name of the model inside the model directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    /// Square input resolution expected by the model
    #[must_use]
    pub fn input_size(self) -> u32 {
        match self {
            Self::U2net | Self::U2netp | Self::Silueta => 320,
            Self::IsnetGeneralUse => 1024,
        }
    }

    /// Preprocessing parameters for this model family
    #[must_use]
    pub fn preprocessing_config(self) -> PreprocessingConfig {
        let size = self.input_size();
        match self {
            Self::U2net | Self::U2netp | Self::Silueta => PreprocessingConfig {
                target_size: [size, size],
                normalization_mean: [0.485, 0.456, 0.406],
                normalization_std: [0.229, 0.224, 0.225],
            },
            Self::IsnetGeneralUse => PreprocessingConfig {
                target_size: [size, size],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::U2net
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                let available: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                BgRemovalError::invalid_config(format!(
                    "Unknown model '{s}'. Available: {}",
                    available.join(", ")
                ))
            })
    }
}

/// Complete model specification: which family, and optionally where its file lives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub path: Option<PathBuf>,
}

impl ModelSpec {
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        Self { kind, path: None }
    }

    #[must_use]
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => format!(
                "{}:{}",
                self.kind,
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            None => self.kind.to_string(),
        }
    }
}

/// Preprocessing parameters consumed by [`crate::utils::ImagePreprocessor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Resolve where the model file for `spec` lives.
///
/// An explicit path wins. Otherwise the file is looked up as
/// `<model_home>/<name>.onnx`, falling back to `<home>/.u2net/<name>.onnx`.
pub fn resolve_model_path(
    spec: &ModelSpec,
    model_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = &spec.path {
        return Ok(path.clone());
    }

    let dir = match model_home.filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => home
            .map(|h| h.join(DEFAULT_MODEL_DIR))
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Cannot locate model directory: {MODEL_HOME_ENV} is unset and no home directory is available"
                ))
            })?,
    };

    Ok(dir.join(spec.kind.file_name()))
}

/// Owns a resolved model file and answers metadata queries about it
#[derive(Debug, Clone)]
pub struct ModelManager {
    kind: ModelKind,
    model_path: PathBuf,
}

impl ModelManager {
    /// Create a manager from a spec, resolving the file location from the environment
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let model_home = std::env::var_os(MODEL_HOME_ENV).map(PathBuf::from);
        let model_path = resolve_model_path(spec, model_home, dirs::home_dir())?;
        Ok(Self::with_model_path(spec.kind, model_path))
    }

    #[must_use]
    pub fn with_model_path<P: AsRef<Path>>(kind: ModelKind, model_path: P) -> Self {
        Self {
            kind,
            model_path: model_path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Read the model file into memory
    pub fn load_model(&self) -> Result<Vec<u8>> {
        if !self.model_path.is_file() {
            let placement = format!("place {} in ${MODEL_HOME_ENV}", self.kind.file_name());
            return Err(BgRemovalError::model_error_with_context(
                "load",
                &self.model_path,
                "file not found",
                &["pass --model-path", placement.as_str()],
            ));
        }

        fs::read(&self.model_path).map_err(|e| {
            BgRemovalError::model_error_with_context("read", &self.model_path, &e.to_string(), &[])
        })
    }

    /// Model metadata; `size_bytes` is 0 when the file cannot be stat'ed
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size = self.kind.input_size() as usize;
        let size_bytes = fs::metadata(&self.model_path)
            .map(|m| m.len() as usize)
            .unwrap_or(0);

        Ok(ModelInfo {
            name: self.kind.name().to_string(),
            size_bytes,
            input_shape: (1, 3, size, size),
            output_shape: (1, 1, size, size),
        })
    }

    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.kind.preprocessing_config())
    }
}
