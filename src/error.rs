//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types for the removal engine
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input/output errors (model file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Tensor or pixel processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {operation} model '{path_display}': {error}.{suggestion_text}"
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_prefixes() {
        assert_eq!(
            BgRemovalError::processing("bad tensor").to_string(),
            "Processing error: bad tensor"
        );
        assert_eq!(
            BgRemovalError::inference("session died").to_string(),
            "Inference error: session died"
        );
        assert_eq!(
            BgRemovalError::invalid_config("port").to_string(),
            "Invalid configuration: port"
        );
    }

    #[test]
    fn test_model_error_with_context() {
        let err = BgRemovalError::model_error_with_context(
            "load",
            "/models/u2net.onnx",
            "file not found",
            &["set --model-path", "set U2NET_HOME"],
        );
        let msg = err.to_string();
        assert!(msg.contains("Failed to load model '/models/u2net.onnx'"));
        assert!(msg.contains("file not found"));
        assert!(msg.contains("Suggestions: set --model-path, set U2NET_HOME"));
    }

    #[test]
    fn test_model_error_without_suggestions() {
        let err = BgRemovalError::model_error_with_context("read", "m.onnx", "denied", &[]);
        assert!(err.to_string().ends_with("denied."));
    }

    #[test]
    fn test_config_value_error() {
        let err = BgRemovalError::config_value_error("port", 0, "1-65535");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Invalid port: 0 (valid range: 1-65535)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BgRemovalError = io.into();
        assert!(matches!(err, BgRemovalError::Io(_)));
    }
}
