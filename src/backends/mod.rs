//! Backend implementations for inference
//!
//! - ONNX Runtime backend (CPU, CUDA and CoreML execution providers)
//! - Mock backend (deterministic masks, no model file needed)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use self::mock::MockBackend;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;
