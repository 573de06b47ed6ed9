//! Services used by the processor that are independent of inference

pub mod format;

pub use format::{OutputFormatHandler, PNG_MEDIA_TYPE};
