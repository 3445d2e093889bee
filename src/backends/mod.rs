//! Inference backend implementations
//!
//! - ONNX Runtime backend (GPU acceleration where available)
//! - Tract backend (pure Rust, no external runtime)
//! - Mock backend and fake segmentation providers for tests

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub mod mock;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

#[cfg(any(feature = "onnx", feature = "tract"))]
use crate::{
    config::ModelConfig,
    error::{Result, TextBehindError},
};

/// Read the model file named by the configuration
#[cfg(any(feature = "onnx", feature = "tract"))]
fn read_model_bytes(config: &ModelConfig) -> Result<Vec<u8>> {
    std::fs::read(&config.model_path).map_err(|e| {
        TextBehindError::model_error_with_context(
            "read",
            &config.model_path,
            &e.to_string(),
            &["check the --model path", "download an ONNX segmentation model"],
        )
    })
}
