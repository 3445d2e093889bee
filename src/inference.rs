//! Inference backend abstraction

use crate::{config::ModelConfig, error::Result};
use ndarray::Array4;
use std::time::Duration;

/// Trait for segmentation model inference backends
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given model configuration
    ///
    /// Returns the model load time when a model was actually loaded, `None`
    /// when the backend was already initialized.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Model loading or validation errors
    /// - Invalid configuration parameters
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Invalid input tensor dimensions
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape (N, C, H, W)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
