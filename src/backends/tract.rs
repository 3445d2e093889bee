//! Tract backend for segmentation models
//!
//! Pure Rust inference through Tract: no native runtime, CPU only.

use super::read_model_bytes;
use crate::config::ModelConfig;
use crate::error::{Result, TextBehindError};
use crate::inference::InferenceBackend;
use ndarray::Array4;
use std::time::{Duration, Instant};
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models
#[derive(Debug, Default)]
pub struct TractBackend {
    model: Option<TractModel>,
    target_size: usize,
    initialized: bool,
}

impl TractBackend {
    /// Tract only ever runs on the CPU
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn load_model(&mut self, config: &ModelConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = read_model_bytes(config)?;
        let side = config.target_size as usize;

        log::info!("Initializing Tract backend");
        log::info!("  - Model: {}", config.model_path.display());
        log::info!(
            "  - Model size: {:.2} MB",
            model_data.len() as f64 / (1024.0 * 1024.0)
        );
        if config.execution_provider != crate::config::ExecutionProvider::Auto
            && config.execution_provider != crate::config::ExecutionProvider::Cpu
        {
            log::warn!(
                "Tract ignores execution provider '{}', running on CPU",
                config.execution_provider
            );
        }

        let model_error = |stage: &str, e: &dyn std::fmt::Display| {
            TextBehindError::model_error_with_context(
                stage,
                &config.model_path,
                &e.to_string(),
                &["check that the file is a valid ONNX model"],
            )
        };

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| model_error("load", &e))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| model_error("configure input of", &e))?
            .into_optimized()
            .map_err(|e| model_error("optimize", &e))?
            .into_runnable()
            .map_err(|e| model_error("prepare", &e))?;

        self.model = Some(model);
        self.target_size = side;
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TextBehindError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on input tensor {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| TextBehindError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| TextBehindError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            TextBehindError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let shape = output_data.shape().to_vec();
        let [n, c, h, w] = shape[..] else {
            return Err(TextBehindError::inference(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (n, c, h, w),
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| TextBehindError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {}ms, output tensor {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );
        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.target_size, self.target_size)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}
