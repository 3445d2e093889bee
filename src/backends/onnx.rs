//! ONNX Runtime backend for segmentation models
//!
//! Runs the model through ONNX Runtime with support for multiple execution
//! providers (CPU, CUDA, `CoreML`).

use super::read_model_bytes;
use crate::config::{ExecutionProvider, ModelConfig};
use crate::error::{Result, TextBehindError};
use crate::inference::InferenceBackend;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::time::{Duration, Instant};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug, Default)]
pub struct OnnxBackend {
    session: Option<Session>,
    target_size: usize,
    initialized: bool,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability and description
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);

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
                "Apple Silicon acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a new uninitialized ONNX backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Execution providers to register for the requested provider
    ///
    /// Unavailable providers are skipped, leaving ONNX Runtime on CPU.
    fn providers_for(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        let mut providers = Vec::new();
        match requested {
            ExecutionProvider::Auto => {
                if cuda_available {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda.build());
                }
                if coreml_available {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(coreml.build());
                }
                if providers.is_empty() {
                    log::warn!("No hardware acceleration available, falling back to CPU");
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
            },
            ExecutionProvider::Cuda => {
                if cuda_available {
                    log::info!("Using CUDA execution provider");
                    providers.push(cuda.build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available {
                    log::info!("Using CoreML execution provider");
                    providers.push(coreml.build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }
        providers
    }

    fn load_model(&mut self, config: &ModelConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = read_model_bytes(config)?;

        let mut session_builder = Session::builder()
            .map_err(|e| {
                TextBehindError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                TextBehindError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::providers_for(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    TextBehindError::inference(format!(
                        "Failed to set {} execution provider: {e}",
                        config.execution_provider
                    ))
                })?;
        }

        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| TextBehindError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| TextBehindError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| TextBehindError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                TextBehindError::model_error_with_context(
                    "load",
                    &config.model_path,
                    &e.to_string(),
                    &["check that the file is a valid ONNX model"],
                )
            })?;

        log::debug!("ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        log::debug!(
            "  - Model: {} ({:.2} MB)",
            config.model_path.display(),
            model_data.len() as f64 / (1024.0 * 1024.0)
        );

        self.session = Some(session);
        self.target_size = config.target_size as usize;
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(TextBehindError::inference("Backend not initialized"));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| TextBehindError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            TextBehindError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs keep us independent of the model's tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| TextBehindError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| TextBehindError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| TextBehindError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                TextBehindError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let output_shape = output_tensor.shape().to_vec();
        let [n, c, h, w] = output_shape[..] else {
            return Err(TextBehindError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };

        let result = Array4::from_shape_vec(
            (n, c, h, w),
            output_tensor.view().to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| TextBehindError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Inference complete: {:.2}ms, output shape {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            result.dim()
        );
        Ok(result)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.target_size, self.target_size)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
