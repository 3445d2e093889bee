//! Subject segmentation service
//!
//! The effect pipeline only sees [`SegmentationProvider`]. [`ModelSegmenter`]
//! is the model-backed implementation: letterbox, run an inference backend,
//! then map the output back onto the photo.

use crate::config::ModelConfig;
use crate::error::{Result, TextBehindError};
use crate::inference::InferenceBackend;
use crate::types::SegmentationMask;
use crate::utils::{ImagePreprocessor, Letterbox};
use image::RgbImage;
use ndarray::Array4;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Produces a per-pixel foreground probability map for a photo
///
/// Implementations must return a mask with the same dimensions as the image.
pub trait SegmentationProvider: Send + Sync {
    /// Segment the foreground subject of an image
    ///
    /// # Errors
    /// Implementation specific; the pipeline reports any error as a
    /// segmentation stage failure.
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask>;
}

/// Segmentation provider backed by an inference model
pub struct ModelSegmenter {
    backend: Mutex<Box<dyn InferenceBackend>>,
    config: ModelConfig,
}

impl ModelSegmenter {
    /// Wrap a backend; the model is loaded lazily on the first request
    ///
    /// # Errors
    /// - `InvalidConfig` when the model configuration fails validation
    pub fn new(backend: Box<dyn InferenceBackend>, config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend: Mutex::new(backend),
            config,
        })
    }

    /// Wrap a backend and load the model right away
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Model loading errors from the backend
    pub fn with_initialized_backend(
        backend: Box<dyn InferenceBackend>,
        config: ModelConfig,
    ) -> Result<Self> {
        let segmenter = Self::new(backend, config)?;
        segmenter.initialize()?;
        Ok(segmenter)
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Load the model if it is not loaded yet
    ///
    /// Returns the load time, or `None` when the model was already loaded.
    ///
    /// # Errors
    /// - Model loading errors from the backend
    pub fn initialize(&self) -> Result<Option<Duration>> {
        let mut backend = self.lock_backend()?;
        let load_time = backend.initialize(&self.config)?;
        if let Some(load_time) = load_time {
            info!(
                backend = backend.name(),
                load_ms = load_time.as_millis() as u64,
                "Segmentation model loaded"
            );
        }
        Ok(load_time)
    }

    fn lock_backend(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn InferenceBackend>>> {
        self.backend
            .lock()
            .map_err(|_| TextBehindError::inference("Inference backend lock poisoned"))
    }

    /// Map a `1 x 1 x H x W` model output back onto the original image
    ///
    /// Each original pixel samples the model output at its letterboxed
    /// position; values are clamped to [0, 1].
    ///
    /// # Errors
    /// - `Inference` when the tensor is not a single-channel single-batch map
    pub fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        let (n, c, height, width) = tensor.dim();
        if n != 1 || c != 1 || height == 0 || width != height {
            return Err(TextBehindError::inference(format!(
                "Invalid output tensor shape {:?}, expected (1, 1, S, S)",
                tensor.dim()
            )));
        }

        let letterbox = Letterbox::fit(original_dimensions, width as u32)?;
        let (orig_width, orig_height) = original_dimensions;
        let mut data = Vec::with_capacity(orig_width as usize * orig_height as usize);

        for y in 0..orig_height {
            for x in 0..orig_width {
                let (mx, my) = letterbox.to_model(x, y);
                let value = tensor.get([0, 0, my, mx]).copied().unwrap_or(0.0);
                data.push(if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 });
            }
        }

        SegmentationMask::new(data, original_dimensions)
    }
}

impl SegmentationProvider for ModelSegmenter {
    #[instrument(level = "debug", skip(self, image), fields(width = image.width(), height = image.height()))]
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
        let start = Instant::now();
        let (tensor, _) = ImagePreprocessor::preprocess(image, &self.config.preprocessing())?;

        let output = {
            let mut backend = self.lock_backend()?;
            if let Some(load_time) = backend.initialize(&self.config)? {
                info!(
                    backend = backend.name(),
                    load_ms = load_time.as_millis() as u64,
                    "Segmentation model loaded"
                );
            }
            backend.infer(&tensor)?
        };

        let mask = Self::tensor_to_mask(&output, image.dimensions())?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Segmentation complete"
        );
        Ok(mask)
    }
}
