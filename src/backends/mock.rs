//! Mock backends and fake segmentation providers for testing
//!
//! Nothing here loads a model; masks are produced from simple rules so tests
//! can predict every pixel.

use crate::config::ModelConfig;
use crate::error::{Result, TextBehindError};
use crate::inference::InferenceBackend;
use crate::segmentation::SegmentationProvider;
use crate::types::SegmentationMask;
use image::RgbImage;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock backend turns an input tensor into a mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockOutput {
    /// Every output value is the same
    Constant(f32),
    /// Foreground wherever the first input channel is below zero, which
    /// with mean 0.5 / std 1.0 normalization means darker than mid-gray
    DarkSubject,
}

/// Mock inference backend
#[derive(Debug)]
pub struct MockBackend {
    output: MockOutput,
    target_size: usize,
    initialized: bool,
    fail_init: bool,
    fail_inference: bool,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Backend whose output is `value` everywhere
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self::with_output(MockOutput::Constant(value))
    }

    /// Backend that marks dark pixels as the subject
    #[must_use]
    pub fn dark_subject() -> Self {
        Self::with_output(MockOutput::DarkSubject)
    }

    #[must_use]
    pub fn with_output(output: MockOutput) -> Self {
        Self {
            output,
            target_size: 0,
            initialized: false,
            fail_init: false,
            fail_inference: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Backend whose initialization fails
    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new(0.0)
        }
    }

    /// Backend whose inference fails
    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self {
            fail_inference: true,
            ..Self::new(0.0)
        }
    }

    /// Shared handle on the recorded method calls
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, config: &ModelConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        if self.fail_init {
            return Err(TextBehindError::model("Mock initialization failure"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.target_size = config.target_size as usize;
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(TextBehindError::inference("Backend not initialized"));
        }
        if self.fail_inference {
            return Err(TextBehindError::inference("Mock inference failure"));
        }

        let (n, _c, h, w) = input.dim();
        let output = match self.output {
            MockOutput::Constant(value) => Array4::from_elem((n, 1, h, w), value),
            MockOutput::DarkSubject => Array4::from_shape_fn((n, 1, h, w), |(b, _, y, x)| {
                if input[[b, 0, y, x]] < 0.0 {
                    1.0
                } else {
                    0.0
                }
            }),
        };
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.target_size, self.target_size)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Provider returning the same probability for every pixel
#[derive(Debug, Clone, Copy)]
pub struct ConstantMaskProvider {
    pub value: f32,
}

impl ConstantMaskProvider {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    /// No pixel is the subject
    #[must_use]
    pub fn background() -> Self {
        Self::new(0.0)
    }

    /// Every pixel is the subject
    #[must_use]
    pub fn foreground() -> Self {
        Self::new(1.0)
    }
}

impl SegmentationProvider for ConstantMaskProvider {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
        Ok(SegmentationMask::filled(image.width(), image.height(), self.value))
    }
}

/// Provider marking a rectangle `[x0, x1) x [y0, y1)` as the subject
#[derive(Debug, Clone, Copy)]
pub struct RegionMaskProvider {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl RegionMaskProvider {
    #[must_use]
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl SegmentationProvider for RegionMaskProvider {
    fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                if (self.x0..self.x1).contains(&x) && (self.y0..self.y1).contains(&y) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        SegmentationMask::new(data, (width, height))
    }
}

/// Provider returning a fixed mask whatever the image size
#[derive(Debug, Clone)]
pub struct FixedMaskProvider {
    mask: SegmentationMask,
}

impl FixedMaskProvider {
    #[must_use]
    pub fn new(mask: SegmentationMask) -> Self {
        Self { mask }
    }
}

impl SegmentationProvider for FixedMaskProvider {
    fn segment(&self, _image: &RgbImage) -> Result<SegmentationMask> {
        Ok(self.mask.clone())
    }
}

/// Provider that always fails and counts how often it was asked
#[derive(Debug, Default)]
pub struct FailingProvider {
    message: String,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentationProvider for FailingProvider {
    fn segment(&self, _image: &RgbImage) -> Result<SegmentationMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TextBehindError::segmentation(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig::builder()
            .model_path("mock.onnx")
            .target_size(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_mock_backend_records_calls() {
        let mut backend = MockBackend::new(0.25);
        let history = backend.call_history();
        backend.initialize(&config()).unwrap();
        let out = backend.infer(&Array4::zeros((1, 3, 4, 4))).unwrap();

        assert_eq!(out.dim(), (1, 1, 4, 4));
        assert!(out.iter().all(|v| (*v - 0.25).abs() < f32::EPSILON));
        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_mock_backend_failures() {
        assert!(MockBackend::new_failing_init().initialize(&config()).is_err());

        let mut backend = MockBackend::new_failing_inference();
        backend.initialize(&config()).unwrap();
        assert!(backend.infer(&Array4::zeros((1, 3, 4, 4))).is_err());
    }

    #[test]
    fn test_dark_subject_output() {
        let mut backend = MockBackend::dark_subject();
        backend.initialize(&config()).unwrap();
        let mut input = Array4::<f32>::from_elem((1, 3, 2, 2), 0.5);
        input[[0, 0, 1, 1]] = -0.5;
        let out = backend.infer(&input).unwrap();
        assert_eq!(out[[0, 0, 0, 0]], 0.0);
        assert_eq!(out[[0, 0, 1, 1]], 1.0);
    }

    #[test]
    fn test_region_provider() {
        let image = RgbImage::new(4, 3);
        let mask = RegionMaskProvider::new(1, 1, 3, 2).segment(&image).unwrap();
        assert_eq!(mask.dimensions, (4, 3));
        assert_eq!(mask.value_at(1, 1), Some(1.0));
        assert_eq!(mask.value_at(2, 1), Some(1.0));
        assert_eq!(mask.value_at(3, 1), Some(0.0));
        assert_eq!(mask.value_at(1, 0), Some(0.0));
    }

    #[test]
    fn test_failing_provider_counts_calls() {
        let provider = FailingProvider::new("no model");
        let image = RgbImage::new(2, 2);
        assert!(provider.segment(&image).is_err());
        assert!(provider.segment(&image).is_err());
        assert_eq!(provider.calls(), 2);
    }
}
