//! Configuration types for the segmentation model and image output

use crate::error::{Result, TextBehindError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = TextBehindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(TextBehindError::invalid_config(format!(
                "Unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Output image format options
///
/// The composite is always opaque, so both formats carry the same pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension without the dot
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Guess the format from a path's extension
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TextBehindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(TextBehindError::invalid_config(format!(
                "Unsupported output format '{other}' (expected png or jpeg)"
            ))),
        }
    }
}

/// Tensor preprocessing parameters derived from a [`ModelConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square model input side in pixels
    pub target_size: u32,
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided out after the mean
    pub normalization_std: [f32; 3],
}

/// Configuration for the model-backed segmentation provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX segmentation model
    pub model_path: PathBuf,

    /// Square model input size in pixels
    pub target_size: u32,

    /// Per-channel normalization mean
    pub normalization_mean: [f32; 3],

    /// Per-channel normalization standard deviation
    pub normalization_std: [f32; 3],

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            target_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use text_behind::{ExecutionProvider, ModelConfig};
    ///
    /// let config = ModelConfig::builder()
    ///     .model_path("models/isnet.onnx")
    ///     .target_size(1024)
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.target_size, 1024);
    /// ```
    #[must_use]
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON is malformed
    /// - The resulting configuration fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            TextBehindError::invalid_config(format!(
                "Failed to parse model config '{}': {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty model path
    /// - Target size of zero
    /// - Non-positive or non-finite normalization std
    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(TextBehindError::invalid_config("Model path must not be empty"));
        }

        if self.target_size == 0 {
            return Err(TextBehindError::config_value_error(
                "target size",
                self.target_size,
                "1 or more",
                Some(1024),
            ));
        }

        if let Some(std) = self
            .normalization_std
            .iter()
            .find(|s| !s.is_finite() || **s <= 0.0)
        {
            return Err(TextBehindError::config_value_error(
                "normalization std",
                *std,
                "finite and > 0",
                Some(1.0),
            ));
        }

        if self.normalization_mean.iter().any(|m| !m.is_finite()) {
            return Err(TextBehindError::invalid_config(
                "Normalization mean must be finite",
            ));
        }

        Ok(())
    }

    /// Set both thread counts: `threads` intra-op, half of that inter-op (0 = auto)
    pub fn set_num_threads(&mut self, threads: usize) {
        self.intra_threads = threads;
        self.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
    }

    /// Preprocessing parameters for the segmentation model
    #[must_use]
    pub fn preprocessing(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: self.target_size,
            normalization_mean: self.normalization_mean,
            normalization_std: self.normalization_std,
        }
    }
}

/// Builder for `ModelConfig`
#[derive(Debug, Default)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = path.into();
        self
    }

    #[must_use]
    pub fn target_size(mut self, size: u32) -> Self {
        self.config.target_size = size;
        self
    }

    #[must_use]
    pub fn normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.config.normalization_mean = mean;
        self.config.normalization_std = std;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both thread counts: `threads` intra-op, half of that inter-op (0 = auto)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.set_num_threads(threads);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`ModelConfig::validate`]
    pub fn build(self) -> Result<ModelConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ModelConfig::builder().model_path("m.onnx").build().unwrap();
        assert_eq!(config.target_size, 1024);
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.intra_threads, 0);
        assert_eq!(config.inter_threads, 0);
    }

    #[test]
    fn test_validation_rules() {
        assert!(ModelConfig::builder().build().is_err());
        assert!(ModelConfig::builder()
            .model_path("m.onnx")
            .target_size(0)
            .build()
            .is_err());
        assert!(ModelConfig::builder()
            .model_path("m.onnx")
            .normalization([0.5; 3], [1.0, 0.0, 1.0])
            .build()
            .is_err());
        assert!(ModelConfig::builder()
            .model_path("m.onnx")
            .normalization([f32::NAN, 0.5, 0.5], [1.0; 3])
            .build()
            .is_err());
    }

    #[test]
    fn test_num_threads_split() {
        let config = ModelConfig::builder()
            .model_path("m.onnx")
            .num_threads(8)
            .build()
            .unwrap();
        assert_eq!((config.intra_threads, config.inter_threads), (8, 4));

        let config = ModelConfig::builder()
            .model_path("m.onnx")
            .num_threads(1)
            .build()
            .unwrap();
        assert_eq!((config.intra_threads, config.inter_threads), (1, 1));
    }

    #[test]
    fn test_execution_provider_parsing() {
        for provider in [
            ExecutionProvider::Auto,
            ExecutionProvider::Cpu,
            ExecutionProvider::Cuda,
            ExecutionProvider::CoreMl,
        ] {
            assert_eq!(provider.to_string().parse::<ExecutionProvider>().unwrap(), provider);
        }
        assert_eq!("CUDA".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_output_format_helpers() {
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::from_path("a/b.JPEG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_path("a/b.webp"), None);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_json_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"model_path": "isnet.onnx", "target_size": 320, "execution_provider": "cpu"}"#,
        )
        .unwrap();

        let config = ModelConfig::from_json_file(&path).unwrap();
        assert_eq!(config.model_path, PathBuf::from("isnet.onnx"));
        assert_eq!(config.target_size, 320);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.normalization_std, [1.0; 3]);
    }

    #[test]
    fn test_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ModelConfig::from_json_file(&path),
            Err(TextBehindError::InvalidConfig(_))
        ));
        assert!(matches!(
            ModelConfig::from_json_file(dir.path().join("missing.json")),
            Err(TextBehindError::Io(_))
        ));
    }

    #[test]
    fn test_preprocessing_mirrors_model_config() {
        let config = ModelConfig::builder()
            .model_path("m.onnx")
            .target_size(320)
            .normalization([0.485, 0.456, 0.406], [0.229, 0.224, 0.225])
            .build()
            .unwrap();
        let pre = config.preprocessing();
        assert_eq!(pre.target_size, 320);
        assert_eq!(pre.normalization_mean, [0.485, 0.456, 0.406]);
    }
}
