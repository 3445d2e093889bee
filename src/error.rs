//! Error types for text-behind-subject compositing

use thiserror::Error;

/// Result type alias for compositing operations
pub type Result<T> = std::result::Result<T, TextBehindError>;

/// Error types raised by the compositing pipeline and its collaborators
#[derive(Error, Debug)]
pub enum TextBehindError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Buffers that must share a size do not
    #[error("Dimension mismatch in {context}: expected {}x{}, got {}x{}", .expected.0, .expected.1, .actual.0, .actual.1)]
    DimensionMismatch {
        context: String,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Segmentation provider failures
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Any failure inside the effect pipeline, with the original cause attached
    #[error("Composite failed during {stage}: {source}")]
    CompositeFailure {
        stage: String,
        #[source]
        source: Box<TextBehindError>,
    },
}

impl TextBehindError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a dimension mismatch error for the named buffer
    pub fn dimension_mismatch<S: Into<String>>(
        context: S,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Wrap an error raised while running a pipeline stage
    pub fn composite_failure<S: Into<String>>(stage: S, source: TextBehindError) -> Self {
        Self::CompositeFailure {
            stage: stage.into(),
            source: Box::new(source),
        }
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
            "Failed to {} model '{}': {}.{}",
            operation, path_display, error, suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Pipeline stage that failed, if this is a wrapped failure
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::CompositeFailure { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Innermost cause of a wrapped failure (or the error itself)
    #[must_use]
    pub fn root_cause(&self) -> &TextBehindError {
        match self {
            Self::CompositeFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = TextBehindError::invalid_config("test config error");
        assert!(matches!(err, TextBehindError::InvalidConfig(_)));

        let err = TextBehindError::segmentation("provider crashed");
        assert!(matches!(err, TextBehindError::Segmentation(_)));
    }

    #[test]
    fn test_error_display() {
        let err = TextBehindError::invalid_config("font size must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: font size must be positive"
        );

        let err = TextBehindError::dimension_mismatch("segmentation mask", (100, 50), (99, 50));
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in segmentation mask: expected 100x50, got 99x50"
        );
    }

    #[test]
    fn test_composite_failure_preserves_cause() {
        let inner = TextBehindError::segmentation("model returned NaN");
        let err = TextBehindError::composite_failure("segmentation", inner);

        assert_eq!(err.stage(), Some("segmentation"));
        assert!(err.to_string().contains("segmentation"));
        assert!(err.to_string().contains("model returned NaN"));

        let source = err.source().expect("wrapped failure keeps its source");
        assert!(source.to_string().contains("model returned NaN"));
        assert!(matches!(err.root_cause(), TextBehindError::Segmentation(_)));
    }

    #[test]
    fn test_enhanced_error_context() {
        let err = TextBehindError::model_error_with_context(
            "initialize",
            Path::new("/models/selfie.onnx"),
            "file not found",
            &["check file path", "verify permissions"],
        );
        let error_string = err.to_string();
        assert!(error_string.contains("initialize"));
        assert!(error_string.contains("/models/selfie.onnx"));
        assert!(error_string.contains("Suggestions"));

        let err = TextBehindError::config_value_error("target_size", 0, "32-4096", Some(256));
        let error_string = err.to_string();
        assert!(error_string.contains("target_size"));
        assert!(error_string.contains("32-4096"));
        assert!(error_string.contains("Recommended: 256"));
    }
}
