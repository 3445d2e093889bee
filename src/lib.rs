#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # text-behind
//!
//! Renders one or two lines of text *behind* the foreground subject of a
//! photograph. A segmentation provider supplies a per-pixel foreground
//! probability map; the map is thresholded into a binary mask, the text is
//! drawn onto a transparent layer, and two ordered "over" passes put the text
//! on the background and the subject back on top of it.
//!
//! ## Features
//!
//! - **Injected segmentation**: anything implementing [`SegmentationProvider`]
//! - **Model-backed provider**: [`ModelSegmenter`] over ONNX Runtime (`onnx`)
//!   or Tract (`tract`) inference backends
//! - **Outlined text**: scalable fonts via `cosmic-text`, with a built-in
//!   bitmap font when no font file can be found
//! - **Font lookup**: family aliases, file-name guessing and a final bitmap
//!   fallback, so a request never fails because of its font
//! - **CLI Integration**: optional `text-behind` binary (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use text_behind::{
//!     ModelConfig, ModelSegmenter, TextBehindProcessor, TextSpec,
//! };
//!
//! # #[cfg(feature = "onnx")]
//! # fn example() -> anyhow::Result<()> {
//! let config = ModelConfig::builder().model_path("models/isnet.onnx").build()?;
//! let segmenter = ModelSegmenter::new(Box::new(text_behind::OnnxBackend::new()), config)?;
//! let processor = TextBehindProcessor::with_default_fonts(Arc::new(segmenter));
//!
//! let spec = TextSpec::new("HELLO")
//!     .with_second_line("WORLD")
//!     .with_font("Arial", 96)
//!     .with_anchor(40, 60);
//! let image = processor.process_bytes(&std::fs::read("portrait.jpg")?, &spec)?;
//! image.save("out.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Custom segmentation
//!
//! ```rust
//! use std::sync::Arc;
//! use image::RgbImage;
//! use text_behind::{
//!     MemoryFontStore, Result, SegmentationMask, SegmentationProvider,
//!     TextBehindProcessor, TextSpec,
//! };
//!
//! struct NoSubject;
//!
//! impl SegmentationProvider for NoSubject {
//!     fn segment(&self, image: &RgbImage) -> Result<SegmentationMask> {
//!         Ok(SegmentationMask::filled(image.width(), image.height(), 0.0))
//!     }
//! }
//!
//! let processor = TextBehindProcessor::new(Arc::new(NoSubject), Arc::new(MemoryFontStore::new()));
//! let photo = image::DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, image::Rgb([40, 40, 40])));
//! let result = processor.process_image(&photo, &TextSpec::new("HI").with_anchor(4, 4))?;
//! assert_eq!(result.dimensions(), (64, 32));
//! # Ok::<(), text_behind::TextBehindError>(())
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod mask;
pub mod processor;
pub mod segmentation;
pub mod services;
pub mod text;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use compositor::LayerCompositor;
pub use config::{ExecutionProvider, ModelConfig, ModelConfigBuilder, OutputFormat};
pub use error::{Result, TextBehindError};
pub use inference::InferenceBackend;
pub use mask::MaskBinarizer;
pub use processor::TextBehindProcessor;
pub use segmentation::{ModelSegmenter, SegmentationProvider};
pub use services::{ImageIOService, OutputFormatHandler};
pub use text::{
    DirectoryFontStore, FontHandle, FontResolver, FontStore, MemoryFontStore, ResolvedFont,
    TextLayerRenderer,
};
pub use types::{
    BinaryMask, EffectResult, MaskStatistics, ProcessingTimings, SegmentationMask, TextSpec,
};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Apply the effect to an encoded image using the default font directories
///
/// Convenience wrapper for one-off requests; build a [`TextBehindProcessor`]
/// once and reuse it when serving many images.
///
/// # Errors
/// - `CompositeFailure` naming the pipeline stage that failed
///
/// # Examples
/// ```rust,no_run
/// use std::sync::Arc;
/// use text_behind::{backends::mock::ConstantMaskProvider, text_behind_from_bytes, TextSpec};
///
/// let bytes = std::fs::read("photo.png")?;
/// let image = text_behind_from_bytes(
///     &bytes,
///     &TextSpec::new("BEHIND"),
///     Arc::new(ConstantMaskProvider::background()),
/// )?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn text_behind_from_bytes(
    image_bytes: &[u8],
    spec: &TextSpec,
    provider: Arc<dyn SegmentationProvider>,
) -> Result<image::RgbImage> {
    TextBehindProcessor::with_default_fonts(provider).process_bytes(image_bytes, spec)
}
