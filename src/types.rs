//! Core types for text-behind-subject compositing

use crate::error::{Result, TextBehindError};
use crate::mask::MaskBinarizer;
use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Continuous per-pixel foreground probability map
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    /// Row-major probabilities in [0, 1]
    pub data: Vec<f32>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask, checking the buffer against the dimensions
    pub fn new(data: Vec<f32>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(TextBehindError::processing(format!(
                "Mask buffer holds {} values but {}x{} needs {}",
                data.len(),
                dimensions.0,
                dimensions.1,
                expected
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Mask with every pixel set to the same probability
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            dimensions: (width, height),
        }
    }

    /// Create mask from a grayscale image (0 maps to 0.0, 255 to 1.0)
    #[must_use]
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let data = image.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
        Self {
            data,
            dimensions: image.dimensions(),
        }
    }

    /// Create mask from a (height, width) array of probabilities
    #[must_use]
    pub fn from_array(array: &Array2<f32>) -> Self {
        let (height, width) = array.dim();
        let data = array.iter().copied().collect();
        Self {
            data,
            dimensions: (width as u32, height as u32),
        }
    }

    /// Width of the mask in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    /// Height of the mask in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Probability at the given pixel, if in bounds
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.data
            .get(y as usize * self.width() as usize + x as usize)
            .copied()
    }

    /// Statistics of the mask as the binarizer would threshold it
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let foreground = self
            .data
            .iter()
            .filter(|v| MaskBinarizer::is_foreground(**v))
            .count();
        MaskStatistics::from_counts(self.data.len(), foreground)
    }

    /// Convert mask to an 8-bit grayscale image
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        let (width, height) = self.dimensions;
        GrayImage::from_fn(width, height, |x, y| {
            let v = self.value_at(x, y).unwrap_or(0.0);
            Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }
}

/// Binary foreground/background decision per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    /// Row-major flags, `true` marks foreground
    pub data: Vec<bool>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl BinaryMask {
    /// Create a binary mask, checking the buffer against the dimensions
    pub fn new(data: Vec<bool>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(TextBehindError::processing(format!(
                "Binary mask holds {} values but {}x{} needs {}",
                data.len(),
                dimensions.0,
                dimensions.1,
                expected
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Mask with every pixel marked the same way
    #[must_use]
    pub fn filled(width: u32, height: u32, foreground: bool) -> Self {
        Self {
            data: vec![foreground; width as usize * height as usize],
            dimensions: (width, height),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Whether the pixel belongs to the subject; out-of-bounds pixels are background
    #[must_use]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        if x >= self.width() || y >= self.height() {
            return false;
        }
        self.data
            .get(y as usize * self.width() as usize + x as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Logical inverse of the mask
    #[must_use]
    pub fn invert(&self) -> Self {
        Self {
            data: self.data.iter().map(|&fg| !fg).collect(),
            dimensions: self.dimensions,
        }
    }

    /// Number of foreground pixels
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&fg| fg).count()
    }

    /// Convert to a 0/255 grayscale image
    #[must_use]
    pub fn to_image(&self) -> GrayImage {
        let (width, height) = self.dimensions;
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if self.is_foreground(x, y) { 255 } else { 0 }])
        })
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        MaskStatistics::from_counts(self.data.len(), self.foreground_count())
    }
}

/// Statistics about a binary mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

impl MaskStatistics {
    fn from_counts(total_pixels: usize, foreground_pixels: usize) -> Self {
        let background_pixels = total_pixels - foreground_pixels;
        let total = total_pixels.max(1) as f32;

        Self {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: foreground_pixels as f32 / total,
            background_ratio: background_pixels as f32 / total,
        }
    }
}

fn default_font_family() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    48
}

fn default_anchor() -> i32 {
    50
}

/// Text to draw and where to draw it
///
/// Field names on the wire follow the request payload of the web front end
/// (`textLine1`, `textLine2`, `fontFamily`, `fontSize`, `textX`, `textY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpec {
    /// First line of text
    #[serde(rename = "textLine1", default)]
    pub line1: String,

    /// Optional second line, drawn below the first
    #[serde(rename = "textLine2", default)]
    pub line2: Option<String>,

    /// Font family name (an alias such as "Arial" or a font resource name)
    #[serde(rename = "fontFamily", default = "default_font_family")]
    pub font_family: String,

    /// Font size in pixels
    #[serde(rename = "fontSize", default = "default_font_size")]
    pub font_size: u32,

    /// X of the first line's top-left corner
    #[serde(rename = "textX", default = "default_anchor")]
    pub anchor_x: i32,

    /// Y of the first line's top-left corner
    #[serde(rename = "textY", default = "default_anchor")]
    pub anchor_y: i32,
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            line1: String::new(),
            line2: None,
            font_family: default_font_family(),
            font_size: default_font_size(),
            anchor_x: default_anchor(),
            anchor_y: default_anchor(),
        }
    }
}

impl TextSpec {
    /// Single-line spec with default font settings
    pub fn new<S: Into<String>>(line1: S) -> Self {
        Self {
            line1: line1.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_second_line<S: Into<String>>(mut self, line2: S) -> Self {
        self.line2 = Some(line2.into());
        self
    }

    #[must_use]
    pub fn with_font<S: Into<String>>(mut self, family: S, size: u32) -> Self {
        self.font_family = family.into();
        self.font_size = size;
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, x: i32, y: i32) -> Self {
        self.anchor_x = x;
        self.anchor_y = y;
        self
    }

    /// Anchor of the first line's top-left corner
    #[must_use]
    pub fn anchor(&self) -> (i32, i32) {
        (self.anchor_x, self.anchor_y)
    }

    /// Second line, if one was supplied and it is not blank
    #[must_use]
    pub fn second_line(&self) -> Option<&str> {
        self.line2
            .as_deref()
            .filter(|line| !line.trim().is_empty())
    }

    /// Whether there is nothing to draw
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line1.is_empty() && self.second_line().is_none()
    }

    /// Parse a spec from a JSON request payload
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TextBehindError::invalid_config(format!("Invalid text spec JSON: {e}")))
    }

    /// Check the font size is usable
    ///
    /// Sizes above `i32::MAX` are rejected since line offsets are signed pixels.
    pub fn validate(&self) -> Result<()> {
        if self.font_size == 0 || i32::try_from(self.font_size).is_err() {
            return Err(TextBehindError::config_value_error(
                "font_size",
                self.font_size,
                "1 to 2147483647",
                Some(48),
            ));
        }
        Ok(())
    }
}

/// Detailed timing breakdown for one effect request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image decoding and RGB normalization
    pub image_decode_ms: u64,

    /// External segmentation call
    pub segmentation_ms: u64,

    /// Mask thresholding
    pub binarize_ms: u64,

    /// Text layer rendering
    pub text_render_ms: u64,

    /// Both composite passes and the flatten
    pub composite_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Segmentation: {}ms | Binarize: {}ms | Text: {}ms | Composite: {}ms",
            self.total_ms,
            self.image_decode_ms,
            self.segmentation_ms,
            self.binarize_ms,
            self.text_render_ms,
            self.composite_ms
        )
    }
}

/// Output of an effect request with the intermediate data kept for inspection
#[derive(Debug, Clone)]
pub struct EffectResult {
    /// Final opaque composite
    pub image: RgbImage,

    /// Foreground mask used for compositing
    pub mask: BinaryMask,

    /// Foreground/background pixel counts
    pub mask_statistics: MaskStatistics,

    /// Per-stage timings
    pub timings: ProcessingTimings,
}

impl EffectResult {
    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
