//! Thresholding of segmentation probability maps into binary masks

use crate::error::{Result, TextBehindError};
use crate::types::{BinaryMask, SegmentationMask};
use tracing::debug;

/// Probability above which a pixel counts as foreground
pub const FOREGROUND_THRESHOLD: f32 = 0.5;

/// Turns a continuous foreground probability map into a binary decision
pub struct MaskBinarizer;

impl MaskBinarizer {
    /// Per-value rule: strictly greater than the threshold is foreground
    #[must_use]
    pub fn is_foreground(value: f32) -> bool {
        value > FOREGROUND_THRESHOLD
    }

    /// Binarize a segmentation mask
    ///
    /// Returns `(foreground, background)` where the second mask is the logical
    /// inverse of the first.
    ///
    /// # Errors
    /// - `DimensionMismatch` when the mask has a zero dimension or its buffer
    ///   length disagrees with its dimensions
    pub fn binarize(mask: &SegmentationMask) -> Result<(BinaryMask, BinaryMask)> {
        let (width, height) = mask.dimensions;
        let expected_len = width as usize * height as usize;

        if width == 0 || height == 0 || mask.data.len() != expected_len {
            let actual_height = if width == 0 {
                0
            } else {
                (mask.data.len() / width as usize) as u32
            };
            return Err(TextBehindError::dimension_mismatch(
                "segmentation mask buffer",
                (width, height),
                (width, actual_height),
            ));
        }

        let foreground = BinaryMask {
            data: mask.data.iter().map(|&v| Self::is_foreground(v)).collect(),
            dimensions: mask.dimensions,
        };
        let background = foreground.invert();

        debug!(
            width,
            height,
            foreground_pixels = foreground.foreground_count(),
            "Binarized segmentation mask"
        );

        Ok((foreground, background))
    }
}
