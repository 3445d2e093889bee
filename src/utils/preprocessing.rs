//! Letterbox preprocessing of photos into model input tensors

use crate::{
    config::PreprocessingConfig,
    error::{Result, TextBehindError},
};
use image::{imageops, Rgb, RgbImage};
use ndarray::Array4;

/// Padding color around the letterboxed image
pub const PADDING_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Placement of the resized photo inside the square model canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub target_size: u32,
}

impl Letterbox {
    /// Aspect-preserving fit of `(width, height)` into a `target_size` square
    ///
    /// # Errors
    /// - `Processing` when either side or the target size is zero
    pub fn fit(dimensions: (u32, u32), target_size: u32) -> Result<Self> {
        let (width, height) = dimensions;
        if width == 0 || height == 0 || target_size == 0 {
            return Err(TextBehindError::processing(format!(
                "Cannot letterbox {width}x{height} into {target_size}x{target_size}"
            )));
        }

        let target = target_size as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Ok(Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
            target_size,
        })
    }

    /// Model-space pixel for an original-image pixel, clamped into the canvas
    #[must_use]
    pub fn to_model(&self, x: u32, y: u32) -> (usize, usize) {
        let max = self.target_size.saturating_sub(1);
        let mx = ((x as f32 * self.scale).round() as u32 + self.offset_x).min(max);
        let my = ((y as f32 * self.scale).round() as u32 + self.offset_y).min(max);
        (mx as usize, my as usize)
    }
}

/// Image preprocessing for segmentation models
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Letterbox an image onto a white square canvas
    ///
    /// # Errors
    /// - `Processing` for empty images or a zero target size
    pub fn letterbox(image: &RgbImage, target_size: u32) -> Result<(RgbImage, Letterbox)> {
        let letterbox = Letterbox::fit(image.dimensions(), target_size)?;

        let resized = imageops::resize(
            image,
            letterbox.scaled_width,
            letterbox.scaled_height,
            imageops::FilterType::Triangle,
        );

        let mut canvas = RgbImage::from_pixel(target_size, target_size, PADDING_COLOR);
        imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        Ok((canvas, letterbox))
    }

    /// Letterbox and normalize an image into an NCHW tensor
    ///
    /// # Errors
    /// - `Processing` for empty images or a zero target size
    pub fn preprocess(
        image: &RgbImage,
        config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, Letterbox)> {
        let (canvas, letterbox) = Self::letterbox(image, config.target_size)?;
        Ok((Self::canvas_to_tensor(&canvas, config), letterbox))
    }

    /// Convert a canvas to a normalized tensor: `(v / 255 - mean) / std`
    fn canvas_to_tensor(canvas: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = (f32::from(pixel[channel]) / 255.0 - config.normalization_mean[channel])
                    / config.normalization_std[channel];
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = value;
                }
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target_size: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn test_letterbox_wide_image() {
        let fit = Letterbox::fit((200, 100), 100).unwrap();
        assert!((fit.scale - 0.5).abs() < f32::EPSILON);
        assert_eq!((fit.scaled_width, fit.scaled_height), (100, 50));
        assert_eq!((fit.offset_x, fit.offset_y), (0, 25));
    }

    #[test]
    fn test_letterbox_upscales_small_image() {
        let fit = Letterbox::fit((10, 20), 40).unwrap();
        assert_eq!((fit.scaled_width, fit.scaled_height), (20, 40));
        assert_eq!((fit.offset_x, fit.offset_y), (10, 0));
        assert_eq!(fit.to_model(0, 0), (10, 0));
        assert_eq!(fit.to_model(9, 19), (28, 38));
    }

    #[test]
    fn test_letterbox_rejects_empty() {
        assert!(Letterbox::fit((0, 10), 32).is_err());
        assert!(Letterbox::fit((10, 10), 0).is_err());
    }

    #[test]
    fn test_to_model_clamps_into_canvas() {
        let fit = Letterbox::fit((3, 3), 2).unwrap();
        assert_eq!(fit.to_model(2, 2), (1, 1));
    }

    #[test]
    fn test_preprocess_shape_padding_and_normalization() {
        let image = RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]));
        let (tensor, letterbox) = ImagePreprocessor::preprocess(&image, &config(20)).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 20, 20]);
        assert_eq!(letterbox.offset_y, 5);
        // White padding normalizes to +0.5, black photo pixels to -0.5
        assert!((tensor[[0, 0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((tensor[[0, 2, 10, 10]] + 0.5).abs() < 1e-6);
        assert!((tensor[[0, 1, 19, 19]] - 0.5).abs() < 1e-6);
    }
}
