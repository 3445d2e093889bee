//! Output encoding

use crate::{
    config::OutputFormat,
    error::{Result, TextBehindError},
};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};

/// Default JPEG quality
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Service for encoding composite results
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an opaque image into the requested format
    ///
    /// `jpeg_quality` is only used for JPEG and must be within 1-100.
    ///
    /// # Errors
    /// - `InvalidConfig` for an out-of-range JPEG quality
    /// - `Image` when encoding fails
    ///
    /// # Examples
    /// ```rust
    /// use text_behind::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbImage;
    ///
    /// let bytes = OutputFormatHandler::encode(&RgbImage::new(4, 4), OutputFormat::Png, 90)?;
    /// assert_eq!(&bytes[1..4], b"PNG");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(image: &RgbImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match format {
            OutputFormat::Png => {
                image.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                if !(1..=100).contains(&jpeg_quality) {
                    return Err(TextBehindError::config_value_error(
                        "JPEG quality",
                        jpeg_quality,
                        "1-100",
                        Some(DEFAULT_JPEG_QUALITY),
                    ));
                }
                JpegEncoder::new_with_quality(&mut bytes, jpeg_quality).write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    image::ExtendedColorType::Rgb8,
                )?;
            },
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_png_is_lossless() {
        let image = RgbImage::from_fn(5, 5, |x, y| Rgb([x as u8 * 40, y as u8 * 40, 7]));
        let bytes = OutputFormatHandler::encode(&image, OutputFormat::Png, 90).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_jpeg_encoding() {
        let image = RgbImage::from_pixel(16, 16, Rgb([128, 64, 32]));
        let bytes = OutputFormatHandler::encode(&image, OutputFormat::Jpeg, 85).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(image::load_from_memory(&bytes).unwrap().to_rgb8().dimensions(), (16, 16));
    }

    #[test]
    fn test_jpeg_quality_range() {
        let image = RgbImage::new(2, 2);
        assert!(OutputFormatHandler::encode(&image, OutputFormat::Jpeg, 0).is_err());
        assert!(OutputFormatHandler::encode(&image, OutputFormat::Jpeg, 101).is_err());
        // PNG ignores the quality
        assert!(OutputFormatHandler::encode(&image, OutputFormat::Png, 0).is_ok());
    }
}
