//! Image file and buffer I/O
//!
//! Keeps decoding and file handling out of the effect pipeline.

use crate::{
    config::OutputFormat,
    error::{Result, TextBehindError},
    services::format::OutputFormatHandler,
};
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Prefix of generated output file names
pub const OUTPUT_FILE_PREFIX: &str = "text_behind_image_";

/// Service for loading and saving images
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Decoding is tried by extension first, then by sniffing the content.
    ///
    /// # Errors
    /// - `Io` when the file is missing or unreadable
    /// - `Image` when neither detection method can decode it
    ///
    /// # Examples
    /// ```rust,no_run
    /// use text_behind::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("portrait.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(TextBehindError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Image file does not exist: {}", path_ref.display()),
            )));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {e}. Attempting content-based detection.",
                    path_ref.display()
                );
                let data = std::fs::read(path_ref)?;
                Self::decode_bytes(&data)
            },
        }
    }

    /// Decode an in-memory encoded image, sniffing its format
    ///
    /// # Errors
    /// - `Image` when the bytes are not a supported image
    pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(data)?)
    }

    /// Decode bytes and normalize to 8-bit RGB
    ///
    /// # Errors
    /// - `Image` when the bytes are not a supported image
    pub fn decode_rgb(data: &[u8]) -> Result<RgbImage> {
        Ok(Self::decode_bytes(data)?.to_rgb8())
    }

    /// Encode and write an image, creating parent directories as needed
    ///
    /// # Errors
    /// - `Io` when the directory or file cannot be written
    /// - `Image` when encoding fails
    pub fn save_image<P: AsRef<Path>>(
        image: &RgbImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = OutputFormatHandler::encode(image, format, jpeg_quality)?;
        std::fs::write(path_ref, bytes)?;

        log::debug!(
            "Saved {}x{} {format:?} image to {}",
            image.width(),
            image.height(),
            path_ref.display()
        );
        Ok(())
    }

    /// Output file name for a result: `text_behind_image_<id>.<ext>`
    #[must_use]
    pub fn output_file_name(id: &str, format: OutputFormat) -> String {
        format!("{OUTPUT_FILE_PREFIX}{id}.{}", format.extension())
    }
}
