//! Mask-driven layer compositing
//!
//! The text layer is first cut away wherever the subject is, blended over the
//! photo, and then the subject itself is blended back on top. The final image
//! is flattened onto white so no alpha survives.

use crate::error::{Result, TextBehindError};
use crate::types::BinaryMask;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use tracing::{debug, span, Level};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Combines photo, text layer and subject mask into the final image
pub struct LayerCompositor;

impl LayerCompositor {
    /// Run both composite passes and flatten the result
    ///
    /// # Errors
    /// - `DimensionMismatch` when the text layer or mask size differs from the image
    pub fn composite(
        image: &RgbImage,
        text_layer: &RgbaImage,
        mask: &BinaryMask,
    ) -> Result<RgbImage> {
        let dimensions = image.dimensions();
        Self::check_dimensions("text layer", dimensions, text_layer.dimensions())?;
        Self::check_dimensions("binary mask", dimensions, mask.dimensions)?;

        let _span = span!(
            Level::DEBUG,
            "composite",
            width = dimensions.0,
            height = dimensions.1
        )
        .entered();

        let background = to_rgba(image);

        let masked_text = Self::mask_text_layer(text_layer, mask)?;
        let pass1 = Self::alpha_over(&background, &masked_text)?;
        debug!("Pass 1 complete: text composited over background");

        let cutout = Self::subject_cutout(&background, mask)?;
        let pass2 = Self::alpha_over(&pass1, &cutout)?;
        debug!("Pass 2 complete: subject composited over text");

        Ok(Self::flatten_onto_white(&pass2))
    }

    /// Force every text pixel under the subject to full transparency
    pub fn mask_text_layer(text_layer: &RgbaImage, mask: &BinaryMask) -> Result<RgbaImage> {
        Self::check_dimensions("binary mask", text_layer.dimensions(), mask.dimensions)?;

        let mut masked = text_layer.clone();
        for (x, y, pixel) in masked.enumerate_pixels_mut() {
            if mask.is_foreground(x, y) {
                *pixel = TRANSPARENT;
            }
        }
        Ok(masked)
    }

    /// Keep only the subject pixels of an image, everything else transparent
    pub fn subject_cutout(image: &RgbaImage, mask: &BinaryMask) -> Result<RgbaImage> {
        Self::check_dimensions("binary mask", image.dimensions(), mask.dimensions)?;

        let (width, height) = image.dimensions();
        Ok(RgbaImage::from_fn(width, height, |x, y| {
            if mask.is_foreground(x, y) {
                *image.get_pixel(x, y)
            } else {
                TRANSPARENT
            }
        }))
    }

    /// Porter-Duff "over" with straight (non-premultiplied) alpha
    ///
    /// # Errors
    /// - `DimensionMismatch` when the layers differ in size
    pub fn alpha_over(dst: &RgbaImage, src: &RgbaImage) -> Result<RgbaImage> {
        Self::check_dimensions("source layer", dst.dimensions(), src.dimensions())?;

        let (width, height) = dst.dimensions();
        let mut out = RgbaImage::new(width, height);
        for ((out_px, dst_px), src_px) in out.pixels_mut().zip(dst.pixels()).zip(src.pixels()) {
            *out_px = over_pixel(*dst_px, *src_px);
        }
        Ok(out)
    }

    /// Composite onto opaque white and drop the alpha channel
    #[must_use]
    pub fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
        let (width, height) = image.dimensions();
        let mut out = RgbImage::new(width, height);
        for (out_px, px) in out.pixels_mut().zip(image.pixels()) {
            let alpha = f32::from(px[3]) / 255.0;
            let blend = |c: u8| (f32::from(c) * alpha + 255.0 * (1.0 - alpha)).round() as u8;
            *out_px = Rgb([blend(px[0]), blend(px[1]), blend(px[2])]);
        }
        out
    }

    fn check_dimensions(context: &str, expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
        if expected != actual {
            return Err(TextBehindError::dimension_mismatch(context, expected, actual));
        }
        Ok(())
    }
}

fn to_rgba(image: &RgbImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgba([r, g, b, 255])
    })
}

fn over_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let src_a = f32::from(src[3]) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |s: u8, d: u8| {
        let value = (f32::from(s) * src_a + f32::from(d) * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
