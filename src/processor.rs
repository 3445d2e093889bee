//! Text-behind-subject effect pipeline
//!
//! `TextBehindProcessor` ties the stages together: decode, segment, binarize,
//! render text and composite. Any stage failure is reported as a
//! [`TextBehindError::CompositeFailure`] naming the stage, with the original
//! error kept as its source.

use crate::{
    compositor::LayerCompositor,
    error::{Result, TextBehindError},
    mask::MaskBinarizer,
    segmentation::SegmentationProvider,
    services::ImageIOService,
    text::{DirectoryFontStore, FontStore, TextLayerRenderer},
    types::{EffectResult, ProcessingTimings, TextSpec},
};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, span, Level};

/// Stage names reported in [`TextBehindError::CompositeFailure`]
pub mod stage {
    pub const VALIDATE: &str = "validate";
    pub const DECODE: &str = "decode";
    pub const SEGMENTATION: &str = "segmentation";
    pub const BINARIZE: &str = "binarize";
    pub const COMPOSITE: &str = "composite";
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Renders text behind the foreground subject of photos
///
/// Holds no per-request state, so one processor can serve many threads.
pub struct TextBehindProcessor {
    provider: Arc<dyn SegmentationProvider>,
    renderer: TextLayerRenderer,
}

impl TextBehindProcessor {
    /// Processor using the given segmentation provider and font store
    pub fn new(provider: Arc<dyn SegmentationProvider>, font_store: Arc<dyn FontStore>) -> Self {
        Self {
            provider,
            renderer: TextLayerRenderer::new(font_store),
        }
    }

    /// Processor searching `fonts/` and the system font directories
    pub fn with_default_fonts(provider: Arc<dyn SegmentationProvider>) -> Self {
        Self::new(provider, Arc::new(DirectoryFontStore::with_default_dirs()))
    }

    /// Processor with a preconfigured text renderer
    pub fn with_renderer(
        provider: Arc<dyn SegmentationProvider>,
        renderer: TextLayerRenderer,
    ) -> Self {
        Self { provider, renderer }
    }

    /// Decode an encoded image and apply the effect
    ///
    /// # Errors
    /// - `CompositeFailure` naming the stage that failed
    pub fn process_bytes(&self, image_bytes: &[u8], spec: &TextSpec) -> Result<RgbImage> {
        self.process_bytes_with_details(image_bytes, spec)
            .map(|result| result.image)
    }

    /// Decode an encoded image and apply the effect, keeping intermediate data
    ///
    /// # Errors
    /// - `CompositeFailure` naming the stage that failed
    pub fn process_bytes_with_details(
        &self,
        image_bytes: &[u8],
        spec: &TextSpec,
    ) -> Result<EffectResult> {
        let total_start = Instant::now();
        Self::validate(spec)?;

        let decode_start = Instant::now();
        let rgb = ImageIOService::decode_rgb(image_bytes)
            .map_err(|e| TextBehindError::composite_failure(stage::DECODE, e))?;
        let decode_ms = elapsed_ms(decode_start);

        let mut result = self.run(&rgb, spec, total_start)?;
        result.timings.image_decode_ms = decode_ms;
        Ok(result)
    }

    /// Apply the effect to a decoded image
    ///
    /// # Errors
    /// - `CompositeFailure` naming the stage that failed
    pub fn process_image(&self, image: &DynamicImage, spec: &TextSpec) -> Result<RgbImage> {
        self.process_with_details(image, spec).map(|result| result.image)
    }

    /// Render one or two lines of text behind the subject of `image`
    ///
    /// An empty or blank `line2` is treated as absent.
    ///
    /// # Errors
    /// - `CompositeFailure` naming the stage that failed
    #[allow(clippy::too_many_arguments)]
    pub fn render_text_behind_subject(
        &self,
        image: &DynamicImage,
        line1: &str,
        line2: Option<&str>,
        font_family: &str,
        font_size: u32,
        anchor_x: i32,
        anchor_y: i32,
    ) -> Result<RgbImage> {
        let spec = TextSpec {
            line1: line1.to_string(),
            line2: line2.map(str::to_string),
            font_family: font_family.to_string(),
            font_size,
            anchor_x,
            anchor_y,
        };
        self.process_image(image, &spec)
    }

    /// Apply the effect and return the result with its mask and timings
    ///
    /// # Errors
    /// - `CompositeFailure` naming the stage that failed
    #[instrument(
        skip(self, image, spec),
        fields(
            dimensions = %format!("{}x{}", image.width(), image.height()),
            font_family = %spec.font_family,
            font_size = spec.font_size
        )
    )]
    pub fn process_with_details(&self, image: &DynamicImage, spec: &TextSpec) -> Result<EffectResult> {
        let total_start = Instant::now();
        Self::validate(spec)?;

        let decode_start = Instant::now();
        let rgb = image.to_rgb8();
        let decode_ms = elapsed_ms(decode_start);

        let mut result = self.run(&rgb, spec, total_start)?;
        result.timings.image_decode_ms = decode_ms;
        Ok(result)
    }

    fn validate(spec: &TextSpec) -> Result<()> {
        spec.validate()
            .map_err(|e| TextBehindError::composite_failure(stage::VALIDATE, e))
    }

    fn run(&self, image: &RgbImage, spec: &TextSpec, total_start: Instant) -> Result<EffectResult> {
        let dimensions = image.dimensions();
        let mut timings = ProcessingTimings::default();

        info!(
            width = dimensions.0,
            height = dimensions.1,
            lines = if spec.second_line().is_some() { 2 } else { 1 },
            "Starting text-behind-subject effect"
        );

        let segmentation = {
            let _span = span!(Level::INFO, "segmentation").entered();
            let start = Instant::now();
            let mask = self
                .provider
                .segment(image)
                .and_then(|mask| {
                    if mask.dimensions == dimensions {
                        Ok(mask)
                    } else {
                        Err(TextBehindError::dimension_mismatch(
                            "segmentation mask",
                            dimensions,
                            mask.dimensions,
                        ))
                    }
                })
                .map_err(|e| TextBehindError::composite_failure(stage::SEGMENTATION, e))?;
            timings.segmentation_ms = elapsed_ms(start);
            mask
        };

        let foreground = {
            let _span = span!(Level::DEBUG, "binarize").entered();
            let start = Instant::now();
            let (foreground, _background) = MaskBinarizer::binarize(&segmentation)
                .map_err(|e| TextBehindError::composite_failure(stage::BINARIZE, e))?;
            timings.binarize_ms = elapsed_ms(start);
            foreground
        };
        let mask_statistics = foreground.statistics();
        debug!(
            foreground_pixels = mask_statistics.foreground_pixels,
            foreground_ratio = mask_statistics.foreground_ratio,
            "Mask statistics"
        );

        let text_layer = {
            let start = Instant::now();
            let layer = self.renderer.render(dimensions, spec);
            timings.text_render_ms = elapsed_ms(start);
            layer
        };

        let composite = {
            let start = Instant::now();
            let composite = LayerCompositor::composite(image, &text_layer, &foreground)
                .map_err(|e| TextBehindError::composite_failure(stage::COMPOSITE, e))?;
            timings.composite_ms = elapsed_ms(start);
            composite
        };

        timings.total_ms = elapsed_ms(total_start);
        info!(timings = %timings.summary(), "Effect complete");

        Ok(EffectResult {
            image: composite,
            mask: foreground,
            mask_statistics,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{
        ConstantMaskProvider, FailingProvider, FixedMaskProvider, RegionMaskProvider,
    };
    use crate::text::MemoryFontStore;
    use crate::types::SegmentationMask;
    use image::Rgb;

    fn processor(provider: impl SegmentationProvider + 'static) -> TextBehindProcessor {
        TextBehindProcessor::new(Arc::new(provider), Arc::new(MemoryFontStore::new()))
    }

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    fn gray_photo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([90, 90, 90])))
    }

    #[test]
    fn test_background_mask_shows_text() {
        let processor = processor(ConstantMaskProvider::background());
        let spec = TextSpec::new("HI").with_font("Arial", 20).with_anchor(10, 10);
        let result = processor.process_image(&gray_photo(), &spec).unwrap();

        assert_eq!(result.dimensions(), (80, 60));
        // Bitmap fill blended over gray: 220/255 white
        let lit = result.get_pixel(10, 10);
        assert!(lit[0] > 200, "expected text pixel, got {lit:?}");
        assert_eq!(*result.get_pixel(70, 50), Rgb([90, 90, 90]));
    }

    #[test]
    fn test_foreground_mask_hides_text() {
        let processor = processor(ConstantMaskProvider::foreground());
        let spec = TextSpec::new("HI").with_anchor(10, 10);
        let image = gray_photo();
        let result = processor.process_image(&image, &spec).unwrap();
        assert_eq!(result, image.to_rgb8());
    }

    #[test]
    fn test_subject_region_occludes_text() {
        // Subject covers the top-left glyph, text continues to the right
        let processor = processor(RegionMaskProvider::new(0, 0, 16, 60));
        let spec = TextSpec::new("HHHH").with_anchor(10, 10);
        let result = processor.process_image(&gray_photo(), &spec).unwrap();

        assert_eq!(*result.get_pixel(10, 10), Rgb([90, 90, 90]));
        // Second H starts at x = 22
        assert!(result.get_pixel(22, 10)[0] > 200);
    }

    #[test]
    fn test_render_text_behind_subject_arguments() {
        let processor = processor(ConstantMaskProvider::background());
        let result = processor
            .render_text_behind_subject(&gray_photo(), "HI", Some("HI"), "Arial", 20, 10, 10)
            .unwrap();
        assert_eq!(result.dimensions(), (80, 60));
        assert_ne!(*result.get_pixel(10, 10), Rgb([90, 90, 90]));
        // Bitmap font: second line 20 pixels lower
        assert_ne!(*result.get_pixel(10, 30), Rgb([90, 90, 90]));
    }

    #[test]
    fn test_empty_text_on_background_is_identity() {
        let processor = processor(ConstantMaskProvider::background());
        let image = white(100, 100);
        let result = processor
            .render_text_behind_subject(&image, "", Some(" "), "Arial", 48, 50, 50)
            .unwrap();
        assert_eq!(result.as_raw(), image.to_rgb8().as_raw());
    }

    #[test]
    fn test_details_include_mask_and_timings() {
        let processor = processor(RegionMaskProvider::new(0, 0, 40, 60));
        let result = processor
            .process_with_details(&gray_photo(), &TextSpec::new("X"))
            .unwrap();

        assert_eq!(result.mask.dimensions, (80, 60));
        assert_eq!(result.mask_statistics.foreground_pixels, 40 * 60);
        assert!(result.timings.total_ms >= result.timings.composite_ms);
    }

    #[test]
    fn test_provider_failure_is_wrapped() {
        let provider = Arc::new(FailingProvider::new("model unavailable"));
        let processor =
            TextBehindProcessor::new(provider.clone(), Arc::new(MemoryFontStore::new()));
        let err = processor
            .process_image(&gray_photo(), &TextSpec::new("X"))
            .unwrap_err();

        assert_eq!(err.stage(), Some(stage::SEGMENTATION));
        assert!(matches!(err.root_cause(), TextBehindError::Segmentation(_)));
        assert!(err.to_string().contains("model unavailable"));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_wrong_mask_size_is_segmentation_failure() {
        let processor = processor(FixedMaskProvider::new(SegmentationMask::filled(10, 10, 0.0)));
        let err = processor
            .process_image(&gray_photo(), &TextSpec::new("X"))
            .unwrap_err();
        assert_eq!(err.stage(), Some(stage::SEGMENTATION));
        assert!(matches!(
            err.root_cause(),
            TextBehindError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_invalid_spec_fails_before_segmentation() {
        let provider = Arc::new(FailingProvider::new("unused"));
        let processor =
            TextBehindProcessor::new(provider.clone(), Arc::new(MemoryFontStore::new()));
        let spec = TextSpec::new("X").with_font("Arial", 0);
        let err = processor.process_image(&gray_photo(), &spec).unwrap_err();

        assert_eq!(err.stage(), Some(stage::VALIDATE));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_undecodable_bytes_fail_in_decode_stage() {
        let processor = processor(ConstantMaskProvider::background());
        let err = processor
            .process_bytes(b"\x00\x01garbage", &TextSpec::new("X"))
            .unwrap_err();
        assert_eq!(err.stage(), Some(stage::DECODE));
        assert!(matches!(err.root_cause(), TextBehindError::Image(_)));
    }

    #[test]
    fn test_process_bytes_normalizes_rgba_input() {
        let rgba = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let processor = processor(ConstantMaskProvider::foreground());
        let result = processor.process_bytes(&bytes, &TextSpec::new("")).unwrap();
        // Alpha is dropped, not composited
        assert_eq!(*result.get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_processor_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TextBehindProcessor>();
    }
}
