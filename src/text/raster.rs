//! Glyph coverage maps and stamping them onto an RGBA canvas

use super::fonts::FontHandle;
use cosmic_text::{
    fontdb, Attrs, Buffer, Color as CosmicColor, Family, FontSystem, Metrics, Shaping, SwashCache,
    Wrap,
};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use tracing::{debug, warn};

/// Line height relative to the font size for scalable fonts
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// 8-bit coverage of one rasterized line of text
///
/// `origin` is the position of the coverage map's top-left pixel relative to
/// the point the line is drawn at; shaped glyphs can overhang to the left or
/// above.
#[derive(Debug, Clone)]
pub struct GlyphCoverage {
    origin: (i32, i32),
    alpha: GrayImage,
}

impl GlyphCoverage {
    pub fn new(origin: (i32, i32), alpha: GrayImage) -> Self {
        Self { origin, alpha }
    }

    /// Coverage that draws nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::new((0, 0), GrayImage::new(0, 0))
    }

    /// Build a coverage map from scattered `(x, y, coverage)` samples
    ///
    /// Samples landing on the same pixel keep the strongest coverage.
    #[must_use]
    pub fn from_samples(samples: &[(i32, i32, u8)]) -> Self {
        let mut drawn = samples.iter().filter(|(_, _, a)| *a > 0);
        let Some(&(first_x, first_y, _)) = drawn.next() else {
            return Self::empty();
        };

        let (min_x, min_y, max_x, max_y) = drawn.fold(
            (first_x, first_y, first_x, first_y),
            |(min_x, min_y, max_x, max_y), &(x, y, _)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        );

        let width = (max_x - min_x + 1) as u32;
        let height = (max_y - min_y + 1) as u32;
        let mut alpha = GrayImage::new(width, height);
        for &(x, y, a) in samples.iter().filter(|(_, _, a)| *a > 0) {
            let px = alpha.get_pixel_mut((x - min_x) as u32, (y - min_y) as u32);
            px[0] = px[0].max(a);
        }

        Self::new((min_x, min_y), alpha)
    }

    #[must_use]
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    #[must_use]
    pub fn alpha(&self) -> &GrayImage {
        &self.alpha
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alpha.pixels().all(|p| p[0] == 0)
    }
}

/// Blend `ink` into the canvas wherever the coverage is non-zero
///
/// Every channel, alpha included, moves toward the ink in proportion to the
/// coverage, so a fully covered pixel ends up exactly the ink color. Pixels
/// falling outside the canvas are clipped.
pub fn stamp(canvas: &mut RgbaImage, coverage: &GlyphCoverage, at: (i32, i32), ink: Rgba<u8>) {
    let (canvas_w, canvas_h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let left = i64::from(at.0) + i64::from(coverage.origin.0);
    let top = i64::from(at.1) + i64::from(coverage.origin.1);

    for (x, y, Luma([cov])) in coverage.alpha.enumerate_pixels() {
        if *cov == 0 {
            continue;
        }
        let cx = left + i64::from(x);
        let cy = top + i64::from(y);
        if cx < 0 || cy < 0 || cx >= canvas_w || cy >= canvas_h {
            continue;
        }

        let px = canvas.get_pixel_mut(cx as u32, cy as u32);
        let cov = u32::from(*cov);
        for (channel, ink_channel) in px.0.iter_mut().zip(ink.0) {
            let blended = (u32::from(*channel) * (255 - cov) + u32::from(ink_channel) * cov + 127) / 255;
            *channel = blended as u8;
        }
    }
}

/// Shapes and rasterizes text with a scalable font through cosmic-text
pub struct ScalableRasterizer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    family: String,
}

impl ScalableRasterizer {
    /// Load a font into a private font database
    ///
    /// Returns `None` when the bytes do not parse as a font face.
    #[must_use]
    pub fn new(font: &FontHandle) -> Option<Self> {
        let mut db = fontdb::Database::new();
        db.load_font_data(font.data().to_vec());

        let family = db
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()));

        let Some(family) = family else {
            warn!(
                resource = font.resource(),
                "Font data could not be parsed, falling back to bitmap font"
            );
            return None;
        };

        debug!(resource = font.resource(), family = %family, "Loaded scalable font");
        Some(Self {
            font_system: FontSystem::new_with_locale_and_db("en-US".to_string(), db),
            swash_cache: SwashCache::new(),
            family,
        })
    }

    /// Family name reported by the font file
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Rasterize a single line at the given pixel size
    pub fn rasterize(&mut self, text: &str, font_size: f32) -> GlyphCoverage {
        if text.is_empty() || font_size <= 0.0 {
            return GlyphCoverage::empty();
        }

        let metrics = Metrics::new(font_size, font_size * LINE_HEIGHT_FACTOR);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_wrap(&mut self.font_system, Wrap::None);

        let attrs = Attrs::new().family(Family::Name(&self.family));
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        // Drawing in opaque white leaves the coverage in the alpha channel
        let mut samples = Vec::new();
        buffer.draw(
            &mut self.font_system,
            &mut self.swash_cache,
            CosmicColor::rgba(255, 255, 255, 255),
            |x, y, w, h, color| {
                let coverage = color.a();
                if coverage == 0 {
                    return;
                }
                for dy in 0..h as i32 {
                    for dx in 0..w as i32 {
                        samples.push((x + dx, y + dy, coverage));
                    }
                }
            },
        );

        GlyphCoverage::from_samples(&samples)
    }
}
