//! Text layer rendering
//!
//! Draws one or two lines of outlined text onto a transparent canvas the size
//! of the photo. Each line is rasterized once into a coverage map and then
//! stamped: 24 times around the anchor in the outline color, once at the
//! anchor in the fill color. The built-in bitmap font gets no outline.

pub mod bitmap;
pub mod fonts;
pub mod raster;

pub use fonts::{
    AliasResolver, DirectoryFontStore, ExtensionResolver, FontHandle, FontResolver, FontStore,
    MemoryFontStore, ResolvedFont, ResolverStrategy, FONT_ALIASES,
};
pub use raster::{stamp, GlyphCoverage, ScalableRasterizer};

use crate::types::TextSpec;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tracing::{debug, span, Level};

/// Text body color
pub const FILL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 220]);

/// Outline color, stamped around the text body
pub const OUTLINE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 180]);

/// Gap between the first line's font size and the second line, scalable fonts
pub const LINE_SPACING: i32 = 10;

/// Second line offset when the built-in bitmap font is used
pub const BITMAP_LINE_OFFSET: i32 = 20;

const OUTLINE_RADIUS: i32 = 2;

/// Every `(dx, dy)` in `[-2, 2]^2` except the origin, row by row
pub const OUTLINE_OFFSETS: [(i32, i32); 24] = outline_offsets();

const fn outline_offsets() -> [(i32, i32); 24] {
    let mut offsets = [(0, 0); 24];
    let mut index = 0;
    let mut dx = -OUTLINE_RADIUS;
    while dx <= OUTLINE_RADIUS {
        let mut dy = -OUTLINE_RADIUS;
        while dy <= OUTLINE_RADIUS {
            if dx != 0 || dy != 0 {
                offsets[index] = (dx, dy);
                index += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    offsets
}

/// Which kind of font drew the text layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontKind {
    /// A scalable font, identified by the resource it was loaded from
    Scalable { resource: String },
    /// The built-in bitmap font
    Bitmap,
}

/// What the renderer did for one text layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayerReport {
    pub font: FontKind,

    /// Top-left anchor of each drawn line, in order
    pub line_anchors: Vec<(i32, i32)>,
}

/// Anchors of line 1 and, if present, line 2
#[must_use]
pub fn line_anchors(spec: &TextSpec, scalable: bool) -> Vec<(i32, i32)> {
    let (x, y) = spec.anchor();
    let mut anchors = vec![(x, y)];
    if spec.second_line().is_some() {
        let offset = if scalable {
            i32::try_from(spec.font_size)
                .unwrap_or(i32::MAX)
                .saturating_add(LINE_SPACING)
        } else {
            BITMAP_LINE_OFFSET
        };
        anchors.push((x, y.saturating_add(offset)));
    }
    anchors
}

/// Stamp every line's outline ring, then every line's fill on top
///
/// All outlines go down before any fill, so a later line's outline never
/// covers an earlier line's body.
pub fn stamp_outlined_lines(
    layer: &mut RgbaImage,
    coverages: &[GlyphCoverage],
    anchors: &[(i32, i32)],
) {
    for &(dx, dy) in &OUTLINE_OFFSETS {
        for (coverage, &(x, y)) in coverages.iter().zip(anchors) {
            stamp(
                layer,
                coverage,
                (x.saturating_add(dx), y.saturating_add(dy)),
                OUTLINE_COLOR,
            );
        }
    }
    for (coverage, &anchor) in coverages.iter().zip(anchors) {
        stamp(layer, coverage, anchor, FILL_COLOR);
    }
}

/// Renders text specs onto transparent RGBA layers
pub struct TextLayerRenderer {
    resolver: FontResolver,
}

impl TextLayerRenderer {
    pub fn new(font_store: Arc<dyn FontStore>) -> Self {
        Self {
            resolver: FontResolver::new(font_store),
        }
    }

    /// Renderer with a custom resolution chain
    #[must_use]
    pub fn with_resolver(resolver: FontResolver) -> Self {
        Self { resolver }
    }

    /// Render the text layer for an image of the given size
    #[must_use]
    pub fn render(&self, dimensions: (u32, u32), spec: &TextSpec) -> RgbaImage {
        self.render_with_report(dimensions, spec).0
    }

    /// Render the text layer and report the font kind and line anchors used
    #[must_use]
    pub fn render_with_report(
        &self,
        dimensions: (u32, u32),
        spec: &TextSpec,
    ) -> (RgbaImage, TextLayerReport) {
        let _span = span!(
            Level::DEBUG,
            "render_text_layer",
            width = dimensions.0,
            height = dimensions.1,
            font_family = %spec.font_family,
            font_size = spec.font_size
        )
        .entered();

        let mut layer = RgbaImage::new(dimensions.0, dimensions.1);
        let lines: Vec<&str> = std::iter::once(spec.line1.as_str())
            .chain(spec.second_line())
            .collect();

        let rasterizer = match self.resolver.resolve(&spec.font_family) {
            ResolvedFont::Scalable(handle) => {
                ScalableRasterizer::new(&handle).map(|r| (r, handle.resource().to_string()))
            },
            ResolvedFont::Bitmap => None,
        };

        let report = match rasterizer {
            Some((mut rasterizer, resource)) => {
                let anchors = line_anchors(spec, true);
                let coverages: Vec<GlyphCoverage> = lines
                    .iter()
                    .map(|line| rasterizer.rasterize(line, spec.font_size as f32))
                    .collect();

                stamp_outlined_lines(&mut layer, &coverages, &anchors);

                TextLayerReport {
                    font: FontKind::Scalable { resource },
                    line_anchors: anchors,
                }
            },
            None => {
                let anchors = line_anchors(spec, false);
                for (line, &anchor) in lines.iter().zip(&anchors) {
                    stamp(&mut layer, &bitmap::rasterize(line), anchor, FILL_COLOR);
                }

                TextLayerReport {
                    font: FontKind::Bitmap,
                    line_anchors: anchors,
                }
            },
        };

        debug!(
            font = ?report.font,
            lines = report.line_anchors.len(),
            "Rendered text layer"
        );
        (layer, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::collections::HashSet;

    fn bitmap_renderer() -> TextLayerRenderer {
        TextLayerRenderer::new(Arc::new(MemoryFontStore::new()))
    }

    /// Renderer backed by a font found on this machine, if any
    fn system_font_renderer() -> Option<(TextLayerRenderer, String)> {
        let store = DirectoryFontStore::with_default_dirs();
        for family in ["DejaVuSans", "LiberationSans-Regular", "Arial", "Helvetica", "Verdana"] {
            if let ResolvedFont::Scalable(handle) = FontResolver::new(Arc::new(store.clone())).resolve(family) {
                if ScalableRasterizer::new(&handle).is_some() {
                    return Some((TextLayerRenderer::new(Arc::new(store)), family.to_string()));
                }
            }
        }
        None
    }

    #[test]
    fn test_outline_offsets_cover_ring() {
        let set: HashSet<_> = OUTLINE_OFFSETS.iter().copied().collect();
        assert_eq!(set.len(), 24);
        assert!(!set.contains(&(0, 0)));
        assert!(set.iter().all(|(dx, dy)| dx.abs() <= 2 && dy.abs() <= 2));
    }

    #[test]
    fn test_line_anchors_for_each_font_kind() {
        let spec = TextSpec::new("TOP")
            .with_second_line("BOTTOM")
            .with_font("Arial", 48)
            .with_anchor(50, 50);
        assert_eq!(line_anchors(&spec, true), vec![(50, 50), (50, 108)]);
        assert_eq!(line_anchors(&spec, false), vec![(50, 50), (50, 70)]);

        let single = TextSpec::new("ONLY").with_second_line("   ");
        assert_eq!(line_anchors(&single, true).len(), 1);
    }

    #[test]
    fn test_line_anchors_saturate_at_extremes() {
        let spec = TextSpec::new("TOP")
            .with_second_line("BOTTOM")
            .with_font("Arial", 48)
            .with_anchor(0, i32::MAX);
        assert_eq!(line_anchors(&spec, true), vec![(0, i32::MAX), (0, i32::MAX)]);
        assert_eq!(line_anchors(&spec, false), vec![(0, i32::MAX), (0, i32::MAX)]);

        let huge = TextSpec::new("TOP")
            .with_second_line("BOTTOM")
            .with_font("Arial", u32::MAX)
            .with_anchor(0, 0);
        assert_eq!(line_anchors(&huge, true)[1], (0, i32::MAX));
    }

    #[test]
    fn test_anchor_at_i32_max_renders_off_canvas() {
        let spec = TextSpec::new("TOP")
            .with_second_line("BOTTOM")
            .with_anchor(0, i32::MAX);
        let (layer, report) = bitmap_renderer().render_with_report((16, 16), &spec);
        assert_eq!(report.line_anchors, vec![(0, i32::MAX), (0, i32::MAX)]);
        assert!(layer.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_outlined_lines_at_i32_extremes() {
        let dot = GlyphCoverage::new((0, 0), GrayImage::from_pixel(1, 1, Luma([255])));
        let mut layer = RgbaImage::new(8, 8);
        stamp_outlined_lines(
            &mut layer,
            &[dot.clone(), dot],
            &[(i32::MAX, i32::MAX), (i32::MIN, i32::MIN)],
        );
        assert!(layer.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_single_pixel_outline_ring_and_fill() {
        let dot = GlyphCoverage::new((0, 0), GrayImage::from_pixel(1, 1, Luma([255])));
        let mut layer = RgbaImage::new(9, 9);
        stamp_outlined_lines(&mut layer, &[dot], &[(4, 4)]);

        assert_eq!(*layer.get_pixel(4, 4), FILL_COLOR);
        for (dx, dy) in OUTLINE_OFFSETS {
            assert_eq!(
                *layer.get_pixel((4 + dx) as u32, (4 + dy) as u32),
                OUTLINE_COLOR,
                "ring pixel at offset ({dx}, {dy})"
            );
        }
        let drawn = layer.pixels().filter(|p| p[3] > 0).count();
        assert_eq!(drawn, 25);
    }

    #[test]
    fn test_second_line_outline_never_covers_first_fill() {
        let dot = GlyphCoverage::new((0, 0), GrayImage::from_pixel(1, 1, Luma([255])));
        let mut layer = RgbaImage::new(12, 12);
        // (5, 5) sits inside the ring around (7, 6)
        stamp_outlined_lines(&mut layer, &[dot.clone(), dot], &[(5, 5), (7, 6)]);

        assert_eq!(*layer.get_pixel(5, 5), FILL_COLOR);
        assert_eq!(*layer.get_pixel(7, 6), FILL_COLOR);
        assert_eq!(*layer.get_pixel(9, 8), OUTLINE_COLOR);
    }

    #[test]
    fn test_empty_spec_renders_transparent_layer() {
        let layer = bitmap_renderer().render((20, 10), &TextSpec::new(""));
        assert_eq!(layer.dimensions(), (20, 10));
        assert!(layer.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_bitmap_fallback_has_fill_and_no_outline() {
        let spec = TextSpec::new("HI").with_font("NoSuchFamily", 20).with_anchor(10, 10);
        let (layer, report) = bitmap_renderer().render_with_report((100, 100), &spec);

        assert_eq!(report.font, FontKind::Bitmap);
        assert_eq!(report.line_anchors, vec![(10, 10)]);

        let drawn: Vec<_> = layer.pixels().filter(|p| p[3] > 0).collect();
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|p| **p == FILL_COLOR));
        // Top-left of the H stem sits on the anchor
        assert_eq!(*layer.get_pixel(10, 10), FILL_COLOR);
        assert_eq!(*layer.get_pixel(9, 9), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_bitmap_second_line_offset() {
        let spec = TextSpec::new("A").with_second_line("B").with_anchor(5, 5);
        let (layer, report) = bitmap_renderer().render_with_report((60, 60), &spec);

        assert_eq!(report.line_anchors, vec![(5, 5), (5, 25)]);
        // Both "A" and "B" have ink in their top-left row region
        assert_eq!(*layer.get_pixel(5, 25), FILL_COLOR);
    }

    #[test]
    fn test_text_outside_canvas_is_clipped() {
        let spec = TextSpec::new("HELLO").with_anchor(-500, -500);
        let layer = bitmap_renderer().render((30, 30), &spec);
        assert!(layer.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_unparseable_scalable_font_falls_back_to_bitmap() {
        let store = MemoryFontStore::new().with_font("arial.ttf", b"garbage".to_vec());
        let renderer = TextLayerRenderer::new(Arc::new(store));
        let spec = TextSpec::new("X").with_second_line("Y");
        let (_, report) = renderer.render_with_report((200, 200), &spec);
        assert_eq!(report.font, FontKind::Bitmap);
        assert_eq!(report.line_anchors[1].1 - report.line_anchors[0].1, BITMAP_LINE_OFFSET);
    }

    #[test]
    fn test_scalable_font_line_offset_and_outline() {
        let Some((renderer, family)) = system_font_renderer() else {
            eprintln!("No system font found, skipping scalable rendering test");
            return;
        };

        let spec = TextSpec::new("I")
            .with_second_line("I")
            .with_font(family, 40)
            .with_anchor(30, 30);
        let (layer, report) = renderer.render_with_report((200, 200), &spec);

        assert!(matches!(report.font, FontKind::Scalable { .. }));
        assert_eq!(report.line_anchors, vec![(30, 30), (30, 80)]);

        let solid_fill: Vec<(u32, u32)> = layer
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == FILL_COLOR)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!solid_fill.is_empty(), "expected fully covered fill pixels");
        assert!(layer.pixels().any(|p| *p == OUTLINE_COLOR));

        // The outline reaches two pixels past the leftmost solid fill pixel
        let (x, y) = *solid_fill.iter().min_by_key(|(x, _)| *x).unwrap();
        assert!(layer.get_pixel(x - 1, y)[3] > 0);
        assert!(layer.get_pixel(x - 2, y)[3] > 0);
    }
}
