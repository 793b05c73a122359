//! Scanline glyph rasterizer.
//!
//! Converts a glyph's shapes to an 8-bit coverage bitmap:
//! - outlines are stroked with an integer Bresenham line at 2× resolution
//! - the interior is filled scanline by scanline with the even-odd rule
//! - the 2× buffer is box-filtered down to the output size

use common::Vec2;

use crate::error::FontError;
use crate::face::Font;
use crate::glyph::{BoundingBox, Shape};
use crate::hooks::Tracer;

/// Assumed device resolution.
pub const DPI: f32 = 96.0;
pub const POINTS_PER_INCH: f32 = 72.0;
/// Linear supersampling factor of the working buffer.
pub const SUPERSAMPLE: usize = 2;
/// Largest supersampled buffer side; bigger glyphs render as 1×1.
pub const MAX_SUPERSAMPLED_EXTENT: usize = 8192;

// ─────────────────────────────────────────────────────────────────────────────
// RenderedGlyph
// ─────────────────────────────────────────────────────────────────────────────

/// A rasterized glyph at output resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedGlyph {
    /// Row-major coverage, one byte per pixel (0 = empty, 255 = full).
    pub coverage: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Horizontal advance in pixels.
    pub advance_width: i32,
    /// Distance from the line's ascent to the top of the bitmap, in pixels.
    pub baseline_offset: i32,
    /// Distance from the pen position to the left edge of the bitmap.
    pub bearing_x: i32,
}

impl RenderedGlyph {
    pub fn coverage_at(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.coverage[y * self.width + x]
    }

    /// Number of pixels with any coverage.
    pub fn covered_pixels(&self) -> usize {
        self.coverage.iter().filter(|&&c| c > 0).count()
    }
}

/// Font units to device pixels at `point_size`.
pub fn pixel_scale(font: &Font, point_size: f32) -> f32 {
    point_size * DPI / POINTS_PER_INCH / font.units_per_em() as f32
}

// ─────────────────────────────────────────────────────────────────────────────
// Rasterization
// ─────────────────────────────────────────────────────────────────────────────

/// Rasterize the glyph mapped to `codepoint` at `point_size`.
///
/// Unmapped codepoints yield [`FontError::GlyphNotFound`].
pub fn rasterize_glyph(font: &Font, codepoint: u8, point_size: f32) -> Result<RenderedGlyph, FontError> {
    rasterize_glyph_traced(font, codepoint, point_size, Tracer::none())
}

/// [`rasterize_glyph`], reporting the buffer size to `tracer`.
pub fn rasterize_glyph_traced(
    font: &Font,
    codepoint: u8,
    point_size: f32,
    tracer: Tracer<'_>,
) -> Result<RenderedGlyph, FontError> {
    let outline = font.glyph(codepoint)?;
    let glyph_id = font.glyph_index(codepoint);
    tracer.emit(format_args!("rasterize {codepoint} (glyph {glyph_id}) at {point_size}pt"));
    Ok(render_outline(font, glyph_id, &outline.bbox, point_size, tracer))
}

/// Render an already decoded glyph. Never fails: degenerate boxes, unusable
/// scales and oversized buffers all produce a 1×1 glyph.
pub(crate) fn render_outline(
    font: &Font,
    glyph_id: u16,
    bbox: &BoundingBox,
    point_size: f32,
    tracer: Tracer<'_>,
) -> RenderedGlyph {
    let scale = pixel_scale(font, point_size);
    let ss_scale = scale * SUPERSAMPLE as f32;

    let advance_width = (font.advance_width(glyph_id) as f32 * scale).round() as i32;
    let baseline_offset = ((font.ascent() as f32 - bbox.y_max as f32) * scale).round() as i32;
    let bearing_x = (bbox.x_min as f32 * scale).round() as i32;
    let single_pixel = RenderedGlyph {
        coverage: vec![0],
        width: 1,
        height: 1,
        advance_width,
        baseline_offset,
        bearing_x,
    };

    if bbox.is_degenerate() || !(ss_scale > 0.0 && ss_scale.is_finite()) {
        log::debug!("glyph {glyph_id} has a degenerate box {bbox:?}; emitting 1x1");
        return single_pixel;
    }
    let (Some(w2), Some(h2)) = (
        supersampled_extent(bbox.width(), ss_scale),
        supersampled_extent(bbox.height(), ss_scale),
    ) else {
        log::warn!(
            "glyph {glyph_id} at {point_size}pt exceeds {MAX_SUPERSAMPLED_EXTENT} pixels; emitting 1x1"
        );
        return single_pixel;
    };
    tracer.emit(format_args!("glyph {glyph_id}: {w2}x{h2} supersampled"));

    // Buffer space: origin at (xMin, yMax), y growing downwards.
    let x_min = bbox.x_min as f32;
    let y_max = bbox.y_max as f32;
    let shapes: Vec<Shape> = font
        .outline_shapes(glyph_id)
        .iter()
        .map(|s| s.map(|p| Vec2::new((p.x - x_min) * ss_scale, (y_max - p.y) * ss_scale)))
        .collect();

    let mut buffer = vec![0u8; w2 * h2];
    for shape in &shapes {
        for (a, b) in shape.edges() {
            draw_line(&mut buffer, w2, h2, a, b);
        }
    }
    fill_shapes(&shapes, &mut buffer, w2, h2);

    let (coverage, width, height) = downscale(&buffer, w2, h2);
    RenderedGlyph {
        coverage,
        width,
        height,
        advance_width,
        baseline_offset,
        bearing_x,
    }
}

/// `ceil(extent × ss_scale) + 1`, or `None` past [`MAX_SUPERSAMPLED_EXTENT`].
fn supersampled_extent(extent: i32, ss_scale: f32) -> Option<usize> {
    let scaled = (extent as f32 * ss_scale).ceil();
    if scaled >= MAX_SUPERSAMPLED_EXTENT as f32 {
        return None;
    }
    Some(scaled as usize + 1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Stroking
// ─────────────────────────────────────────────────────────────────────────────

/// Integer Bresenham line from `a` to `b`, endpoints truncated and clamped
/// to the buffer.
fn draw_line(buffer: &mut [u8], w: usize, h: usize, a: Vec2, b: Vec2) {
    let clamp = |v: f32, max: usize| (v as i32).clamp(0, max as i32 - 1);
    let (mut x, mut y) = (clamp(a.x, w), clamp(a.y, h));
    let (x1, y1) = (clamp(b.x, w), clamp(b.y, h));

    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let sx = if x1 > x { 1 } else { -1 };
    let sy = if y1 > y { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        buffer[y as usize * w + x as usize] = 255;
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scanline fill
// ─────────────────────────────────────────────────────────────────────────────

/// A non-horizontal edge with `lo.y < hi.y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Edge {
    lo: Vec2,
    hi: Vec2,
}

impl Edge {
    /// `None` for horizontal edges, which never cross a scanline.
    pub(crate) fn new(a: Vec2, b: Vec2) -> Option<Edge> {
        if a.y == b.y {
            return None;
        }
        Some(if a.y < b.y { Edge { lo: a, hi: b } } else { Edge { lo: b, hi: a } })
    }

    /// Half-open span test: the upper endpoint's row is not covered.
    fn is_active(&self, y: f32) -> bool {
        self.lo.y <= y && self.hi.y > y
    }

    fn x_at(&self, y: f32) -> f32 {
        self.lo.x + (self.hi.x - self.lo.x) * (y - self.lo.y) / (self.hi.y - self.lo.y)
    }

    fn inverse_slope(&self) -> f32 {
        (self.hi.x - self.lo.x) / (self.hi.y - self.lo.y)
    }
}

pub(crate) fn build_edges(shapes: &[Shape]) -> Vec<Edge> {
    shapes
        .iter()
        .flat_map(|s| s.edges())
        .filter_map(|(a, b)| Edge::new(a, b))
        .collect()
}

/// `(x, inverse_slope)` of the edges crossing row `y`, sorted by X and then
/// by slope, truncated to an even count.
pub(crate) fn sorted_crossings(edges: &[Edge], y: f32) -> Vec<(f32, f32)> {
    let mut active: Vec<(f32, f32)> = edges
        .iter()
        .filter(|e| e.is_active(y))
        .map(|e| (e.x_at(y), e.inverse_slope()))
        .collect();
    active.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    if active.len() % 2 == 1 {
        log::trace!("row {y}: dropping unmatched edge of {}", active.len());
        active.pop();
    }
    active
}

/// X intercepts of [`sorted_crossings`].
pub(crate) fn active_intercepts(edges: &[Edge], y: f32) -> Vec<f32> {
    sorted_crossings(edges, y).into_iter().map(|(x, _)| x).collect()
}

fn fill_shapes(shapes: &[Shape], buffer: &mut [u8], w: usize, h: usize) {
    let edges = build_edges(shapes);
    for y in 0..h {
        let intercepts = active_intercepts(&edges, y as f32);
        for pair in intercepts.chunks_exact(2) {
            let start = (pair[0] as i32).max(0);
            let end = (pair[1] as i32).min(w as i32 - 1);
            for x in start..=end {
                buffer[y * w + x as usize] = 255;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Downscale
// ─────────────────────────────────────────────────────────────────────────────

/// 2×2 box average. Blocks cut by an odd edge average only their in-bounds
/// pixels.
fn downscale(buffer: &[u8], w2: usize, h2: usize) -> (Vec<u8>, usize, usize) {
    let w = w2.div_ceil(SUPERSAMPLE);
    let h = h2.div_ceil(SUPERSAMPLE);
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            let mut count = 0u32;
            for sy in y * SUPERSAMPLE..((y + 1) * SUPERSAMPLE).min(h2) {
                for sx in x * SUPERSAMPLE..((x + 1) * SUPERSAMPLE).min(w2) {
                    sum += buffer[sy * w2 + sx] as u32;
                    count += 1;
                }
            }
            out[y * w + x] = (sum / count.max(1)) as u8;
        }
    }
    (out, w, h)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
