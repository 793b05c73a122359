//! Single-line text composition from cached glyphs.

use std::sync::Arc;

use common::Color;

use crate::cache::{quantize_size, ColoredGlyph, GlyphCache};
use crate::face::Font;
use crate::hooks::Tracer;
use crate::rasterizer::pixel_scale;

/// Substituted for characters outside 0–255 and for unmapped codepoints.
pub const PLACEHOLDER: u8 = b'?';

/// A packed `0xAARRGGBB` pixel buffer, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Bitmap {
    /// A fully transparent bitmap.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0; width * height] }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.pixels[y * self.width + x]
    }

    fn blit(&mut self, glyph: &ColoredGlyph, left: i32, top: i32) {
        for gy in 0..glyph.height() {
            let y = top.saturating_add(gy as i32);
            if y < 0 || y as usize >= self.height {
                continue;
            }
            for gx in 0..glyph.width() {
                let x = left.saturating_add(gx as i32);
                if x < 0 || x as usize >= self.width {
                    continue;
                }
                let idx = gy * glyph.width() + gx;
                if glyph.glyph.coverage[idx] > 0 {
                    self.pixels[y as usize * self.width + x as usize] = glyph.pixels[idx];
                }
            }
        }
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap({}x{})", self.width, self.height)
    }
}

/// Pixel size of a rendered line of text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextExtent {
    pub width: usize,
    pub height: usize,
}

/// Codepoints above 255 become the placeholder.
fn to_codepoint(ch: char) -> u8 {
    u8::try_from(ch as u32).unwrap_or(PLACEHOLDER)
}

/// Codepoint that will actually be drawn for `ch`, if any.
fn resolve(font: &Font, ch: char) -> Option<u8> {
    let cp = to_codepoint(ch);
    if font.glyph(cp).is_ok() {
        return Some(cp);
    }
    if cp != PLACEHOLDER && font.glyph(PLACEHOLDER).is_ok() {
        return Some(PLACEHOLDER);
    }
    log::debug!("no glyph for {ch:?} and no placeholder; skipping");
    None
}

/// Largest bitmap [`draw_string`] allocates, in pixels.
pub const MAX_BITMAP_PIXELS: usize = 1 << 26;

/// Ascent and line height in pixels.
fn line_box(font: &Font, point_size: f32) -> (i32, usize) {
    let scale = pixel_scale(font, point_size);
    let ascent = (font.ascent() as f32 * scale).round() as i32;
    let descent = (font.descent() as f32 * scale).round() as i32;
    (ascent, (ascent as i64 - descent as i64).max(0) as usize)
}

fn total_advance(advances: impl Iterator<Item = i32>) -> usize {
    advances.fold(0i32, i32::saturating_add).max(0) as usize
}

/// Size of the bitmap [`draw_string`] would produce, without rasterizing.
pub fn measure_string(font: &Font, text: &str, point_size: f32) -> TextExtent {
    let point_size = quantize_size(point_size);
    let scale = pixel_scale(font, point_size);
    let width = total_advance(text.chars().filter_map(|ch| resolve(font, ch)).map(|cp| {
        let advance = font.advance_width(font.glyph_index(cp));
        (advance as f32 * scale).round() as i32
    }));
    TextExtent {
        width,
        height: line_box(font, point_size).1,
    }
}

/// Render `text` as one line, left to right, with no kerning.
///
/// Characters outside 0–255 and codepoints without a glyph are drawn as `?`;
/// if the font has no `?` either the character is skipped. Each glyph's top
/// sits at its baseline offset below the ascent line and its left edge at
/// the pen position plus its left side bearing. A line larger than
/// [`MAX_BITMAP_PIXELS`] yields an empty bitmap.
pub fn draw_string(
    cache: &GlyphCache,
    font: &Font,
    text: &str,
    point_size: f32,
    color: Color,
) -> Bitmap {
    draw_string_traced(cache, font, text, point_size, color, Tracer::none())
}

/// [`draw_string`], tracing layout and cache misses to `tracer`.
pub fn draw_string_traced(
    cache: &GlyphCache,
    font: &Font,
    text: &str,
    point_size: f32,
    color: Color,
    tracer: Tracer<'_>,
) -> Bitmap {
    let glyphs: Vec<Arc<ColoredGlyph>> = text
        .chars()
        .filter_map(|ch| resolve(font, ch))
        .filter_map(|cp| match cache.get_or_rasterize_traced(font, cp, color, point_size, tracer) {
            Ok(glyph) => Some(glyph),
            Err(e) => {
                log::warn!("cannot render codepoint {cp}: {e}");
                None
            }
        })
        .collect();

    let width = total_advance(glyphs.iter().map(|g| g.glyph.advance_width));
    let (_, height) = line_box(font, quantize_size(point_size));
    if width.checked_mul(height).is_none_or(|n| n > MAX_BITMAP_PIXELS) {
        log::warn!("{width}x{height} line exceeds {MAX_BITMAP_PIXELS} pixels; drawing nothing");
        return Bitmap::new(0, 0);
    }
    tracer.emit(format_args!("draw {} glyphs into {width}x{height}", glyphs.len()));

    let mut bitmap = Bitmap::new(width, height);
    let mut pen = 0i32;
    for glyph in &glyphs {
        bitmap.blit(glyph, pen.saturating_add(glyph.glyph.bearing_x), glyph.glyph.baseline_offset);
        pen = pen.saturating_add(glyph.glyph.advance_width);
    }
    bitmap
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
