//! Memoized, color-tinted glyph rasters.
//!
//! Entries are keyed structurally by font identity, codepoint, color and
//! size. Once inserted an entry is never replaced or evicted, so every
//! request for the same key observes the same [`Arc`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use common::Color;

use crate::error::FontError;
use crate::face::{Font, FontId};
use crate::hooks::Tracer;
use crate::rasterizer::{render_outline, RenderedGlyph};

/// Sizes are quantized to 1/64 point.
const SIZE_UNITS_PER_POINT: f32 = 64.0;

/// `point_size` rounded down to the cache's size resolution.
pub fn quantize_size(point_size: f32) -> f32 {
    size_64(point_size) as f32 / SIZE_UNITS_PER_POINT
}

fn size_64(point_size: f32) -> u32 {
    (point_size * SIZE_UNITS_PER_POINT) as u32
}

// ─────────────────────────────────────────────────────────────────────────────
// GlyphKey
// ─────────────────────────────────────────────────────────────────────────────

/// Cache key. The full RGBA color participates, alpha included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub font: FontId,
    pub codepoint: u8,
    pub color: Color,
    /// Size in 1/64 point units.
    pub size_64: u32,
}

impl GlyphKey {
    pub fn new(font: FontId, codepoint: u8, color: Color, point_size: f32) -> Self {
        Self {
            font,
            codepoint,
            color,
            size_64: size_64(point_size),
        }
    }

    /// The size a cached raster for this key is rendered at.
    pub fn point_size(&self) -> f32 {
        self.size_64 as f32 / SIZE_UNITS_PER_POINT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ColoredGlyph
// ─────────────────────────────────────────────────────────────────────────────

/// Multiply `color`'s channels by `coverage`; alpha is kept as requested.
pub fn tint(color: Color, coverage: u8) -> u32 {
    let scale = |channel: u8| (channel as u32 * coverage as u32 / 255) as u8;
    Color::rgba(scale(color.r), scale(color.g), scale(color.b), color.a).to_argb()
}

/// A rendered glyph tinted into packed `0xAARRGGBB` pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColoredGlyph {
    pub pixels: Vec<u32>,
    pub glyph: RenderedGlyph,
}

impl ColoredGlyph {
    pub fn new(glyph: RenderedGlyph, color: Color) -> Self {
        let pixels = glyph.coverage.iter().map(|&c| tint(color, c)).collect();
        Self { pixels, glyph }
    }

    pub fn width(&self) -> usize {
        self.glyph.width
    }

    pub fn height(&self) -> usize {
        self.glyph.height
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GlyphCache
// ─────────────────────────────────────────────────────────────────────────────

/// Process-lifetime glyph cache with shared reads.
///
/// Each key owns a [`OnceLock`] slot. The map lock is only held to find or
/// insert a slot; rendering happens inside the slot's initializer, so a slow
/// glyph blocks only callers waiting for that same key.
#[derive(Debug, Default)]
pub struct GlyphCache {
    entries: RwLock<HashMap<GlyphKey, Arc<OnceLock<Arc<ColoredGlyph>>>>>,
    rasterizations: AtomicUsize,
}

impl GlyphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an already rendered glyph.
    pub fn get(&self, key: &GlyphKey) -> Option<Arc<ColoredGlyph>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Return the cached glyph for the tuple, rasterizing it on first use.
    ///
    /// A tuple is rasterized at most once, even under concurrent callers.
    /// [`FontError::GlyphNotFound`] is returned for unmapped codepoints and
    /// never cached.
    pub fn get_or_rasterize(
        &self,
        font: &Font,
        codepoint: u8,
        color: Color,
        point_size: f32,
    ) -> Result<Arc<ColoredGlyph>, FontError> {
        self.get_or_rasterize_traced(font, codepoint, color, point_size, Tracer::none())
    }

    /// [`get_or_rasterize`](Self::get_or_rasterize), tracing misses to `tracer`.
    pub fn get_or_rasterize_traced(
        &self,
        font: &Font,
        codepoint: u8,
        color: Color,
        point_size: f32,
        tracer: Tracer<'_>,
    ) -> Result<Arc<ColoredGlyph>, FontError> {
        let key = GlyphKey::new(font.id(), codepoint, color, point_size);
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let outline = font.glyph(codepoint)?;
        let slot = self.slot(key);
        let entry = slot.get_or_init(|| {
            let glyph_id = font.glyph_index(codepoint);
            tracer.emit(format_args!("cache miss {key:?}"));
            let rendered = render_outline(font, glyph_id, &outline.bbox, key.point_size(), tracer);
            self.rasterizations.fetch_add(1, Ordering::Relaxed);
            Arc::new(ColoredGlyph::new(rendered, color))
        });
        Ok(Arc::clone(entry))
    }

    fn slot(&self, key: GlyphKey) -> Arc<OnceLock<Arc<ColoredGlyph>>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_default())
    }

    /// Number of rasterizations performed through this cache.
    pub fn rasterization_count(&self) -> usize {
        self.rasterizations.load(Ordering::Relaxed)
    }

    /// Number of keys seen, including ones still rendering.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
