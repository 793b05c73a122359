//! # Font Engine
//!
//! TrueType font loading, glyph rasterization and cached text drawing.
//!
//! - `tables`: sfnt directory, head, hhea, vhea, maxp, hmtx and loca
//! - `cmap`: format 4 character map restricted to codepoints 0–254
//! - `glyph`: simple and composite outlines from the `glyf` table
//! - `face`: loaded fonts and process-wide font identities
//! - `rasterizer`: 2× supersampled even-odd scanline fill
//! - `cache`: color-tinted glyph cache shared across threads
//! - `text`: single-line string composition
//! - `hooks`: optional reclaim and trace callbacks for loading

pub mod cache;
pub mod cmap;
pub mod error;
pub mod face;
pub mod glyph;
pub mod hooks;
pub mod rasterizer;
pub mod tables;
pub mod text;

#[cfg(test)]
mod test_font;

pub use cache::{ColoredGlyph, GlyphCache, GlyphKey};
pub use error::FontError;
pub use face::{Font, FontId, FontIdAllocator};
pub use hooks::{LoadOptions, Tracer};
pub use rasterizer::{rasterize_glyph, rasterize_glyph_traced, RenderedGlyph};
pub use text::{draw_string, draw_string_traced, measure_string, Bitmap, TextExtent};
