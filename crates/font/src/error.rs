//! Error taxonomy for font loading and rendering.

use common::ParseError;

/// Errors produced while loading a font or rendering its glyphs.
///
/// Container-level variants abort a load. Per-glyph variants are absorbed by
/// the caller: the rasterizer returns [`FontError::GlyphNotFound`] and the
/// compositor substitutes a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FontError {
    /// Truncated or inconsistent table directory, or a mandatory table is
    /// missing or unreadable.
    #[error("malformed font container: {0}")]
    MalformedContainer(String),

    /// The `cmap` table has no platform 0 / format 4 subtable.
    #[error("unsupported character map (format {format})")]
    UnsupportedCharacterMap { format: u16 },

    /// The codepoint resolves to the missing glyph.
    #[error("no glyph mapped for codepoint {codepoint}")]
    GlyphNotFound { codepoint: u8 },

    /// Every font identity has already been handed out.
    #[error("font identity space exhausted ({capacity} fonts loaded)")]
    FontIdentitySpaceExhausted { capacity: u16 },

    /// Byte-level decode failure inside a single table or glyph.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FontError {
    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        Self::MalformedContainer(what.into())
    }

    /// `true` for errors that make the whole font unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedContainer(_) | Self::FontIdentitySpaceExhausted { .. }
        )
    }
}
