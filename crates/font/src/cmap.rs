//! Character map resolution.
//!
//! Only the Unicode-platform (platform ID 0) segmented mapping subtable,
//! format 4, is supported. The map covers the single-byte codepoints 0–254
//! and is built once at load time by a linear scan of the segments.

use common::{Cursor, ParseError};

use crate::error::FontError;
use crate::hooks::{Reclaimer, Tracer};

/// Number of codepoints covered by a [`CodepointMap`] (0 through 254).
pub const CODEPOINT_COUNT: usize = 255;

/// The only subtable format understood here.
pub const SEGMENT_MAPPING_FORMAT: u16 = 4;
/// The Unicode platform.
pub const PLATFORM_UNICODE: u16 = 0;

// ─────────────────────────────────────────────────────────────────────────────
// CodepointMap
// ─────────────────────────────────────────────────────────────────────────────

/// Total mapping from codepoint 0–254 to glyph index.
///
/// Unmapped codepoints resolve to glyph 0, the missing glyph.
#[derive(Clone, PartialEq, Eq)]
pub struct CodepointMap {
    glyphs: [u16; CODEPOINT_COUNT],
}

impl CodepointMap {
    /// A map sending every codepoint to the missing glyph.
    pub const fn empty() -> Self {
        Self { glyphs: [0; CODEPOINT_COUNT] }
    }

    pub fn glyph_index(&self, codepoint: u8) -> u16 {
        self.glyphs.get(codepoint as usize).copied().unwrap_or(0)
    }

    /// `(codepoint, glyph)` pairs for every codepoint in the domain.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u16)> + '_ {
        self.glyphs.iter().enumerate().map(|(cp, &g)| (cp as u8, g))
    }

    /// Number of codepoints mapped to a real glyph.
    pub fn mapped_count(&self) -> usize {
        self.glyphs.iter().filter(|&&g| g != 0).count()
    }
}

impl Default for CodepointMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl core::fmt::Debug for CodepointMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CodepointMap")
            .field("mapped", &self.mapped_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EncodingRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the `cmap` encoding-record list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    /// Offset of the subtable from the start of the `cmap` table.
    pub offset: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// SegmentMap (format 4)
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed format 4 subtable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentMap {
    pub end_code: Vec<u16>,
    pub start_code: Vec<u16>,
    pub id_delta: Vec<i16>,
    pub id_range_offset: Vec<u16>,
    pub glyph_id_array: Vec<u16>,
}

impl SegmentMap {
    /// Parse a format 4 subtable; `c` is positioned at its format field.
    pub fn read(c: &mut Cursor<'_>, reclaim: &mut Reclaimer<'_>) -> Result<Self, ParseError> {
        let start = c.position();
        let format = c.u16()?;
        if format != SEGMENT_MAPPING_FORMAT {
            return Err(ParseError::InvalidValue("not a format 4 subtable"));
        }
        let length = c.u16()? as usize;
        let _language = c.u16()?;
        let seg_count = (c.u16()? / 2) as usize;
        let _search_range = c.u16()?;
        let _entry_selector = c.u16()?;
        let _range_shift = c.u16()?;

        let mut read_array = |c: &mut Cursor<'_>| -> Result<Vec<u16>, ParseError> {
            let mut out = Vec::with_capacity(seg_count);
            for _ in 0..seg_count {
                out.push(c.u16()?);
                reclaim.tick();
            }
            Ok(out)
        };

        let end_code = read_array(c)?;
        let _reserved_pad = c.u16()?;
        let start_code = read_array(c)?;
        let id_delta = read_array(c)?.into_iter().map(|d| d as i16).collect();
        let id_range_offset = read_array(c)?;

        // Whatever the subtable length leaves is the glyph ID array.
        let consumed = c.position() - start;
        let declared = length.saturating_sub(consumed) / 2;
        let glyph_count = declared.min(c.remaining() / 2);
        let mut glyph_id_array = Vec::with_capacity(glyph_count);
        for _ in 0..glyph_count {
            glyph_id_array.push(c.u16()?);
            reclaim.tick();
        }

        Ok(SegmentMap { end_code, start_code, id_delta, id_range_offset, glyph_id_array })
    }

    pub fn seg_count(&self) -> usize {
        self.end_code.len()
    }

    /// Word `idx` counted from the start of `idRangeOffset`; the glyph ID
    /// array follows it directly in the subtable.
    fn range_word(&self, idx: usize) -> Option<u16> {
        match self.id_range_offset.get(idx) {
            Some(w) => Some(*w),
            None => self.glyph_id_array.get(idx - self.id_range_offset.len()).copied(),
        }
    }

    /// Resolve one codepoint by linear scan; uncovered codepoints give 0.
    pub fn lookup(&self, codepoint: u16) -> u16 {
        for i in 0..self.seg_count() {
            if self.start_code[i] > codepoint || codepoint > self.end_code[i] {
                continue;
            }

            let delta = self.id_delta[i] as u16;
            if self.id_range_offset[i] == 0 {
                return delta.wrapping_add(codepoint);
            }

            let idx = i
                + self.id_range_offset[i] as usize / 2
                + (codepoint - self.start_code[i]) as usize;
            return match self.range_word(idx) {
                Some(0) | None => 0,
                Some(glyph) => glyph.wrapping_add(delta),
            };
        }
        0
    }

    /// Build the total codepoint map over 0–254.
    pub fn to_codepoint_map(&self) -> CodepointMap {
        let mut map = CodepointMap::empty();
        for (cp, slot) in map.glyphs.iter_mut().enumerate() {
            *slot = self.lookup(cp as u16);
        }
        map
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// cmap table
// ─────────────────────────────────────────────────────────────────────────────

/// Decode the `cmap` table starting at the cursor position.
///
/// Selects the first encoding record with platform ID 0 whose subtable is
/// format 4. Every other subtable is reported and skipped; if none qualifies
/// the result is [`FontError::UnsupportedCharacterMap`], which callers treat
/// as non-fatal.
pub fn read_cmap(
    c: &mut Cursor<'_>,
    reclaim: &mut Reclaimer<'_>,
    tracer: Tracer<'_>,
) -> Result<CodepointMap, FontError> {
    let table_start = c.position();
    let _version = c.u16()?;
    let num_records = c.u16()?;

    let mut records = Vec::with_capacity(num_records as usize);
    for _ in 0..num_records {
        records.push(EncodingRecord {
            platform_id: c.u16()?,
            encoding_id: c.u16()?,
            offset: c.u32()?,
        });
    }

    let mut last_format = 0;
    for rec in records {
        let sub_start = table_start + rec.offset as usize;
        let format = match common::read_be::<u16>(c.buffer(), sub_start) {
            Ok(f) => f,
            Err(e) => {
                log::warn!(
                    "cmap subtable (platform {}, encoding {}) out of range: {e}",
                    rec.platform_id,
                    rec.encoding_id
                );
                continue;
            }
        };

        if rec.platform_id == PLATFORM_UNICODE && format == SEGMENT_MAPPING_FORMAT {
            let mut sub = Cursor::at(c.buffer(), sub_start)?;
            let segments = SegmentMap::read(&mut sub, reclaim)?;
            tracer.emit(format_args!(
                "cmap: format 4 subtable with {} segments (encoding {})",
                segments.seg_count(),
                rec.encoding_id
            ));
            return Ok(segments.to_codepoint_map());
        }

        log::warn!(
            "only cmap format 4 on platform 0 is supported; skipping platform {} format {format}",
            rec.platform_id
        );
        last_format = format;
    }

    Err(FontError::UnsupportedCharacterMap { format: last_format })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
