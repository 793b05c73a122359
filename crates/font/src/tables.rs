//! TrueType table parsing.
//!
//! Decodes the sfnt offset table and directory records, and the metric tables
//! `head`, `hhea`, `vhea`, `hmtx` and `maxp`. Each decoder reads from a
//! [`Cursor`] already positioned at the start of its table.

use common::{Cursor, ParseError};

use crate::hooks::Reclaimer;

// ─────────────────────────────────────────────────────────────────────────────
// TableTag
// ─────────────────────────────────────────────────────────────────────────────

/// A 4-byte table tag identifying a TrueType table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableTag(pub [u8; 4]);

impl TableTag {
    pub const HEAD: Self = Self(*b"head");
    pub const HHEA: Self = Self(*b"hhea");
    pub const VHEA: Self = Self(*b"vhea");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const MAXP: Self = Self(*b"maxp");
    pub const CMAP: Self = Self(*b"cmap");
    pub const LOCA: Self = Self(*b"loca");
    pub const GLYF: Self = Self(*b"glyf");

    /// Tables a font cannot be loaded without.
    pub const MANDATORY: [Self; 7] = [
        Self::HEAD,
        Self::HHEA,
        Self::HMTX,
        Self::MAXP,
        Self::CMAP,
        Self::LOCA,
        Self::GLYF,
    ];
}

impl core::fmt::Debug for TableTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = core::str::from_utf8(&self.0).unwrap_or("????");
        write!(f, "TableTag('{s}')")
    }
}

impl core::fmt::Display for TableTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = core::str::from_utf8(&self.0).unwrap_or("????");
        write!(f, "{s}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OffsetTable / TableRecord
// ─────────────────────────────────────────────────────────────────────────────

/// sfnt version for TrueType outlines.
pub const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
/// Apple's `true` sfnt version.
pub const SFNT_VERSION_APPLE: u32 = u32::from_be_bytes(*b"true");
/// `OTTO` (CFF outlines); accepted here, but such fonts have no `glyf`.
pub const SFNT_VERSION_OTTO: u32 = u32::from_be_bytes(*b"OTTO");

/// Size of the fixed sfnt header.
pub const OFFSET_TABLE_LEN: usize = 12;
/// Size of one table directory record.
pub const TABLE_RECORD_LEN: usize = 16;

/// The fixed header at the start of an sfnt container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetTable {
    pub sfnt_version: u32,
    pub num_tables: u16,
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
}

impl OffsetTable {
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, ParseError> {
        Ok(OffsetTable {
            sfnt_version: c.u32()?,
            num_tables: c.u16()?,
            search_range: c.u16()?,
            entry_selector: c.u16()?,
            range_shift: c.u16()?,
        })
    }

    pub fn is_known_version(&self) -> bool {
        matches!(
            self.sfnt_version,
            SFNT_VERSION_TRUETYPE | SFNT_VERSION_APPLE | SFNT_VERSION_OTTO
        )
    }

    /// Byte length of the header plus the directory it announces.
    pub fn directory_len(&self) -> usize {
        OFFSET_TABLE_LEN + self.num_tables as usize * TABLE_RECORD_LEN
    }
}

/// A single entry in the sfnt table directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: TableTag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, ParseError> {
        Ok(TableRecord {
            tag: TableTag(c.tag()?),
            checksum: c.u32()?,
            offset: c.u32()?,
            length: c.u32()?,
        })
    }

    /// `true` if the record's byte range lies inside a source of `len` bytes.
    pub fn fits_within(&self, len: usize) -> bool {
        (self.offset as u64 + self.length as u64) <= len as u64
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HeadTable
// ─────────────────────────────────────────────────────────────────────────────

/// Expected value of `head.magicNumber`.
pub const HEAD_MAGIC: u32 = 0x5F0F_3CF5;

/// Parsed `head` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadTable {
    pub version: u32,
    pub font_revision: u32,
    pub checksum_adjustment: u32,
    pub magic_number: u32,
    pub flags: u16,
    pub units_per_em: u16,
    pub created: u64,
    pub modified: u64,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: u16,
    pub lowest_rec_ppem: u16,
    pub font_direction_hint: i16,
    /// 0 = short offsets (u16 × 2), 1 = long offsets (u32).
    pub index_to_loc_format: i16,
    pub glyph_data_format: i16,
}

impl HeadTable {
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, ParseError> {
        Ok(HeadTable {
            version: c.u32()?,
            font_revision: c.u32()?,
            checksum_adjustment: c.u32()?,
            magic_number: c.u32()?,
            flags: c.u16()?,
            units_per_em: c.u16()?,
            created: c.u64()?,
            modified: c.u64()?,
            x_min: c.i16()?,
            y_min: c.i16()?,
            x_max: c.i16()?,
            y_max: c.i16()?,
            mac_style: c.u16()?,
            lowest_rec_ppem: c.u16()?,
            font_direction_hint: c.i16()?,
            index_to_loc_format: c.i16()?,
            glyph_data_format: c.i16()?,
        })
    }

    pub fn loca_format(&self) -> LocaFormat {
        if self.index_to_loc_format == 0 {
            LocaFormat::Short
        } else {
            LocaFormat::Long
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HheaTable / VheaTable
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed `hhea` (horizontal header) table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HheaTable {
    pub version: u32,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub metric_data_format: i16,
    pub num_h_metrics: u16,
}

impl HheaTable {
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let version = c.u32()?;
        let ascender = c.i16()?;
        let descender = c.i16()?;
        let line_gap = c.i16()?;
        let advance_width_max = c.u16()?;
        let min_left_side_bearing = c.i16()?;
        let min_right_side_bearing = c.i16()?;
        let x_max_extent = c.i16()?;
        let caret_slope_rise = c.i16()?;
        let caret_slope_run = c.i16()?;
        let caret_offset = c.i16()?;
        c.skip(8)?; // reserved
        let metric_data_format = c.i16()?;
        let num_h_metrics = c.u16()?;

        Ok(HheaTable {
            version,
            ascender,
            descender,
            line_gap,
            advance_width_max,
            min_left_side_bearing,
            min_right_side_bearing,
            x_max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            metric_data_format,
            num_h_metrics,
        })
    }
}

/// Parsed `vhea` (vertical header) table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VheaTable {
    pub version: u32,
    pub vert_typo_ascender: i16,
    pub vert_typo_descender: i16,
    pub vert_typo_line_gap: i16,
    pub advance_height_max: i16,
    pub min_top_side_bearing: i16,
    pub min_bottom_side_bearing: i16,
    pub y_max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub metric_data_format: i16,
    pub num_v_metrics: u16,
}

impl VheaTable {
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let version = c.u32()?;
        let vert_typo_ascender = c.i16()?;
        let vert_typo_descender = c.i16()?;
        let vert_typo_line_gap = c.i16()?;
        let advance_height_max = c.i16()?;
        let min_top_side_bearing = c.i16()?;
        let min_bottom_side_bearing = c.i16()?;
        let y_max_extent = c.i16()?;
        let caret_slope_rise = c.i16()?;
        let caret_slope_run = c.i16()?;
        let caret_offset = c.i16()?;
        c.skip(8)?; // reserved
        let metric_data_format = c.i16()?;
        let num_v_metrics = c.u16()?;

        Ok(VheaTable {
            version,
            vert_typo_ascender,
            vert_typo_descender,
            vert_typo_line_gap,
            advance_height_max,
            min_top_side_bearing,
            min_bottom_side_bearing,
            y_max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            metric_data_format,
            num_v_metrics,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MaxpTable
// ─────────────────────────────────────────────────────────────────────────────

/// `maxp` version carrying only the glyph count (CFF fonts).
pub const MAXP_VERSION_0_5: u32 = 0x0000_5000;

/// Parsed `maxp` table. The capacity counters are advisory only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaxpTable {
    pub version: u32,
    pub num_glyphs: u16,
    pub max_points: u16,
    pub max_contours: u16,
    pub max_component_points: u16,
    pub max_component_contours: u16,
    pub max_zones: u16,
    pub max_twilight_points: u16,
    pub max_storage: u16,
    pub max_function_defs: u16,
    pub max_instruction_defs: u16,
    pub max_stack_elements: u16,
    pub max_size_of_instructions: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

impl MaxpTable {
    pub fn read(c: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let version = c.u32()?;
        let num_glyphs = c.u16()?;
        if version == MAXP_VERSION_0_5 {
            return Ok(MaxpTable { version, num_glyphs, ..Default::default() });
        }

        Ok(MaxpTable {
            version,
            num_glyphs,
            max_points: c.u16()?,
            max_contours: c.u16()?,
            max_component_points: c.u16()?,
            max_component_contours: c.u16()?,
            max_zones: c.u16()?,
            max_twilight_points: c.u16()?,
            max_storage: c.u16()?,
            max_function_defs: c.u16()?,
            max_instruction_defs: c.u16()?,
            max_stack_elements: c.u16()?,
            max_size_of_instructions: c.u16()?,
            max_component_elements: c.u16()?,
            max_component_depth: c.u16()?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hmtx table
// ─────────────────────────────────────────────────────────────────────────────

/// Horizontal metrics for a glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LongHorMetric {
    pub advance_width: u16,
    pub left_side_bearing: i16,
}

/// Decoded `hmtx` table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HorizontalMetrics {
    /// One entry per glyph index below `hhea.numberOfHMetrics`.
    pub long_metrics: Vec<LongHorMetric>,
    /// Side bearings of the glyphs past the long metrics.
    pub left_side_bearings: Vec<i16>,
}

impl HorizontalMetrics {
    /// Decode `num_long` long metrics followed by `num_glyphs - num_long`
    /// trailing side bearings. A truncated trailing array is tolerated.
    pub fn read(
        c: &mut Cursor<'_>,
        num_long: u16,
        num_glyphs: u16,
        reclaim: &mut Reclaimer<'_>,
    ) -> Result<Self, ParseError> {
        if num_long == 0 {
            return Err(ParseError::InvalidValue("hhea declares zero horizontal metrics"));
        }

        let mut long_metrics = Vec::with_capacity(num_long as usize);
        for _ in 0..num_long {
            long_metrics.push(LongHorMetric {
                advance_width: c.u16()?,
                left_side_bearing: c.i16()?,
            });
            reclaim.tick();
        }

        let extra = num_glyphs.saturating_sub(num_long) as usize;
        let available = (c.remaining() / 2).min(extra);
        let mut left_side_bearings = Vec::with_capacity(available);
        for _ in 0..available {
            left_side_bearings.push(c.i16()?);
            reclaim.tick();
        }

        Ok(HorizontalMetrics { long_metrics, left_side_bearings })
    }

    /// Metrics for `glyph_id`; glyphs past the long metrics reuse the last
    /// advance width.
    pub fn get(&self, glyph_id: u16) -> LongHorMetric {
        let idx = glyph_id as usize;
        if let Some(m) = self.long_metrics.get(idx) {
            return *m;
        }
        let advance_width = self.long_metrics.last().map_or(0, |m| m.advance_width);
        let extra = idx - self.long_metrics.len();
        LongHorMetric {
            advance_width,
            left_side_bearing: self.left_side_bearings.get(extra).copied().unwrap_or(0),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loca table
// ─────────────────────────────────────────────────────────────────────────────

/// Offset width of the `loca` table, selected by `head.indexToLocFormat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocaFormat {
    /// u16 entries holding offset / 2.
    Short,
    /// u32 entries holding the byte offset.
    Long,
}

/// Get the byte range `(start, end)` of a glyph within the `glyf` table.
pub fn glyph_range(loca: &[u8], glyph_id: u16, format: LocaFormat) -> Result<(u32, u32), ParseError> {
    let idx = glyph_id as usize;
    let (offset, next_offset) = match format {
        LocaFormat::Short => (
            common::read_be::<u16>(loca, idx * 2)? as u32 * 2,
            common::read_be::<u16>(loca, idx * 2 + 2)? as u32 * 2,
        ),
        LocaFormat::Long => (
            common::read_be::<u32>(loca, idx * 4)?,
            common::read_be::<u32>(loca, idx * 4 + 4)?,
        ),
    };

    if next_offset < offset {
        return Err(ParseError::InvalidValue("loca offsets are not ascending"));
    }
    Ok((offset, next_offset))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_tag_display() {
        assert_eq!(format!("{}", TableTag::HEAD), "head");
        assert_eq!(format!("{:?}", TableTag::GLYF), "TableTag('glyf')");
        assert_eq!(TableTag(*b"cmap"), TableTag::CMAP);
        assert_ne!(TableTag(*b"cmap"), TableTag::HEAD);
    }

    #[test]
    fn offset_table_and_record() {
        let mut data = Vec::new();
        data.extend_from_slice(&SFNT_VERSION_TRUETYPE.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 6]);
        data.extend_from_slice(b"maxp");
        data.extend_from_slice(&0xDEADu32.to_be_bytes());
        data.extend_from_slice(&28u32.to_be_bytes());
        data.extend_from_slice(&6u32.to_be_bytes());

        let mut c = Cursor::new(&data);
        let header = OffsetTable::read(&mut c).unwrap();
        assert!(header.is_known_version());
        assert_eq!(header.num_tables, 1);
        assert_eq!(header.directory_len(), 28);

        let rec = TableRecord::read(&mut c).unwrap();
        assert_eq!(rec.tag, TableTag::MAXP);
        assert_eq!(rec.offset, 28);
        assert!(!rec.fits_within(data.len()));
        assert!(rec.fits_within(34));
    }

    #[test]
    fn unknown_sfnt_version() {
        let header = OffsetTable {
            sfnt_version: 0x1234_5678,
            num_tables: 0,
            search_range: 0,
            entry_selector: 0,
            range_shift: 0,
        };
        assert!(!header.is_known_version());
    }

    #[test]
    fn head_table_parse() {
        let mut data = vec![0u8; 54];
        data[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        data[12..16].copy_from_slice(&HEAD_MAGIC.to_be_bytes());
        data[18..20].copy_from_slice(&1000u16.to_be_bytes());
        data[36..38].copy_from_slice(&(-50i16).to_be_bytes());
        data[42..44].copy_from_slice(&900i16.to_be_bytes());
        data[50..52].copy_from_slice(&1i16.to_be_bytes());

        let head = HeadTable::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!(head.units_per_em, 1000);
        assert_eq!(head.magic_number, HEAD_MAGIC);
        assert_eq!(head.x_min, -50);
        assert_eq!(head.y_max, 900);
        assert_eq!(head.loca_format(), LocaFormat::Long);
    }

    #[test]
    fn head_table_truncated() {
        let data = vec![0u8; 40];
        assert!(HeadTable::read(&mut Cursor::new(&data)).is_err());
    }

    #[test]
    fn hhea_table_parse() {
        let mut data = vec![0u8; 36];
        data[4..6].copy_from_slice(&800i16.to_be_bytes());
        data[6..8].copy_from_slice(&(-200i16).to_be_bytes());
        data[8..10].copy_from_slice(&90i16.to_be_bytes());
        data[34..36].copy_from_slice(&3u16.to_be_bytes());

        let hhea = HheaTable::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!(hhea.ascender, 800);
        assert_eq!(hhea.descender, -200);
        assert_eq!(hhea.line_gap, 90);
        assert_eq!(hhea.num_h_metrics, 3);
    }

    #[test]
    fn vhea_table_parse() {
        let mut data = vec![0u8; 36];
        data[4..6].copy_from_slice(&500i16.to_be_bytes());
        data[34..36].copy_from_slice(&2u16.to_be_bytes());
        let vhea = VheaTable::read(&mut Cursor::new(&data)).unwrap();
        assert_eq!(vhea.vert_typo_ascender, 500);
        assert_eq!(vhea.num_v_metrics, 2);
    }

    #[test]
    fn maxp_versions() {
        let mut short = Vec::new();
        short.extend_from_slice(&MAXP_VERSION_0_5.to_be_bytes());
        short.extend_from_slice(&256u16.to_be_bytes());
        let maxp = MaxpTable::read(&mut Cursor::new(&short)).unwrap();
        assert_eq!(maxp.num_glyphs, 256);
        assert_eq!(maxp.max_points, 0);

        let mut full = Vec::new();
        full.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        full.extend_from_slice(&4u16.to_be_bytes());
        full.extend_from_slice(&64u16.to_be_bytes());
        full.extend_from_slice(&[0u8; 22]);
        full.extend_from_slice(&3u16.to_be_bytes());
        let maxp = MaxpTable::read(&mut Cursor::new(&full)).unwrap();
        assert_eq!(maxp.num_glyphs, 4);
        assert_eq!(maxp.max_points, 64);
        assert_eq!(maxp.max_component_depth, 3);
    }

    #[test]
    fn hmtx_long_and_trailing() {
        let mut data = Vec::new();
        for (aw, lsb) in [(500u16, 10i16), (600, 20)] {
            data.extend_from_slice(&aw.to_be_bytes());
            data.extend_from_slice(&lsb.to_be_bytes());
        }
        data.extend_from_slice(&(-5i16).to_be_bytes());

        let mut reclaim = Reclaimer::default();
        let hm = HorizontalMetrics::read(&mut Cursor::new(&data), 2, 4, &mut reclaim).unwrap();
        assert_eq!(hm.long_metrics.len(), 2);
        assert_eq!(hm.left_side_bearings, vec![-5]);
        assert_eq!(hm.get(0), LongHorMetric { advance_width: 500, left_side_bearing: 10 });
        assert_eq!(hm.get(2), LongHorMetric { advance_width: 600, left_side_bearing: -5 });
        // Past the truncated side-bearing array.
        assert_eq!(hm.get(3), LongHorMetric { advance_width: 600, left_side_bearing: 0 });
    }

    #[test]
    fn hmtx_requires_long_metrics() {
        let mut reclaim = Reclaimer::default();
        assert!(HorizontalMetrics::read(&mut Cursor::new(&[]), 0, 1, &mut reclaim).is_err());
    }

    #[test]
    fn loca_short_format() {
        let mut data = Vec::new();
        for val in [0u16, 50, 120, 200] {
            data.extend_from_slice(&val.to_be_bytes());
        }
        assert_eq!(glyph_range(&data, 1, LocaFormat::Short).unwrap(), (100, 240));
        assert!(glyph_range(&data, 3, LocaFormat::Short).is_err());
    }

    #[test]
    fn loca_long_format() {
        let mut data = Vec::new();
        for val in [0u32, 100, 240, 400] {
            data.extend_from_slice(&val.to_be_bytes());
        }
        assert_eq!(glyph_range(&data, 1, LocaFormat::Long).unwrap(), (100, 240));
        assert_eq!(glyph_range(&data, 2, LocaFormat::Long).unwrap(), (240, 400));
    }

    #[test]
    fn loca_descending_is_rejected() {
        let mut data = Vec::new();
        for val in [10u32, 4] {
            data.extend_from_slice(&val.to_be_bytes());
        }
        assert!(glyph_range(&data, 0, LocaFormat::Long).is_err());
    }
}
