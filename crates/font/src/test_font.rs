//! Synthetic sfnt builder for unit tests.

use crate::glyph::{
    BoundingBox, ARGS_ARE_XY_VALUES, ARG_1_AND_2_ARE_WORDS, MORE_COMPONENTS, USE_MY_METRICS,
    WE_HAVE_AN_X_AND_Y_SCALE, WE_HAVE_A_SCALE, WE_HAVE_A_TWO_BY_TWO, WE_HAVE_INSTRUCTIONS,
};
use crate::tables::{TableTag, HEAD_MAGIC, SFNT_VERSION_TRUETYPE};

/// Route `log` output through the test harness.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn f2dot14(v: f32) -> i16 {
    (v * 16384.0).round() as i16
}

// ─────────────────────────────────────────────────────────────────────────────
// cmap
// ─────────────────────────────────────────────────────────────────────────────

/// One format 4 segment.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Segment {
    start: u16,
    end: u16,
    delta: i16,
    /// Index into the glyph ID array where this segment's run begins.
    array_start: Option<u16>,
}

impl Segment {
    pub(crate) fn delta(start: u16, end: u16, delta: i16) -> Self {
        Self { start, end, delta, array_start: None }
    }

    pub(crate) fn ranged(start: u16, end: u16, array_start: u16, delta: i16) -> Self {
        Self { start, end, delta, array_start: Some(array_start) }
    }

    /// The mandatory final `0xFFFF` segment.
    pub(crate) fn terminator() -> Self {
        Self::delta(0xFFFF, 0xFFFF, 1)
    }
}

pub(crate) fn format4_subtable(segments: &[Segment], glyph_ids: &[u16]) -> Vec<u8> {
    let seg_count = segments.len() as u16;
    let length = 16 + 8 * seg_count + 2 * glyph_ids.len() as u16;
    let mut out = Vec::new();
    push_u16(&mut out, 4);
    push_u16(&mut out, length);
    push_u16(&mut out, 0);
    push_u16(&mut out, seg_count * 2);
    let entry_selector = (seg_count.max(1)).ilog2() as u16;
    let search_range = 2 * (1u16 << entry_selector);
    push_u16(&mut out, search_range);
    push_u16(&mut out, entry_selector);
    push_u16(&mut out, (seg_count * 2).saturating_sub(search_range));

    for s in segments {
        push_u16(&mut out, s.end);
    }
    push_u16(&mut out, 0);
    for s in segments {
        push_u16(&mut out, s.start);
    }
    for s in segments {
        push_i16(&mut out, s.delta);
    }
    for (i, s) in segments.iter().enumerate() {
        let offset = match s.array_start {
            Some(first) => 2 * (seg_count - i as u16 + first),
            None => 0,
        };
        push_u16(&mut out, offset);
    }
    for &g in glyph_ids {
        push_u16(&mut out, g);
    }
    out
}

/// A `cmap` table from `(platform, encoding, subtable bytes)` records.
pub(crate) fn cmap_table(records: &[(u16, u16, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, 0);
    push_u16(&mut out, records.len() as u16);
    let mut offset = 4 + 8 * records.len() as u32;
    for (platform, encoding, sub) in records {
        push_u16(&mut out, *platform);
        push_u16(&mut out, *encoding);
        push_u32(&mut out, offset);
        offset += sub.len() as u32;
    }
    for (_, _, sub) in records {
        out.extend_from_slice(sub);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// glyf
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a simple glyph from contours of `(x, y, on_curve)` points.
///
/// Zero deltas use the "same" flag bit; everything else is a word delta.
pub(crate) fn simple_glyph(contours: &[&[(i16, i16, bool)]]) -> Vec<u8> {
    let all: Vec<(i16, i16, bool)> = contours.iter().flat_map(|c| c.iter().copied()).collect();
    let x_min = all.iter().map(|p| p.0).min().unwrap_or(0);
    let y_min = all.iter().map(|p| p.1).min().unwrap_or(0);
    let x_max = all.iter().map(|p| p.0).max().unwrap_or(0);
    let y_max = all.iter().map(|p| p.1).max().unwrap_or(0);

    let mut out = Vec::new();
    push_i16(&mut out, contours.len() as i16);
    for v in [x_min, y_min, x_max, y_max] {
        push_i16(&mut out, v);
    }
    let mut end = 0u16;
    for c in contours {
        end += c.len() as u16;
        push_u16(&mut out, end - 1);
    }
    push_u16(&mut out, 0);

    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    let (mut px, mut py) = (0i16, 0i16);
    for &(x, y, on) in &all {
        let mut flag = if on { 0x01 } else { 0x00 };
        let (dx, dy) = (x - px, y - py);
        if dx == 0 {
            flag |= 0x10;
        } else {
            push_i16(&mut xs, dx);
        }
        if dy == 0 {
            flag |= 0x20;
        } else {
            push_i16(&mut ys, dy);
        }
        out.push(flag);
        (px, py) = (x, y);
    }
    out.extend_from_slice(&xs);
    out.extend_from_slice(&ys);
    out
}

/// Axis-aligned rectangle of four on-curve points.
pub(crate) fn rect_glyph(x0: i16, y0: i16, x1: i16, y1: i16) -> Vec<u8> {
    simple_glyph(&[&[(x0, y0, true), (x1, y0, true), (x1, y1, true), (x0, y1, true)]])
}

#[derive(Clone, Debug)]
enum Scale {
    Uniform(f32),
    PerAxis(f32, f32),
    TwoByTwo([f32; 4]),
}

/// One component of a synthetic composite glyph.
#[derive(Clone, Debug)]
pub(crate) struct Component {
    glyph: u16,
    args: (i32, i32),
    xy: bool,
    flags: u16,
    scale: Option<Scale>,
    instructions: Vec<u8>,
}

impl Component {
    pub(crate) fn offset(glyph: u16, dx: i16, dy: i16) -> Self {
        Self {
            glyph,
            args: (dx as i32, dy as i32),
            xy: true,
            flags: 0,
            scale: None,
            instructions: Vec::new(),
        }
    }

    pub(crate) fn anchor(glyph: u16, parent_point: u16, child_point: u16) -> Self {
        Self {
            args: (parent_point as i32, child_point as i32),
            xy: false,
            ..Self::offset(glyph, 0, 0)
        }
    }

    pub(crate) fn use_my_metrics(self) -> Self {
        self.flag(USE_MY_METRICS)
    }

    pub(crate) fn flag(mut self, flag: u16) -> Self {
        self.flags |= flag;
        self
    }

    pub(crate) fn scale(mut self, s: f32) -> Self {
        self.scale = Some(Scale::Uniform(s));
        self
    }

    pub(crate) fn xy_scale(mut self, sx: f32, sy: f32) -> Self {
        self.scale = Some(Scale::PerAxis(sx, sy));
        self
    }

    pub(crate) fn two_by_two(mut self, m: [f32; 4]) -> Self {
        self.scale = Some(Scale::TwoByTwo(m));
        self
    }

    pub(crate) fn instructions(mut self, bytes: &[u8]) -> Self {
        self.instructions = bytes.to_vec();
        self.flag(WE_HAVE_INSTRUCTIONS)
    }
}

pub(crate) fn composite_glyph(bbox: (i16, i16, i16, i16), components: &[Component]) -> Vec<u8> {
    let mut out = Vec::new();
    push_i16(&mut out, -1);
    for v in [bbox.0, bbox.1, bbox.2, bbox.3] {
        push_i16(&mut out, v);
    }

    for (i, comp) in components.iter().enumerate() {
        let (a, b) = comp.args;
        let fits_byte = if comp.xy {
            (-128..=127).contains(&a) && (-128..=127).contains(&b)
        } else {
            (0..=255).contains(&a) && (0..=255).contains(&b)
        };

        let mut flags = comp.flags;
        if comp.xy {
            flags |= ARGS_ARE_XY_VALUES;
        }
        if !fits_byte {
            flags |= ARG_1_AND_2_ARE_WORDS;
        }
        if i + 1 < components.len() {
            flags |= MORE_COMPONENTS;
        }
        match comp.scale {
            Some(Scale::Uniform(_)) => flags |= WE_HAVE_A_SCALE,
            Some(Scale::PerAxis(..)) => flags |= WE_HAVE_AN_X_AND_Y_SCALE,
            Some(Scale::TwoByTwo(_)) => flags |= WE_HAVE_A_TWO_BY_TWO,
            None => {}
        }

        push_u16(&mut out, flags);
        push_u16(&mut out, comp.glyph);
        if fits_byte {
            out.push(a as u8);
            out.push(b as u8);
        } else {
            push_u16(&mut out, a as u16);
            push_u16(&mut out, b as u16);
        }
        match &comp.scale {
            Some(Scale::Uniform(s)) => push_i16(&mut out, f2dot14(*s)),
            Some(Scale::PerAxis(sx, sy)) => {
                push_i16(&mut out, f2dot14(*sx));
                push_i16(&mut out, f2dot14(*sy));
            }
            Some(Scale::TwoByTwo(m)) => {
                for v in m {
                    push_i16(&mut out, f2dot14(*v));
                }
            }
            None => {}
        }
    }

    let instructions: Vec<u8> = components.iter().flat_map(|c| c.instructions.clone()).collect();
    if components.iter().any(|c| c.flags & WE_HAVE_INSTRUCTIONS != 0) {
        push_u16(&mut out, instructions.len() as u16);
        out.extend_from_slice(&instructions);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// FontBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Assembles a complete sfnt byte stream.
///
/// Glyph 0 is an empty `.notdef`. Codepoints are mapped through one
/// delta segment each.
#[derive(Clone, Debug)]
pub(crate) struct FontBuilder {
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub long_loca: bool,
    pub with_vhea: bool,
    /// Write the table directory in reverse tag order.
    pub reverse_directory: bool,
    glyphs: Vec<(Vec<u8>, u16, i16)>,
    mapping: Vec<(u8, u16)>,
    omit: Vec<TableTag>,
    cmap_override: Option<Vec<u8>>,
}

impl FontBuilder {
    pub(crate) fn new() -> Self {
        Self {
            units_per_em: 1000,
            ascent: 800,
            descent: -200,
            long_loca: false,
            with_vhea: false,
            reverse_directory: false,
            glyphs: vec![(Vec::new(), 500, 0)],
            mapping: Vec::new(),
            omit: Vec::new(),
            cmap_override: None,
        }
    }

    /// Append a glyph; its index is the number of glyphs added before it.
    pub(crate) fn glyph(mut self, data: Vec<u8>, advance: u16) -> Self {
        self.glyphs.push((data, advance, 0));
        self
    }

    pub(crate) fn map(mut self, codepoint: u8, glyph: u16) -> Self {
        self.mapping.push((codepoint, glyph));
        self
    }

    pub(crate) fn omit(mut self, tag: TableTag) -> Self {
        self.omit.push(tag);
        self
    }

    pub(crate) fn cmap(mut self, table: Vec<u8>) -> Self {
        self.cmap_override = Some(table);
        self
    }

    fn head(&self) -> Vec<u8> {
        let boxes: Vec<BoundingBox> = self
            .glyphs
            .iter()
            .filter(|(d, _, _)| d.len() >= 10)
            .map(|(d, _, _)| {
                let field = |i: usize| i16::from_be_bytes([d[i], d[i + 1]]);
                BoundingBox::normalized(field(2), field(4), field(6), field(8))
            })
            .collect();

        let mut out = Vec::new();
        push_u32(&mut out, 0x0001_0000);
        push_u32(&mut out, 0x0001_0000);
        push_u32(&mut out, 0);
        push_u32(&mut out, HEAD_MAGIC);
        push_u16(&mut out, 0x000B);
        push_u16(&mut out, self.units_per_em);
        out.extend_from_slice(&[0; 16]);
        push_i16(&mut out, boxes.iter().map(|b| b.x_min).min().unwrap_or(0));
        push_i16(&mut out, boxes.iter().map(|b| b.y_min).min().unwrap_or(0));
        push_i16(&mut out, boxes.iter().map(|b| b.x_max).max().unwrap_or(0));
        push_i16(&mut out, boxes.iter().map(|b| b.y_max).max().unwrap_or(0));
        push_u16(&mut out, 0);
        push_u16(&mut out, 8);
        push_i16(&mut out, 2);
        push_i16(&mut out, self.long_loca as i16);
        push_i16(&mut out, 0);
        out
    }

    fn hhea(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, 0x0001_0000);
        push_i16(&mut out, self.ascent);
        push_i16(&mut out, self.descent);
        push_i16(&mut out, 0);
        push_u16(&mut out, self.glyphs.iter().map(|g| g.1).max().unwrap_or(0));
        for v in [0i16, 0, 0, 1, 0, 0] {
            push_i16(&mut out, v);
        }
        out.extend_from_slice(&[0; 8]);
        push_i16(&mut out, 0);
        push_u16(&mut out, self.glyphs.len() as u16);
        out
    }

    fn vhea(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, 0x0001_1000);
        push_i16(&mut out, self.units_per_em as i16 / 2);
        push_i16(&mut out, -(self.units_per_em as i16) / 2);
        push_i16(&mut out, 0);
        push_i16(&mut out, self.units_per_em as i16);
        for v in [0i16, 0, 0, 0, 1, 0] {
            push_i16(&mut out, v);
        }
        out.extend_from_slice(&[0; 8]);
        push_i16(&mut out, 0);
        push_u16(&mut out, 1);
        out
    }

    fn hmtx(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, advance, lsb) in &self.glyphs {
            push_u16(&mut out, *advance);
            push_i16(&mut out, *lsb);
        }
        out
    }

    fn maxp(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, 0x0001_0000);
        push_u16(&mut out, self.glyphs.len() as u16);
        out.extend_from_slice(&[0; 26]);
        out
    }

    fn cmap_table(&self) -> Vec<u8> {
        if let Some(table) = &self.cmap_override {
            return table.clone();
        }
        let mut mapping = self.mapping.clone();
        mapping.sort_by_key(|m| m.0);
        let segments: Vec<Segment> = mapping
            .iter()
            .map(|&(cp, glyph)| {
                let delta = (glyph as i32 - cp as i32) as i16;
                Segment::delta(cp as u16, cp as u16, delta)
            })
            .chain(std::iter::once(Segment::terminator()))
            .collect();
        let sub = format4_subtable(&segments, &[]);
        cmap_table(&[(0, 3, &sub[..])])
    }

    fn glyf_and_loca(&self) -> (Vec<u8>, Vec<u8>) {
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        let write_offset = |loca: &mut Vec<u8>, offset: usize| {
            if self.long_loca {
                push_u32(loca, offset as u32);
            } else {
                push_u16(loca, (offset / 2) as u16);
            }
        };
        for (data, _, _) in &self.glyphs {
            write_offset(&mut loca, glyf.len());
            glyf.extend_from_slice(data);
            if glyf.len() % 2 == 1 {
                glyf.push(0);
            }
        }
        write_offset(&mut loca, glyf.len());
        (glyf, loca)
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let (glyf, loca) = self.glyf_and_loca();
        let mut tables: Vec<(TableTag, Vec<u8>)> = vec![
            (TableTag::CMAP, self.cmap_table()),
            (TableTag::GLYF, glyf),
            (TableTag::HEAD, self.head()),
            (TableTag::HHEA, self.hhea()),
            (TableTag::HMTX, self.hmtx()),
            (TableTag::LOCA, loca),
            (TableTag::MAXP, self.maxp()),
        ];
        if self.with_vhea {
            tables.push((TableTag::VHEA, self.vhea()));
        }
        tables.retain(|(tag, _)| !self.omit.contains(tag));
        if self.reverse_directory {
            tables.reverse();
        }

        let num_tables = tables.len() as u16;
        let mut out = Vec::new();
        push_u32(&mut out, SFNT_VERSION_TRUETYPE);
        push_u16(&mut out, num_tables);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);

        let mut offset = 12 + 16 * tables.len();
        let mut body = Vec::new();
        for (tag, data) in &tables {
            out.extend_from_slice(&tag.0);
            push_u32(&mut out, 0);
            push_u32(&mut out, offset as u32);
            push_u32(&mut out, data.len() as u32);
            body.extend_from_slice(data);
            while body.len() % 4 != 0 {
                body.push(0);
            }
            offset = 12 + 16 * tables.len() + body.len();
        }
        out.extend_from_slice(&body);
        out
    }
}
