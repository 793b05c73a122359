//! The loaded font handle.
//!
//! [`Font::load`] walks the sfnt table directory, decodes the metric tables
//! and the character map, then decodes every glyph reachable from codepoints
//! 0–254 and resolves composite glyphs against the decoded set.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

use common::{Cursor, ParseError, Vec2};

use crate::cmap::{read_cmap, CodepointMap};
use crate::error::FontError;
use crate::glyph::{
    decode_glyph, GlyphOutline, OutlineBody, Placement, Shape, SCALED_COMPONENT_OFFSET,
};
use crate::hooks::{LoadOptions, Reclaimer, Tracer};
use crate::tables::{
    glyph_range, HeadTable, HheaTable, HorizontalMetrics, LocaFormat, LongHorMetric, MaxpTable,
    OffsetTable, TableRecord, TableTag, VheaTable, HEAD_MAGIC,
};

/// Deepest composite nesting followed when resolving or flattening.
pub const MAX_COMPONENT_DEPTH: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// FontId / FontIdAllocator
// ─────────────────────────────────────────────────────────────────────────────

/// Number of identities a default allocator hands out.
pub const FONT_ID_CAPACITY: u16 = 255;

/// Small per-font identity, used as a glyph-cache key component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(u8);

impl FontId {
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

/// Hands out [`FontId`]s in increasing order until its capacity is spent.
///
/// Safe to share between threads constructing fonts concurrently.
#[derive(Debug)]
pub struct FontIdAllocator {
    next: AtomicU16,
    capacity: u16,
}

impl FontIdAllocator {
    pub const fn new() -> Self {
        Self { next: AtomicU16::new(0), capacity: FONT_ID_CAPACITY }
    }

    /// An allocator limited to `capacity` identities (at most 255).
    pub fn with_capacity(capacity: u16) -> Self {
        Self {
            next: AtomicU16::new(0),
            capacity: capacity.min(FONT_ID_CAPACITY),
        }
    }

    pub fn allocate(&self) -> Result<FontId, FontError> {
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .map(|n| FontId(n as u8))
            .map_err(|_| FontError::FontIdentitySpaceExhausted { capacity: self.capacity })
    }

    /// Identities handed out so far.
    pub fn allocated(&self) -> u16 {
        self.next.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }
}

impl Default for FontIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Font
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded font: metrics, character map and the glyphs it reaches.
///
/// Immutable after load.
pub struct Font {
    id: FontId,
    head: HeadTable,
    hhea: HheaTable,
    vhea: Option<VheaTable>,
    maxp: MaxpTable,
    hmtx: HorizontalMetrics,
    cmap: CodepointMap,
    glyphs: HashMap<u16, GlyphOutline>,
}

impl Font {
    /// Load a font with default hooks.
    pub fn load(data: &[u8], ids: &FontIdAllocator) -> Result<Font, FontError> {
        Self::load_with(data, ids, LoadOptions::default())
    }

    /// Load a font, reporting progress and reclaim points through `options`.
    ///
    /// The identity is taken from `ids` only once decoding has succeeded.
    pub fn load_with(
        data: &[u8],
        ids: &FontIdAllocator,
        options: LoadOptions<'_>,
    ) -> Result<Font, FontError> {
        let LoadOptions { mut reclaimer, tracer } = options;
        let tables = TableSet::read(data, tracer)?;

        let head = tables.head.ok_or_else(|| missing(TableTag::HEAD))?;
        let hhea = tables.hhea.ok_or_else(|| missing(TableTag::HHEA))?;
        let maxp = tables.maxp.ok_or_else(|| missing(TableTag::MAXP))?;
        let hmtx_bytes = tables.hmtx.ok_or_else(|| missing(TableTag::HMTX))?;
        let cmap_bytes = tables.cmap.ok_or_else(|| missing(TableTag::CMAP))?;
        let loca = tables.loca.ok_or_else(|| missing(TableTag::LOCA))?;
        let glyf = tables.glyf.ok_or_else(|| missing(TableTag::GLYF))?;

        if head.units_per_em == 0 {
            return Err(FontError::malformed("head.unitsPerEm is zero"));
        }
        if head.magic_number != HEAD_MAGIC {
            log::warn!("head.magicNumber is {:#010x}", head.magic_number);
        }

        let hmtx = HorizontalMetrics::read(
            &mut Cursor::new(hmtx_bytes),
            hhea.num_h_metrics,
            maxp.num_glyphs,
            &mut reclaimer,
        )
        .map_err(|e| table_error(TableTag::HMTX, e))?;

        let cmap = match read_cmap(&mut Cursor::new(cmap_bytes), &mut reclaimer, tracer) {
            Ok(map) => map,
            Err(e @ FontError::UnsupportedCharacterMap { .. }) => {
                log::warn!("{e}; no codepoint will resolve to a glyph");
                CodepointMap::empty()
            }
            Err(FontError::Parse(e)) => return Err(table_error(TableTag::CMAP, e)),
            Err(e) => return Err(e),
        };
        tracer.emit(format_args!("cmap: {} codepoints mapped", cmap.mapped_count()));

        let mut loader = GlyphLoader {
            loca,
            glyf,
            format: head.loca_format(),
            num_glyphs: maxp.num_glyphs,
            reclaim: &mut reclaimer,
            tracer,
            glyphs: HashMap::new(),
        };
        for (_, glyph_id) in cmap.iter() {
            if glyph_id != 0 {
                loader.ensure(glyph_id);
            }
        }
        loader.resolve_composites();
        let glyphs = loader.glyphs;
        tracer.emit(format_args!("glyf: {} glyphs decoded", glyphs.len()));

        let id = ids.allocate()?;
        log::debug!(
            "loaded {id}: {} glyphs, {} units/em, {} reclaim calls",
            glyphs.len(),
            head.units_per_em,
            reclaimer.calls()
        );

        Ok(Font {
            id,
            head,
            hhea,
            vhea: tables.vhea,
            maxp,
            hmtx,
            cmap,
            glyphs,
        })
    }

    pub fn id(&self) -> FontId {
        self.id
    }

    pub fn head(&self) -> &HeadTable {
        &self.head
    }

    pub fn hhea(&self) -> &HheaTable {
        &self.hhea
    }

    pub fn vhea(&self) -> Option<&VheaTable> {
        self.vhea.as_ref()
    }

    pub fn maxp(&self) -> &MaxpTable {
        &self.maxp
    }

    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    pub fn ascent(&self) -> i16 {
        self.hhea.ascender
    }

    pub fn descent(&self) -> i16 {
        self.hhea.descender
    }

    pub fn line_gap(&self) -> i16 {
        self.hhea.line_gap
    }

    pub fn codepoint_map(&self) -> &CodepointMap {
        &self.cmap
    }

    /// Glyph index for `codepoint`; 0 when unmapped.
    pub fn glyph_index(&self, codepoint: u8) -> u16 {
        self.cmap.glyph_index(codepoint)
    }

    /// The decoded glyph for `codepoint`.
    pub fn glyph(&self, codepoint: u8) -> Result<&GlyphOutline, FontError> {
        match self.glyph_index(codepoint) {
            0 => Err(FontError::GlyphNotFound { codepoint }),
            gid => self
                .glyphs
                .get(&gid)
                .ok_or(FontError::GlyphNotFound { codepoint }),
        }
    }

    /// A decoded glyph by index.
    pub fn outline(&self, glyph_id: u16) -> Option<&GlyphOutline> {
        self.glyphs.get(&glyph_id)
    }

    /// Number of glyphs decoded at load time.
    pub fn decoded_glyphs(&self) -> usize {
        self.glyphs.len()
    }

    pub fn metrics(&self, glyph_id: u16) -> LongHorMetric {
        self.hmtx.get(glyph_id)
    }

    pub fn advance_width(&self, glyph_id: u16) -> u16 {
        self.hmtx.get(glyph_id).advance_width
    }

    /// Renderable shapes of a glyph, with composite components transformed
    /// and placed in the parent's coordinate space.
    pub fn outline_shapes(&self, glyph_id: u16) -> Vec<Shape> {
        self.flatten(glyph_id, 0).0
    }

    fn flatten(&self, glyph_id: u16, depth: usize) -> (Vec<Shape>, Vec<Vec2>) {
        let Some(outline) = self.glyphs.get(&glyph_id) else {
            return (Vec::new(), Vec::new());
        };
        let components = match &outline.body {
            OutlineBody::Empty => return (Vec::new(), Vec::new()),
            OutlineBody::Simple { shapes, points } => return (shapes.clone(), points.clone()),
            OutlineBody::Composite(components) => components,
        };
        if depth >= MAX_COMPONENT_DEPTH {
            log::warn!("glyph {glyph_id}: composite nesting deeper than {MAX_COMPONENT_DEPTH}");
            return (Vec::new(), Vec::new());
        }

        let mut shapes = Vec::new();
        let mut points = Vec::new();
        for comp in components {
            let (child_shapes, child_points) = self.flatten(comp.glyph_index, depth + 1);
            let child_points: Vec<Vec2> =
                child_points.iter().map(|&p| comp.transform_point(p)).collect();

            let offset = match comp.placement {
                Placement::Offset { dx, dy } => {
                    let d = Vec2::new(dx as f32, dy as f32);
                    if comp.has_flag(SCALED_COMPONENT_OFFSET) {
                        comp.transform_point(d)
                    } else {
                        d
                    }
                }
                Placement::Anchor { parent_point, child_point } => {
                    match (
                        points.get(parent_point as usize),
                        child_points.get(child_point as usize),
                    ) {
                        (Some(&parent), Some(&child)) => parent - child,
                        _ => {
                            log::warn!(
                                "glyph {glyph_id}: anchor {parent_point}->{child_point} out of range"
                            );
                            Vec2::ZERO
                        }
                    }
                }
            };

            shapes.extend(
                child_shapes
                    .iter()
                    .map(|s| s.map(|p| comp.transform_point(p) + offset)),
            );
            points.extend(child_points.into_iter().map(|p| p + offset));
        }
        (shapes, points)
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("id", &self.id)
            .field("units_per_em", &self.head.units_per_em)
            .field("num_glyphs", &self.maxp.num_glyphs)
            .field("decoded_glyphs", &self.glyphs.len())
            .field("cmap", &self.cmap)
            .finish()
    }
}

fn missing(tag: TableTag) -> FontError {
    FontError::malformed(format!("missing mandatory table '{tag}'"))
}

fn table_error(tag: TableTag, e: ParseError) -> FontError {
    FontError::malformed(format!("table '{tag}': {e}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Table directory
// ─────────────────────────────────────────────────────────────────────────────

/// Tables found while walking the directory. Tables whose decoding needs
/// values from other tables are kept as byte ranges.
#[derive(Default)]
struct TableSet<'a> {
    head: Option<HeadTable>,
    hhea: Option<HheaTable>,
    vhea: Option<VheaTable>,
    maxp: Option<MaxpTable>,
    hmtx: Option<&'a [u8]>,
    cmap: Option<&'a [u8]>,
    loca: Option<&'a [u8]>,
    glyf: Option<&'a [u8]>,
}

impl<'a> TableSet<'a> {
    fn read(data: &'a [u8], tracer: Tracer<'_>) -> Result<Self, FontError> {
        let mut c = Cursor::new(data);
        let header = OffsetTable::read(&mut c)
            .map_err(|e| FontError::malformed(format!("offset table: {e}")))?;
        if !header.is_known_version() {
            return Err(FontError::malformed(format!(
                "unknown sfnt version {:#010x}",
                header.sfnt_version
            )));
        }
        if header.directory_len() > data.len() {
            return Err(FontError::malformed(format!(
                "directory of {} tables exceeds the {}-byte source",
                header.num_tables,
                data.len()
            )));
        }
        tracer.emit(format_args!("sfnt: {} tables", header.num_tables));

        let mut set = TableSet::default();
        for _ in 0..header.num_tables {
            let record = TableRecord::read(&mut c)?;
            let start = record.offset as usize;
            let bytes = match data.get(start..start + record.length as usize) {
                Some(bytes) if record.fits_within(data.len()) => bytes,
                _ => {
                    return Err(FontError::malformed(format!(
                        "table '{}' ({} bytes at {}) lies outside the source",
                        record.tag, record.length, record.offset
                    )));
                }
            };
            tracer.emit(format_args!(
                "table '{}' at {} ({} bytes)",
                record.tag, record.offset, record.length
            ));

            let mut t = Cursor::new(bytes);
            match record.tag {
                TableTag::HEAD => {
                    set.head = Some(HeadTable::read(&mut t).map_err(|e| table_error(record.tag, e))?);
                }
                TableTag::HHEA => {
                    set.hhea = Some(HheaTable::read(&mut t).map_err(|e| table_error(record.tag, e))?);
                }
                TableTag::MAXP => {
                    set.maxp = Some(MaxpTable::read(&mut t).map_err(|e| table_error(record.tag, e))?);
                }
                TableTag::VHEA => match VheaTable::read(&mut t) {
                    Ok(vhea) => set.vhea = Some(vhea),
                    Err(e) => log::warn!("ignoring unreadable 'vhea': {e}"),
                },
                TableTag::HMTX => set.hmtx = Some(bytes),
                TableTag::CMAP => set.cmap = Some(bytes),
                TableTag::LOCA => set.loca = Some(bytes),
                TableTag::GLYF => set.glyf = Some(bytes),
                other => log::debug!("skipping table '{other}'"),
            }
        }
        Ok(set)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Glyph loading
// ─────────────────────────────────────────────────────────────────────────────

struct GlyphLoader<'a, 'r, 'h> {
    loca: &'a [u8],
    glyf: &'a [u8],
    format: LocaFormat,
    num_glyphs: u16,
    reclaim: &'r mut Reclaimer<'h>,
    tracer: Tracer<'h>,
    glyphs: HashMap<u16, GlyphOutline>,
}

impl GlyphLoader<'_, '_, '_> {
    /// Decode `glyph_id` unless already present. Failures are logged and
    /// leave the glyph absent.
    fn ensure(&mut self, glyph_id: u16) {
        if self.glyphs.contains_key(&glyph_id) {
            return;
        }
        if glyph_id >= self.num_glyphs {
            log::warn!("glyph {glyph_id} is past maxp.numGlyphs ({})", self.num_glyphs);
            return;
        }
        match self.decode(glyph_id) {
            Ok(outline) => {
                self.tracer.emit(format_args!(
                    "glyph {glyph_id}: {} shapes, {} components",
                    outline.shapes().len(),
                    outline.components().len()
                ));
                self.glyphs.insert(glyph_id, outline);
            }
            Err(e) => log::warn!("skipping undecodable glyph {glyph_id}: {e}"),
        }
    }

    fn decode(&mut self, glyph_id: u16) -> Result<GlyphOutline, ParseError> {
        let (start, end) = glyph_range(self.loca, glyph_id, self.format)?;
        let bytes = self
            .glyf
            .get(start as usize..end as usize)
            .ok_or(ParseError::UnexpectedEof { offset: start as usize, wanted: (end - start) as usize })?;
        decode_glyph(bytes, self.reclaim)
    }

    /// Decode every component reachable from a composite glyph and apply
    /// `USE_MY_METRICS` bounding boxes, children first.
    fn resolve_composites(&mut self) {
        let mut roots: Vec<u16> = self
            .glyphs
            .iter()
            .filter(|(_, g)| g.is_composite())
            .map(|(&id, _)| id)
            .collect();
        roots.sort_unstable();

        let mut visited = HashSet::new();
        for id in roots {
            self.resolve(id, 0, &mut visited);
        }
    }

    fn resolve(&mut self, glyph_id: u16, depth: usize, visited: &mut HashSet<u16>) {
        if !visited.insert(glyph_id) {
            return;
        }
        if depth >= MAX_COMPONENT_DEPTH {
            log::warn!("glyph {glyph_id}: composite nesting deeper than {MAX_COMPONENT_DEPTH}");
            return;
        }
        let components = match self.glyphs.get(&glyph_id) {
            Some(g) => g.components().to_vec(),
            None => return,
        };

        for comp in components {
            self.ensure(comp.glyph_index);
            self.resolve(comp.glyph_index, depth + 1, visited);
            if !comp.use_my_metrics() {
                continue;
            }
            let child_bbox = self.glyphs.get(&comp.glyph_index).map(|g| g.bbox);
            if let (Some(bbox), Some(parent)) = (child_bbox, self.glyphs.get_mut(&glyph_id)) {
                parent.bbox = bbox;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
