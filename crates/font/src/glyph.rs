//! Glyph outline decoding from the `glyf` table.
//!
//! Simple glyphs are decoded into closed [`Shape`]s whose quadratic curves are
//! already tessellated into straight segments. Composite glyphs are decoded
//! into [`ComponentRef`]s and resolved by the font handle once the whole
//! glyph set is available.

use common::{Cursor, ParseError, Vec2};

use crate::hooks::Reclaimer;

/// Straight segments used to approximate one quadratic curve.
pub const CURVE_SEGMENTS: usize = 16;

/// Divisor for F2Dot14 transform coefficients.
const F2DOT14_ONE: f32 = 16384.0;

// ─────────────────────────────────────────────────────────────────────────────
// Shape
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointKind {
    OnCurve,
    OffCurve,
    /// Implied on-curve point between two consecutive off-curve points.
    Midpoint,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapePoint {
    pub pos: Vec2,
    pub kind: PointKind,
}

impl ShapePoint {
    pub const fn new(pos: Vec2, kind: PointKind) -> Self {
        Self { pos, kind }
    }
}

/// A closed polygon in font units. The last point connects to the first.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub points: Vec<ShapePoint>,
}

impl Shape {
    /// Every edge of the polygon, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i].pos, self.points[(i + 1) % n].pos))
    }

    /// Copy of this shape with `f` applied to every point.
    pub fn map(&self, f: impl Fn(Vec2) -> Vec2) -> Shape {
        Shape {
            points: self
                .points
                .iter()
                .map(|p| ShapePoint::new(f(p.pos), p.kind))
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BoundingBox
// ─────────────────────────────────────────────────────────────────────────────

/// Glyph bounding box in font units; `min <= max` on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

impl BoundingBox {
    /// Build a box from raw header values, swapping inverted bounds.
    pub fn normalized(x0: i16, y0: i16, x1: i16, y1: i16) -> Self {
        Self {
            x_min: x0.min(x1),
            y_min: y0.min(y1),
            x_max: x0.max(x1),
            y_max: y0.max(y1),
        }
    }

    pub fn width(&self) -> i32 {
        self.x_max as i32 - self.x_min as i32
    }

    pub fn height(&self) -> i32 {
        self.y_max as i32 - self.y_min as i32
    }

    /// `true` if either axis has zero extent.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ComponentRef
// ─────────────────────────────────────────────────────────────────────────────

pub const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
pub const ARGS_ARE_XY_VALUES: u16 = 0x0002;
pub const ROUND_XY_TO_GRID: u16 = 0x0004;
pub const WE_HAVE_A_SCALE: u16 = 0x0008;
pub const MORE_COMPONENTS: u16 = 0x0020;
pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
pub const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
pub const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
pub const USE_MY_METRICS: u16 = 0x0200;
pub const OVERLAP_COMPOUND: u16 = 0x0400;
pub const SCALED_COMPONENT_OFFSET: u16 = 0x0800;
pub const UNSCALED_COMPONENT_OFFSET: u16 = 0x1000;

/// How a component is positioned inside its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Translate by `(dx, dy)` font units.
    Offset { dx: i16, dy: i16 },
    /// Move the child so its point `child_point` lands on the parent's
    /// already-placed point `parent_point`.
    Anchor { parent_point: u16, child_point: u16 },
}

/// One component of a composite glyph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentRef {
    pub glyph_index: u16,
    /// Raw component flags, including the ones only carried along.
    pub flags: u16,
    pub placement: Placement,
    /// `[xx, xy, yx, yy]`: `x' = xx·x + yx·y`, `y' = xy·x + yy·y`.
    pub transform: [f32; 4],
}

impl ComponentRef {
    pub const IDENTITY: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

    pub fn use_my_metrics(&self) -> bool {
        self.flags & USE_MY_METRICS != 0
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Apply the linear part of the transform.
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        let [xx, xy, yx, yy] = self.transform;
        Vec2::new(xx * p.x + yx * p.y, xy * p.x + yy * p.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GlyphOutline
// ─────────────────────────────────────────────────────────────────────────────

/// Decoded body of a glyph. Shapes and component refs never coexist.
#[derive(Clone, Debug, PartialEq)]
pub enum OutlineBody {
    /// No contours, e.g. the space glyph.
    Empty,
    Simple {
        shapes: Vec<Shape>,
        /// Decoded points before midpoint insertion and tessellation, used
        /// for composite anchor placement.
        points: Vec<Vec2>,
    },
    Composite(Vec<ComponentRef>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlyphOutline {
    pub bbox: BoundingBox,
    pub body: OutlineBody,
}

impl GlyphOutline {
    pub fn empty() -> Self {
        Self { bbox: BoundingBox::default(), body: OutlineBody::Empty }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.body, OutlineBody::Composite(_))
    }

    /// Own shapes of a simple glyph; empty for composite and empty glyphs.
    pub fn shapes(&self) -> &[Shape] {
        match &self.body {
            OutlineBody::Simple { shapes, .. } => shapes,
            _ => &[],
        }
    }

    pub fn points(&self) -> &[Vec2] {
        match &self.body {
            OutlineBody::Simple { points, .. } => points,
            _ => &[],
        }
    }

    pub fn components(&self) -> &[ComponentRef] {
        match &self.body {
            OutlineBody::Composite(components) => components,
            _ => &[],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simple glyph flag bits
// ─────────────────────────────────────────────────────────────────────────────

const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE_SHORT: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE_SHORT: u8 = 0x20;

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Decode one glyph from its `glyf` byte range (as delimited by `loca`).
///
/// An empty range is an empty glyph.
pub fn decode_glyph(data: &[u8], reclaim: &mut Reclaimer<'_>) -> Result<GlyphOutline, ParseError> {
    if data.is_empty() {
        return Ok(GlyphOutline::empty());
    }

    let mut c = Cursor::new(data);
    let num_contours = c.i16()?;
    let (x0, y0, x1, y1) = (c.i16()?, c.i16()?, c.i16()?, c.i16()?);
    let bbox = BoundingBox::normalized(x0, y0, x1, y1);

    let body = if num_contours >= 0 {
        decode_simple(&mut c, num_contours as u16, reclaim)?
    } else {
        OutlineBody::Composite(decode_composite(&mut c)?)
    };
    Ok(GlyphOutline { bbox, body })
}

fn decode_simple(
    c: &mut Cursor<'_>,
    num_contours: u16,
    reclaim: &mut Reclaimer<'_>,
) -> Result<OutlineBody, ParseError> {
    if num_contours == 0 {
        return Ok(OutlineBody::Empty);
    }

    let mut end_pts = Vec::with_capacity(num_contours as usize);
    for _ in 0..num_contours {
        let end = c.u16()?;
        if end_pts.last().is_some_and(|&prev| end <= prev) {
            return Err(ParseError::InvalidValue("contour end points are not increasing"));
        }
        end_pts.push(end);
    }
    let num_points = end_pts.last().map_or(0, |&e| e as usize + 1);

    let instruction_len = c.u16()? as usize;
    c.skip(instruction_len)?;

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = c.u8()?;
        flags.push(flag);
        reclaim.tick();
        if flag & REPEAT_FLAG != 0 {
            let repeat = c.u8()? as usize;
            let room = num_points - flags.len();
            flags.extend(std::iter::repeat_n(flag, repeat.min(room)));
        }
    }

    let xs = decode_coordinates(c, &flags, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE_SHORT, reclaim)?;
    let ys = decode_coordinates(c, &flags, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE_SHORT, reclaim)?;

    let points: Vec<Vec2> = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| Vec2::new(x as f32, y as f32))
        .collect();

    let mut shapes = Vec::with_capacity(end_pts.len());
    let mut start = 0usize;
    for &end in &end_pts {
        let end = end as usize;
        let contour: Vec<(Vec2, bool)> = (start..=end)
            .map(|i| (points[i], flags[i] & ON_CURVE_POINT != 0))
            .collect();
        match build_shape(&contour) {
            Some(shape) => shapes.push(shape),
            None => log::trace!("dropping contour {start}..={end} with fewer than 3 points"),
        }
        start = end + 1;
    }

    Ok(OutlineBody::Simple { shapes, points })
}

/// Decode one delta-encoded coordinate stream into absolute values.
fn decode_coordinates(
    c: &mut Cursor<'_>,
    flags: &[u8],
    short_bit: u8,
    same_or_positive_bit: u8,
    reclaim: &mut Reclaimer<'_>,
) -> Result<Vec<i32>, ParseError> {
    let mut out = Vec::with_capacity(flags.len());
    let mut value: i32 = 0;
    for &flag in flags {
        if flag & short_bit != 0 {
            let delta = c.u8()? as i32;
            if flag & same_or_positive_bit != 0 {
                value += delta;
            } else {
                value -= delta;
            }
        } else if flag & same_or_positive_bit == 0 {
            value += c.i16()? as i32;
        }
        out.push(value);
        reclaim.tick();
    }
    Ok(out)
}

/// Turn one contour of `(point, on_curve)` pairs into a tessellated shape.
///
/// Returns `None` when fewer than three points remain.
pub fn build_shape(contour: &[(Vec2, bool)]) -> Option<Shape> {
    let n = contour.len();
    let mut expanded = Vec::with_capacity(n * 2);
    for (i, &(pos, on_curve)) in contour.iter().enumerate() {
        let kind = if on_curve { PointKind::OnCurve } else { PointKind::OffCurve };
        expanded.push(ShapePoint::new(pos, kind));

        let (next_pos, next_on) = contour[(i + 1) % n];
        if n > 1 && !on_curve && !next_on {
            expanded.push(ShapePoint::new(pos.midpoint(next_pos), PointKind::Midpoint));
        }
    }

    let m = expanded.len();
    let mut points = Vec::with_capacity(m * CURVE_SEGMENTS);
    for (j, p) in expanded.iter().enumerate() {
        if p.kind != PointKind::OffCurve || m < 3 {
            points.push(*p);
            continue;
        }
        let from = expanded[(j + m - 1) % m].pos;
        let to = expanded[(j + 1) % m].pos;
        for s in 1..CURVE_SEGMENTS {
            let t = s as f32 / CURVE_SEGMENTS as f32;
            points.push(ShapePoint::new(quadratic(from, p.pos, to, t), PointKind::OnCurve));
        }
    }

    (points.len() >= 3).then_some(Shape { points })
}

/// Point at `t` on the quadratic Bezier `from → ctrl → to`.
fn quadratic(from: Vec2, ctrl: Vec2, to: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    from * (u * u) + ctrl * (2.0 * u * t) + to * (t * t)
}

fn decode_composite(c: &mut Cursor<'_>) -> Result<Vec<ComponentRef>, ParseError> {
    let mut components = Vec::new();
    let mut have_instructions = false;

    loop {
        let flags = c.u16()?;
        let glyph_index = c.u16()?;

        let xy = flags & ARGS_ARE_XY_VALUES != 0;
        let (arg1, arg2): (i32, i32) = match (flags & ARG_1_AND_2_ARE_WORDS != 0, xy) {
            (true, true) => (c.i16()? as i32, c.i16()? as i32),
            (true, false) => (c.u16()? as i32, c.u16()? as i32),
            (false, true) => (c.i8()? as i32, c.i8()? as i32),
            (false, false) => (c.u8()? as i32, c.u8()? as i32),
        };
        let placement = if xy {
            Placement::Offset { dx: arg1 as i16, dy: arg2 as i16 }
        } else {
            Placement::Anchor { parent_point: arg1 as u16, child_point: arg2 as u16 }
        };

        let mut transform = ComponentRef::IDENTITY;
        if flags & WE_HAVE_A_SCALE != 0 {
            let scale = c.i16()? as f32 / F2DOT14_ONE;
            transform[0] = scale;
            transform[3] = scale;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            transform[0] = c.i16()? as f32 / F2DOT14_ONE;
            transform[3] = c.i16()? as f32 / F2DOT14_ONE;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            for coeff in transform.iter_mut() {
                *coeff = c.i16()? as f32 / F2DOT14_ONE;
            }
        }

        components.push(ComponentRef { glyph_index, flags, placement, transform });
        have_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    if have_instructions {
        let len = c.u16()? as usize;
        c.skip(len)?;
    }

    Ok(components)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
