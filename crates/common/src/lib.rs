//! # Common Foundation Crate
//!
//! Shared byte-reading utilities, parse errors, colors and geometry primitives
//! for the font decoder and rasterizer.

#![forbid(unsafe_code)]

use core::fmt;
use std::ops::{Add, Mul, Sub};

// ─────────────────────────────────────────────────────────────────────────────
// ParseError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur when decoding binary data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Tried to read past the end of the buffer.
    #[error("unexpected end of input at offset {offset} (wanted {wanted} bytes)")]
    UnexpectedEof { offset: usize, wanted: usize },
    /// A parsed value is not valid in context.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    /// A length or count field is out of the acceptable range.
    #[error("length out of range: {0}")]
    LengthOutOfRange(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// BeScalar — fixed-width big-endian integers
// ─────────────────────────────────────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width integer that can be decoded from big-endian bytes.
///
/// Implemented for the closed set `u8, i8, u16, i16, u32, i32, u64, i64`;
/// the trait is sealed so the set cannot grow outside this crate.
pub trait BeScalar: sealed::Sealed + Copy + Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decode from exactly `Self::SIZE` bytes.
    fn from_be_slice(bytes: &[u8]) -> Self;
}

macro_rules! be_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl BeScalar for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn from_be_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_be_bytes(raw)
                }
            }
        )*
    };
}

be_scalar!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Read a big-endian scalar from `data` at an explicit byte `offset`.
///
/// Pure: the input is never modified, and an out-of-range read is an error
/// rather than a panic.
#[inline]
pub fn read_be<T: BeScalar>(data: &[u8], offset: usize) -> Result<T, ParseError> {
    let end = offset
        .checked_add(T::SIZE)
        .ok_or(ParseError::LengthOutOfRange("offset overflow"))?;
    match data.get(offset..end) {
        Some(bytes) => Ok(T::from_be_slice(bytes)),
        None => Err(ParseError::UnexpectedEof { offset, wanted: T::SIZE }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cursor — seekable big-endian byte reader
// ─────────────────────────────────────────────────────────────────────────────

/// A zero-copy, seekable big-endian reader over a byte slice.
pub struct Cursor<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at offset 0.
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    /// Create a cursor positioned at `pos`.
    #[inline]
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self, ParseError> {
        let mut c = Self::new(buf);
        c.set_position(pos)?;
        Ok(c)
    }

    /// Current read position (byte offset).
    #[inline]
    pub fn position(&self) -> usize {
        self.off
    }

    /// Total length of the underlying buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if there are no more bytes to read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Number of bytes remaining from the current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.off)
    }

    /// Return the full underlying buffer.
    #[inline]
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Seek to an absolute position. Returns an error if out of bounds.
    #[inline]
    pub fn set_position(&mut self, pos: usize) -> Result<(), ParseError> {
        if pos > self.buf.len() {
            return Err(ParseError::UnexpectedEof { offset: pos, wanted: 0 });
        }
        self.off = pos;
        Ok(())
    }

    // ── internal ──

    #[inline]
    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .off
            .checked_add(n)
            .ok_or(ParseError::LengthOutOfRange("read length overflow"))?;
        let slice = self
            .buf
            .get(self.off..end)
            .ok_or(ParseError::UnexpectedEof { offset: self.off, wanted: n })?;
        self.off = end;
        Ok(slice)
    }

    // ── primitive readers ──

    /// Read any big-endian scalar and advance past it.
    #[inline]
    pub fn read<T: BeScalar>(&mut self) -> Result<T, ParseError> {
        let value = read_be::<T>(self.buf, self.off)?;
        self.off += T::SIZE;
        Ok(value)
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8, ParseError> {
        self.read()
    }

    #[inline]
    pub fn i8(&mut self) -> Result<i8, ParseError> {
        self.read()
    }

    #[inline]
    pub fn u16(&mut self) -> Result<u16, ParseError> {
        self.read()
    }

    #[inline]
    pub fn i16(&mut self) -> Result<i16, ParseError> {
        self.read()
    }

    #[inline]
    pub fn u32(&mut self) -> Result<u32, ParseError> {
        self.read()
    }

    #[inline]
    pub fn i32(&mut self) -> Result<i32, ParseError> {
        self.read()
    }

    #[inline]
    pub fn u64(&mut self) -> Result<u64, ParseError> {
        self.read()
    }

    /// Read a 4-byte table tag.
    #[inline]
    pub fn tag(&mut self) -> Result<[u8; 4], ParseError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read exactly `n` bytes as a slice.
    #[inline]
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.take(n)
    }

    /// Skip `n` bytes.
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.take(n).map(|_| ())
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("off", &self.off)
            .field("len", &self.buf.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Color
// ─────────────────────────────────────────────────────────────────────────────

/// An RGBA color with 8 bits per channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255, a: 255 };

    /// Create a fully-opaque color.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with an explicit alpha channel.
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a hex color string.
    ///
    /// Supported formats (with or without leading `#`):
    /// - `RRGGBB`   → opaque
    /// - `RRGGBBAA` → with alpha
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let s = s.strip_prefix('#').unwrap_or(s);

        fn hex_digit(c: u8) -> Result<u8, ParseError> {
            match c {
                b'0'..=b'9' => Ok(c - b'0'),
                b'a'..=b'f' => Ok(c - b'a' + 10),
                b'A'..=b'F' => Ok(c - b'A' + 10),
                _ => Err(ParseError::InvalidValue("invalid hex digit")),
            }
        }

        let bytes = s.as_bytes();
        let channel = |i: usize| -> Result<u8, ParseError> {
            Ok(hex_digit(bytes[i])? << 4 | hex_digit(bytes[i + 1])?)
        };
        match bytes.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(ParseError::InvalidValue("hex color must be 6 or 8 hex digits")),
        }
    }

    /// Pack into a `u32` as `0xAARRGGBB`.
    #[inline]
    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | (self.b as u32)
    }

    /// Unpack from a `u32` in `0xAARRGGBB` format.
    #[inline]
    pub const fn from_argb(v: u32) -> Self {
        Self {
            a: (v >> 24) as u8,
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color(#{:02x}{:02x}{:02x}{:02x})", self.r, self.g, self.b, self.a)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vec2 — 2D vector / point
// ─────────────────────────────────────────────────────────────────────────────

/// A 2D vector (or point) with `f32` components.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation.
    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Point halfway between `self` and `other`.
    #[inline]
    pub fn midpoint(self, other: Self) -> Self {
        self.lerp(other, 0.5)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({}, {})", self.x, self.y)
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
