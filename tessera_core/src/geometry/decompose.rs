// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Range, pixel, subpixel, zoom, and overdraw descriptors.

use core::ops::{Mul, MulAssign};

/// A half-open data range `[start, end)` inside `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    /// Inclusive start.
    pub start: f64,
    /// Exclusive end.
    pub end: f64,
}

impl Range {
    /// The whole data set.
    pub const ALL: Self = Self::new(0.0, 1.0);

    /// No data.
    pub const NONE: Self = Self::new(0.0, 0.0);

    /// Creates a range.
    #[inline]
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Returns `true` if the range lies inside `[0, 1]` and is not reversed.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.start >= 0.0 && self.end <= 1.0 && self.start <= self.end
    }

    /// Returns `true` if the range is non-empty.
    #[inline]
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.start < self.end
    }

    /// Length of the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> f64 {
        self.end - self.start
    }

    /// Restricts this range to `rhs`, expressed relative to this range.
    #[inline]
    pub const fn apply(&mut self, rhs: Self) {
        let w = self.end - self.start;
        self.end = self.start + rhs.end * w;
        self.start += rhs.start * w;
    }
}

impl Default for Range {
    #[inline]
    fn default() -> Self {
        Self::ALL
    }
}

/// Pixel-interleave (sort-first) decomposition.
///
/// A pixel `(x, y, w, h)` renders every `w`-th column starting at `x` and
/// every `h`-th row starting at `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pixel {
    /// Column offset.
    pub x: u32,
    /// Row offset.
    pub y: u32,
    /// Column stride.
    pub w: u32,
    /// Row stride.
    pub h: u32,
}

impl Pixel {
    /// Every pixel.
    pub const ALL: Self = Self::new(0, 0, 1, 1);

    /// Creates a pixel decomposition.
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Returns `true` if strides are positive and offsets lie inside them.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.w > 0 && self.x < self.w && self.h > 0 && self.y < self.h
    }

    /// Repairs zero strides and out-of-range offsets.
    pub const fn validate(&mut self) {
        if self.w == 0 {
            self.w = 1;
        }
        if self.h == 0 {
            self.h = 1;
        }
        if self.x >= self.w {
            self.x = 0;
        }
        if self.y >= self.h {
            self.y = 0;
        }
    }

    /// Interleaves `rhs` inside this decomposition.
    pub const fn apply(&mut self, rhs: Self) {
        if !self.is_valid() || !rhs.is_valid() {
            return;
        }
        self.x += rhs.x * self.w;
        self.y += rhs.y * self.h;
        self.w *= rhs.w;
        self.h *= rhs.h;
    }
}

impl Default for Pixel {
    #[inline]
    fn default() -> Self {
        Self::ALL
    }
}

/// Subpixel (anti-aliasing sample) decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubPixel {
    /// Sample index.
    pub index: u32,
    /// Number of samples.
    pub size: u32,
}

impl SubPixel {
    /// A single sample.
    pub const ALL: Self = Self::new(0, 1);

    /// Creates a subpixel decomposition.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    /// Returns `true` if `index < size`.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.index < self.size
    }

    /// Repairs a zero size and an out-of-range index.
    pub const fn validate(&mut self) {
        if self.size == 0 {
            self.size = 1;
        }
        if self.index >= self.size {
            self.index = 0;
        }
    }

    /// Nests `rhs` inside this decomposition.
    pub const fn apply(&mut self, rhs: Self) {
        if !self.is_valid() || !rhs.is_valid() {
            return;
        }
        self.index += rhs.index * self.size;
        self.size *= rhs.size;
    }
}

impl Default for SubPixel {
    #[inline]
    fn default() -> Self {
        Self::ALL
    }
}

/// Per-axis scale factor.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Zoom {
    /// Horizontal factor.
    pub x: f64,
    /// Vertical factor.
    pub y: f64,
}

impl Zoom {
    /// No scaling.
    pub const NONE: Self = Self::new(1.0, 1.0);

    /// Creates a zoom.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if both factors are positive and finite.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.x > 0.0 && self.y > 0.0 && self.x.is_finite() && self.y.is_finite()
    }

    /// Replaces unusable factors with `1`.
    pub const fn validate(&mut self) {
        if !(self.x > 0.0 && self.x.is_finite()) {
            self.x = 1.0;
        }
        if !(self.y > 0.0 && self.y.is_finite()) {
            self.y = 1.0;
        }
    }

    /// Returns the reciprocal zoom.
    #[inline]
    #[must_use]
    pub const fn invert(self) -> Self {
        Self::new(1.0 / self.x, 1.0 / self.y)
    }
}

impl Default for Zoom {
    #[inline]
    fn default() -> Self {
        Self::NONE
    }
}

impl Mul for Zoom {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl MulAssign for Zoom {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<f64> for Zoom {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Extra pixels rendered beyond each edge of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Overdraw {
    /// Left margin.
    pub left: i32,
    /// Bottom margin.
    pub bottom: i32,
    /// Right margin.
    pub right: i32,
    /// Top margin.
    pub top: i32,
}

impl Overdraw {
    /// No overdraw.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Creates an overdraw descriptor.
    #[inline]
    #[must_use]
    pub const fn new(left: i32, bottom: i32, right: i32, top: i32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Total horizontal margin.
    #[inline]
    #[must_use]
    pub const fn horizontal(&self) -> i32 {
        self.left + self.right
    }

    /// Total vertical margin.
    #[inline]
    #[must_use]
    pub const fn vertical(&self) -> i32 {
        self.bottom + self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_apply_maps_into_parent() {
        let mut r = Range::new(0.5, 1.0);
        r.apply(Range::new(0.0, 0.5));
        assert_eq!(r, Range::new(0.5, 0.75));
        assert!(r.is_valid());
    }

    #[test]
    fn range_apply_stays_inside_parent() {
        let parent = Range::new(0.2, 0.6);
        for child in [Range::new(0.0, 1.0), Range::new(0.25, 0.75), Range::new(0.9, 1.0)] {
            let mut r = parent;
            r.apply(child);
            assert!(r.start >= parent.start - 1e-12, "start escaped parent");
            assert!(r.end <= parent.end + 1e-12, "end escaped parent");
        }
    }

    #[test]
    fn empty_range_has_no_data() {
        assert!(!Range::NONE.has_data());
        assert!(Range::NONE.is_valid());
        assert!(!Range::new(0.6, 0.4).is_valid());
    }

    #[test]
    fn pixel_apply_interleaves() {
        let mut p = Pixel::new(1, 0, 2, 1);
        p.apply(Pixel::new(1, 0, 2, 1));
        assert_eq!(p, Pixel::new(3, 0, 4, 1));
    }

    #[test]
    fn pixel_validate_repairs() {
        let mut p = Pixel::new(5, 0, 0, 0);
        p.validate();
        assert_eq!(p, Pixel::ALL);
    }

    #[test]
    fn subpixel_apply_nests() {
        let mut s = SubPixel::new(1, 2);
        s.apply(SubPixel::new(1, 4));
        assert_eq!(s, SubPixel::new(3, 8));
    }

    #[test]
    fn zoom_validate_replaces_zero() {
        let mut z = Zoom::new(0.0, 2.0);
        z.validate();
        assert_eq!(z, Zoom::new(1.0, 2.0));
        assert_eq!(Zoom::new(2.0, 4.0).invert(), Zoom::new(0.5, 0.25));
    }
}
