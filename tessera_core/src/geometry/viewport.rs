// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fractional and pixel viewports.

use core::ops::Add;

use kurbo::Rect;

use super::{Pixel, Zoom};

/// A fractional 2D region, normally inside the unit square.
///
/// `x`/`y` is the bottom-left corner, `w`/`h` the size. A viewport with a
/// negative size is invalid; one with a zero size is valid but empty.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    /// Left edge.
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
}

impl Viewport {
    /// The whole unit square.
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    /// An invalid viewport.
    pub const INVALID: Self = Self::new(0.0, 0.0, -1.0, -1.0);

    /// An empty viewport at the origin.
    pub const EMPTY: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a viewport.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Returns `true` if the size is non-negative.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.w >= 0.0 && self.h >= 0.0
    }

    /// Returns `true` if the viewport covers a non-zero area.
    #[inline]
    #[must_use]
    pub const fn has_area(&self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }

    /// Returns `w * h`.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Right edge.
    #[inline]
    #[must_use]
    pub const fn x_end(&self) -> f64 {
        self.x + self.w
    }

    /// Top edge.
    #[inline]
    #[must_use]
    pub const fn y_end(&self) -> f64 {
        self.y + self.h
    }

    /// Restricts this viewport to the sub-region `rhs`, expressed relative to
    /// this viewport.
    #[inline]
    pub const fn apply(&mut self, rhs: Self) {
        self.x += rhs.x * self.w;
        self.y += rhs.y * self.h;
        self.w *= rhs.w;
        self.h *= rhs.h;
    }

    /// Re-expresses this viewport relative to `rhs`.
    ///
    /// This is the inverse of [`apply`](Self::apply).
    pub const fn transform(&mut self, rhs: Self) {
        self.w /= rhs.w;
        self.h /= rhs.h;
        self.x = (self.x - rhs.x) / rhs.w;
        self.y = (self.y - rhs.y) / rhs.h;
    }

    /// Intersects this viewport with `rhs`.
    ///
    /// Invalid inputs yield [`INVALID`](Self::INVALID). Disjoint or empty
    /// inputs yield [`EMPTY`](Self::EMPTY).
    pub fn intersect(&mut self, rhs: Self) {
        if *self == rhs {
            return;
        }
        if !self.is_valid() || !rhs.is_valid() {
            *self = Self::INVALID;
            return;
        }
        if !self.has_area() || !rhs.has_area() {
            *self = Self::EMPTY;
            return;
        }
        let r = self.to_rect().intersect(rhs.to_rect());
        *self = if r.area() > 0.0 {
            Self::from_rect(r)
        } else {
            Self::EMPTY
        };
    }

    /// Returns the part of `with` that overlaps this viewport, expressed in
    /// this viewport's coordinate system.
    #[must_use]
    pub fn coverage(&self, with: Self) -> Self {
        let mut coverage = with;
        coverage.intersect(*self);
        coverage.transform(*self);
        coverage
    }

    /// Converts to a [`kurbo::Rect`].
    #[inline]
    #[must_use]
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x_end(), self.y_end())
    }

    /// Creates a viewport from a [`kurbo::Rect`].
    #[inline]
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }
}

impl Default for Viewport {
    #[inline]
    fn default() -> Self {
        Self::FULL
    }
}

/// An integer on-screen region in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelViewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

impl PixelViewport {
    /// An invalid pixel viewport.
    pub const INVALID: Self = Self::new(0, 0, -1, -1);

    /// Creates a pixel viewport.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Returns `true` if the size is non-negative.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.w >= 0 && self.h >= 0
    }

    /// Returns `true` if the region is non-empty.
    #[inline]
    #[must_use]
    pub const fn has_area(&self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Area in pixels.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Right edge.
    #[inline]
    #[must_use]
    pub const fn x_end(&self) -> i32 {
        self.x + self.w
    }

    /// Top edge.
    #[inline]
    #[must_use]
    pub const fn y_end(&self) -> i32 {
        self.y + self.h
    }

    /// Restricts this region to the fractional sub-region `vp`.
    ///
    /// End positions are rounded independently of the start so that adjacent
    /// sub-viewports tile without gaps.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "pixel positions truncate toward zero"
    )]
    pub fn apply_viewport(&mut self, vp: Viewport) {
        let w = f64::from(self.w);
        let h = f64::from(self.h);
        let x_end = self.x + ((vp.x + vp.w) * w) as i32;
        let y_end = self.y + ((vp.y + vp.h) * h) as i32;
        self.x += (w * vp.x) as i32;
        self.y += (h * vp.y) as i32;
        self.w = x_end - self.x;
        self.h = y_end - self.y;
    }

    /// Shrinks this region to the share of one pixel-interleave slot.
    ///
    /// Any remainder rounds the size up.
    pub fn apply_pixel(&mut self, pixel: Pixel) {
        if pixel.w > 1 {
            let pw = pixel.w.cast_signed();
            let mut w = self.w / pw;
            if self.w - w * pw != 0 {
                w += 1;
            }
            self.w = w;
        }
        if pixel.h > 1 {
            let ph = pixel.h.cast_signed();
            let mut h = self.h / ph;
            if self.h - h * ph != 0 {
                h += 1;
            }
            self.h = h;
        }
    }

    /// Scales the size by `zoom`, rounding to the nearest pixel.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "zoomed size rounds to whole pixels"
    )]
    pub fn apply_zoom(&mut self, zoom: Zoom) {
        if zoom == Zoom::NONE {
            return;
        }
        self.w = (f64::from(self.w) * zoom.x + 0.5) as i32;
        self.h = (f64::from(self.h) * zoom.y + 0.5) as i32;
    }

    /// Returns the fractional viewport that turns `rhs` into `self` when
    /// applied.
    #[must_use]
    pub fn sub_viewport(&self, rhs: Self) -> Viewport {
        if *self == rhs {
            return Viewport::FULL;
        }
        if !rhs.has_area() {
            return Viewport::new(f64::from(self.x), f64::from(self.y), 0.0, 0.0);
        }
        let rw = f64::from(rhs.w);
        let rh = f64::from(rhs.h);
        Viewport::new(
            f64::from(self.x - rhs.x) / rw,
            f64::from(self.y - rhs.y) / rh,
            f64::from(self.w) / rw,
            f64::from(self.h) / rh,
        )
    }

    /// Returns the zoom that turns `rhs` into `self`.
    #[must_use]
    pub fn zoom_to(&self, rhs: Self) -> Zoom {
        if *self == rhs {
            return Zoom::NONE;
        }
        if !rhs.has_area() {
            return Zoom::new(f64::from(f32::MAX), f64::from(f32::MAX));
        }
        Zoom::new(
            f64::from(self.w) / f64::from(rhs.w),
            f64::from(self.h) / f64::from(rhs.h),
        )
    }

    /// Grows this region to the bounding box of both regions.
    pub fn merge(&mut self, rhs: Self) {
        if *self == rhs || !rhs.has_area() {
            return;
        }
        if !self.has_area() {
            *self = rhs;
            return;
        }
        let x_end = self.x_end().max(rhs.x_end());
        let y_end = self.y_end().max(rhs.y_end());
        self.x = self.x.min(rhs.x);
        self.y = self.y.min(rhs.y);
        self.w = x_end - self.x;
        self.h = y_end - self.y;
    }

    /// Shrinks this region to the overlap with `rhs`.
    pub fn intersect(&mut self, rhs: Self) {
        if *self == rhs {
            return;
        }
        if !self.is_valid() || !rhs.is_valid() {
            *self = Self::INVALID;
            return;
        }
        if !self.has_area() || !rhs.has_area() {
            *self = Self::new(0, 0, 0, 0);
            return;
        }
        let x_end = self.x_end().min(rhs.x_end());
        let y_end = self.y_end().min(rhs.y_end());
        self.x = self.x.max(rhs.x);
        self.y = self.y.max(rhs.y);
        self.w = x_end - self.x;
        self.h = y_end - self.y;
    }
}

impl Default for PixelViewport {
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

impl Add<(i32, i32)> for PixelViewport {
    type Output = Self;

    #[inline]
    fn add(self, (dx, dy): (i32, i32)) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: Viewport, b: Viewport) -> bool {
        (a.x - b.x).abs() < EPS
            && (a.y - b.y).abs() < EPS
            && (a.w - b.w).abs() < EPS
            && (a.h - b.h).abs() < EPS
    }

    #[test]
    fn apply_nests_relative_to_parent() {
        let mut vp = Viewport::new(0.5, 0.0, 0.5, 1.0);
        vp.apply(Viewport::new(0.0, 0.5, 0.5, 0.5));
        assert!(approx(vp, Viewport::new(0.5, 0.5, 0.25, 0.5)));
    }

    #[test]
    fn transform_inverts_apply() {
        let parent = Viewport::new(0.25, 0.25, 0.5, 0.5);
        let child = Viewport::new(0.1, 0.2, 0.3, 0.4);
        let mut vp = parent;
        vp.apply(child);
        vp.transform(parent);
        assert!(approx(vp, child));
    }

    #[test]
    fn coverage_of_half_overlap() {
        let view = Viewport::new(0.0, 0.0, 1.0, 1.0);
        let segment = Viewport::new(0.5, 0.0, 1.0, 1.0);
        let c = view.coverage(segment);
        assert!(approx(c, Viewport::new(0.5, 0.0, 0.5, 1.0)));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let mut a = Viewport::new(0.0, 0.0, 0.25, 1.0);
        a.intersect(Viewport::new(0.5, 0.0, 0.5, 1.0));
        assert!(!a.has_area());
        assert!(a.is_valid());
    }

    #[test]
    fn intersect_with_invalid_invalidates() {
        let mut a = Viewport::FULL;
        a.intersect(Viewport::INVALID);
        assert!(!a.is_valid());
    }

    #[test]
    fn pixel_viewport_halves_tile_without_gaps() {
        let base = PixelViewport::new(0, 0, 101, 51);
        let mut left = base;
        left.apply_viewport(Viewport::new(0.0, 0.0, 0.5, 1.0));
        let mut right = base;
        right.apply_viewport(Viewport::new(0.5, 0.0, 0.5, 1.0));
        assert_eq!(left.x_end(), right.x);
        assert_eq!(left.w + right.w, 101);
    }

    #[test]
    fn pixel_decomposition_rounds_up() {
        let mut pvp = PixelViewport::new(0, 0, 100, 100);
        pvp.apply_pixel(Pixel::new(0, 0, 3, 1));
        assert_eq!(pvp.w, 34);
        assert_eq!(pvp.h, 100);
    }

    #[test]
    fn zoom_rounds_to_nearest() {
        let mut pvp = PixelViewport::new(0, 0, 100, 30);
        pvp.apply_zoom(Zoom::new(0.5, 0.5));
        assert_eq!((pvp.w, pvp.h), (50, 15));
        let mut none = pvp;
        none.apply_zoom(Zoom::NONE);
        assert_eq!(none, pvp);
    }

    #[test]
    fn sub_viewport_recovers_applied_fraction() {
        let parent = PixelViewport::new(0, 0, 200, 100);
        let mut child = parent;
        child.apply_viewport(Viewport::new(0.5, 0.0, 0.5, 1.0));
        let sub = child.sub_viewport(parent);
        assert!(approx(sub, Viewport::new(0.5, 0.0, 0.5, 1.0)));
        assert_eq!(parent.sub_viewport(parent), Viewport::FULL);
    }

    #[test]
    fn zoom_to_is_size_ratio() {
        let a = PixelViewport::new(0, 0, 50, 25);
        let b = PixelViewport::new(0, 0, 100, 100);
        let z = a.zoom_to(b);
        assert!((z.x - 0.5).abs() < EPS);
        assert!((z.y - 0.25).abs() < EPS);
        assert_eq!(a.zoom_to(a), Zoom::NONE);
    }

    #[test]
    fn merge_and_intersect() {
        let mut m = PixelViewport::new(0, 0, 10, 10);
        m.merge(PixelViewport::new(5, 5, 10, 10));
        assert_eq!(m, PixelViewport::new(0, 0, 15, 15));

        let mut i = PixelViewport::new(0, 0, 10, 10);
        i.intersect(PixelViewport::new(5, 5, 10, 10));
        assert_eq!(i, PixelViewport::new(5, 5, 5, 5));
    }

    #[test]
    fn offset_moves_origin() {
        let pvp = PixelViewport::new(1, 2, 3, 4) + (10, 20);
        assert_eq!(pvp, PixelViewport::new(11, 22, 3, 4));
    }
}
