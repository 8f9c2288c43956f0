// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Projection walls described by three corners.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::geometry::{Vec3, Viewport};

use super::Projection;

/// How the wall moves with the observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WallKind {
    /// The wall is fixed in world space.
    #[default]
    Fixed,
    /// The wall is attached to a head-mounted display.
    Hmd,
}

/// A rectangular projection surface.
///
/// The fourth (top-right) corner is implied: `bottom_right + top_left -
/// bottom_left`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wall {
    /// Bottom-left corner.
    pub bottom_left: Vec3,
    /// Bottom-right corner.
    pub bottom_right: Vec3,
    /// Top-left corner.
    pub top_left: Vec3,
    /// Tracking behavior.
    pub kind: WallKind,
}

impl Default for Wall {
    fn default() -> Self {
        Self::new(
            Vec3::new(-0.8, -0.5, -1.0),
            Vec3::new(0.8, -0.5, -1.0),
            Vec3::new(-0.8, 0.5, -1.0),
        )
    }
}

impl Wall {
    /// Creates a fixed wall from three corners.
    #[must_use]
    pub const fn new(bottom_left: Vec3, bottom_right: Vec3, top_left: Vec3) -> Self {
        Self {
            bottom_left,
            bottom_right,
            top_left,
            kind: WallKind::Fixed,
        }
    }

    /// Horizontal edge vector.
    #[inline]
    #[must_use]
    pub fn u(&self) -> Vec3 {
        self.bottom_right - self.bottom_left
    }

    /// Vertical edge vector.
    #[inline]
    #[must_use]
    pub fn v(&self) -> Vec3 {
        self.top_left - self.bottom_left
    }

    /// Center of the wall.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.bottom_right + self.top_left) * 0.5
    }

    /// Width (length of the horizontal edge).
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.u().length()
    }

    /// Height (length of the vertical edge).
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.v().length()
    }

    /// Builds a wall equivalent to `projection`.
    ///
    /// Heading, pitch and roll are in degrees.
    #[must_use]
    pub fn from_projection(projection: &Projection) -> Self {
        let extent = |fov: f64| {
            let half = (0.5 * fov).to_radians();
            (projection.distance * 2.0 * half.sin() / half.cos()).abs()
        };
        let width = extent(projection.fov[0]);
        let height = extent(projection.fov[1]);

        let [h, p, r] = projection.hpr.map(f64::to_radians);
        let (sin_h, cos_h) = (h.sin(), h.cos());
        let (sin_p, cos_p) = (p.sin(), p.cos());
        let (sin_r, cos_r) = (r.sin(), r.cos());

        // Columns of the rotation.
        let u = Vec3::new(cos_h * cos_r, -cos_h * sin_r, -sin_h);
        let v = Vec3::new(
            -sin_p * sin_h * cos_r + cos_p * sin_r,
            sin_p * sin_h * sin_r + cos_p * cos_r,
            -sin_p * cos_h,
        );
        let w = Vec3::new(
            cos_p * sin_h * cos_r + sin_p * sin_r,
            -cos_p * sin_h * sin_r + sin_p * cos_r,
            cos_p * cos_h,
        );

        let offset = projection.origin + w * projection.distance;
        let corner = |x: f64, y: f64| u * x + v * y + offset;
        Self::new(
            corner(-width * 0.5, -height * 0.5),
            corner(width * 0.5, -height * 0.5),
            corner(-width * 0.5, height * 0.5),
        )
    }

    /// Grows or shrinks symmetrically along the horizontal edge.
    pub fn resize_horizontal(&mut self, ratio: f64) {
        if ratio == 1.0 || ratio < 0.0 {
            return;
        }
        let delta = self.u() * 0.5 * (ratio - 1.0);
        self.bottom_left -= delta;
        self.bottom_right += delta;
        self.top_left -= delta;
    }

    /// Grows or shrinks symmetrically along the vertical edge.
    pub fn resize_vertical(&mut self, ratio: f64) {
        if ratio == 1.0 || ratio < 0.0 {
            return;
        }
        let delta = self.v() * 0.5 * (ratio - 1.0);
        self.bottom_left -= delta;
        self.bottom_right -= delta;
        self.top_left += delta;
    }

    /// Moves the left edge outward by `ratio - 1` of the width.
    pub fn resize_left(&mut self, ratio: f64) {
        if ratio == 1.0 || ratio < 0.0 {
            return;
        }
        let delta = self.u() * (ratio - 1.0);
        self.bottom_left -= delta;
        self.top_left -= delta;
    }

    /// Moves the right edge outward by `ratio - 1` of the width.
    pub fn resize_right(&mut self, ratio: f64) {
        if ratio == 1.0 || ratio < 0.0 {
            return;
        }
        let delta = self.u() * (ratio - 1.0);
        self.bottom_right += delta;
    }

    /// Moves the top edge outward by `ratio - 1` of the height.
    pub fn resize_top(&mut self, ratio: f64) {
        if ratio == 1.0 || ratio < 0.0 {
            return;
        }
        let delta = self.v() * (ratio - 1.0);
        self.top_left += delta;
    }

    /// Moves the bottom edge outward by `ratio - 1` of the height.
    pub fn resize_bottom(&mut self, ratio: f64) {
        if ratio == 1.0 || ratio < 0.0 {
            return;
        }
        let delta = self.v() * (ratio - 1.0);
        self.bottom_left -= delta;
        self.bottom_right -= delta;
    }

    /// Resizes horizontally so that width / height equals `aspect`.
    pub fn resize_horizontal_to_aspect(&mut self, aspect: f64) {
        let height = self.height();
        if height == 0.0 {
            return;
        }
        let current = self.width() / height;
        self.resize_horizontal(aspect / current);
    }

    /// Scales the wall toward (`ratio < 1`) or away from `eye`.
    pub fn move_focus(&mut self, eye: Vec3, ratio: f64) {
        if ratio == 1.0 {
            return;
        }
        self.bottom_left = eye + (self.bottom_left - eye) * ratio;
        self.bottom_right = eye + (self.bottom_right - eye) * ratio;
        self.top_left = eye + (self.top_left - eye) * ratio;
    }

    /// Restricts the wall to the fractional region `vp`.
    pub fn apply(&mut self, vp: Viewport) {
        let u = self.u();
        let v = self.v();
        self.bottom_left = self.bottom_left + u * vp.x + v * vp.y;
        self.bottom_right = self.bottom_left + u * vp.w;
        self.top_left = self.bottom_left + v * vp.h;
    }

    /// Scales every corner about the origin.
    pub fn scale(&mut self, ratio: f64) {
        if ratio == 1.0 {
            return;
        }
        self.bottom_left = self.bottom_left * ratio;
        self.bottom_right = self.bottom_right * ratio;
        self.top_left = self.top_left * ratio;
    }

    /// Compares corners with a tolerance of `1e-4`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-4;
        let close = |a: Vec3, b: Vec3| {
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS && (a.z - b.z).abs() < EPS
        };
        close(self.bottom_left, other.bottom_left)
            && close(self.bottom_right, other.bottom_right)
            && close(self.top_left, other.top_left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_right_half() {
        let mut wall = Wall::default();
        wall.apply(Viewport::new(0.5, 0.0, 0.5, 1.0));
        let expected = Wall::new(
            Vec3::new(0.0, -0.5, -1.0),
            Vec3::new(0.8, -0.5, -1.0),
            Vec3::new(0.0, 0.5, -1.0),
        );
        assert!(wall.approx_eq(&expected), "{wall:?}");
    }

    #[test]
    fn resize_left_then_right_grows_width() {
        let mut wall = Wall::default();
        wall.resize_left(1.25);
        assert!((wall.width() - 2.0).abs() < 1e-9);
        assert!((wall.bottom_left.x + 1.2).abs() < 1e-9);
        wall.resize_right(1.1);
        assert!((wall.width() - 2.2).abs() < 1e-9);
    }

    #[test]
    fn resize_ignores_unit_and_negative_ratio() {
        let mut wall = Wall::default();
        wall.resize_top(1.0);
        wall.resize_bottom(-2.0);
        wall.resize_horizontal(-1.0);
        assert_eq!(wall, Wall::default());
    }

    #[test]
    fn resize_vertical_is_symmetric() {
        let mut wall = Wall::default();
        wall.resize_vertical(2.0);
        assert!((wall.bottom_left.y + 1.0).abs() < 1e-9);
        assert!((wall.top_left.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn move_focus_scales_about_eye() {
        let mut wall = Wall::default();
        wall.move_focus(Vec3::ZERO, 2.0);
        assert!((wall.bottom_left.z + 2.0).abs() < 1e-9);
        assert!((wall.width() - 3.2).abs() < 1e-9);
    }

    #[test]
    fn aspect_resize() {
        let mut wall = Wall::default();
        wall.resize_horizontal_to_aspect(1.0);
        assert!((wall.width() - wall.height()).abs() < 1e-9);
    }

    #[test]
    fn from_projection_without_rotation() {
        let projection = Projection {
            origin: Vec3::ZERO,
            distance: 2.0,
            fov: [90.0, 90.0],
            hpr: [0.0, 0.0, 0.0],
        };
        let wall = Wall::from_projection(&projection);
        assert!((wall.width() - 4.0).abs() < 1e-9);
        assert!((wall.height() - 4.0).abs() < 1e-9);
        assert!((wall.center().z - 2.0).abs() < 1e-9);
    }
}
