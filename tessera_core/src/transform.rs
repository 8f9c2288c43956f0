// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 transform.
//!
//! This covers what the frustum math needs (identity, translation, multiply,
//! point transformation, column access and mutation) without pulling in a
//! full linear-algebra crate.

use core::ops::Mul;

use crate::geometry::Vec3;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by OpenGL-style projection and model-view matrices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(v: Vec3) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [v.x, v.y, v.z, 1.0],
            ],
        }
    }

    /// Returns the translation part (column 3).
    #[inline]
    #[must_use]
    pub const fn translation(&self) -> Vec3 {
        Vec3::new(self.cols[3][0], self.cols[3][1], self.cols[3][2])
    }

    /// Transforms a point, including translation and perspective divide.
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let c = &self.cols;
        let x = c[0][0] * p.x + c[1][0] * p.y + c[2][0] * p.z + c[3][0];
        let y = c[0][1] * p.x + c[1][1] * p.y + c[2][1] * p.z + c[3][1];
        let z = c[0][2] * p.x + c[1][2] * p.y + c[2][2] * p.z + c[3][2];
        let w = c[0][3] * p.x + c[1][3] * p.y + c[2][3] * p.z + c[3][3];
        if w == 1.0 || w == 0.0 {
            Vec3::new(x, y, z)
        } else {
            Vec3::new(x / w, y / w, z / w)
        }
    }

    /// Transforms a direction (ignores translation).
    #[must_use]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let c = &self.cols;
        Vec3::new(
            c[0][0] * v.x + c[1][0] * v.y + c[2][0] * v.z,
            c[0][1] * v.x + c[1][1] * v.y + c[2][1] * v.z,
            c[0][2] * v.x + c[1][2] * v.y + c[2][2] * v.z,
        )
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        for (j, col) in out.iter_mut().enumerate() {
            for (i, v) in col.iter_mut().enumerate() {
                *v = a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
            }
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform3d::default(), Transform3d::IDENTITY);
    }

    #[test]
    fn translation_composition() {
        let a = Transform3d::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let b = Transform3d::from_translation(Vec3::new(0.0, 2.0, 0.0));
        assert_eq!((a * b).translation(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn transform_point_applies_translation() {
        let t = Transform3d::from_translation(Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(t.transform_point(Vec3::new(1.0, 1.0, 1.0)), Vec3::new(1.0, 1.0, -4.0));
        assert_eq!(t.transform_vector(Vec3::new(1.0, 1.0, 1.0)), Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn multiply_applies_right_then_left() {
        let mut swap = Transform3d::IDENTITY;
        // Maps x to y and y to -x.
        swap.cols[0] = [0.0, 1.0, 0.0, 0.0];
        swap.cols[1] = [-1.0, 0.0, 0.0, 0.0];
        let t = Transform3d::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let p = (swap * t).transform_point(Vec3::ZERO);
        assert_eq!(p, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn nan_detected() {
        let mut t = Transform3d::IDENTITY;
        assert!(t.is_finite());
        t.cols[2][1] = f64::NAN;
        assert!(!t.is_finite());
    }
}
