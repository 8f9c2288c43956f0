// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plane transform derived from a wall or projection.

use crate::geometry::Vec3;
use crate::transform::Transform3d;

use super::{Projection, Wall, WallKind};

/// The derived form of a frustum description.
///
/// `transform` maps world space into wall space: the wall center becomes the
/// origin, the wall edges the X and Y axes, and the wall normal the Z axis.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrustumData {
    /// World to wall transform.
    pub transform: Transform3d,
    /// Wall width.
    pub width: f64,
    /// Wall height.
    pub height: f64,
    /// Tracking behavior.
    pub kind: WallKind,
}

impl Default for FrustumData {
    fn default() -> Self {
        Self::INVALID
    }
}

impl FrustumData {
    /// No frustum.
    pub const INVALID: Self = Self {
        transform: Transform3d::IDENTITY,
        width: 0.0,
        height: 0.0,
        kind: WallKind::Fixed,
    };

    /// Derives the plane transform from a wall.
    #[must_use]
    pub fn from_wall(wall: &Wall) -> Self {
        let mut data = Self::INVALID;
        data.apply_wall(wall);
        data
    }

    /// Recomputes from `wall`.
    pub fn apply_wall(&mut self, wall: &Wall) {
        let u = wall.u();
        let v = wall.v();
        let w = u.cross(v).normalize();
        self.width = u.length();
        self.height = v.length();
        let u = u.normalize();
        let v = v.normalize();
        let c = wall.center();

        self.transform = Transform3d::from_cols(
            [u.x, v.x, w.x, 0.0],
            [u.y, v.y, w.y, 0.0],
            [u.z, v.z, w.z, 0.0],
            [-u.dot(c), -v.dot(c), -w.dot(c), 1.0],
        );
        self.kind = wall.kind;
    }

    /// Recomputes from `projection`.
    pub fn apply_projection(&mut self, projection: &Projection) {
        self.apply_wall(&Wall::from_projection(projection));
        self.kind = WallKind::Fixed;
    }

    /// Returns `true` if the wall has area and the transform is finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.transform.is_finite()
    }

    /// Transforms a world-space point into wall space.
    #[inline]
    #[must_use]
    pub fn to_wall_space(&self, p: Vec3) -> Vec3 {
        self.transform.transform_point(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_wall_centers_origin() {
        let data = FrustumData::from_wall(&Wall::default());
        assert!(data.is_valid());
        assert!((data.width - 1.6).abs() < 1e-9);
        assert!((data.height - 1.0).abs() < 1e-9);
        let center = data.to_wall_space(Vec3::new(0.0, 0.0, -1.0));
        assert!(center.length() < 1e-9);
        // The eye at the origin sits one unit in front of the wall.
        let eye = data.to_wall_space(Vec3::ZERO);
        assert!((eye.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_wall_is_invalid() {
        let p = Vec3::new(1.0, 1.0, 1.0);
        let data = FrustumData::from_wall(&Wall::new(p, p, p));
        assert!(!data.is_valid());
        assert!(!FrustumData::INVALID.is_valid());
    }
}
