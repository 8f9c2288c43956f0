// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frustum descriptions and the math that converts between them.
//!
//! A frustum is configured either as a [`Wall`] (three corners of the
//! projection surface) or as a [`Projection`] (projector origin, distance,
//! field of view and orientation). [`Frustum`] keeps both forms in sync and
//! caches the derived [`FrustumData`] plane transform used for per-eye
//! frustum evaluation.

mod data;
mod projection;
mod wall;

pub use data::FrustumData;
pub use projection::Projection;
pub use wall::{Wall, WallKind};

/// Which description of a frustum is authoritative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrustumType {
    /// No frustum; inherit it from the view or segment.
    #[default]
    None,
    /// The wall is authoritative.
    Wall,
    /// The projection is authoritative.
    Projection,
}

/// A frustum configured as a wall or a projection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frustum {
    current: FrustumType,
    wall: Wall,
    projection: Projection,
    data: FrustumData,
}

impl Frustum {
    /// Creates a frustum from a wall.
    #[must_use]
    pub fn from_wall(wall: Wall) -> Self {
        let mut frustum = Self::default();
        frustum.set_wall(wall);
        frustum
    }

    /// Creates a frustum from a projection.
    #[must_use]
    pub fn from_projection(projection: Projection) -> Self {
        let mut frustum = Self::default();
        frustum.set_projection(projection);
        frustum
    }

    /// Makes `wall` authoritative and updates the projection to match.
    ///
    /// The projection keeps its current distance.
    pub fn set_wall(&mut self, wall: Wall) {
        self.projection = Projection::from_wall(&wall, self.projection.distance);
        self.wall = wall;
        self.current = FrustumType::Wall;
        self.data.apply_wall(&self.wall);
    }

    /// Makes `projection` authoritative and updates the wall to match.
    pub fn set_projection(&mut self, projection: Projection) {
        self.wall = Wall::from_projection(&projection);
        self.projection = projection;
        self.current = FrustumType::Projection;
        self.data.apply_projection(&self.projection);
    }

    /// Clears the frustum so it is inherited again.
    pub fn unset(&mut self) {
        self.current = FrustumType::None;
        self.data = FrustumData::INVALID;
    }

    /// Returns the authoritative description.
    #[must_use]
    pub fn current_type(&self) -> FrustumType {
        self.current
    }

    /// Returns the wall form.
    #[must_use]
    pub fn wall(&self) -> &Wall {
        &self.wall
    }

    /// Returns the projection form.
    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Returns the derived plane transform.
    #[must_use]
    pub fn data(&self) -> &FrustumData {
        &self.data
    }
}

/// Near-plane extents of a perspective or orthographic frustum.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderFrustum {
    /// Left extent at the near plane.
    pub left: f64,
    /// Right extent at the near plane.
    pub right: f64,
    /// Bottom extent at the near plane.
    pub bottom: f64,
    /// Top extent at the near plane.
    pub top: f64,
    /// Near plane distance.
    pub near: f64,
    /// Far plane distance.
    pub far: f64,
}

impl Default for RenderFrustum {
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            bottom: -1.0,
            top: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl RenderFrustum {
    /// Width at the near plane.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height at the near plane.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    #[test]
    fn set_wall_keeps_projection_in_sync() {
        let mut frustum = Frustum::default();
        assert_eq!(frustum.current_type(), FrustumType::None);
        frustum.set_wall(Wall::default());
        assert_eq!(frustum.current_type(), FrustumType::Wall);
        assert!(frustum.data().is_valid());
        let rebuilt = Wall::from_projection(frustum.projection());
        assert!(rebuilt.approx_eq(frustum.wall()), "{rebuilt:?}");
    }

    #[test]
    fn set_projection_updates_wall() {
        let projection = Projection {
            origin: Vec3::new(0.0, 1.0, 0.0),
            distance: 2.0,
            fov: [90.0, 60.0],
            hpr: [0.0, 0.0, 0.0],
        };
        let frustum = Frustum::from_projection(projection);
        assert_eq!(frustum.current_type(), FrustumType::Projection);
        assert!((frustum.wall().width() - 4.0).abs() < 1e-9);
        assert!((frustum.data().width - 4.0).abs() < 1e-9);
    }

    #[test]
    fn unset_invalidates_data() {
        let mut frustum = Frustum::from_wall(Wall::default());
        frustum.unset();
        assert_eq!(frustum.current_type(), FrustumType::None);
        assert!(!frustum.data().is_valid());
    }
}
