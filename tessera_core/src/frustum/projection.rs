// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Projector-style frustum description.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::geometry::Vec3;

use super::Wall;

/// A frustum described by a projector position, orientation and field of
/// view.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Projection {
    /// Projector position.
    pub origin: Vec3,
    /// Distance from the origin to the projection plane.
    pub distance: f64,
    /// Horizontal and vertical field of view, in degrees.
    pub fov: [f64; 2],
    /// Heading, pitch and roll, in degrees.
    pub hpr: [f64; 3],
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            distance: 1.0,
            fov: [50.0, 50.0],
            hpr: [0.0, 0.0, 0.0],
        }
    }
}

impl Projection {
    /// Derives the projection that produces `wall`, placing the projector
    /// `distance` units in front of the wall center.
    #[must_use]
    pub fn from_wall(wall: &Wall, distance: f64) -> Self {
        let u = wall.u();
        let v = wall.v();
        let width = u.length();
        let height = v.length();
        let w = u.cross(v).normalize();
        let origin = wall.center() - w * distance;

        let fov = |extent: f64| 2.0 * (extent * 0.5).atan2(distance).to_degrees();

        let u = u.normalize();
        let v = v.normalize();
        let heading = (-u.z).atan2((1.0 - u.z * u.z).max(0.0).sqrt());
        let roll = (-u.y).atan2(u.x);
        let pitch = (-v.z).atan2(w.z);

        Self {
            origin,
            distance,
            fov: [fov(width), fov(height)],
            hpr: [heading.to_degrees(), pitch.to_degrees(), roll.to_degrees()],
        }
    }

    /// Compares with a tolerance of `1e-4`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-4;
        let o = self.origin - other.origin;
        o.length() < EPS
            && (self.distance - other.distance).abs() < EPS
            && self
                .fov
                .iter()
                .zip(other.fov)
                .all(|(a, b)| (a - b).abs() < EPS)
            && self
                .hpr
                .iter()
                .zip(other.hpr)
                .all(|(a, b)| (a - b).abs() < EPS)
    }
}
