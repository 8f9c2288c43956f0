// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render contexts: the per-eye parameters a channel renders a compound with.

use super::id::CompoundId;
use super::store::CompoundStore;
use crate::attributes::Eye;
use crate::config::EngineConfig;
use crate::frustum::{FrustumData, RenderFrustum, WallKind};
use crate::geometry::{Overdraw, Pixel, PixelViewport, Range, SubPixel, Vec3, Viewport, Zoom};
use crate::resources::{Observer, Resources, View};
use crate::transform::Transform3d;

/// Everything a channel needs to render one eye pass of a compound.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderContext {
    /// Pixel viewport, including overdraw.
    pub pvp: PixelViewport,
    /// Overdraw on each side of `pvp`.
    pub overdraw: Overdraw,
    /// Fractional viewport relative to the destination.
    pub vp: Viewport,
    /// Database range.
    pub range: Range,
    /// Pixel decomposition.
    pub pixel: Pixel,
    /// Subpixel decomposition.
    pub sub_pixel: SubPixel,
    /// Zoom relative to the destination.
    pub zoom: Zoom,
    /// Frame period.
    pub period: u32,
    /// Frame phase.
    pub phase: u32,
    /// Position of the rendered pixels on the destination.
    pub offset: (i32, i32),
    /// Eye pass.
    pub eye: Eye,
    /// Task id of the compound, matched against statistics.
    pub task_id: u32,
    /// Perspective frustum.
    pub frustum: RenderFrustum,
    /// Orthographic frustum.
    pub ortho: RenderFrustum,
    /// Head transform for the perspective frustum.
    pub head_transform: Transform3d,
    /// Head transform for the orthographic frustum, with stereo shear.
    pub ortho_transform: Transform3d,
}

impl CompoundStore {
    /// Builds the render context for `eye` from the inherited data.
    ///
    /// The inherited data must be current for the frame.
    #[must_use]
    pub fn render_context(
        &self,
        id: CompoundId,
        eye: Eye,
        resources: &dyn Resources,
        config: &EngineConfig,
    ) -> RenderContext {
        let inherit = self.inherit(id);
        let mut context = RenderContext {
            pvp: inherit.pvp,
            overdraw: inherit.overdraw,
            vp: inherit.viewport,
            range: inherit.range,
            pixel: inherit.pixel,
            sub_pixel: inherit.sub_pixel,
            zoom: inherit.zoom,
            period: inherit.period,
            phase: inherit.phase,
            offset: (inherit.pvp.x, inherit.pvp.y),
            eye,
            task_id: self.task_id(id),
            ..RenderContext::default()
        };

        let camera = Camera::new(self, id, resources, config);
        let data = &inherit.frustum_data;
        let eye_wall = data.transform.transform_point(camera.eye_position(eye));
        log::trace!("{id:?} {eye:?} eye in wall space {eye_wall:?}");

        // Perspective
        context.frustum = camera.corners(eye_wall, false, inherit.viewport);
        context.head_transform = camera.head_transform(eye_wall);

        // Orthographic, from the cyclop eye and sheared for stereo
        let cyclop_wall = data
            .transform
            .transform_point(camera.eye_position(Eye::Cyclop));
        context.ortho = camera.corners(cyclop_wall, true, inherit.viewport);
        let mut ortho = head_transform(&data.transform, eye_wall);
        if eye_wall.z != 0.0 {
            ortho.cols[2][0] += (cyclop_wall.x - eye_wall.x) / eye_wall.z;
            ortho.cols[2][1] += (cyclop_wall.y - eye_wall.y) / eye_wall.z;
        }
        context.ortho_transform = camera.track(ortho);
        context
    }

    /// Computes the frustum of the tile `tile_vp` of a compound.
    ///
    /// `tile_vp` is relative to the compound's pixel viewport.
    #[must_use]
    pub fn tile_frustum(
        &self,
        id: CompoundId,
        eye: Eye,
        tile_vp: Viewport,
        ortho: bool,
        resources: &dyn Resources,
        config: &EngineConfig,
    ) -> RenderFrustum {
        let inherit = self.inherit(id);
        let camera = Camera::new(self, id, resources, config);
        let eye_wall = inherit
            .frustum_data
            .transform
            .transform_point(camera.eye_position(eye));
        let mut vp = inherit.viewport;
        vp.apply(tile_vp);
        camera.corners(eye_wall, ortho, vp)
    }
}

/// Resolved destination state the frustum computations read.
struct Camera<'a> {
    data: FrustumData,
    pixel: Pixel,
    near_far: (f64, f64),
    dest_pvp: PixelViewport,
    view: Option<&'a dyn View>,
    eye_base: f64,
}

impl<'a> Camera<'a> {
    fn new(
        store: &CompoundStore,
        id: CompoundId,
        resources: &'a dyn Resources,
        config: &EngineConfig,
    ) -> Self {
        let inherit = store.inherit(id);
        let destination = inherit.channel.and_then(|c| resources.channel(c));
        let view = destination
            .and_then(|c| c.view())
            .and_then(|v| resources.view(v));
        Self {
            data: inherit.frustum_data,
            pixel: inherit.pixel,
            near_far: destination.map_or((0.1, 100.0), |c| c.near_far()),
            dest_pvp: destination.map_or(PixelViewport::INVALID, |c| c.pixel_viewport()),
            view,
            eye_base: config.eye_base,
        }
    }

    fn observer(&self) -> Option<&'a Observer> {
        self.view.and_then(|v| v.observer())
    }

    fn model_unit(&self) -> f64 {
        self.view.map_or(1.0, |v| v.model_unit())
    }

    /// World-space position of `eye`, in model units.
    fn eye_position(&self, eye: Eye) -> Vec3 {
        let model_unit = self.model_unit();
        if let Some(observer) = self.observer() {
            let position = if self.data.kind == WallKind::Fixed {
                observer.eye_world(eye)
            } else {
                observer.eye_relative(eye)
            };
            return position * model_unit;
        }
        let half = 0.5 * model_unit * self.eye_base;
        match eye {
            Eye::Cyclop => Vec3::ZERO,
            Eye::Left => Vec3::new(-half, 0.0, 0.0),
            Eye::Right => Vec3::new(half, 0.0, 0.0),
        }
    }

    /// Applies the inverse head matrix for head-mounted walls.
    fn track(&self, transform: Transform3d) -> Transform3d {
        if self.data.kind == WallKind::Fixed {
            return transform;
        }
        match self.observer() {
            Some(observer) => transform * observer.inverse_head_matrix,
            None => transform,
        }
    }

    fn head_transform(&self, eye_wall: Vec3) -> Transform3d {
        self.track(head_transform(&self.data.transform, eye_wall))
    }

    fn corners(&self, eye: Vec3, ortho: bool, vp: Viewport) -> RenderFrustum {
        let (near, far) = self.near_far;
        let mut f = RenderFrustum {
            near,
            far,
            ..RenderFrustum::default()
        };

        let ratio = if ortho { 1.0 } else { near / eye.z };
        let w2 = self.data.width * 0.5;
        let h2 = self.data.height * 0.5;
        if eye.z > 0.0 || ortho {
            f.left = (-w2 - eye.x) * ratio;
            f.right = (w2 - eye.x) * ratio;
            f.bottom = (-h2 - eye.y) * ratio;
            f.top = (h2 - eye.y) * ratio;
        } else {
            // Eye behind the wall: mirror.
            f.left = (w2 - eye.x) * ratio;
            f.right = (-w2 - eye.x) * ratio;
            f.bottom = (h2 + eye.y) * ratio;
            f.top = (-h2 + eye.y) * ratio;
        }

        let pixel = self.pixel;
        if pixel != Pixel::ALL && pixel.is_valid() && self.dest_pvp.has_area() {
            if pixel.w > 1 {
                let pixel_w = f.width() / f64::from(self.dest_pvp.w);
                let jitter = pixel_w * f64::from(pixel.x) - pixel_w * 0.5;
                f.left += jitter;
                f.right += jitter;
            }
            if pixel.h > 1 {
                let pixel_h = (f.bottom - f.top) / f64::from(self.dest_pvp.h);
                let jitter = pixel_h * f64::from(pixel.y) + pixel_h * 0.5;
                f.top -= jitter;
                f.bottom -= jitter;
            }
        }

        if vp != Viewport::FULL && vp.is_valid() {
            let fw = f.width();
            f.left += fw * vp.x;
            f.right = f.left + fw * vp.w;
            let fh = f.height();
            f.bottom += fh * vp.y;
            f.top = f.bottom + fh * vp.h;
        }
        f
    }
}

/// Moves the wall transform so `eye` becomes the origin.
fn head_transform(transform: &Transform3d, eye: Vec3) -> Transform3d {
    let mut result = *transform;
    let e = [eye.x, eye.y, eye.z];
    for col in &mut result.cols {
        for (k, ek) in e.iter().enumerate() {
            col[k] -= ek * col[3];
        }
    }
    result
}
