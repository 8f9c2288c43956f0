// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Destination frustum computation from views and segments.

use super::id::CompoundId;
use super::store::CompoundStore;
use crate::attributes::Eye;
use crate::error::InvariantViolation;
use crate::frustum::{FrustumType, Projection, Wall};
use crate::geometry::{Overdraw, PixelViewport, Vec3, Viewport};
use crate::resources::{Channel, ChannelId, Resources, View};

impl CompoundStore {
    /// Recomputes the frustum of a destination compound from its channel's
    /// view and segment, and stores the overdraw the channel needs for edge
    /// blending.
    ///
    /// The view frustum wins if the view has one; otherwise the segment
    /// frustum is used. Compounds that are not destinations, or whose channel
    /// has no view or segment, are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel, view or segment is unknown.
    pub fn update_frustum(
        &mut self,
        id: CompoundId,
        resources: &mut dyn Resources,
    ) -> Result<(), InvariantViolation> {
        if !self.is_destination(id) {
            return Ok(());
        }
        let Some(channel_id) = self.channel(id) else {
            return Ok(());
        };
        let channel = resources
            .channel(channel_id)
            .ok_or(InvariantViolation::UnknownChannel(channel_id))?;
        let (Some(segment_id), Some(view_id)) = (channel.segment(), channel.view()) else {
            return Ok(());
        };
        let segment = resources
            .segment(segment_id)
            .ok_or(InvariantViolation::UnknownSegment(segment_id))?;
        let view = resources
            .view(view_id)
            .ok_or(InvariantViolation::UnknownView(view_id))?;

        let eye = view
            .observer()
            .map_or(Vec3::ZERO, |o| o.eye_world(Eye::Cyclop));
        let ratio = view.focus_ratio();
        let segment_vp = segment.viewport();

        let (mut wall, kind, distance) = if view.frustum().current_type() != FrustumType::None {
            let coverage = view.viewport().coverage(segment_vp);
            let mut wall = *view.frustum().wall();
            wall.apply(coverage);
            wall.move_focus(eye, ratio);
            (
                wall,
                view.frustum().current_type(),
                view.frustum().projection().distance,
            )
        } else {
            let output = segment.channel().unwrap_or(channel_id);
            let output_vp = resources
                .channel(output)
                .ok_or(InvariantViolation::UnknownChannel(output))?
                .viewport();
            let coverage = output_vp.coverage(channel.viewport());
            let mut wall = *segment.frustum().wall();
            wall.move_focus(eye, ratio);
            wall.apply(coverage);
            (
                wall,
                segment.frustum().current_type(),
                segment.frustum().projection().distance,
            )
        };

        let overdraw = channel_overdraw(channel, view, segment_vp);
        apply_overdraw(&mut wall, overdraw, channel.pixel_viewport());
        wall.scale(view.model_unit());

        match kind {
            FrustumType::Wall => {
                log::debug!("{id:?} wall for {}: {wall:?}", channel.name());
                self.set_wall(id, wall);
            }
            FrustumType::Projection => {
                let projection = Projection::from_wall(&wall, distance);
                log::debug!("{id:?} projection for {}: {projection:?}", channel.name());
                self.set_projection(id, projection);
            }
            FrustumType::None => {
                log::warn!("{id:?}: segment of {} has no frustum", channel.name());
            }
        }
        resources.set_overdraw(channel_id, overdraw);
        Ok(())
    }
}

/// Overdraw on the sides where the view extends past the segment, scaled
/// down to the channel's maximum size.
fn channel_overdraw(
    channel: &dyn Channel,
    view: &dyn View,
    segment_vp: Viewport,
) -> Overdraw {
    let view_vp = view.viewport();
    let [h, v] = view.overdraw();
    let mut od = Overdraw::ZERO;
    if h != 0 && view_vp.x < segment_vp.x {
        od.left = h;
    }
    if h != 0 && view_vp.x_end() > segment_vp.x_end() {
        od.right = h;
    }
    if v != 0 && view_vp.y < segment_vp.y {
        od.bottom = v;
    }
    if v != 0 && view_vp.y_end() > segment_vp.y_end() {
        od.top = v;
    }

    let max_size = channel.max_size();
    if max_size != (0, 0) {
        let pvp = channel.pixel_viewport();
        (od.left, od.right) = clamp_pair(od.left, od.right, pvp.w, max_size.0);
        (od.bottom, od.top) = clamp_pair(od.bottom, od.top, pvp.h, max_size.1);
    }
    od
}

/// Scales an overdraw pair so that `size` plus overdraw fits into `max`.
fn clamp_pair(first: i32, second: i32, size: i32, max: i32) -> (i32, i32) {
    let total = first + second;
    if total == 0 || total + size <= max {
        return (first, second);
    }
    let max_overdraw = (max - size).max(0);
    let ratio = f64::from(max_overdraw) / f64::from(total);
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the scaled overdraw is at most max_overdraw"
    )]
    let first = (f64::from(first) * ratio + 0.5) as i32;
    (first, max_overdraw - first)
}

/// Grows the wall so the overdraw pixels keep the on-screen pixel size.
fn apply_overdraw(wall: &mut Wall, od: Overdraw, pvp: PixelViewport) {
    let (w, h) = (f64::from(pvp.w), f64::from(pvp.h));
    let (l, r, b, t) = (
        f64::from(od.left),
        f64::from(od.right),
        f64::from(od.bottom),
        f64::from(od.top),
    );
    if od.left > 0 {
        wall.resize_left((w + l) / w);
    }
    if od.right > 0 {
        wall.resize_right((w + l + r) / (w + l));
    }
    if od.bottom > 0 {
        wall.resize_bottom((h + b) / h);
    }
    if od.top > 0 {
        wall.resize_top((h + b + t) / (h + b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frustum::Frustum;
    use crate::resources::{SegmentId, StaticChannel, StaticResources, StaticSegment, StaticView, ViewId};

    const EPS: f64 = 1e-9;

    fn wall() -> Wall {
        Wall::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
        )
    }

    fn setup(view: StaticView, segment_vp: Viewport) -> (CompoundStore, CompoundId, StaticResources) {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("dest", PixelViewport::new(0, 0, 100, 100))
                .displaying(ViewId(0), SegmentId(0)),
        );
        res.add_view(ViewId(0), view);
        let mut segment = StaticSegment::new(Frustum::from_wall(wall()), ChannelId(0));
        segment.viewport = segment_vp;
        res.add_segment(SegmentId(0), segment);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(0)));
        (store, root, res)
    }

    #[test]
    fn segment_wall_becomes_compound_wall() {
        let (mut store, root, mut res) = setup(StaticView::new(), Viewport::FULL);
        store.update_frustum(root, &mut res).unwrap();
        assert_eq!(store.frustum(root).current_type(), FrustumType::Wall);
        assert!(store.frustum(root).wall().approx_eq(&wall()));
    }

    #[test]
    fn view_wall_is_cut_to_segment_coverage() {
        let mut view = StaticView::new();
        view.frustum = Frustum::from_wall(wall());
        // Segment covers the right half of the view.
        let (mut store, root, mut res) = setup(view, Viewport::new(0.5, 0.0, 0.5, 1.0));
        store.update_frustum(root, &mut res).unwrap();
        let result = store.frustum(root).wall();
        assert!((result.bottom_left.x - 0.0).abs() < EPS);
        assert!((result.bottom_right.x - 1.0).abs() < EPS);
    }

    #[test]
    fn view_overdraw_extends_wall_and_channel() {
        let mut view = StaticView::new();
        view.frustum = Frustum::from_wall(wall());
        view.overdraw = [10, 0];
        let (mut store, root, mut res) = setup(view, Viewport::new(0.5, 0.0, 0.5, 1.0));
        store.update_frustum(root, &mut res).unwrap();

        assert_eq!(res.channels[&ChannelId(0)].overdraw, Overdraw::new(10, 0, 0, 0));
        let result = store.frustum(root).wall();
        // 10 extra pixels on a 100 pixel, 1 unit wide wall.
        assert!((result.bottom_left.x + 0.1).abs() < EPS);
        assert!((result.bottom_right.x - 1.0).abs() < EPS);
    }

    #[test]
    fn overdraw_is_clamped_to_max_size() {
        let mut view = StaticView::new();
        view.frustum = Frustum::from_wall(wall());
        view.overdraw = [40, 0];
        let (mut store, root, mut res) = setup(view, Viewport::new(0.25, 0.0, 0.5, 1.0));
        if let Some(c) = res.channel_mut(ChannelId(0)) {
            c.max_size = (150, 0);
        }
        store.update_frustum(root, &mut res).unwrap();
        let od = res.channels[&ChannelId(0)].overdraw;
        assert_eq!(od.left + od.right, 50);
        assert_eq!(od.left, 25);
    }

    #[test]
    fn max_size_below_channel_size_clamps_to_zero() {
        assert_eq!(clamp_pair(10, 10, 100, 80), (0, 0));
        assert_eq!(clamp_pair(10, 10, 100, 0), (0, 0));
        assert_eq!(clamp_pair(10, 10, 100, 200), (10, 10));
    }

    #[test]
    fn projection_view_stays_projection() {
        let mut view = StaticView::new();
        view.frustum = Frustum::from_projection(Projection::from_wall(&wall(), 2.0));
        let (mut store, root, mut res) = setup(view, Viewport::FULL);
        store.update_frustum(root, &mut res).unwrap();
        assert_eq!(store.frustum(root).current_type(), FrustumType::Projection);
        assert!((store.frustum(root).projection().distance - 2.0).abs() < EPS);
    }

    #[test]
    fn non_destination_is_untouched() {
        let (mut store, root, mut res) = setup(StaticView::new(), Viewport::FULL);
        let child = store.create_child(root);
        store.update_frustum(child, &mut res).unwrap();
        assert_eq!(store.frustum(child).current_type(), FrustumType::None);
    }
}
