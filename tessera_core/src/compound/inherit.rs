// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame inheritance of compound parameters.
//!
//! [`CompoundStore::update_inherit_data`] derives a compound's
//! [`InheritData`] from its parent's snapshot and its own [`CompoundData`].
//! Parents must be updated before their children; the update passes walk
//! the tree top-down to guarantee this.

use super::data::{CompoundData, InheritData};
use super::id::{CompoundId, INVALID};
use super::store::CompoundStore;
use crate::attributes::{Eyes, StereoMode, Tasks};
use crate::dirty;
use crate::error::InvariantViolation;
use crate::geometry::{PixelViewport, Zoom};
use crate::resources::Resources;

impl CompoundStore {
    /// Recomputes the inherited data of one compound for `frame_number`.
    ///
    /// The parent's inherited data must be current. Calling this twice in the
    /// same frame without configuration changes yields the same snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the compound, its view, segment or window refer to
    /// resources `resources` does not know.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn update_inherit_data(
        &mut self,
        id: CompoundId,
        frame_number: u32,
        resources: &dyn Resources,
    ) -> Result<(), InvariantViolation> {
        self.validate(id);
        let idx = id.idx as usize;
        {
            let data = &mut self.data[idx];
            data.pixel.validate();
            data.sub_pixel.validate();
            data.zoom.validate();
        }
        let data = self.data[idx];

        let mut inherit = if self.parent[idx] == INVALID {
            self.inherit_root(id, &data, resources)?
        } else {
            self.inherit_node(id, &data, resources)?
        };

        if inherit.channel.is_some() {
            self.inherit_stereo(&mut inherit, resources)?;
            self.inherit_active(id, &data, &mut inherit, frame_number, resources)?;
        }

        if inherit.pvp.is_valid() {
            inherit.pvp.apply_pixel(data.pixel);
            let unzoomed = inherit.pvp;
            inherit.pvp.apply_zoom(data.zoom);
            // Keep the zoom pixel-exact with the integer-rounded viewport.
            inherit.zoom *= inherit.pvp.zoom_to(unzoomed);
        }

        inherit.tasks = self.inherit_tasks(id, &data, resources)?;

        if let Some(channel) = self.channel_at(id.idx) {
            let channel = resources
                .channel(channel)
                .ok_or(InvariantViolation::UnknownChannel(channel))?;
            let view = match inherit.channel {
                Some(c) => resources
                    .channel(c)
                    .ok_or(InvariantViolation::UnknownChannel(c))?
                    .view(),
                None => None,
            };
            if !channel.supports_view(view) {
                inherit.tasks = Tasks::empty();
            }
        }

        if !inherit.pvp.has_area() || !inherit.range.has_data() {
            inherit.tasks = Tasks::empty();
        }

        self.inherit[idx] = inherit;
        Ok(())
    }

    fn inherit_root(
        &mut self,
        id: CompoundId,
        data: &CompoundData,
        resources: &dyn Resources,
    ) -> Result<InheritData, InvariantViolation> {
        let old_pvp = self.inherit[id.idx as usize].pvp;
        let mut inherit = InheritData {
            channel: data.channel,
            pvp: old_pvp,
            viewport: data.viewport,
            range: data.range,
            pixel: data.pixel,
            sub_pixel: data.sub_pixel,
            zoom: Zoom::NONE,
            frustum_data: *data.frustum.data(),
            eyes: Eyes::ALL,
            max_fps: data.max_fps,
            active: data.active.map(|count| count > 0),
            ..InheritData::default()
        };
        self.inherit_pvp(id, data, &mut inherit, resources)?;

        if let Some(eyes) = data.eyes {
            inherit.eyes = eyes;
            if self.channel_without_view(&inherit, resources)? {
                inherit.eyes = Eyes::CYCLOP;
            }
        }
        self.inherit_overrides(data, &mut inherit);
        Ok(inherit)
    }

    fn inherit_node(
        &mut self,
        id: CompoundId,
        data: &CompoundData,
        resources: &dyn Resources,
    ) -> Result<InheritData, InvariantViolation> {
        let idx = id.idx as usize;
        let old_pvp = self.inherit[idx].pvp;
        let parent = self.inherit[self.parent[idx] as usize];
        let mut inherit = parent;

        if inherit.channel.is_none() {
            inherit.pvp = old_pvp;
            self.inherit_pvp(id, data, &mut inherit, resources)?;
            inherit.viewport.apply(data.viewport);
        } else if inherit.pvp.is_valid() {
            inherit.pvp.apply_viewport(data.viewport);
            // Derive the viewport from the rounded pixel viewport so the
            // frustum matches the pixels exactly.
            inherit
                .viewport
                .apply(inherit.pvp.sub_viewport(parent.pvp));
            inherit_overdraw(&mut inherit, parent.pvp);
        }

        if data.frustum.data().is_valid() {
            inherit.frustum_data = *data.frustum.data();
        }

        inherit.range.apply(data.range);
        inherit.pixel.apply(data.pixel);
        inherit.sub_pixel.apply(data.sub_pixel);

        if let Some(eyes) = data.eyes {
            inherit.eyes = eyes;
        } else if self.channel_without_view(&inherit, resources)? {
            inherit.eyes = Eyes::CYCLOP;
        }

        inherit.max_fps = data.max_fps;
        self.inherit_overrides(data, &mut inherit);
        Ok(inherit)
    }

    fn inherit_overrides(&self, data: &CompoundData, inherit: &mut InheritData) {
        if let Some(period) = data.period {
            inherit.period = period.max(1);
        }
        if let Some(phase) = data.phase {
            inherit.phase = phase;
        }
        if let Some(buffers) = data.buffers {
            inherit.buffers = buffers;
        }
        if let Some(mode) = data.stereo_mode {
            inherit.stereo_mode = mode;
        }
        if let Some(mask) = data.left_mask {
            inherit.left_mask = mask;
        }
        if let Some(mask) = data.right_mask {
            inherit.right_mask = mask;
        }
    }

    /// Takes the pixel viewport, with overdraw, from the compound's own
    /// channel.
    fn inherit_pvp(
        &mut self,
        id: CompoundId,
        data: &CompoundData,
        inherit: &mut InheritData,
        resources: &dyn Resources,
    ) -> Result<(), InvariantViolation> {
        let Some(channel_id) = data.channel else {
            return Ok(());
        };
        let channel = resources
            .channel(channel_id)
            .ok_or(InvariantViolation::UnknownChannel(channel_id))?;

        let old_pvp = inherit.pvp;
        inherit.channel = Some(channel_id);
        inherit.pvp = channel.pixel_viewport();

        if channel.view().is_none() || !inherit.pvp.is_valid() {
            return Ok(());
        }

        let overdraw = channel.overdraw();
        inherit.pvp.w += overdraw.left + overdraw.right;
        inherit.pvp.h += overdraw.bottom + overdraw.top;

        if old_pvp != inherit.pvp {
            log::debug!("{id:?} pixel viewport changed to {:?}", inherit.pvp);
            self.dirty.mark(id.idx, dirty::FRUSTUM);
        }
        inherit.overdraw = overdraw;
        Ok(())
    }

    fn channel_without_view(
        &self,
        inherit: &InheritData,
        resources: &dyn Resources,
    ) -> Result<bool, InvariantViolation> {
        let Some(channel) = inherit.channel else {
            return Ok(false);
        };
        let channel = resources
            .channel(channel)
            .ok_or(InvariantViolation::UnknownChannel(channel))?;
        Ok(channel.view().is_none())
    }

    fn inherit_tasks(
        &self,
        id: CompoundId,
        data: &CompoundData,
        resources: &dyn Resources,
    ) -> Result<Tasks, InvariantViolation> {
        let idx = id.idx;
        let channel = self.channel_at(idx);
        let mut tasks = match data.tasks {
            Some(tasks) => tasks,
            None if self.first_child[idx as usize] == INVALID => {
                let mut tasks = Tasks::ALL;
                // An ancestor on the same channel already cleared it.
                let mut p = self.parent[idx as usize];
                while p != INVALID {
                    if self.channel_at(p) == channel {
                        tasks.remove(Tasks::CLEAR);
                    }
                    p = self.parent[p as usize];
                }
                tasks
            }
            None => Tasks::CLEAR | Tasks::ASSEMBLE | Tasks::READBACK,
        };

        let has_view = match channel {
            Some(c) if self.is_destination_at(idx) => resources
                .channel(c)
                .ok_or(InvariantViolation::UnknownChannel(c))?
                .view()
                .is_some(),
            _ => false,
        };
        tasks.set(Tasks::VIEW, has_view);
        Ok(tasks)
    }

    fn inherit_stereo(
        &self,
        inherit: &mut InheritData,
        resources: &dyn Resources,
    ) -> Result<(), InvariantViolation> {
        if inherit.stereo_mode != StereoMode::Auto {
            return Ok(());
        }
        let Some(channel_id) = inherit.channel else {
            return Ok(());
        };
        let channel = resources
            .channel(channel_id)
            .ok_or(InvariantViolation::UnknownChannel(channel_id))?;

        let eyes = match channel.segment() {
            Some(segment) => resources
                .segment(segment)
                .ok_or(InvariantViolation::UnknownSegment(segment))?
                .eyes(),
            None => inherit.eyes,
        };
        if !eyes.contains(Eyes::STEREO) {
            inherit.stereo_mode = StereoMode::Passive;
            return Ok(());
        }

        let window_id = channel.window();
        let window = resources
            .window(window_id)
            .ok_or(InvariantViolation::UnknownWindow(window_id))?;
        inherit.stereo_mode = if window.is_stereo() && !window.uses_fbo() {
            StereoMode::Quad
        } else {
            StereoMode::Anaglyph
        };
        Ok(())
    }

    fn inherit_active(
        &self,
        id: CompoundId,
        data: &CompoundData,
        inherit: &mut InheritData,
        frame_number: u32,
        resources: &dyn Resources,
    ) -> Result<(), InvariantViolation> {
        let Some(channel_id) = inherit.channel else {
            return Ok(());
        };
        let channel = resources
            .channel(channel_id)
            .ok_or(InvariantViolation::UnknownChannel(channel_id))?;

        let phase_active = frame_number % inherit.period.max(1) == inherit.phase;
        let channel_active = channel.is_running();
        let destination = self.is_destination_at(id.idx);

        for (i, active) in inherit.active.iter_mut().enumerate() {
            // Destinations count activations, everything else follows its
            // parent.
            let dest_active = if destination {
                data.active[i] > 0
            } else {
                *active
            };
            let eye_active = inherit.eyes.bits() & (1 << i) != 0;
            *active = dest_active && eye_active && phase_active && channel_active;
        }
        Ok(())
    }
}

/// Shrinks the inherited overdraw to the part of `inherit.pvp` that lies on
/// the parent's overdraw margins.
fn inherit_overdraw(inherit: &mut InheritData, parent_pvp: PixelViewport) {
    let pvp = inherit.pvp;
    let od = &mut inherit.overdraw;
    od.left -= pvp.x - parent_pvp.x;
    od.bottom -= pvp.y - parent_pvp.y;
    od.right -= parent_pvp.x_end() - pvp.x_end();
    od.top -= parent_pvp.y_end() - pvp.y_end();

    od.left = od.left.max(0).min(pvp.w);
    od.bottom = od.bottom.max(0).min(pvp.h);
    od.right = od.right.max(0).min(pvp.w);
    od.top = od.top.max(0).min(pvp.h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{Buffers, ColorMask, Eye};
    use crate::frustum::{Frustum, Wall};
    use crate::geometry::{Overdraw, Pixel, Range, Viewport};
    use crate::resources::{
        ChannelId, SegmentId, StaticChannel, StaticResources, StaticSegment, StaticView,
        StaticWindow, ViewId, WindowId,
    };

    const EPS: f64 = 1e-9;

    fn destination(res: &mut StaticResources, with_view: bool) -> ChannelId {
        let mut channel = StaticChannel::new("dest", PixelViewport::new(0, 0, 800, 600));
        if with_view {
            channel = channel.displaying(ViewId(0), SegmentId(0));
            res.add_view(ViewId(0), StaticView::new());
            res.add_segment(
                SegmentId(0),
                StaticSegment::new(Frustum::from_wall(Wall::default()), ChannelId(0)),
            );
        }
        res.add_channel(ChannelId(0), channel);
        ChannelId(0)
    }

    fn update_all(store: &mut CompoundStore, root: CompoundId, frame: u32, res: &StaticResources) {
        let mut order = alloc::vec![root];
        let mut i = 0;
        while i < order.len() {
            order.extend(store.children(order[i]));
            i += 1;
        }
        for id in order {
            store.update_inherit_data(id, frame, res).unwrap();
        }
    }

    #[test]
    fn root_defaults() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        store.update_inherit_data(root, 0, &res).unwrap();

        let inherit = store.inherit(root);
        assert_eq!(inherit.channel, Some(channel));
        assert_eq!(inherit.pvp, PixelViewport::new(0, 0, 800, 600));
        assert_eq!(inherit.eyes, Eyes::ALL);
        assert_eq!(inherit.period, 1);
        assert_eq!(inherit.buffers, Buffers::COLOR);
        assert_eq!(inherit.stereo_mode, StereoMode::Passive);
        assert_eq!(inherit.left_mask, ColorMask::RED);
        assert_eq!(inherit.right_mask, ColorMask::GREEN | ColorMask::BLUE);
        assert_eq!(inherit.tasks, Tasks::ALL | Tasks::VIEW);
        assert_eq!(inherit.active, [true, true, true]);
    }

    #[test]
    fn explicit_eyes_without_view_fall_back_to_cyclop() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, false);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        store.set_eyes(root, Some(Eyes::STEREO));
        store.update_inherit_data(root, 0, &res).unwrap();
        assert_eq!(store.inherit_eyes(root), Eyes::CYCLOP);
        assert!(!store.inherit_tasks(root).contains(Tasks::VIEW));
    }

    #[test]
    fn child_viewport_is_pixel_exact() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let left = store.create_child(root);
        let right = store.create_child(root);
        store.set_viewport(left, Viewport::new(0.0, 0.0, 1.0 / 3.0, 1.0));
        store.set_viewport(right, Viewport::new(1.0 / 3.0, 0.0, 2.0 / 3.0, 1.0));
        update_all(&mut store, root, 0, &res);

        let l = store.inherit(left);
        let r = store.inherit(right);
        assert_eq!(l.pvp.w + r.pvp.w, 800);
        assert_eq!(l.pvp.x_end(), r.pvp.x);
        assert!((l.viewport.w - f64::from(l.pvp.w) / 800.0).abs() < EPS);
        assert!((r.viewport.x - f64::from(r.pvp.x) / 800.0).abs() < EPS);
        // Interior and leaf default tasks; the leaves share the root channel.
        assert_eq!(
            store.inherit_tasks(root),
            Tasks::CLEAR | Tasks::ASSEMBLE | Tasks::READBACK | Tasks::VIEW
        );
        assert!(!l.tasks.contains(Tasks::CLEAR));
        assert!(l.tasks.contains(Tasks::DRAW));
    }

    #[test]
    fn range_composes_inside_parent() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let mid = store.create_child(root);
        store.set_range(mid, Range::new(0.5, 1.0));
        let leaf = store.create_child(mid);
        store.set_range(leaf, Range::new(0.0, 0.5));
        update_all(&mut store, root, 0, &res);

        let range = store.inherit(leaf).range;
        assert!((range.start - 0.5).abs() < EPS);
        assert!((range.end - 0.75).abs() < EPS);
    }

    #[test]
    fn empty_range_disables_tasks() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let leaf = store.create_child(root);
        store.set_range(leaf, Range::NONE);
        update_all(&mut store, root, 0, &res);
        assert_eq!(store.inherit_tasks(leaf), Tasks::empty());
    }

    #[test]
    fn pixel_and_zoom_back_compute_effective_zoom() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let leaf = store.create_child(root);
        store.set_pixel(leaf, Pixel::new(0, 0, 3, 1));
        store.set_zoom(leaf, Zoom::new(0.5, 0.5));
        update_all(&mut store, root, 0, &res);

        let inherit = store.inherit(leaf);
        // 800 / 3 rounds up to 267, then halves to 134.
        assert_eq!(inherit.pvp.w, 134);
        assert_eq!(inherit.pvp.h, 300);
        assert!((inherit.zoom.x - 134.0 / 267.0).abs() < EPS);
        assert!((inherit.zoom.y - 0.5).abs() < EPS);
        assert_eq!(inherit.pixel, Pixel::new(0, 0, 3, 1));
    }

    #[test]
    fn overdraw_enlarges_pvp_and_shrinks_per_child() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        if let Some(c) = res.channel_mut(channel) {
            c.overdraw = Overdraw::new(0, 0, 100, 0);
        }
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let left = store.create_child(root);
        let right = store.create_child(root);
        store.set_viewport(left, Viewport::new(0.0, 0.0, 0.5, 1.0));
        store.set_viewport(right, Viewport::new(0.5, 0.0, 0.5, 1.0));
        update_all(&mut store, root, 0, &res);

        assert_eq!(store.inherit(root).pvp.w, 900);
        assert_eq!(store.inherit(root).overdraw.right, 100);
        assert_eq!(store.inherit(left).overdraw.right, 0);
        assert_eq!(store.inherit(right).overdraw.right, 100);
    }

    #[test]
    fn inheritance_is_idempotent() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let leaf = store.create_child(root);
        store.set_viewport(leaf, Viewport::new(0.25, 0.0, 0.5, 1.0));
        store.set_zoom(leaf, Zoom::new(0.7, 0.7));
        update_all(&mut store, root, 3, &res);
        let first = *store.inherit(leaf);
        update_all(&mut store, root, 3, &res);
        assert_eq!(*store.inherit(leaf), first);
    }

    #[test]
    fn period_and_phase_gate_activity() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let leaf = store.create_child(root);
        store.set_period(leaf, Some(2));
        store.set_phase(leaf, Some(1));

        update_all(&mut store, root, 4, &res);
        assert!(!store.is_inherit_active(leaf, Eye::Cyclop));
        update_all(&mut store, root, 5, &res);
        assert!(store.is_inherit_active(leaf, Eye::Cyclop));
        assert!(store.is_last_inherit_eye(leaf, Eye::Cyclop));
    }

    #[test]
    fn deactivated_destination_is_inactive() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        let leaf = store.create_child(root);
        store.deactivate(root, Eyes::CYCLOP);
        update_all(&mut store, root, 0, &res);
        assert!(!store.is_active(root, &res));
        assert!(!store.is_active(leaf, &res));
    }

    #[test]
    fn stereo_window_resolves_quad() {
        let mut res = StaticResources::new();
        let channel = destination(&mut res, true);
        if let Some(s) = res.segments.get_mut(&SegmentId(0)) {
            s.eyes = Eyes::ALL;
        }
        res.add_window(
            WindowId(0),
            StaticWindow {
                stereo: true,
                ..StaticWindow::default()
            },
        );
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(channel));
        store.update_inherit_data(root, 0, &res).unwrap();
        assert_eq!(store.inherit(root).stereo_mode, StereoMode::Quad);
        assert_eq!(store.inherit(root).active, [true, true, true]);

        res.add_window(
            WindowId(0),
            StaticWindow {
                stereo: true,
                fbo: true,
                ..StaticWindow::default()
            },
        );
        store.update_inherit_data(root, 0, &res).unwrap();
        assert_eq!(store.inherit(root).stereo_mode, StereoMode::Anaglyph);
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let res = StaticResources::new();
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(9)));
        assert_eq!(
            store.update_inherit_data(root, 0, &res),
            Err(InvariantViolation::UnknownChannel(ChannelId(9)))
        );
    }
}
