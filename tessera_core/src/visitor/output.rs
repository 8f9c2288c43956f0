// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output frames, output tile queues and swap barriers.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::attributes::{Eye, Tasks};
use crate::compound::{CompoundId, CompoundStore, CompoundVisitorMut, VisitorResult};
use crate::config::EngineConfig;
use crate::frame::{Frame, FrameData, FrameKind, FrameRef};
use crate::geometry::{PixelViewport, Viewport, Zoom};
use crate::report::{BarrierCommit, Diagnostic};
use crate::resources::{BarrierId, Resources};
use crate::tile_queue::{Tile, zigzag};

/// Name of the software barrier guarding hardware swap group joins.
pub(crate) const NV_BARRIER_NAME: &str = "__NV_swap_group_protection_barrier__";

/// Prepares the outputs of every active compound.
///
/// Output frames and queues register under their name. Later duplicates are
/// unset and reported; the first one wins.
pub(crate) struct OutputPass<'a> {
    pub(crate) frame_number: u32,
    pub(crate) resources: &'a mut dyn Resources,
    pub(crate) config: &'a EngineConfig,
    pub(crate) frames: BTreeMap<String, FrameRef>,
    pub(crate) queues: BTreeMap<String, (CompoundId, usize)>,
    /// Barrier and number of windows joined, by name.
    pub(crate) barriers: BTreeMap<String, (BarrierId, u32)>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) visited: u32,
}

impl<'a> OutputPass<'a> {
    pub(crate) fn new(
        frame_number: u32,
        resources: &'a mut dyn Resources,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            frame_number,
            resources,
            config,
            frames: BTreeMap::new(),
            queues: BTreeMap::new(),
            barriers: BTreeMap::new(),
            diagnostics: Vec::new(),
            visited: 0,
        }
    }

    /// The barriers joined in this pass.
    pub(crate) fn barrier_commits(&self) -> Vec<BarrierCommit> {
        self.barriers
            .iter()
            .map(|(name, &(barrier, height))| BarrierCommit {
                name: name.clone(),
                barrier,
                height,
            })
            .collect()
    }

    fn update_queues(&mut self, store: &mut CompoundStore, id: CompoundId) {
        let idx = id.idx as usize;
        for i in 0..store.output_queues[idx].len() {
            let name = store.output_queues[idx][i].name.clone();
            if self.queues.contains_key(&name) {
                log::warn!("{id:?} ignoring duplicate output queue {name:?}");
                store.output_queues[idx][i].unset_data();
                self.diagnostics.push(Diagnostic::DuplicateOutputQueue { compound: id, name });
                continue;
            }
            let tiles = self.generate_tiles(store, id, i);
            let queue = &mut store.output_queues[idx][i];
            queue.cycle_data(self.frame_number);
            for (eye, tile) in tiles {
                queue.add_tile(eye, tile);
            }
            log::trace!("{id:?} queue {name:?} with {} tiles", queue.tiles().len());
            self.queues.insert(name, (id, i));
        }
    }

    fn generate_tiles(&self, store: &CompoundStore, id: CompoundId, queue: usize) -> Vec<(Eye, Tile)> {
        let inherit = store.inherit(id);
        let pvp = inherit.pvp;
        if !pvp.has_area() {
            return Vec::new();
        }
        let queue = &store.output_queues[id.idx as usize][queue];
        let (w, h) = (f64::from(pvp.w), f64::from(pvp.h));
        let resources = &*self.resources;

        let mut tiles = Vec::new();
        for position in zigzag(queue.dimensions(pvp)) {
            let tile_pvp = queue.tile_pvp(pvp, position);
            let vp = Viewport::new(
                f64::from(tile_pvp.x) / w,
                f64::from(tile_pvp.y) / h,
                f64::from(tile_pvp.w) / w,
                f64::from(tile_pvp.h) / h,
            );
            for eye in Eye::ALL {
                if !inherit.eyes.has(eye) || !inherit.active[eye.index()] {
                    continue;
                }
                tiles.push((
                    eye,
                    Tile {
                        pvp: tile_pvp,
                        vp,
                        frustum: store.tile_frustum(id, eye, vp, false, resources, self.config),
                        ortho: store.tile_frustum(id, eye, vp, true, resources, self.config),
                    },
                ));
            }
        }
        tiles
    }

    fn update_frames(&mut self, store: &mut CompoundStore, id: CompoundId) {
        let idx = id.idx as usize;
        if store.output_frames[idx].is_empty() {
            store.inherit[idx].tasks.remove(Tasks::READBACK);
        }
        let Some(channel) = store.channel(id) else {
            return;
        };
        if !store.inherit_tasks(id).contains(Tasks::READBACK) {
            return;
        }
        let inherit = *store.inherit(id);
        let resources = &*self.resources;
        let tiled = !store.input_queues[idx].is_empty();
        // Offset of the frame on the window, i.e. the channel origin.
        let window_offset = if inherit.channel == Some(channel) {
            (inherit.pvp.x, inherit.pvp.y)
        } else {
            resources
                .channel(channel)
                .map_or((0, 0), |c| (c.pixel_viewport().x, c.pixel_viewport().y))
        };

        for i in 0..store.output_frames[idx].len() {
            let frame = &store.output_frames[idx][i];
            let name = frame.name.clone();
            if self.frames.contains_key(&name) {
                log::warn!("{id:?} ignoring duplicate output frame {name:?}");
                store.output_frames[idx][i].unset_data();
                self.diagnostics.push(Diagnostic::DuplicateOutputFrame { compound: id, name });
                continue;
            }

            let mut frame_pvp = inherit.pvp;
            frame_pvp.apply_viewport(frame.viewport);
            if !frame_pvp.has_area() {
                log::info!("{id:?} skipping output frame {name:?} without pixels");
                store.output_frames[idx][i].unset_data();
                self.diagnostics.push(Diagnostic::EmptyOutputFrame { compound: id, name });
                continue;
            }

            // Position on the destination, used by the input frames.
            let offset = if tiled {
                (0, 0)
            } else {
                (frame_pvp.x, frame_pvp.y)
            };
            #[expect(
                clippy::cast_possible_truncation,
                reason = "pixel positions are rounded toward zero"
            )]
            let pvp = PixelViewport::new(
                (frame.viewport.x * f64::from(inherit.pvp.w)) as i32,
                (frame.viewport.y * f64::from(inherit.pvp.h)) as i32,
                frame_pvp.w,
                frame_pvp.h,
            );
            let (frame_zoom, data_zoom) = negotiate_zoom(frame, inherit.zoom);
            let data = FrameData {
                frame_number: self.frame_number,
                pvp,
                offset,
                buffers: frame.buffers.unwrap_or(inherit.buffers),
                kind: frame.kind,
                zoom: data_zoom,
                context: store.render_context(id, Eye::Cyclop, resources, self.config),
            };

            let frame = &mut store.output_frames[idx][i];
            frame.cycle_data(data);
            frame.set_offset(window_offset);
            frame.set_zoom(frame_zoom);
            log::trace!(
                "{id:?} output frame {name:?} reads {pvp:?} at zoom {frame_zoom:?}, assembles at {data_zoom:?}"
            );
            self.frames.insert(name, FrameRef { compound: id, index: i });
        }
    }

    fn update_swap_barrier(&mut self, store: &CompoundStore, id: CompoundId) {
        let Some(swap_barrier) = store.swap_barrier(id) else {
            return;
        };
        let Some(window) = store
            .channel(id)
            .and_then(|c| self.resources.channel(c))
            .map(|c| c.window())
        else {
            log::warn!("{id:?} has a swap barrier but no window");
            return;
        };

        if swap_barrier.is_nv_barrier() {
            let joined = self
                .resources
                .window(window)
                .is_some_and(|w| w.has_nv_swap_barrier());
            if joined {
                return;
            }
            let entry = self
                .barriers
                .entry(String::from(NV_BARRIER_NAME))
                .or_insert((BarrierId(0), 0));
            let previous = (entry.1 > 0).then_some(entry.0);
            entry.0 = self
                .resources
                .join_nv_swap_barrier(window, swap_barrier, previous);
            entry.1 += 1;
        } else {
            let entry = self
                .barriers
                .entry(swap_barrier.name.clone())
                .or_insert((BarrierId(0), 0));
            let previous = (entry.1 > 0).then_some(entry.0);
            entry.0 = self.resources.join_swap_barrier(window, previous);
            entry.1 += 1;
        }
    }
}

/// Splits the zoom of an output frame between readback and assembly.
///
/// Returns the readback zoom of the frame and the zoom its data is assembled
/// with. Memory frames scale down during readback and up again during
/// assembly; textures read at full size and are zoomed by the input.
fn negotiate_zoom(frame: &Frame, inherit_zoom: Zoom) -> (Zoom, Zoom) {
    let (mut zoom, inverse) = match frame.native_zoom {
        Some(zoom) if zoom.is_valid() => (zoom, zoom.invert()),
        _ => (inherit_zoom.invert(), inherit_zoom),
    };
    match frame.kind {
        FrameKind::Texture => (Zoom::NONE, inverse),
        FrameKind::Memory => {
            let mut input = Zoom::NONE;
            if zoom.x > 1.0 {
                input.x = inverse.x;
                zoom.x = 1.0;
            }
            if zoom.y > 1.0 {
                input.y = inverse.y;
                zoom.y = 1.0;
            }
            (zoom, input)
        }
    }
}

impl CompoundVisitorMut for OutputPass<'_> {
    fn visit(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        self.visited += 1;
        if !store.is_active(id, &*self.resources) {
            return VisitorResult::Prune;
        }
        self.update_queues(store, id);
        self.update_frames(store, id);
        self.update_swap_barrier(store, id);
        VisitorResult::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn memory_frames_downscale_on_readback() {
        let frame = Frame::new("f");
        let (readback, assemble) = negotiate_zoom(&frame, Zoom::new(0.5, 2.0));
        // Rendered at half width: read everything, stretch on assembly.
        assert!((readback.x - 1.0).abs() < EPS);
        assert!((assemble.x - 0.5).abs() < EPS);
        // Rendered at double height: shrink during readback.
        assert!((readback.y - 0.5).abs() < EPS);
        assert!((assemble.y - 1.0).abs() < EPS);
    }

    #[test]
    fn textures_are_zoomed_by_the_input() {
        let frame = Frame::new("f").with_kind(FrameKind::Texture);
        let (readback, assemble) = negotiate_zoom(&frame, Zoom::new(0.5, 0.5));
        assert_eq!(readback, Zoom::NONE);
        assert!((assemble.x - 0.5).abs() < EPS);
    }

    #[test]
    fn native_zoom_overrides_inherited() {
        let frame = Frame::new("f").with_zoom(Zoom::new(4.0, 4.0));
        let (readback, assemble) = negotiate_zoom(&frame, Zoom::NONE);
        assert_eq!(readback, Zoom::NONE);
        assert!((assemble.x - 0.25).abs() < EPS);
        assert!((assemble.y - 0.25).abs() < EPS);
    }
}
