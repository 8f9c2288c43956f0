// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame update of a compound tree.
//!
//! [`CompoundStore::update`] runs these steps, each a full traversal or a
//! drain of one dirty channel:
//!
//! 1. **TOPOLOGY**: Drain dirty indices of the tree and reset the
//!    equalizers of each affected compound and its ancestors, so their split
//!    trees are rebuilt from the new child lists.
//! 2. **Data pass**: Run the equalizers of every compound, then recompute
//!    its inherited data. Stops at the first configuration error.
//! 3. **FRUSTUM**: Drain dirty destinations, recompute their frusta and
//!    re-inherit their subtrees.
//! 4. **Output pass**: Generate tiles, prepare output frames and join swap
//!    barriers.
//! 5. **Input pass**: Link input frames and queues to the outputs of the
//!    same name.
//!
//! Dirty indices belonging to other trees in the same store are marked
//! again and wait for their own update.

use alloc::vec::Vec;
use core::mem;

use super::id::{CompoundId, INVALID};
use super::store::CompoundStore;
use crate::config::EngineConfig;
use crate::dirty;
use crate::error::InvariantViolation;
use crate::report::UpdateReport;
use crate::resources::Resources;
use crate::trace::{PassBeginEvent, PassEndEvent, PassKind, Tracer};
use crate::visitor::{DataPass, ExitPass, InheritPass, InitPass, InputPass, OutputPass};
use understory_dirty::Channel;

/// Upper bound of frustum refreshes per update. Setting the overdraw of a
/// channel can change its pixel viewport once more.
const MAX_FRUSTUM_ROUNDS: usize = 2;

impl CompoundStore {
    /// Prepares the tree rooted at `root` for updates.
    ///
    /// Assigns task ids in traversal order, names anonymous frames and tile
    /// queues, computes destination frusta and the initial inherited data.
    /// Call it again after the tree was restructured.
    ///
    /// # Errors
    ///
    /// Returns an error if a compound refers to resources `resources` does
    /// not know.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn init(
        &mut self,
        root: CompoundId,
        resources: &mut dyn Resources,
    ) -> Result<(), InvariantViolation> {
        self.validate(root);
        self.reset_restructured_equalizers(root);

        let mut pass = InitPass::new(resources);
        self.accept_mut(root, &mut pass);
        if let Some(err) = pass.error {
            log::error!("init of {root:?} failed: {err}");
            return Err(err);
        }
        log::debug!("initialized {} compounds under {root:?}", pass.visited);
        self.refresh_frusta(root, 0, resources)
    }

    /// Updates the tree rooted at `root` for `frame_number`.
    ///
    /// # Errors
    ///
    /// Returns an error if an equalizer finds a configuration it cannot
    /// balance, or a compound refers to resources `resources` does not know.
    /// Passes after the failing one do not run; the inherited data of
    /// compounds not yet visited stays at the previous frame.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn update(
        &mut self,
        root: CompoundId,
        frame_number: u32,
        resources: &mut dyn Resources,
        config: &EngineConfig,
        tracer: &mut Tracer<'_>,
    ) -> Result<UpdateReport, InvariantViolation> {
        self.validate(root);
        let mut report = UpdateReport::new(frame_number);
        self.reset_restructured_equalizers(root);

        // Equalizers and inheritance.
        begin(tracer, frame_number, PassKind::UpdateData, root);
        let mut data = DataPass::new(frame_number, &*resources, config, tracer);
        self.accept_mut(root, &mut data);
        let DataPass {
            diagnostics,
            last_draw,
            error,
            visited,
            ..
        } = data;
        if let Some(err) = error {
            log::error!("frame {frame_number}: update of {root:?} failed: {err}");
            return Err(err);
        }
        report.diagnostics = diagnostics;
        report.last_draw = last_draw;
        end(tracer, frame_number, PassKind::UpdateData, root, visited);

        self.refresh_frusta(root, frame_number, resources)?;

        // Outputs.
        begin(tracer, frame_number, PassKind::UpdateOutput, root);
        let mut output = OutputPass::new(frame_number, resources, config);
        self.accept_mut(root, &mut output);
        report.swap_barriers = output.barrier_commits();
        let OutputPass {
            frames,
            queues,
            diagnostics,
            visited,
            ..
        } = output;
        report.output_frames = frames.values().copied().collect();
        report.output_queues = queues.values().copied().collect();
        report.diagnostics.extend(diagnostics);
        end(tracer, frame_number, PassKind::UpdateOutput, root, visited);

        // Inputs.
        begin(tracer, frame_number, PassKind::UpdateInput, root);
        let mut input = InputPass::new(frame_number, &*resources, &frames, &queues);
        self.accept_mut(root, &mut input);
        let visited = input.visited;
        report.diagnostics.extend(input.diagnostics);
        end(tracer, frame_number, PassKind::UpdateInput, root, visited);

        for diagnostic in &report.diagnostics {
            tracer.diagnostic(frame_number, diagnostic);
        }
        log::trace!(
            "frame {frame_number}: {} output frames, {} queues, {} barriers, {} diagnostics",
            report.output_frames.len(),
            report.output_queues.len(),
            report.swap_barriers.len(),
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// Releases the per-run state of the tree rooted at `root`: frame data,
    /// task ids and the state of all equalizers, including the tile queues
    /// they created.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn exit(&mut self, root: CompoundId) {
        self.validate(root);
        let mut pass = ExitPass::default();
        self.accept_mut(root, &mut pass);
        log::debug!("released {} compounds under {root:?}", pass.visited);
    }

    fn reset_restructured_equalizers(&mut self, root: CompoundId) {
        for idx in self.drain_in_tree(dirty::TOPOLOGY, root.idx) {
            let mut p = idx;
            while p != INVALID {
                let owner = self.id_at(p);
                let mut balancers = mem::take(&mut self.balancers[p as usize]);
                for balancer in &mut balancers {
                    balancer.restructure(self, owner);
                }
                self.balancers[p as usize] = balancers;
                p = self.parent[p as usize];
            }
        }
    }

    fn refresh_frusta(
        &mut self,
        root: CompoundId,
        frame_number: u32,
        resources: &mut dyn Resources,
    ) -> Result<(), InvariantViolation> {
        for _ in 0..MAX_FRUSTUM_ROUNDS {
            let pending = self.drain_in_tree(dirty::FRUSTUM, root.idx);
            if pending.is_empty() {
                break;
            }
            for idx in pending {
                let id = self.id_at(idx);
                self.update_frustum(id, resources)?;
                let mut pass = InheritPass {
                    frame_number,
                    resources: &*resources,
                    error: None,
                };
                self.accept_mut(id, &mut pass);
                if let Some(err) = pass.error {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Drains `channel` and returns the live indices under `root`. Indices of
    /// other trees stay dirty.
    fn drain_in_tree(&mut self, channel: Channel, root: u32) -> Vec<u32> {
        let drained: Vec<u32> = self
            .dirty
            .drain(channel)
            .affected()
            .deterministic()
            .run()
            .collect();
        let mut ours = Vec::with_capacity(drained.len());
        for idx in drained {
            if self.free_list.contains(&idx) {
                continue;
            }
            if self.root_idx(idx) == root {
                ours.push(idx);
            } else {
                self.dirty.mark(idx, channel);
            }
        }
        ours
    }

    fn root_idx(&self, mut idx: u32) -> u32 {
        while self.parent[idx as usize] != INVALID {
            idx = self.parent[idx as usize];
        }
        idx
    }
}

fn begin(tracer: &mut Tracer<'_>, frame_number: u32, pass: PassKind, root: CompoundId) {
    tracer.pass_begin(&PassBeginEvent {
        frame_number,
        pass,
        root,
    });
}

fn end(tracer: &mut Tracer<'_>, frame_number: u32, pass: PassKind, root: CompoundId, visited: u32) {
    tracer.pass_end(&PassEndEvent {
        frame_number,
        pass,
        root,
        visited,
    });
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::attributes::{Eyes, Tasks};
    use crate::frame::{Frame, FrameRef};
    use crate::geometry::{PixelViewport, Viewport};
    use crate::report::{BarrierCommit, Diagnostic};
    use crate::resources::{
        BarrierId, ChannelId, PipeId, StaticChannel, StaticResources, WindowId,
    };
    use crate::swap_barrier::SwapBarrier;
    use crate::tile_queue::TileQueue;
    use crate::visitor::NV_BARRIER_NAME;

    /// A root on no channel with one destination per window.
    fn two_walls() -> (CompoundStore, CompoundId, [CompoundId; 2], StaticResources) {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("left", PixelViewport::new(0, 0, 640, 480)),
        );
        res.add_channel(
            ChannelId(1),
            StaticChannel::new("right", PixelViewport::new(0, 0, 640, 480))
                .on(WindowId(1), PipeId(1)),
        );
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        let left = store.create_child(root);
        let right = store.create_child(root);
        store.set_channel(left, Some(ChannelId(0)));
        store.set_channel(right, Some(ChannelId(1)));
        (store, root, [left, right], res)
    }

    /// An 800x600 destination assembling the right half rendered elsewhere.
    fn dest_and_source() -> (CompoundStore, CompoundId, CompoundId, StaticResources) {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("dest", PixelViewport::new(0, 0, 800, 600)),
        );
        res.add_channel(
            ChannelId(1),
            StaticChannel::new("source", PixelViewport::new(0, 0, 800, 600))
                .on(WindowId(1), PipeId(1)),
        );
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(0)));
        let source = store.create_child(root);
        store.set_channel(source, Some(ChannelId(1)));
        store.set_viewport(source, Viewport::new(0.5, 0.0, 0.5, 1.0));
        store.add_output_frame(source, Frame::new("right"));
        store.add_input_frame(root, Frame::new("right"));
        (store, root, source, res)
    }

    fn update(
        store: &mut CompoundStore,
        root: CompoundId,
        res: &mut StaticResources,
        frame: u32,
    ) -> UpdateReport {
        store
            .update(root, frame, res, &EngineConfig::DEFAULT, &mut Tracer::none())
            .unwrap()
    }

    #[test]
    fn named_barrier_spans_windows() {
        let (mut store, root, [left, right], mut res) = two_walls();
        store.set_swap_barrier(left, Some(SwapBarrier::named("sync")));
        store.set_swap_barrier(right, Some(SwapBarrier::named("sync")));
        store.init(root, &mut res).unwrap();

        let report = update(&mut store, root, &mut res, 1);
        assert_eq!(
            report.swap_barriers,
            [BarrierCommit {
                name: String::from("sync"),
                barrier: BarrierId(0),
                height: 2,
            }]
        );
        assert_eq!(report.effective_barriers().count(), 1);
        assert_eq!(res.barriers_created, 1);
        let windows: Vec<WindowId> = res.joins.iter().map(|j| j.window).collect();
        assert_eq!(windows, [WindowId(0), WindowId(1)]);
    }

    #[test]
    fn single_window_barrier_is_not_effective() {
        let (mut store, root, [left, _], mut res) = two_walls();
        store.set_swap_barrier(left, Some(SwapBarrier::named("alone")));
        store.init(root, &mut res).unwrap();

        let report = update(&mut store, root, &mut res, 1);
        assert_eq!(report.swap_barriers.len(), 1);
        assert_eq!(report.effective_barriers().count(), 0);
    }

    #[test]
    fn hardware_barrier_is_joined_once_per_window() {
        let (mut store, root, [left, right], mut res) = two_walls();
        store.set_swap_barrier(left, Some(SwapBarrier::nv(1, 1)));
        store.set_swap_barrier(right, Some(SwapBarrier::nv(1, 1)));
        store.init(root, &mut res).unwrap();

        let report = update(&mut store, root, &mut res, 1);
        assert_eq!(report.swap_barriers.len(), 1);
        assert_eq!(report.swap_barriers[0].name, NV_BARRIER_NAME);
        assert_eq!(report.swap_barriers[0].height, 2);
        assert!(res.joins.iter().all(|j| j.nv));

        let report = update(&mut store, root, &mut res, 2);
        assert!(report.swap_barriers.is_empty());
        assert_eq!(res.joins.len(), 2);
    }

    #[test]
    fn input_frames_link_to_outputs() {
        let (mut store, root, source, mut res) = dest_and_source();
        store.init(root, &mut res).unwrap();
        let report = update(&mut store, root, &mut res, 1);

        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        let output = FrameRef {
            compound: source,
            index: 0,
        };
        assert_eq!(report.output_frames, [output]);

        let out = &store.output_frames(source)[0];
        let data = out.data().unwrap();
        assert_eq!(data.frame_number, 1);
        assert_eq!(data.pvp, PixelViewport::new(0, 0, 400, 600));
        assert_eq!(data.offset, (400, 0));
        assert_eq!(
            out.inputs(),
            [FrameRef {
                compound: root,
                index: 0,
            }]
        );

        let input = &store.input_frames(root)[0];
        assert_eq!(input.source(), Some(output));
        assert_eq!(input.offset(), (400, 0));
        assert_eq!(input.data().map(|d| d.frame_number), Some(1));
    }

    #[test]
    fn readback_needs_an_output_frame() {
        let (mut store, root, source, mut res) = dest_and_source();
        store.init(root, &mut res).unwrap();
        update(&mut store, root, &mut res, 1);
        assert!(!store.inherit_tasks(root).contains(Tasks::READBACK));
        assert!(store.inherit_tasks(source).contains(Tasks::READBACK));
    }

    #[test]
    fn missing_output_frame_is_reported() {
        let (mut store, root, _, mut res) = dest_and_source();
        store.add_input_frame(root, Frame::new("nowhere"));
        store.init(root, &mut res).unwrap();
        let report = update(&mut store, root, &mut res, 1);

        assert_eq!(
            report.diagnostics,
            [Diagnostic::MissingOutputFrame {
                compound: root,
                name: String::from("nowhere"),
            }]
        );
        assert!(store.input_frames(root)[1].data().is_none());
        assert!(store.input_frames(root)[0].data().is_some());
    }

    #[test]
    fn duplicate_output_frame_is_ignored() {
        let (mut store, root, source, mut res) = dest_and_source();
        let twin = store.create_child(root);
        store.set_channel(twin, Some(ChannelId(1)));
        store.add_output_frame(twin, Frame::new("right"));
        store.init(root, &mut res).unwrap();
        let report = update(&mut store, root, &mut res, 1);

        assert_eq!(
            report.diagnostics,
            [Diagnostic::DuplicateOutputFrame {
                compound: twin,
                name: String::from("right"),
            }]
        );
        assert!(store.output_frames(twin)[0].data().is_none());
        assert_eq!(
            store.input_frames(root)[0].source().map(|f| f.compound),
            Some(source)
        );
    }

    #[test]
    fn output_queue_is_filled_with_tiles() {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("dest", PixelViewport::new(0, 0, 256, 192)),
        );
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(0)));
        store.set_eyes(root, Some(Eyes::CYCLOP));
        let worker = store.create_child(root);
        store.add_output_queue(root, TileQueue::new("tiles", (64, 64)));
        store.add_input_queue(worker, TileQueue::new("tiles", (64, 64)));
        store.init(root, &mut res).unwrap();

        let report = update(&mut store, root, &mut res, 3);
        assert_eq!(report.output_queues, [(root, 0)]);
        let queue = &store.output_queues(root)[0];
        assert_eq!(queue.tiles().len(), 12);
        assert_eq!(queue.frame_number(), Some(3));
        assert_eq!(store.input_queues(worker)[0].source(), Some((root, 0)));
    }

    #[test]
    fn missing_output_queue_is_reported() {
        let (mut store, root, source, mut res) = dest_and_source();
        store.add_input_queue(source, TileQueue::new("tiles", (64, 64)));
        store.init(root, &mut res).unwrap();
        let report = update(&mut store, root, &mut res, 1);
        assert_eq!(
            report.diagnostics,
            [Diagnostic::MissingOutputQueue {
                compound: source,
                name: String::from("tiles"),
            }]
        );
    }

    #[test]
    fn errors_abort_the_update() {
        let mut res = StaticResources::new();
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(9)));
        let err = store
            .update(root, 1, &mut res, &EngineConfig::DEFAULT, &mut Tracer::none())
            .unwrap_err();
        assert_eq!(err, InvariantViolation::UnknownChannel(ChannelId(9)));
    }

    #[test]
    fn exit_clears_task_ids_and_frames() {
        let (mut store, root, source, mut res) = dest_and_source();
        store.init(root, &mut res).unwrap();
        update(&mut store, root, &mut res, 1);
        assert_eq!(store.task_id(source), 2);

        store.exit(root);
        assert_eq!(store.task_id(root), 0);
        assert_eq!(store.task_id(source), 0);
        assert!(store.output_frames(source)[0].data().is_none());
        assert!(store.input_frames(root)[0].data().is_none());
    }

    #[test]
    fn other_trees_keep_their_dirty_state() {
        let (mut store, root, _, mut res) = dest_and_source();
        let other = store.create_compound();
        store.create_child(other);
        store.init(root, &mut res).unwrap();
        update(&mut store, root, &mut res, 1);

        let pending = store.drain_in_tree(dirty::TOPOLOGY, other.idx);
        assert!(pending.contains(&other.idx));
        assert!(!pending.contains(&root.idx));
    }
}
