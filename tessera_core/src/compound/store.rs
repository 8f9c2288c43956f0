// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays compound storage with allocation, topology, and property
//! management.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use hashbrown::HashMap;
use understory_dirty::{CycleHandling, DirtyTracker};

use super::data::{CompoundData, InheritData};
use super::id::{CompoundId, INVALID};
use super::traverse::Children;
use crate::attributes::{Buffers, ColorMask, Eye, Eyes, StereoMode, Tasks};
use crate::config::EngineConfig;
use crate::dirty;
use crate::equalizer::{EqualizerId, LoadBalancer, LoadBalancerMode};
use crate::frame::Frame;
use crate::frustum::{Frustum, Projection, Wall};
use crate::geometry::{Pixel, Range, SubPixel, Viewport, Zoom};
use crate::listener::ListenerRegistry;
use crate::resources::{ChannelId, Resources};
use crate::statistics::Statistic;
use crate::swap_barrier::SwapBarrier;
use crate::tile_queue::TileQueue;

/// Struct-of-arrays storage for all compounds.
///
/// Compounds are addressed by [`CompoundId`] handles. Internally, each
/// compound occupies a slot in parallel arrays. Destroyed compounds are
/// recycled via a free list, and generation counters prevent stale handle
/// access.
#[derive(Debug)]
pub struct CompoundStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Configured properties (set by callers and equalizers) --
    pub(crate) name: Vec<String>,
    pub(crate) data: Vec<CompoundData>,
    pub(crate) usage: Vec<f32>,
    pub(crate) swap_barrier: Vec<Option<SwapBarrier>>,
    pub(crate) input_frames: Vec<Vec<Frame>>,
    pub(crate) output_frames: Vec<Vec<Frame>>,
    pub(crate) input_queues: Vec<Vec<TileQueue>>,
    pub(crate) output_queues: Vec<Vec<TileQueue>>,

    // -- Computed properties (written by the update passes) --
    pub(crate) inherit: Vec<InheritData>,
    pub(crate) task_id: Vec<u32>,

    // -- Equalizers --
    pub(crate) balancers: Vec<Vec<LoadBalancer>>,
    pub(crate) equalizer_owner: HashMap<EqualizerId, u32>,
    pub(crate) next_equalizer: u32,
    pub(crate) listeners: ListenerRegistry,

    // -- Backup --
    pub(crate) backup: Vec<Option<(CompoundData, f32)>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
}

impl Default for CompoundStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CompoundStore {
    /// Creates an empty compound store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            name: Vec::new(),
            data: Vec::new(),
            usage: Vec::new(),
            swap_barrier: Vec::new(),
            input_frames: Vec::new(),
            output_frames: Vec::new(),
            input_queues: Vec::new(),
            output_queues: Vec::new(),
            inherit: Vec::new(),
            task_id: Vec::new(),
            balancers: Vec::new(),
            equalizer_owner: HashMap::new(),
            next_equalizer: 0,
            listeners: ListenerRegistry::new(),
            backup: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    // -- Allocation API --

    /// Creates a new compound and returns its handle.
    ///
    /// The compound starts with default data (every field inherited), a usage
    /// of `1.0`, and no parent.
    pub fn create_compound(&mut self) -> CompoundId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.name[i].clear();
            self.data[i] = CompoundData::default();
            self.usage[i] = 1.0;
            self.swap_barrier[i] = None;
            self.input_frames[i].clear();
            self.output_frames[i].clear();
            self.input_queues[i].clear();
            self.output_queues[i].clear();
            self.inherit[i] = InheritData::default();
            self.task_id[i] = 0;
            self.backup[i] = None;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.name.push(String::new());
            self.data.push(CompoundData::default());
            self.usage.push(1.0);
            self.swap_barrier.push(None);
            self.input_frames.push(Vec::new());
            self.output_frames.push(Vec::new());
            self.input_queues.push(Vec::new());
            self.output_queues.push(Vec::new());
            self.inherit.push(InheritData::default());
            self.task_id.push(0);
            self.balancers.push(Vec::new());
            self.backup.push(None);
            self.generation.push(0);
            idx
        };

        self.dirty.mark(idx, dirty::TOPOLOGY);

        CompoundId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Creates a new compound as the last child of `parent`.
    pub fn create_child(&mut self, parent: CompoundId) -> CompoundId {
        let child = self.create_compound();
        self.add_child(parent, child);
        child
    }

    /// Destroys a compound, freeing its slot for reuse.
    ///
    /// Attached equalizers are dropped, which releases their subscriptions
    /// and tile queues.
    ///
    /// # Panics
    ///
    /// Panics if the compound has children (remove them first) or if the
    /// handle is stale.
    pub fn destroy_compound(&mut self, id: CompoundId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy compound with children"
        );

        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }

        for mut balancer in mem::take(&mut self.balancers[idx as usize]) {
            self.equalizer_owner.remove(&balancer.id());
            balancer.exit(self, id);
        }

        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live compound.
    #[must_use]
    pub fn is_alive(&self, id: CompoundId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// Equalizers attached to `parent` rebuild their split tree on the next
    /// update.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: CompoundId, child: CompoundId) {
        self.validate(parent);
        self.validate(child);
        assert!(
            self.parent[child.idx as usize] == INVALID,
            "child already has a parent"
        );
        self.link_last(parent.idx, child.idx);
        self.dirty.mark(parent.idx, dirty::TOPOLOGY);
    }

    /// Removes `child` from its current parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the compound has no parent.
    pub fn remove_from_parent(&mut self, child: CompoundId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "compound has no parent");

        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Moves `child` to be the last child of `new_parent`.
    ///
    /// If `child` already has a parent, it is removed first.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `new_parent` lies inside the
    /// subtree of `child`.
    #[doc(alias = "adopt")]
    pub fn reparent(&mut self, child: CompoundId, new_parent: CompoundId) {
        self.validate(child);
        self.validate(new_parent);
        let mut p = new_parent.idx;
        while p != INVALID {
            assert!(p != child.idx, "cannot reparent a compound below itself");
            p = self.parent[p as usize];
        }

        if self.parent[child.idx as usize] != INVALID {
            let old_p = self.parent[child.idx as usize];
            self.unlink_from_parent(child.idx);
            self.dirty.mark(old_p, dirty::TOPOLOGY);
        }

        self.link_last(new_parent.idx, child.idx);
        self.dirty.mark(new_parent.idx, dirty::TOPOLOGY);
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// `child` must not already have a parent. `sibling` must have a parent.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or `sibling`
    /// has no parent.
    pub fn insert_before(&mut self, child: CompoundId, sibling: CompoundId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Returns the parent of a compound, if any.
    #[must_use]
    pub fn parent(&self, id: CompoundId) -> Option<CompoundId> {
        self.validate(id);
        self.handle(self.parent[id.idx as usize])
    }

    /// Returns an iterator over the direct children of a compound.
    #[must_use]
    pub fn children(&self, id: CompoundId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the number of direct children.
    #[must_use]
    pub fn child_count(&self, id: CompoundId) -> usize {
        self.children(id).count()
    }

    /// Returns the handles of all root compounds (those with no parent).
    #[must_use]
    pub fn roots(&self) -> Vec<CompoundId> {
        (0..self.len)
            .filter(|&idx| self.parent[idx as usize] == INVALID && !self.free_list.contains(&idx))
            .map(|idx| CompoundId {
                idx,
                generation: self.generation[idx as usize],
            })
            .collect()
    }

    /// Returns the root of the tree containing `id`.
    #[must_use]
    pub fn root(&self, id: CompoundId) -> CompoundId {
        self.validate(id);
        let mut idx = id.idx;
        while self.parent[idx as usize] != INVALID {
            idx = self.parent[idx as usize];
        }
        self.id_at(idx)
    }

    /// Returns `true` if the compound has no children.
    #[must_use]
    pub fn is_leaf(&self, id: CompoundId) -> bool {
        self.validate(id);
        self.first_child[id.idx as usize] == INVALID
    }

    /// Returns `true` if the compound has no parent.
    #[must_use]
    pub fn is_root(&self, id: CompoundId) -> bool {
        self.validate(id);
        self.parent[id.idx as usize] == INVALID
    }

    // -- Property getters --

    /// Returns the name of a compound.
    #[must_use]
    pub fn name(&self, id: CompoundId) -> &str {
        self.validate(id);
        &self.name[id.idx as usize]
    }

    /// Returns the configured data of a compound.
    #[must_use]
    pub fn data(&self, id: CompoundId) -> &CompoundData {
        self.validate(id);
        &self.data[id.idx as usize]
    }

    /// Returns the frustum configured on a compound.
    #[must_use]
    pub fn frustum(&self, id: CompoundId) -> &Frustum {
        &self.data(id).frustum
    }

    /// Returns the relative resource share of a compound.
    #[must_use]
    pub fn usage(&self, id: CompoundId) -> f32 {
        self.validate(id);
        self.usage[id.idx as usize]
    }

    /// Returns the task id assigned by [`init`](Self::init).
    ///
    /// Task ids are unique per tree and `0` before initialization.
    #[must_use]
    pub fn task_id(&self, id: CompoundId) -> u32 {
        self.validate(id);
        self.task_id[id.idx as usize]
    }

    /// Returns the swap barrier of a compound.
    #[must_use]
    pub fn swap_barrier(&self, id: CompoundId) -> Option<&SwapBarrier> {
        self.validate(id);
        self.swap_barrier[id.idx as usize].as_ref()
    }

    /// Returns the channel a compound renders on: its own, or the closest
    /// ancestor's.
    #[must_use]
    pub fn channel(&self, id: CompoundId) -> Option<ChannelId> {
        self.validate(id);
        self.channel_at(id.idx)
    }

    /// Returns the data inherited for the current frame.
    ///
    /// Only valid after [`update_inherit_data`](Self::update_inherit_data) has
    /// run for the compound.
    #[must_use]
    pub fn inherit(&self, id: CompoundId) -> &InheritData {
        self.validate(id);
        &self.inherit[id.idx as usize]
    }

    /// Returns the inherited channel.
    #[must_use]
    pub fn inherit_channel(&self, id: CompoundId) -> Option<ChannelId> {
        self.inherit(id).channel
    }

    /// Returns the inherited tasks.
    #[must_use]
    pub fn inherit_tasks(&self, id: CompoundId) -> Tasks {
        self.inherit(id).tasks
    }

    /// Returns the inherited eye passes.
    #[must_use]
    pub fn inherit_eyes(&self, id: CompoundId) -> Eyes {
        self.inherit(id).eyes
    }

    /// Returns `true` if `eye` is active for the current frame.
    #[must_use]
    pub fn is_inherit_active(&self, id: CompoundId, eye: Eye) -> bool {
        self.inherit(id).active[eye.index()]
    }

    /// Returns `true` if no eye after `eye` is active for the current frame.
    #[must_use]
    pub fn is_last_inherit_eye(&self, id: CompoundId, eye: Eye) -> bool {
        self.inherit(id).active[eye.index() + 1..]
            .iter()
            .all(|a| !*a)
    }

    /// Returns `true` if the compound owns a channel and no ancestor does.
    #[must_use]
    pub fn is_destination(&self, id: CompoundId) -> bool {
        self.validate(id);
        self.is_destination_at(id.idx)
    }

    /// Returns `true` if the compound renders on its inherited destination
    /// channel.
    #[must_use]
    pub fn has_destination_channel(&self, id: CompoundId) -> bool {
        let channel = self.channel(id);
        channel.is_some() && channel == self.inherit(id).channel
    }

    /// Returns `true` if the compound has work this frame.
    ///
    /// At least one eye must be active and, if the compound renders on a
    /// channel, the channel must be running and support the inherited view.
    #[must_use]
    pub fn is_active(&self, id: CompoundId, resources: &dyn Resources) -> bool {
        let inherit = self.inherit(id);
        if !inherit.any_active() {
            return false;
        }
        let Some(channel) = self.channel(id) else {
            return true;
        };
        let Some(channel) = resources.channel(channel) else {
            return false;
        };
        if !channel.is_running() {
            return false;
        }
        let view = inherit
            .channel
            .and_then(|c| resources.channel(c))
            .and_then(|c| c.view());
        channel.supports_view(view)
    }

    // -- Mutation API --

    /// Sets the name of a compound.
    pub fn set_name(&mut self, id: CompoundId, name: impl Into<String>) {
        self.validate(id);
        self.name[id.idx as usize] = name.into();
    }

    /// Sets the channel of a compound.
    ///
    /// Marks the FRUSTUM channel dirty.
    pub fn set_channel(&mut self, id: CompoundId, channel: Option<ChannelId>) {
        self.data_mut(id).channel = channel;
        self.dirty.mark(id.idx, dirty::FRUSTUM);
    }

    /// Sets the 2D restriction relative to the parent.
    pub fn set_viewport(&mut self, id: CompoundId, viewport: Viewport) {
        self.data_mut(id).viewport = viewport;
    }

    /// Sets the data range restriction relative to the parent.
    pub fn set_range(&mut self, id: CompoundId, range: Range) {
        self.data_mut(id).range = range;
    }

    /// Sets the pixel decomposition.
    pub fn set_pixel(&mut self, id: CompoundId, pixel: Pixel) {
        self.data_mut(id).pixel = pixel;
    }

    /// Sets the sub-pixel decomposition.
    pub fn set_sub_pixel(&mut self, id: CompoundId, sub_pixel: SubPixel) {
        self.data_mut(id).sub_pixel = sub_pixel;
    }

    /// Sets the resolution scale.
    pub fn set_zoom(&mut self, id: CompoundId, zoom: Zoom) {
        self.data_mut(id).zoom = zoom;
    }

    /// Sets the eye passes, `None` to inherit.
    pub fn set_eyes(&mut self, id: CompoundId, eyes: Option<Eyes>) {
        self.data_mut(id).eyes = eyes;
    }

    /// Sets the tasks, `None` for the default set.
    pub fn set_tasks(&mut self, id: CompoundId, tasks: Option<Tasks>) {
        self.data_mut(id).tasks = tasks;
    }

    /// Sets the frame buffer attachments, `None` to inherit.
    pub fn set_buffers(&mut self, id: CompoundId, buffers: Option<Buffers>) {
        self.data_mut(id).buffers = buffers;
    }

    /// Sets the time-multiplex period, `None` to inherit.
    pub fn set_period(&mut self, id: CompoundId, period: Option<u32>) {
        self.data_mut(id).period = period;
    }

    /// Sets the time-multiplex phase, `None` to inherit.
    pub fn set_phase(&mut self, id: CompoundId, phase: Option<u32>) {
        self.data_mut(id).phase = phase;
    }

    /// Sets the stereo mode, `None` to inherit.
    pub fn set_stereo_mode(&mut self, id: CompoundId, mode: Option<StereoMode>) {
        self.data_mut(id).stereo_mode = mode;
    }

    /// Sets the anaglyph color masks, `None` to inherit.
    pub fn set_anaglyph_masks(
        &mut self,
        id: CompoundId,
        left: Option<ColorMask>,
        right: Option<ColorMask>,
    ) {
        let data = self.data_mut(id);
        data.left_mask = left;
        data.right_mask = right;
    }

    /// Sets the frame rate cap.
    pub fn set_max_fps(&mut self, id: CompoundId, max_fps: f32) {
        self.data_mut(id).max_fps = max_fps;
    }

    /// Sets the relative resource share. Negative values clamp to zero.
    pub fn set_usage(&mut self, id: CompoundId, usage: f32) {
        self.validate(id);
        self.usage[id.idx as usize] = usage.max(0.0);
    }

    /// Makes `wall` the compound frustum.
    pub fn set_wall(&mut self, id: CompoundId, wall: Wall) {
        self.data_mut(id).frustum.set_wall(wall);
        log::trace!("{id:?} wall: {wall:?}");
    }

    /// Makes `projection` the compound frustum.
    pub fn set_projection(&mut self, id: CompoundId, projection: Projection) {
        self.data_mut(id).frustum.set_projection(projection);
        log::trace!("{id:?} projection: {projection:?}");
    }

    /// Clears the compound frustum so it is inherited again.
    pub fn unset_frustum(&mut self, id: CompoundId) {
        self.data_mut(id).frustum.unset();
    }

    /// Sets the swap barrier.
    ///
    /// An unnamed barrier is named after the root compound.
    pub fn set_swap_barrier(&mut self, id: CompoundId, barrier: Option<SwapBarrier>) {
        self.validate(id);
        let barrier = barrier.map(|mut b| {
            if b.name.is_empty() {
                let root = &self.name[self.root(id).idx as usize];
                b.name = if root.is_empty() {
                    String::from("barrier")
                } else {
                    format!("barrier.{root}")
                };
            }
            b
        });
        self.swap_barrier[id.idx as usize] = barrier;
    }

    /// Requests a frustum recompute for a destination compound on the next
    /// update, after its view or segment changed.
    pub fn invalidate_frustum(&mut self, id: CompoundId) {
        self.validate(id);
        self.dirty.mark(id.idx, dirty::FRUSTUM);
    }

    /// Increments the activation count of each eye in `eyes`.
    pub fn activate(&mut self, id: CompoundId, eyes: Eyes) {
        let data = self.data_mut(id);
        for eye in Eye::ALL {
            if eyes.has(eye) {
                data.active[eye.index()] += 1;
            }
        }
    }

    /// Decrements the activation count of each eye in `eyes`.
    ///
    /// # Panics
    ///
    /// Panics if an eye in `eyes` is not active.
    pub fn deactivate(&mut self, id: CompoundId, eyes: Eyes) {
        let data = self.data_mut(id);
        for eye in Eye::ALL {
            if eyes.has(eye) {
                let count = &mut data.active[eye.index()];
                assert!(*count > 0, "cannot deactivate inactive eye {eye:?}");
                *count -= 1;
            }
        }
    }

    /// Snapshots the configured data, usage, and equalizer state of every
    /// compound.
    pub fn backup(&mut self) {
        for idx in 0..self.len as usize {
            self.backup[idx] = Some((self.data[idx], self.usage[idx]));
            for balancer in &mut self.balancers[idx] {
                balancer.backup();
            }
        }
    }

    /// Restores the last [`backup`](Self::backup).
    ///
    /// Compounds created after the backup keep their current data.
    pub fn restore(&mut self) {
        for slot in 0..self.len {
            let idx = slot as usize;
            if let Some((data, usage)) = self.backup[idx] {
                self.data[idx] = data;
                self.usage[idx] = usage;
            }
            let owner = self.id_at(slot);
            let mut balancers = mem::take(&mut self.balancers[idx]);
            for balancer in &mut balancers {
                balancer.restore();
                balancer.release_retired(self, owner);
            }
            self.balancers[idx] = balancers;
        }
    }

    // -- Frames and tile queues --

    /// Adds an input frame and returns its index.
    pub fn add_input_frame(&mut self, id: CompoundId, frame: Frame) -> usize {
        self.validate(id);
        let frames = &mut self.input_frames[id.idx as usize];
        frames.push(frame);
        frames.len() - 1
    }

    /// Adds an output frame and returns its index.
    pub fn add_output_frame(&mut self, id: CompoundId, frame: Frame) -> usize {
        self.validate(id);
        let frames = &mut self.output_frames[id.idx as usize];
        frames.push(frame);
        frames.len() - 1
    }

    /// Returns the input frames of a compound.
    #[must_use]
    pub fn input_frames(&self, id: CompoundId) -> &[Frame] {
        self.validate(id);
        &self.input_frames[id.idx as usize]
    }

    /// Returns the output frames of a compound.
    #[must_use]
    pub fn output_frames(&self, id: CompoundId) -> &[Frame] {
        self.validate(id);
        &self.output_frames[id.idx as usize]
    }

    /// Adds an input tile queue and returns its index.
    pub fn add_input_queue(&mut self, id: CompoundId, queue: TileQueue) -> usize {
        self.validate(id);
        let queues = &mut self.input_queues[id.idx as usize];
        queues.push(queue);
        queues.len() - 1
    }

    /// Adds an output tile queue and returns its index.
    pub fn add_output_queue(&mut self, id: CompoundId, queue: TileQueue) -> usize {
        self.validate(id);
        let queues = &mut self.output_queues[id.idx as usize];
        queues.push(queue);
        queues.len() - 1
    }

    /// Removes the input tile queue called `name`.
    pub fn remove_input_queue(&mut self, id: CompoundId, name: &str) -> Option<TileQueue> {
        self.validate(id);
        let queues = &mut self.input_queues[id.idx as usize];
        let pos = queues.iter().position(|q| q.name == name)?;
        Some(queues.remove(pos))
    }

    /// Removes the output tile queue called `name`.
    pub fn remove_output_queue(&mut self, id: CompoundId, name: &str) -> Option<TileQueue> {
        self.validate(id);
        let queues = &mut self.output_queues[id.idx as usize];
        let pos = queues.iter().position(|q| q.name == name)?;
        Some(queues.remove(pos))
    }

    /// Returns the input tile queues of a compound.
    #[must_use]
    pub fn input_queues(&self, id: CompoundId) -> &[TileQueue] {
        self.validate(id);
        &self.input_queues[id.idx as usize]
    }

    /// Returns the output tile queues of a compound.
    #[must_use]
    pub fn output_queues(&self, id: CompoundId) -> &[TileQueue] {
        self.validate(id);
        &self.output_queues[id.idx as usize]
    }

    // -- Equalizers --

    /// Attaches an equalizer to a compound and returns its id.
    pub fn add_equalizer(&mut self, id: CompoundId, balancer: impl Into<LoadBalancer>) -> EqualizerId {
        self.validate(id);
        let eq = EqualizerId(self.next_equalizer);
        self.next_equalizer += 1;
        let mut balancer = balancer.into();
        balancer.set_id(eq);
        self.balancers[id.idx as usize].push(balancer);
        self.equalizer_owner.insert(eq, id.idx);
        log::info!("attached {eq:?} to {id:?}");
        eq
    }

    /// Detaches and drops an equalizer, releasing its subscriptions and the
    /// tile queues it created.
    ///
    /// Returns `false` if the equalizer is unknown.
    pub fn remove_equalizer(&mut self, eq: EqualizerId) -> bool {
        let Some(owner) = self.equalizer_owner.remove(&eq) else {
            return false;
        };
        let balancers = &mut self.balancers[owner as usize];
        let Some(pos) = balancers.iter().position(|b| b.id() == eq) else {
            return false;
        };
        let mut balancer = balancers.remove(pos);
        let owner = self.id_at(owner);
        balancer.exit(self, owner);
        log::info!("detached {eq:?}");
        true
    }

    /// Switches the mode of an attached equalizer, removing the tile queues
    /// of a tile equalizer it replaces.
    ///
    /// Returns `false` if the equalizer is unknown.
    pub fn set_equalizer_mode(
        &mut self,
        eq: EqualizerId,
        mode: LoadBalancerMode,
        config: &EngineConfig,
    ) -> bool {
        let Some(&owner) = self.equalizer_owner.get(&eq) else {
            return false;
        };
        let owner_id = self.id_at(owner);
        let mut balancers = mem::take(&mut self.balancers[owner as usize]);
        let found = match balancers.iter_mut().find(|b| b.id() == eq) {
            Some(balancer) => {
                balancer.set_mode(mode, config);
                balancer.release_retired(self, owner_id);
                true
            }
            None => false,
        };
        self.balancers[owner as usize] = balancers;
        found
    }

    /// Returns the equalizers attached to a compound.
    #[must_use]
    pub fn equalizers(&self, id: CompoundId) -> &[LoadBalancer] {
        self.validate(id);
        &self.balancers[id.idx as usize]
    }

    /// Looks up an equalizer by id.
    #[must_use]
    pub fn equalizer(&self, eq: EqualizerId) -> Option<&LoadBalancer> {
        let owner = *self.equalizer_owner.get(&eq)?;
        self.balancers[owner as usize].iter().find(|b| b.id() == eq)
    }

    /// Looks up an equalizer by id for mutation.
    pub fn equalizer_mut(&mut self, eq: EqualizerId) -> Option<&mut LoadBalancer> {
        let owner = *self.equalizer_owner.get(&eq)?;
        self.balancers[owner as usize]
            .iter_mut()
            .find(|b| b.id() == eq)
    }

    /// Returns the registry equalizers subscribe to channel statistics with.
    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Delivers the statistics `channel` measured for `frame_number` to every
    /// equalizer subscribed to it.
    ///
    /// `region` is the part of its assigned viewport the channel actually
    /// rendered, relative to that viewport.
    pub fn notify_load_data(
        &mut self,
        channel: ChannelId,
        frame_number: u32,
        statistics: &[Statistic],
        region: Viewport,
    ) {
        for key in self.listeners.listeners_for(channel) {
            let Some(balancer) = self.equalizer_mut(key.equalizer) else {
                continue;
            };
            balancer.notify_load_data(key.slot, channel, frame_number, statistics, region);
        }
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: CompoundId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale CompoundId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Returns the live handle for slot `idx`.
    pub(crate) fn id_at(&self, idx: u32) -> CompoundId {
        CompoundId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    fn handle(&self, idx: u32) -> Option<CompoundId> {
        (idx != INVALID).then(|| self.id_at(idx))
    }

    pub(crate) fn data_mut(&mut self, id: CompoundId) -> &mut CompoundData {
        self.validate(id);
        &mut self.data[id.idx as usize]
    }

    pub(crate) fn channel_at(&self, mut idx: u32) -> Option<ChannelId> {
        while idx != INVALID {
            if let Some(channel) = self.data[idx as usize].channel {
                return Some(channel);
            }
            idx = self.parent[idx as usize];
        }
        None
    }

    pub(crate) fn is_destination_at(&self, idx: u32) -> bool {
        if self.data[idx as usize].channel.is_none() {
            return false;
        }
        let mut p = self.parent[idx as usize];
        while p != INVALID {
            if self.data[p as usize].channel.is_some() {
                return false;
            }
            p = self.parent[p as usize];
        }
        true
    }

    fn link_last(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equalizer::{LoadBalancerMode, LoadEqualizer};
    use crate::config::EngineConfig;
    use crate::geometry::PixelViewport;
    use crate::resources::{StaticChannel, StaticResources};

    #[test]
    fn create_and_destroy() {
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        assert!(store.is_alive(id));
        store.destroy_compound(id);
        assert!(!store.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = CompoundStore::new();
        let id1 = store.create_compound();
        store.destroy_compound(id1);
        let id2 = store.create_compound();
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn add_child_and_query() {
        let mut store = CompoundStore::new();
        let parent = store.create_compound();
        let child1 = store.create_child(parent);
        let child2 = store.create_child(parent);

        assert_eq!(store.parent(child1), Some(parent));
        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, [child1, child2]);
        assert!(store.is_leaf(child1));
        assert!(!store.is_leaf(parent));
        assert_eq!(store.root(child2), parent);
    }

    #[test]
    fn insert_before_works() {
        let mut store = CompoundStore::new();
        let parent = store.create_compound();
        let a = store.create_child(parent);
        let c = store.create_child(parent);
        let b = store.create_compound();
        store.insert_before(b, c);
        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, [a, b, c]);
        let first = store.create_compound();
        store.insert_before(first, a);
        assert_eq!(store.children(parent).next(), Some(first));
    }

    #[test]
    fn reparent_works() {
        let mut store = CompoundStore::new();
        let p1 = store.create_compound();
        let p2 = store.create_compound();
        let child = store.create_child(p1);
        store.reparent(child, p2);
        assert_eq!(store.parent(child), Some(p2));
        assert_eq!(store.child_count(p1), 0);
        assert_eq!(store.child_count(p2), 1);
    }

    #[test]
    #[should_panic(expected = "cannot reparent a compound below itself")]
    fn reparent_into_own_subtree_panics() {
        let mut store = CompoundStore::new();
        let a = store.create_compound();
        let b = store.create_child(a);
        store.reparent(a, b);
    }

    #[test]
    fn roots_returns_parentless_compounds() {
        let mut store = CompoundStore::new();
        let r1 = store.create_compound();
        let r2 = store.create_compound();
        let _child = store.create_child(r1);
        assert_eq!(store.roots(), [r1, r2]);
    }

    #[test]
    #[should_panic(expected = "cannot destroy compound with children")]
    fn destroy_with_children_panics() {
        let mut store = CompoundStore::new();
        let parent = store.create_compound();
        let _child = store.create_child(parent);
        store.destroy_compound(parent);
    }

    #[test]
    #[should_panic(expected = "stale CompoundId")]
    fn stale_handle_panics() {
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        store.destroy_compound(id);
        let _ = store.name(id);
    }

    #[test]
    fn channel_resolves_through_ancestors() {
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        let mid = store.create_child(root);
        let leaf = store.create_child(mid);
        assert_eq!(store.channel(leaf), None);

        store.set_channel(root, Some(ChannelId(1)));
        assert_eq!(store.channel(leaf), Some(ChannelId(1)));
        assert!(store.is_destination(root));
        assert!(!store.is_destination(leaf));

        store.set_channel(leaf, Some(ChannelId(2)));
        assert_eq!(store.channel(leaf), Some(ChannelId(2)));
        assert!(!store.is_destination(leaf));
    }

    #[test]
    fn unnamed_swap_barrier_takes_root_name() {
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        let leaf = store.create_child(root);
        store.set_swap_barrier(leaf, Some(SwapBarrier::default()));
        assert_eq!(store.swap_barrier(leaf).map(|b| b.name.as_str()), Some("barrier"));

        store.set_name(root, "wall");
        store.set_swap_barrier(leaf, Some(SwapBarrier::named("")));
        assert_eq!(
            store.swap_barrier(leaf).map(|b| b.name.as_str()),
            Some("barrier.wall")
        );
        store.set_swap_barrier(leaf, Some(SwapBarrier::named("sync")));
        assert_eq!(store.swap_barrier(leaf).map(|b| b.name.as_str()), Some("sync"));
    }

    #[test]
    fn activation_counts() {
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        store.activate(id, Eyes::STEREO);
        assert_eq!(store.data(id).active, [1, 2, 2]);
        store.deactivate(id, Eyes::ALL);
        assert_eq!(store.data(id).active, [0, 1, 1]);
    }

    #[test]
    #[should_panic(expected = "cannot deactivate inactive eye")]
    fn deactivating_inactive_eye_panics() {
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        store.deactivate(id, Eyes::CYCLOP);
        store.deactivate(id, Eyes::CYCLOP);
    }

    #[test]
    fn backup_and_restore() {
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        store.set_viewport(id, Viewport::new(0.0, 0.0, 0.5, 1.0));
        store.backup();
        store.set_viewport(id, Viewport::new(0.5, 0.0, 0.5, 1.0));
        store.set_usage(id, 0.0);
        store.restore();
        assert_eq!(store.data(id).viewport, Viewport::new(0.0, 0.0, 0.5, 1.0));
        assert!((store.usage(id) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn destroying_compound_drops_equalizers() {
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        let config = EngineConfig::default();
        let eq = store.add_equalizer(id, LoadBalancer::new(LoadBalancerMode::TwoD, &config));
        assert!(store.equalizer(eq).is_some());
        store.destroy_compound(id);
        assert!(store.equalizer(eq).is_none());
        assert!(!store.remove_equalizer(eq));

        let other = store.create_compound();
        let eq = store.add_equalizer(other, LoadEqualizer::new(LoadBalancerMode::Db));
        assert_eq!(store.equalizers(other).len(), 1);
        assert!(store.remove_equalizer(eq));
        assert!(store.equalizers(other).is_empty());
    }

    #[test]
    fn is_active_requires_running_channel() {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("c", PixelViewport::new(0, 0, 64, 64)),
        );
        let mut store = CompoundStore::new();
        let id = store.create_compound();
        store.set_channel(id, Some(ChannelId(0)));
        store.update_inherit_data(id, 0, &res).unwrap();
        assert!(store.is_active(id, &res));

        if let Some(c) = res.channel_mut(ChannelId(0)) {
            c.running = false;
        }
        assert!(!store.is_active(id, &res));
    }
}
