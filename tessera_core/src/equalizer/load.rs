// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sort-first and sort-last load balancing along a binary split tree.
//!
//! The children of the balanced compound are arranged as the leaves of a
//! binary tree. Each frame, the youngest frame for which every child has
//! reported its rendering time is used as the cost model: every child gets a
//! target time proportional to its usage, and each interior node places its
//! split where the measured cost to one side equals the target time of its
//! left subtree.

use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;

use super::{Control, EqualizerContext, LoadBalancerMode, task_time};
use crate::compound::{CompoundId, CompoundStore};
use crate::error::InvariantViolation;
use crate::geometry::{Range, Viewport};
use crate::listener::{ListenerKey, Subscription};
use crate::report::Diagnostic;
use crate::statistics::Statistic;
use crate::trace::{SplitAxis, SplitEvent, TargetTimeEvent};

const TIME_EPSILON: f64 = 1e-4;

/// What one child rendered in one frame and how long it took.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Sample {
    task_id: u32,
    vp: Viewport,
    range: Range,
    /// Milliseconds, negative while the report is outstanding.
    time: f64,
}

impl Sample {
    fn is_empty(&self) -> bool {
        !self.vp.has_area() || !self.range.has_data()
    }

    /// Extent along `axis`.
    fn span(&self, axis: SplitAxis) -> (f64, f64) {
        match axis {
            SplitAxis::Vertical => (self.vp.x, self.vp.x_end()),
            SplitAxis::Horizontal => (self.vp.y, self.vp.y_end()),
            SplitAxis::Db => (self.range.start, self.range.end),
        }
    }

    /// Share of the sample that lies inside `vp` across `axis`.
    fn cross_share(&self, axis: SplitAxis, vp: Viewport) -> f64 {
        let (start, end, lo, hi) = match axis {
            SplitAxis::Vertical => (self.vp.y, self.vp.y_end(), vp.y, vp.y_end()),
            SplitAxis::Horizontal => (self.vp.x, self.vp.x_end(), vp.x, vp.x_end()),
            SplitAxis::Db => return 1.0,
        };
        let overlap = end.min(hi) - start.max(lo);
        if overlap <= 0.0 {
            0.0
        } else {
            overlap / (end - start)
        }
    }
}

#[derive(Clone, Debug)]
struct FrameSamples {
    frame: u32,
    samples: Vec<Sample>,
}

impl FrameSamples {
    fn is_complete(&self) -> bool {
        self.samples.iter().all(|s| s.time >= 0.0)
    }
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Leaf(CompoundId),
    Split {
        left: usize,
        right: usize,
        axis: SplitAxis,
    },
}

#[derive(Clone, Copy, Debug)]
struct Node {
    kind: NodeKind,
    /// Summed usage of the active leaves below.
    resources: f64,
    /// Time the subtree should take, in milliseconds.
    target: f64,
    /// Last split position, in the parent's coordinates.
    split: f64,
}

/// Splits the viewport or data range of a compound's children so that all
/// of them finish rendering at the same time.
///
/// Children with zero usage, and inactive children, receive an empty region.
/// The split tree is built lazily on the first update and rebuilt whenever
/// the child list changes.
#[derive(Debug)]
pub struct LoadEqualizer {
    mode: LoadBalancerMode,
    /// Post-order: children precede their parent, the root is last.
    nodes: Vec<Node>,
    slot_tasks: Vec<u32>,
    subscriptions: Vec<Subscription>,
    history: VecDeque<FrameSamples>,
    reassign: bool,
}

impl LoadEqualizer {
    /// Creates a load equalizer for one of the split modes.
    ///
    /// Non-split modes fall back to [`LoadBalancerMode::TwoD`].
    #[must_use]
    pub fn new(mode: LoadBalancerMode) -> Self {
        Self {
            mode: Self::split_mode(mode),
            nodes: Vec::new(),
            slot_tasks: Vec::new(),
            subscriptions: Vec::new(),
            history: VecDeque::new(),
            reassign: false,
        }
    }

    fn split_mode(mode: LoadBalancerMode) -> LoadBalancerMode {
        if mode.is_split() {
            mode
        } else {
            log::warn!("{mode:?} is not a split mode, using 2D");
            LoadBalancerMode::TwoD
        }
    }

    /// The split mode.
    #[must_use]
    pub fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    /// Changes the split mode. The children are reset to the full viewport
    /// and range before the next split.
    pub fn set_mode(&mut self, mode: LoadBalancerMode) {
        self.mode = Self::split_mode(mode);
        self.reset();
        self.reassign = true;
    }

    /// Number of frames kept for statistics.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Split positions of the interior nodes, in post-order.
    #[must_use]
    pub fn splits(&self) -> Vec<(SplitAxis, f64)> {
        self.nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Split { axis, .. } => Some((axis, n.split)),
                NodeKind::Leaf(_) => None,
            })
            .collect()
    }

    pub(crate) fn reset(&mut self) {
        self.nodes.clear();
        self.slot_tasks.clear();
        self.subscriptions.clear();
    }

    pub(crate) fn clear(&mut self) {
        self.reset();
        self.history.clear();
    }

    pub(crate) fn update_pre(
        &mut self,
        store: &mut CompoundStore,
        compound: CompoundId,
        control: Control,
        ctx: &mut EqualizerContext<'_, '_>,
    ) -> Result<(), InvariantViolation> {
        self.check_history(ctx.config.max_history);
        if control.frozen || !store.is_active(compound, ctx.resources) {
            return Ok(());
        }

        let children: Vec<CompoundId> = store.children(compound).collect();
        if self.reassign {
            for &child in &children {
                store.set_viewport(child, Viewport::FULL);
                store.set_range(child, Range::ALL);
            }
            self.reassign = false;
        }
        match children.as_slice() {
            [] => return Ok(()),
            [only] => {
                if self.mode == LoadBalancerMode::Db {
                    store.set_range(*only, Range::ALL);
                } else {
                    store.set_viewport(*only, Viewport::FULL);
                }
                return Ok(());
            }
            _ => {}
        }
        if self.nodes.is_empty() {
            self.build(store, &children, control)?;
        }

        self.update_resources(store, ctx);
        let used: Vec<Sample> = self
            .history
            .front()
            .map(|f| f.samples.clone())
            .unwrap_or_default();
        if !self.compute_targets(store, compound, &used, control.damping, ctx) {
            return Ok(());
        }

        let mut assigned = Vec::with_capacity(children.len());
        let samples: Vec<Sample> = used.into_iter().filter(|s| !s.is_empty()).collect();
        let pvp = store.inherit(compound).pvp;
        let min_pixels = f64::from(ctx.config.min_pixels);
        let epsilon = |axis: SplitAxis| {
            let size = match axis {
                SplitAxis::Vertical => pvp.w,
                SplitAxis::Horizontal => pvp.h,
                SplitAxis::Db => 0,
            };
            if size > 0 {
                min_pixels / f64::from(size)
            } else {
                0.0
            }
        };
        let root = self.nodes.len() - 1;
        let mut work = vec![(root, Viewport::FULL, Range::ALL)];
        while let Some((idx, vp, range)) = work.pop() {
            if !vp.is_valid() || !range.is_valid() {
                return Err(InvariantViolation::MalformedSplit {
                    compound,
                    viewport: vp,
                    range,
                });
            }
            let node = self.nodes[idx];
            let (left, right, axis) = match node.kind {
                NodeKind::Leaf(child) => {
                    assigned.push(assign(store, child, vp, range, node.resources)?);
                    continue;
                }
                NodeKind::Split { left, right, axis } => (left, right, axis),
            };

            let (start, end) = match axis {
                SplitAxis::Vertical => (vp.x, vp.x_end()),
                SplitAxis::Horizontal => (vp.y, vp.y_end()),
                SplitAxis::Db => (range.start, range.end),
            };
            let left_time = self.nodes[left].target;
            let position = if node.resources <= 0.0 || self.nodes[left].resources <= 0.0 {
                start
            } else if self.nodes[right].resources <= 0.0 {
                end
            } else {
                let raw = sweep(&samples, axis, vp, range, left_time);
                clamp_split(raw, start, end, epsilon(axis))
            };
            self.nodes[idx].split = position;
            log::debug!(
                "{compound:?} frame {} split {axis:?} at {position:.4} for {left_time:.2}ms",
                ctx.frame_number
            );
            ctx.tracer.split(&SplitEvent {
                frame_number: ctx.frame_number,
                compound,
                axis,
                position,
                left_time,
            });

            let (mut left_vp, mut right_vp) = (vp, vp);
            let (mut left_range, mut right_range) = (range, range);
            let right_end = if node.resources <= 0.0 { start } else { end };
            match axis {
                SplitAxis::Vertical => {
                    left_vp.w = position - vp.x;
                    right_vp.x = position;
                    right_vp.w = right_end - position;
                }
                SplitAxis::Horizontal => {
                    left_vp.h = position - vp.y;
                    right_vp.y = position;
                    right_vp.h = right_end - position;
                }
                SplitAxis::Db => {
                    left_range.end = position;
                    right_range.start = position;
                    right_range.end = right_end;
                }
            }
            // Right first so the left subtree is assigned first.
            work.push((right, right_vp, right_range));
            work.push((left, left_vp, left_range));
        }

        self.history.push_back(FrameSamples {
            frame: ctx.frame_number,
            samples: assigned,
        });
        Ok(())
    }

    /// Records the time the child in `slot` took for `frame_number`.
    pub(crate) fn notify_load_data(
        &mut self,
        slot: u32,
        frame_number: u32,
        statistics: &[Statistic],
        region: Viewport,
    ) {
        let Some(&task_id) = self.slot_tasks.get(slot as usize) else {
            return;
        };
        let Some(frame) = self.history.iter_mut().find(|f| f.frame == frame_number) else {
            return;
        };
        let Some(sample) = frame
            .samples
            .iter_mut()
            .find(|s| s.task_id == task_id && s.time < 0.0)
        else {
            return;
        };
        let Some(time) = task_time(statistics, task_id) else {
            return;
        };
        sample.vp.apply(region);
        let time = time as f64;
        sample.time = time;
        log::trace!("task {task_id} frame {frame_number}: {time}ms");
    }

    /// Keeps the youngest complete frame at the front, dropping everything
    /// older, and bounds the number of outstanding frames.
    fn check_history(&mut self, max_history: usize) {
        if let Some(youngest) = self.history.iter().rposition(FrameSamples::is_complete) {
            self.history.drain(..youngest);
        }
        // Leave room for the frame about to be recorded.
        while self.history.len() >= max_history.max(2) {
            self.history.remove(1);
        }
        if self.history.is_empty() {
            // Nothing measured yet: assume a uniform cost.
            self.history.push_back(FrameSamples {
                frame: 0,
                samples: vec![Sample {
                    task_id: 0,
                    vp: Viewport::FULL,
                    range: Range::ALL,
                    time: 1.0,
                }],
            });
        }
    }

    fn build(
        &mut self,
        store: &CompoundStore,
        children: &[CompoundId],
        control: Control,
    ) -> Result<(), InvariantViolation> {
        for (slot, &child) in children.iter().enumerate() {
            let channel = store
                .channel(child)
                .ok_or(InvariantViolation::MissingChannel { compound: child })?;
            #[expect(
                clippy::cast_possible_truncation,
                reason = "child counts fit in u32"
            )]
            let key = ListenerKey {
                equalizer: control.id,
                slot: slot as u32,
            };
            self.subscriptions
                .push(store.listeners().subscribe(channel, key));
            self.slot_tasks.push(store.task_id(child));
        }
        self.build_node(children, 0);
        log::info!(
            "{:?} built {:?} split tree over {} children",
            control.id,
            self.mode,
            children.len()
        );
        Ok(())
    }

    fn build_node(&mut self, children: &[CompoundId], level: u32) -> usize {
        let kind = if let [child] = children {
            NodeKind::Leaf(*child)
        } else {
            let (l, r) = children.split_at(children.len() / 2);
            let left = self.build_node(l, level + 1);
            let right = self.build_node(r, level + 1);
            let axis = match self.mode {
                LoadBalancerMode::Vertical => SplitAxis::Vertical,
                LoadBalancerMode::Horizontal => SplitAxis::Horizontal,
                LoadBalancerMode::Db => SplitAxis::Db,
                _ if level % 2 == 0 => SplitAxis::Vertical,
                _ => SplitAxis::Horizontal,
            };
            NodeKind::Split { left, right, axis }
        };
        self.nodes.push(Node {
            kind,
            resources: 0.0,
            target: 0.0,
            split: 0.0,
        });
        self.nodes.len() - 1
    }

    fn update_resources(&mut self, store: &CompoundStore, ctx: &EqualizerContext<'_, '_>) {
        for idx in 0..self.nodes.len() {
            self.nodes[idx].resources = match self.nodes[idx].kind {
                NodeKind::Leaf(child) if store.is_active(child, ctx.resources) => {
                    f64::from(store.usage(child))
                }
                NodeKind::Leaf(_) => 0.0,
                NodeKind::Split { left, right, .. } => {
                    self.nodes[left].resources + self.nodes[right].resources
                }
            };
        }
    }

    /// Hands the measured time of `samples` out as per-node target times.
    ///
    /// Returns `false` if there is nobody to hand it to.
    fn compute_targets(
        &mut self,
        store: &CompoundStore,
        compound: CompoundId,
        samples: &[Sample],
        damping: f64,
        ctx: &mut EqualizerContext<'_, '_>,
    ) -> bool {
        let total: f64 = samples
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.time.max(0.0))
            .sum();
        let resources = self.nodes.last().map_or(0.0, |n| n.resources);
        if resources <= 0.0 {
            if total > 0.0 {
                log::warn!("{compound:?}: {total}ms of load but no active child with usage");
                ctx.diagnostics.push(Diagnostic::UnassignedLoad {
                    compound,
                    leftover: total,
                });
            }
            return false;
        }

        let per_unit = total / resources;
        let mut remaining = total;
        for node in &mut self.nodes {
            let NodeKind::Leaf(child) = node.kind else {
                continue;
            };
            let mut target = node.resources * per_unit;
            if node.resources > 0.0 {
                let task_id = store.task_id(child);
                if let Some(last) = samples.iter().find(|s| s.task_id == task_id) {
                    target = (1.0 - damping) * target + damping * last.time.max(0.0);
                }
            }
            node.target = target.clamp(0.0, remaining);
            remaining -= node.target;
        }
        if remaining > TIME_EPSILON {
            for node in &mut self.nodes {
                if matches!(node.kind, NodeKind::Leaf(_)) {
                    node.target += remaining * node.resources / resources;
                }
            }
        }

        for idx in 0..self.nodes.len() {
            let node = self.nodes[idx];
            match node.kind {
                NodeKind::Leaf(child) => {
                    ctx.tracer.target_time(&TargetTimeEvent {
                        frame_number: ctx.frame_number,
                        compound: child,
                        usage: node.resources,
                        time: node.target,
                    });
                }
                NodeKind::Split { left, right, .. } => {
                    self.nodes[idx].target = self.nodes[left].target + self.nodes[right].target;
                }
            }
        }
        true
    }
}

/// Gives `child` its region and returns the sample awaiting its report.
fn assign(
    store: &mut CompoundStore,
    child: CompoundId,
    vp: Viewport,
    range: Range,
    resources: f64,
) -> Result<Sample, InvariantViolation> {
    let data = store.data(child);
    let split_vp = vp != Viewport::FULL;
    let split_range = range != Range::ALL;
    if (split_vp && data.range != Range::ALL) || (split_range && data.viewport != Viewport::FULL)
    {
        return Err(InvariantViolation::MixedSplitModes { compound: child });
    }
    let empty = !vp.has_area() || !range.has_data();
    if resources <= 0.0 && !empty {
        return Err(InvariantViolation::ZeroUsageAssignment { compound: child });
    }

    if split_range {
        store.set_range(child, range);
    } else {
        store.set_viewport(child, vp);
        store.set_range(child, range);
    }
    log::trace!("{child:?} assigned {vp:?} {range:?}");
    Ok(Sample {
        task_id: store.task_id(child),
        vp,
        range,
        time: if empty { 0.0 } else { -1.0 },
    })
}

/// Walks along `axis` through `[start, end)` of the region, accumulating the
/// measured cost of the samples, and returns the position at which
/// `time_left` is used up.
fn sweep(samples: &[Sample], axis: SplitAxis, vp: Viewport, range: Range, time_left: f64) -> f64 {
    let (start, end) = match axis {
        SplitAxis::Vertical => (vp.x, vp.x_end()),
        SplitAxis::Horizontal => (vp.y, vp.y_end()),
        SplitAxis::Db => (range.start, range.end),
    };
    let mut spans: Vec<(f64, f64, f64)> = samples
        .iter()
        .filter_map(|s| {
            let (lo, hi) = s.span(axis);
            let cost = s.time * s.cross_share(axis, vp);
            (hi > lo && cost > 0.0).then_some((lo, hi, cost))
        })
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut time_left = time_left;
    let mut position = start;
    while time_left > TIME_EPSILON && position < end {
        spans.retain(|&(_, hi, _)| hi > position);
        if spans.is_empty() {
            break;
        }
        // Next discontinuity of the cost function.
        let next = spans.iter().fold(f64::INFINITY, |next, &(lo, hi, _)| {
            let next = next.min(hi);
            if lo > position { next.min(lo) } else { next }
        });
        let width = next - position;
        let cost: f64 = spans
            .iter()
            .filter(|&&(lo, _, _)| lo < next)
            .map(|&(lo, hi, cost)| cost * width / (hi - lo))
            .sum();
        if cost >= time_left {
            position += width * time_left / cost;
            time_left = 0.0;
        } else {
            time_left -= cost;
            position = next;
        }
    }
    position
}

/// Keeps a split at least `epsilon` away from both ends.
fn clamp_split(position: f64, start: f64, end: f64, epsilon: f64) -> f64 {
    if end - start <= 2.0 * epsilon {
        (start + end) * 0.5
    } else {
        position.clamp(start + epsilon, end - epsilon)
    }
}
