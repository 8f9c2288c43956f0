// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource sharing between views.
//!
//! Every child of the balanced compound renders one view, using some or all
//! of a shared set of pipes. The time each view took in the youngest frame
//! all views reported determines how many pipes it deserves. Usage is then
//! handed out in three steps: first a view uses its own pipe, then the
//! pipes it used last frame, and finally whatever pipe still has capacity.
//! Each step assigns whole pipes where possible and splits a pipe between at
//! most two views.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::vec::Vec;

use super::{Control, EqualizerContext, task_time};
use crate::compound::{CompoundId, CompoundStore, CompoundVisitor, CompoundVisitorMut, VisitorResult};
use crate::error::InvariantViolation;
use crate::listener::{ListenerKey, Subscription};
use crate::resources::{ChannelId, PipeId, Resources};
use crate::statistics::Statistic;
use crate::trace::UsageEvent;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Load {
    frame: u32,
    missing: u32,
    n_resources: u32,
    /// Milliseconds, normalized once complete.
    time: f64,
}

impl Load {
    const NONE: Self = Self {
        frame: 0,
        missing: 0,
        n_resources: 0,
        time: 1.0,
    };

    fn new(frame: u32, missing: u32) -> Self {
        Self {
            frame,
            missing,
            n_resources: missing,
            time: 0.0,
        }
    }
}

/// Per-view bookkeeping.
#[derive(Debug, Default)]
struct Branch {
    tasks: BTreeMap<ChannelId, u32>,
    /// Newest first.
    loads: VecDeque<Load>,
    subscriptions: Vec<Subscription>,
}

impl Branch {
    /// Youngest complete load not newer than `frame`, or `0`.
    fn youngest(&self, frame: u32) -> u32 {
        self.loads
            .iter()
            .find(|l| l.missing == 0 && l.frame <= frame)
            .map_or(0, |l| l.frame)
    }

    /// Takes the load of `frame` and drops everything older.
    fn use_load(&mut self, frame: u32) -> Load {
        let Some(pos) = self.loads.iter().position(|l| l.frame == frame) else {
            return Load::NONE;
        };
        self.loads.truncate(pos + 1);
        let load = &mut self.loads[pos];
        if load.time <= 0.0 {
            load.time = 1.0;
        }
        *load
    }

    fn new_load(&mut self, frame: u32, channels: u32, max_history: usize) {
        self.loads.push_front(Load::new(frame, channels));
        self.loads.truncate(max_history.max(1));
    }
}

/// Shares pipes among the views of a multi-view configuration in proportion
/// to how long each view takes to render.
#[derive(Debug, Default)]
pub struct ViewEqualizer {
    branches: Vec<Branch>,
    n_pipes: usize,
}

impl ViewEqualizer {
    /// Creates a view equalizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct pipes used by active leaves at the last update.
    #[must_use]
    pub fn pipe_count(&self) -> usize {
        self.n_pipes
    }

    pub(crate) fn reset(&mut self) {
        self.branches.clear();
    }

    pub(crate) fn update_pre(
        &mut self,
        store: &mut CompoundStore,
        compound: CompoundId,
        control: Control,
        ctx: &mut EqualizerContext<'_, '_>,
    ) -> Result<(), InvariantViolation> {
        let children: Vec<CompoundId> = store.children(compound).collect();
        if self.branches.is_empty() {
            self.subscribe(store, &children, control)?;
        }

        let mut counter = PipeCounter {
            resources: ctx.resources,
            pipes: BTreeSet::new(),
        };
        store.accept(compound, &mut counter);
        if counter.pipes.len() != self.n_pipes {
            log::info!("{:?} balancing over {} pipes", control.id, counter.pipes.len());
            self.n_pipes = counter.pipes.len();
        }

        let res = ctx.resources;
        let active: Vec<bool> = children.iter().map(|&c| store.is_active(c, res)).collect();
        let frame = self.input_frame(&active);
        let mut loads: Vec<Load> = self.branches.iter_mut().map(|b| b.use_load(frame)).collect();
        let total: f64 = loads.iter().map(|l| l.time).sum();

        if control.frozen || !store.is_active(compound, res) || self.n_pipes == 0 {
            return Ok(());
        }
        log::trace!("{:?} using loads of frame {frame}", control.id);

        #[expect(clippy::cast_possible_truncation, reason = "usage is an f32 share")]
        let min_usage = ctx.config.view_min_usage as f32;
        let total = if total <= 0.0 { 1.0 } else { total };
        let resource_time = total / self.n_pipes as f64;
        let mut pipe_usage = BTreeMap::new();
        let mut left_overs = alloc::vec![0.0_f32; children.len()];

        for (i, &child) in children.iter().enumerate() {
            if !active[i] {
                continue;
            }
            #[expect(clippy::cast_possible_truncation, reason = "usage is an f32 share")]
            let mut resources = (loads[i].time / resource_time) as f32;
            let mut step = SelfAssigner {
                resources: res,
                own: pipe(store, child, res),
                left: &mut resources,
                pipe_usage: &mut pipe_usage,
                min_usage,
                channels: 0,
            };
            store.accept_mut(child, &mut step);
            loads[i].missing = step.channels;
            left_overs[i] = resources;
        }

        for (i, &child) in children.iter().enumerate() {
            if !active[i] {
                continue;
            }
            let mut step = PreviousAssigner {
                resources: res,
                own: pipe(store, child, res),
                left: &mut left_overs[i],
                pipe_usage: &mut pipe_usage,
                min_usage,
                channels: 0,
            };
            store.accept_mut(child, &mut step);
            loads[i].missing += step.channels;
        }

        for (i, &child) in children.iter().enumerate() {
            if !active[i] {
                continue;
            }
            let left = &mut left_overs[i];
            if *left > min_usage || loads[i].missing == 0 {
                let mut step = NewAssigner {
                    resources: res,
                    left: &mut *left,
                    pipe_usage: &mut pipe_usage,
                    min_usage,
                    channels: 0,
                    fallback: None,
                };
                store.accept_mut(child, &mut step);
                loads[i].missing += step.channels;
                if loads[i].missing == 0 {
                    // Every view renders on at least one resource.
                    if let Some(fallback) = step.fallback {
                        store.set_usage(fallback, (*left).max(min_usage));
                        loads[i].missing = 1;
                    }
                }
            }
            if loads[i].missing > 0 {
                self.branches[i].new_load(ctx.frame_number, loads[i].missing, ctx.config.max_history);
            }

            for leaf in store.leaves(child) {
                let usage = store.usage(leaf);
                log::debug!("{leaf:?} usage {usage:.2}");
                ctx.tracer.usage(&UsageEvent {
                    frame_number: ctx.frame_number,
                    compound: leaf,
                    usage,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn notify_load_data(
        &mut self,
        slot: u32,
        channel: ChannelId,
        frame_number: u32,
        statistics: &[Statistic],
    ) {
        let Some(branch) = self.branches.get_mut(slot as usize) else {
            return;
        };
        let Some(&task_id) = branch.tasks.get(&channel) else {
            return;
        };
        let Some(load) = branch.loads.iter_mut().find(|l| l.frame == frame_number) else {
            return;
        };
        if load.missing == 0 {
            return;
        }
        let Some(time) = task_time(statistics, task_id) else {
            return;
        };
        load.time += time as f64;
        load.missing -= 1;
        if load.missing == 0 {
            // More resources finish sooner, but not linearly.
            let n = f64::from(load.n_resources);
            load.time = load.time / n * n.sqrt();
        }
        log::trace!("task {task_id} frame {frame_number}: {time}ms, {load:?}");
    }

    fn subscribe(
        &mut self,
        store: &CompoundStore,
        children: &[CompoundId],
        control: Control,
    ) -> Result<(), InvariantViolation> {
        let mut branches = Vec::with_capacity(children.len());
        for (slot, &child) in children.iter().enumerate() {
            let mut branch = Branch::default();
            #[expect(
                clippy::cast_possible_truncation,
                reason = "child counts fit in u32"
            )]
            let key = ListenerKey {
                equalizer: control.id,
                slot: slot as u32,
            };
            for leaf in store.leaves(child) {
                let channel = store
                    .channel(leaf)
                    .ok_or(InvariantViolation::MissingChannel { compound: leaf })?;
                if branch.tasks.insert(channel, store.task_id(leaf)).is_some() {
                    return Err(InvariantViolation::ChannelReuse {
                        compound: child,
                        channel,
                    });
                }
                branch
                    .subscriptions
                    .push(store.listeners().subscribe(channel, key));
            }
            branches.push(branch);
        }
        log::info!("{:?} listening to {} views", control.id, branches.len());
        self.branches = branches;
        Ok(())
    }

    /// The youngest frame every active view has complete data for.
    fn input_frame(&self, active: &[bool]) -> u32 {
        let mut frame = u32::MAX;
        let mut changed = true;
        while changed {
            changed = false;
            for (branch, _) in self.branches.iter().zip(active).filter(|(_, a)| **a) {
                let youngest = branch.youngest(frame);
                if youngest < frame {
                    frame = youngest;
                    changed = true;
                }
            }
        }
        frame
    }
}

fn pipe(store: &CompoundStore, id: CompoundId, resources: &dyn Resources) -> Option<PipeId> {
    let channel = store.channel(id)?;
    Some(resources.channel(channel)?.pipe())
}

/// Collects the pipes of all active leaves.
struct PipeCounter<'a> {
    resources: &'a dyn Resources,
    pipes: BTreeSet<PipeId>,
}

impl CompoundVisitor for PipeCounter<'_> {
    fn visit_pre(&mut self, store: &CompoundStore, id: CompoundId) -> VisitorResult {
        if store.is_active(id, self.resources) {
            VisitorResult::Continue
        } else {
            VisitorResult::Prune
        }
    }

    fn visit_leaf(&mut self, store: &CompoundStore, id: CompoundId) -> VisitorResult {
        if !store.is_active(id, self.resources) {
            return VisitorResult::Prune;
        }
        if let Some(pipe) = pipe(store, id, self.resources) {
            self.pipes.insert(pipe);
        }
        VisitorResult::Continue
    }
}

/// Puts a view on the first active leaf using the view's own pipe.
struct SelfAssigner<'a> {
    resources: &'a dyn Resources,
    own: Option<PipeId>,
    left: &'a mut f32,
    pipe_usage: &'a mut BTreeMap<PipeId, f32>,
    min_usage: f32,
    channels: u32,
}

impl CompoundVisitorMut for SelfAssigner<'_> {
    fn visit_leaf(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        if !store.is_active(id, self.resources) {
            return VisitorResult::Continue;
        }
        let Some(leaf_pipe) = pipe(store, id, self.resources) else {
            return VisitorResult::Continue;
        };
        if Some(leaf_pipe) != self.own {
            return VisitorResult::Continue;
        }
        let used = self.pipe_usage.entry(leaf_pipe).or_insert(0.0);
        if *used >= 1.0 {
            store.set_usage(id, 0.0);
            return VisitorResult::Terminate;
        }
        let usage = if *used > 0.0 {
            let usage = (1.0 - *used).max(self.min_usage);
            // A pipe is shared by at most two views.
            *used = 1.0;
            usage
        } else {
            let usage = self.left.min(1.0);
            *used = usage;
            usage
        };
        store.set_usage(id, usage);
        *self.left -= usage;
        self.channels += 1;
        VisitorResult::Terminate
    }
}

/// Keeps a view on the foreign pipes it used last frame, while it still
/// needs resources.
struct PreviousAssigner<'a> {
    resources: &'a dyn Resources,
    own: Option<PipeId>,
    left: &'a mut f32,
    pipe_usage: &'a mut BTreeMap<PipeId, f32>,
    min_usage: f32,
    channels: u32,
}

impl CompoundVisitorMut for PreviousAssigner<'_> {
    fn visit_leaf(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        if !store.is_active(id, self.resources) {
            return VisitorResult::Continue;
        }
        let Some(leaf_pipe) = pipe(store, id, self.resources) else {
            return VisitorResult::Continue;
        };
        if store.usage(id) == 0.0 || Some(leaf_pipe) == self.own {
            return VisitorResult::Continue;
        }
        store.set_usage(id, 0.0);
        if *self.left <= self.min_usage {
            return VisitorResult::Continue;
        }
        let used = self.pipe_usage.entry(leaf_pipe).or_insert(0.0);
        if *used > 0.0 {
            return VisitorResult::Continue;
        }
        let mut usage = self.left.min(1.0);
        if usage + self.min_usage > 1.0 {
            usage = 1.0;
        }
        *used = usage;
        store.set_usage(id, usage);
        *self.left -= usage;
        self.channels += 1;
        VisitorResult::Continue
    }
}

/// Hands out the remaining resources of a view on any pipe with capacity.
struct NewAssigner<'a> {
    resources: &'a dyn Resources,
    left: &'a mut f32,
    pipe_usage: &'a mut BTreeMap<PipeId, f32>,
    min_usage: f32,
    channels: u32,
    fallback: Option<CompoundId>,
}

impl CompoundVisitorMut for NewAssigner<'_> {
    fn visit_leaf(&mut self, store: &mut CompoundStore, id: CompoundId) -> VisitorResult {
        if !store.is_active(id, self.resources) {
            return VisitorResult::Continue;
        }
        self.fallback.get_or_insert(id);
        if store.usage(id) != 0.0 {
            return VisitorResult::Continue;
        }
        let Some(leaf_pipe) = pipe(store, id, self.resources) else {
            return VisitorResult::Continue;
        };
        let used = self.pipe_usage.entry(leaf_pipe).or_insert(0.0);
        if *used >= 1.0 {
            return VisitorResult::Continue;
        }
        let usage = if *used > 0.0 {
            let usage = (1.0 - *used).max(self.min_usage);
            *used = 1.0;
            usage
        } else {
            let usage = self.left.min(1.0);
            *used = usage;
            usage
        };
        store.set_usage(id, usage);
        *self.left -= usage;
        self.channels += 1;
        if *self.left <= self.min_usage {
            VisitorResult::Terminate
        } else {
            VisitorResult::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::equalizer::LoadBalancer;
    use crate::equalizer::LoadBalancerMode;
    use crate::geometry::{PixelViewport, Viewport};
    use crate::resources::{StaticChannel, StaticResources, WindowId};
    use crate::statistics::StatisticKind;
    use crate::trace::Tracer;

    const EPS: f32 = 1e-4;

    struct Setup {
        store: CompoundStore,
        root: CompoundId,
        /// View A: own leaf on pipe 0, helper on pipe 1.
        a: [CompoundId; 2],
        /// View B: own leaf on pipe 1, helper on pipe 0.
        b: [CompoundId; 2],
        res: StaticResources,
    }

    fn channel(res: &mut StaticResources, id: u32, pipe: u32) {
        res.add_channel(
            ChannelId(id),
            StaticChannel::new("channel", PixelViewport::new(0, 0, 400, 300))
                .on(WindowId(id), PipeId(pipe)),
        );
    }

    impl Setup {
        fn new() -> Self {
            let mut res = StaticResources::new();
            channel(&mut res, 1, 0);
            channel(&mut res, 2, 1);
            channel(&mut res, 3, 1);
            channel(&mut res, 4, 0);
            let mut store = CompoundStore::new();
            let root = store.create_compound();

            let view_a = store.create_child(root);
            store.set_channel(view_a, Some(ChannelId(1)));
            let a0 = store.create_child(view_a);
            let a1 = store.create_child(view_a);
            store.set_channel(a1, Some(ChannelId(2)));

            let view_b = store.create_child(root);
            store.set_channel(view_b, Some(ChannelId(3)));
            let b0 = store.create_child(view_b);
            let b1 = store.create_child(view_b);
            store.set_channel(b1, Some(ChannelId(4)));

            store.add_equalizer(root, LoadBalancer::new(LoadBalancerMode::View, &EngineConfig::DEFAULT));
            store.init(root, &mut res).unwrap();
            Self {
                store,
                root,
                a: [a0, a1],
                b: [b0, b1],
                res,
            }
        }

        fn frame(&mut self, frame_number: u32) -> Result<(), InvariantViolation> {
            self.store
                .update(
                    self.root,
                    frame_number,
                    &mut self.res,
                    &EngineConfig::DEFAULT,
                    &mut Tracer::none(),
                )
                .map(|_| ())
        }

        fn report(&mut self, leaf: CompoundId, frame_number: u32, ms: i64) {
            let task = self.store.task_id(leaf);
            let channel = self.store.channel(leaf).unwrap();
            self.store.notify_load_data(
                channel,
                frame_number,
                &[Statistic::new(StatisticKind::Draw, task, 0, ms)],
                Viewport::FULL,
            );
        }

        fn usage(&self, leaf: CompoundId) -> f32 {
            self.store.usage(leaf)
        }
    }

    #[test]
    fn views_start_on_their_own_pipe() {
        let mut s = Setup::new();
        s.frame(1).unwrap();
        assert!((s.usage(s.a[0]) - 1.0).abs() < EPS);
        assert!(s.usage(s.a[1]).abs() < EPS);
        assert!((s.usage(s.b[0]) - 1.0).abs() < EPS);
        assert!(s.usage(s.b[1]).abs() < EPS);
        let eq = s.store.equalizers(s.root)[0].view().unwrap();
        assert_eq!(eq.pipe_count(), 2);
    }

    #[test]
    fn slow_view_borrows_a_foreign_pipe() {
        let mut s = Setup::new();
        s.frame(1).unwrap();
        s.report(s.a[0], 1, 30);
        s.report(s.b[0], 1, 10);
        s.frame(2).unwrap();
        // 40ms over two pipes: view A needs 1.5 pipes, view B half of one.
        assert!((s.usage(s.a[0]) - 1.0).abs() < EPS);
        assert!((s.usage(s.a[1]) - 0.5).abs() < EPS);
        assert!((s.usage(s.b[0]) - 0.5).abs() < EPS);
        assert!(s.usage(s.b[1]).abs() < EPS);
    }

    #[test]
    fn incomplete_reports_reuse_older_frame() {
        let mut s = Setup::new();
        s.frame(1).unwrap();
        s.report(s.a[0], 1, 30);
        s.report(s.b[0], 1, 10);
        s.frame(2).unwrap();
        // Only one of view A's two resources reports for frame 2.
        s.report(s.a[0], 2, 5);
        s.report(s.b[0], 2, 5);
        s.frame(3).unwrap();
        assert!((s.usage(s.a[1]) - 0.5).abs() < EPS);
    }

    #[test]
    fn channel_reuse_in_one_view_is_an_error() {
        let mut s = Setup::new();
        let extra = s.store.create_child(s.store.parent(s.a[0]).unwrap());
        s.store.set_channel(extra, Some(ChannelId(2)));
        let err = s.frame(1).unwrap_err();
        assert!(matches!(
            err,
            InvariantViolation::ChannelReuse {
                channel: ChannelId(2),
                ..
            }
        ));
    }

    #[test]
    fn complete_load_is_normalized_per_resource() {
        let mut branch = Branch::default();
        branch.tasks.insert(ChannelId(1), 7);
        branch.new_load(5, 4, 8);
        let mut eq = ViewEqualizer {
            branches: alloc::vec![branch],
            n_pipes: 0,
        };
        for _ in 0..4 {
            eq.notify_load_data(
                0,
                ChannelId(1),
                5,
                &[Statistic::new(StatisticKind::Draw, 7, 0, 10)],
            );
        }
        let load = eq.branches[0].use_load(5);
        assert_eq!(load.missing, 0);
        // 40ms over 4 resources: 10ms each, times sqrt(4).
        assert!((load.time - 20.0).abs() < 1e-9);
    }
}
