// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame rate smoothing.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::{Control, EqualizerContext, task_time};
use crate::compound::{CompoundId, CompoundStore};
use crate::listener::{ListenerKey, Subscription};
use crate::statistics::Statistic;
use crate::trace::MaxFpsEvent;

/// How the frame times of a sample window are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FramerateReduction {
    /// Use the slowest frame.
    #[default]
    Max,
    /// Use the mean frame time.
    Average,
}

#[derive(Clone, Copy, Debug)]
struct FrameTime {
    frame: u32,
    /// Slowest leaf so far, in milliseconds.
    time: f64,
    outstanding: usize,
}

/// Caps the frame rate of a compound to what its slowest source delivers,
/// so frames arrive at an even pace.
///
/// The window spans as many frames as the longest time-multiplex period
/// among the sources, so every source reports at least once per window. A
/// new cap is published only once a full window of contiguous frames has
/// been measured.
#[derive(Debug)]
pub struct FramerateEqualizer {
    reduction: FramerateReduction,
    slot_tasks: Vec<u32>,
    subscriptions: Vec<Subscription>,
    window: usize,
    times: VecDeque<FrameTime>,
}

impl FramerateEqualizer {
    /// Creates an equalizer using the [`FramerateReduction::Max`] reduction.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reduction(FramerateReduction::Max)
    }

    /// Creates an equalizer with the given reduction.
    #[must_use]
    pub fn with_reduction(reduction: FramerateReduction) -> Self {
        Self {
            reduction,
            slot_tasks: Vec::new(),
            subscriptions: Vec::new(),
            window: 1,
            times: VecDeque::new(),
        }
    }

    /// The window reduction.
    #[must_use]
    pub fn reduction(&self) -> FramerateReduction {
        self.reduction
    }

    /// Sets the window reduction.
    pub fn set_reduction(&mut self, reduction: FramerateReduction) {
        self.reduction = reduction;
    }

    pub(crate) fn reset(&mut self) {
        self.slot_tasks.clear();
        self.subscriptions.clear();
        self.times.clear();
    }

    pub(crate) fn update_pre(
        &mut self,
        store: &mut CompoundStore,
        compound: CompoundId,
        control: Control,
        ctx: &mut EqualizerContext<'_, '_>,
    ) {
        if self.subscriptions.is_empty() {
            self.subscribe(store, compound, control, ctx.config.framerate_max_samples);
        }

        if let Some(time) = self.take_window() {
            if !control.frozen && time > 0.0 {
                let mut fps = 1000.0 / (time * ctx.config.framerate_slowdown);
                if ctx.config.vsync_cap > 0.0 {
                    fps = fps.min(ctx.config.vsync_cap);
                }
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "frame rates fit in f32"
                )]
                let max_fps = fps as f32;
                log::debug!("{compound:?} capped at {max_fps:.1} fps from {time:.1}ms");
                ctx.tracer.max_fps(&MaxFpsEvent {
                    frame_number: ctx.frame_number,
                    compound,
                    max_fps,
                });
                store.set_max_fps(compound, max_fps);
            }
        }

        let outstanding = store
            .leaves(compound)
            .into_iter()
            .filter(|&leaf| {
                let inherit = store.inherit(leaf);
                store.channel(leaf).is_some()
                    && ctx.frame_number % inherit.period.max(1) == inherit.phase
            })
            .count();
        self.times.push_back(FrameTime {
            frame: ctx.frame_number,
            time: 0.0,
            outstanding,
        });
        let limit = self.window + ctx.config.max_history;
        while self.times.len() > limit {
            self.times.pop_front();
        }
    }

    pub(crate) fn notify_load_data(&mut self, slot: u32, frame_number: u32, statistics: &[Statistic]) {
        let Some(&task_id) = self.slot_tasks.get(slot as usize) else {
            return;
        };
        let Some(entry) = self.times.iter_mut().find(|t| t.frame == frame_number) else {
            return;
        };
        let Some(time) = task_time(statistics, task_id) else {
            return;
        };
        entry.time = entry.time.max(time as f64);
        entry.outstanding = entry.outstanding.saturating_sub(1);
    }

    fn subscribe(
        &mut self,
        store: &CompoundStore,
        compound: CompoundId,
        control: Control,
        max_samples: usize,
    ) {
        let mut window = 1;
        for leaf in store.leaves(compound) {
            let Some(channel) = store.channel(leaf) else {
                continue;
            };
            #[expect(
                clippy::cast_possible_truncation,
                reason = "leaf counts fit in u32"
            )]
            let key = ListenerKey {
                equalizer: control.id,
                slot: self.slot_tasks.len() as u32,
            };
            self.subscriptions
                .push(store.listeners().subscribe(channel, key));
            self.slot_tasks.push(store.task_id(leaf));
            window = window.max(store.inherit(leaf).period as usize);
        }
        self.window = window.clamp(1, max_samples.max(1));
        log::info!(
            "{:?} smoothing {} sources over {} frames",
            control.id,
            self.slot_tasks.len(),
            self.window
        );
    }

    /// Reduces the youngest run of `window` measured frames and drops
    /// everything older.
    fn take_window(&mut self) -> Option<f64> {
        let end = self.times.iter().rposition(|t| t.outstanding == 0)?;
        let start = (end + 1).checked_sub(self.window)?;
        let run = self.times.range(start..=end);
        if run.clone().any(|t| t.outstanding != 0) {
            return None;
        }
        let time = match self.reduction {
            FramerateReduction::Max => run.fold(0.0, |max: f64, t| max.max(t.time)),
            FramerateReduction::Average => run.map(|t| t.time).sum::<f64>() / self.window as f64,
        };
        self.times.drain(..=end);
        Some(time)
    }
}

impl Default for FramerateEqualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::vec::Vec;

    use super::*;
    use crate::config::EngineConfig;
    use crate::geometry::{PixelViewport, Viewport};
    use crate::resources::{ChannelId, StaticChannel, StaticResources};
    use crate::statistics::StatisticKind;
    use crate::trace::Tracer;

    const EPS: f64 = 1e-3;

    struct Setup {
        store: CompoundStore,
        root: CompoundId,
        sources: Vec<CompoundId>,
        res: StaticResources,
    }

    impl Setup {
        fn new(equalizer: FramerateEqualizer, periods: &[u32]) -> Self {
            let mut res = StaticResources::new();
            res.add_channel(
                ChannelId(0),
                StaticChannel::new("dest", PixelViewport::new(0, 0, 640, 480)),
            );
            let mut store = CompoundStore::new();
            let root = store.create_compound();
            store.set_channel(root, Some(ChannelId(0)));
            let mut sources = Vec::new();
            for (i, &period) in (1..).zip(periods) {
                res.add_channel(
                    ChannelId(i),
                    StaticChannel::new(format!("source{i}"), PixelViewport::new(0, 0, 640, 480)),
                );
                let source = store.create_child(root);
                store.set_channel(source, Some(ChannelId(i)));
                store.set_period(source, Some(period));
                sources.push(source);
            }
            store.add_equalizer(root, equalizer);
            store.init(root, &mut res).unwrap();
            Self {
                store,
                root,
                sources,
                res,
            }
        }

        fn frame(&mut self, frame_number: u32) {
            self.store
                .update(
                    self.root,
                    frame_number,
                    &mut self.res,
                    &EngineConfig::DEFAULT,
                    &mut Tracer::none(),
                )
                .unwrap();
        }

        fn report(&mut self, i: usize, frame_number: u32, ms: i64) {
            let source = self.sources[i];
            let task = self.store.task_id(source);
            let channel = self.store.channel(source).unwrap();
            self.store.notify_load_data(
                channel,
                frame_number,
                &[Statistic::new(StatisticKind::Draw, task, 0, ms)],
                Viewport::FULL,
            );
        }

        fn max_fps(&self) -> f64 {
            f64::from(self.store.data(self.root).max_fps)
        }
    }

    #[test]
    fn slowest_source_sets_the_pace() {
        let mut s = Setup::new(FramerateEqualizer::new(), &[1, 1]);
        s.frame(1);
        s.report(0, 1, 20);
        s.report(1, 1, 40);
        s.frame(2);
        assert!((s.max_fps() - 1000.0 / 42.0).abs() < EPS, "{}", s.max_fps());
    }

    #[test]
    fn average_reduction_over_window() {
        let mut s = Setup::new(
            FramerateEqualizer::with_reduction(FramerateReduction::Average),
            &[2],
        );
        s.frame(1);
        s.report(0, 1, 20);
        s.frame(2);
        // Half a window measured: no cap yet.
        assert_eq!(s.store.data(s.root).max_fps, f32::MAX);
        s.report(0, 2, 40);
        s.frame(3);
        assert!((s.max_fps() - 1000.0 / (30.0 * 1.05)).abs() < EPS, "{}", s.max_fps());
    }

    #[test]
    fn cap_respects_vsync() {
        let mut s = Setup::new(FramerateEqualizer::new(), &[1]);
        s.frame(1);
        s.report(0, 1, 2);
        s.frame(2);
        assert!((s.max_fps() - 60.0).abs() < EPS);
    }

    #[test]
    fn incomplete_frames_publish_nothing() {
        let mut s = Setup::new(FramerateEqualizer::new(), &[1, 1]);
        s.frame(1);
        s.report(0, 1, 20);
        s.frame(2);
        assert_eq!(s.store.data(s.root).max_fps, f32::MAX);
    }
}
