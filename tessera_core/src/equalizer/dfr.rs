// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic frame resolution.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use super::{Control, EqualizerContext, task_time};
use crate::compound::{CompoundId, CompoundStore};
use crate::geometry::Zoom;
use crate::listener::{ListenerKey, Subscription};
use crate::statistics::Statistic;
use crate::trace::ZoomEvent;

/// Scales the resolution of a compound to hold a target frame rate.
///
/// Each measured frame adjusts the compound zoom by
/// `(sqrt(fps / target) - 1) * damping + 1`. The zoomed pixel viewport never
/// shrinks below [`EngineConfig::dfr_min_size`](crate::config::EngineConfig::dfr_min_size)
/// pixels and never exceeds the native size of the channel.
#[derive(Debug)]
pub struct DfrEqualizer {
    target_fps: f64,
    current_fps: Option<f64>,
    last_frame: u32,
    task_id: u32,
    subscription: Option<Subscription>,
}

impl DfrEqualizer {
    /// Creates an equalizer aiming for `target_fps`.
    #[must_use]
    pub fn new(target_fps: f64) -> Self {
        Self {
            target_fps,
            current_fps: None,
            last_frame: 0,
            task_id: 0,
            subscription: None,
        }
    }

    /// The frame rate to hold.
    #[must_use]
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// Sets the frame rate to hold.
    pub fn set_target_fps(&mut self, fps: f64) {
        self.target_fps = fps;
    }

    /// The last measured frame rate not yet acted on.
    #[must_use]
    pub fn current_fps(&self) -> Option<f64> {
        self.current_fps
    }

    pub(crate) fn reset(&mut self) {
        self.subscription = None;
    }

    pub(crate) fn update_pre(
        &mut self,
        store: &mut CompoundStore,
        compound: CompoundId,
        control: Control,
        ctx: &mut EqualizerContext<'_, '_>,
    ) {
        let Some(channel_id) = store.channel(compound) else {
            return;
        };
        if self.subscription.is_none() {
            let key = ListenerKey {
                equalizer: control.id,
                slot: 0,
            };
            self.subscription = Some(store.listeners().subscribe(channel_id, key));
            self.task_id = store.task_id(compound);
        }
        if control.frozen || !store.is_active(compound, ctx.resources) || self.target_fps <= 0.0 {
            return;
        }
        let Some(fps) = self.current_fps.take() else {
            return;
        };
        let Some(channel) = ctx.resources.channel(channel_id) else {
            return;
        };

        let factor = ((fps / self.target_fps).sqrt() - 1.0) * control.damping + 1.0;
        let mut zoom = store.data(compound).zoom * factor;
        let native = channel.pixel_viewport();
        let min_size = f64::from(ctx.config.dfr_min_size);
        zoom.x = zoom.x.clamp(min_zoom(min_size, native.w), 1.0);
        zoom.y = zoom.y.clamp(min_zoom(min_size, native.h), 1.0);

        log::debug!("{compound:?} at {fps:.1} fps, zoom by {factor:.3} to {zoom:?}");
        ctx.tracer.zoom(&ZoomEvent {
            frame_number: ctx.frame_number,
            compound,
            fps,
            zoom,
        });
        store.set_zoom(compound, zoom);
    }

    pub(crate) fn notify_load_data(&mut self, frame_number: u32, statistics: &[Statistic]) {
        if frame_number < self.last_frame {
            return;
        }
        let Some(time) = task_time(statistics, self.task_id) else {
            return;
        };
        self.last_frame = frame_number;
        self.current_fps = Some(1000.0 / time as f64);
    }
}

/// Smallest zoom keeping `size` pixels at `min_size`, or `1` if the channel
/// is already smaller.
fn min_zoom(min_size: f64, size: i32) -> f64 {
    if size <= 0 {
        return 1.0;
    }
    (min_size / f64::from(size)).min(1.0)
}

impl Default for DfrEqualizer {
    fn default() -> Self {
        Self::new(10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::equalizer::LoadBalancer;
    use crate::geometry::{PixelViewport, Viewport};
    use crate::resources::{ChannelId, StaticChannel, StaticResources};
    use crate::statistics::StatisticKind;
    use crate::trace::Tracer;

    const EPS: f64 = 1e-6;

    fn setup(zoom: Zoom) -> (CompoundStore, CompoundId, StaticResources) {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("dest", PixelViewport::new(0, 0, 800, 600)),
        );
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(0)));
        store.set_zoom(root, zoom);
        store.add_equalizer(root, DfrEqualizer::new(10.0));
        store.init(root, &mut res).unwrap();
        (store, root, res)
    }

    fn run(store: &mut CompoundStore, root: CompoundId, res: &mut StaticResources, frame: u32, ms: i64) {
        store
            .update(root, frame, res, &EngineConfig::DEFAULT, &mut Tracer::none())
            .unwrap();
        let task = store.task_id(root);
        store.notify_load_data(
            ChannelId(0),
            frame,
            &[Statistic::new(StatisticKind::Draw, task, 0, ms)],
            Viewport::FULL,
        );
    }

    #[test]
    fn fast_frames_raise_resolution() {
        let (mut store, root, mut res) = setup(Zoom::new(0.5, 0.5));
        // 50ms is 20 fps against a target of 10.
        run(&mut store, root, &mut res, 1, 50);
        run(&mut store, root, &mut res, 2, 50);
        let expected = 0.5 * ((2.0_f64.sqrt() - 1.0) * 0.5 + 1.0);
        let zoom = store.data(root).zoom;
        assert!((zoom.x - expected).abs() < EPS, "{zoom:?}");
        assert!((zoom.y - expected).abs() < EPS, "{zoom:?}");
    }

    #[test]
    fn zoom_never_exceeds_native_size() {
        let (mut store, root, mut res) = setup(Zoom::new(0.9, 0.9));
        run(&mut store, root, &mut res, 1, 10);
        run(&mut store, root, &mut res, 2, 10);
        assert_eq!(store.data(root).zoom, Zoom::NONE);
    }

    #[test]
    fn zoom_keeps_minimum_size() {
        let (mut store, root, mut res) = setup(Zoom::NONE);
        for frame in 1..=30 {
            run(&mut store, root, &mut res, frame, 1000);
        }
        let zoom = store.data(root).zoom;
        assert!((zoom.x - 128.0 / 800.0).abs() < EPS, "{zoom:?}");
        assert!((zoom.y - 128.0 / 600.0).abs() < EPS, "{zoom:?}");
    }

    #[test]
    fn each_measurement_is_used_once() {
        let (mut store, root, mut res) = setup(Zoom::new(0.5, 0.5));
        run(&mut store, root, &mut res, 1, 50);
        store
            .update(root, 2, &mut res, &EngineConfig::DEFAULT, &mut Tracer::none())
            .unwrap();
        let once = store.data(root).zoom;
        store
            .update(root, 3, &mut res, &EngineConfig::DEFAULT, &mut Tracer::none())
            .unwrap();
        assert_eq!(store.data(root).zoom, once);
    }

    #[test]
    fn facade_uses_configured_target() {
        let mut config = EngineConfig::DEFAULT;
        config.dfr_target_fps = 30.0;
        let lb = LoadBalancer::new(crate::equalizer::LoadBalancerMode::Dfr, &config);
        assert!((lb.dfr().unwrap().target_fps() - 30.0).abs() < EPS);
    }
}
