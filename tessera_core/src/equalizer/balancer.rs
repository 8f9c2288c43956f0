// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The equalizer facade attached to compounds.

use super::{
    Control, DfrEqualizer, EqualizerContext, EqualizerId, FramerateEqualizer, LoadEqualizer,
    TileEqualizer, ViewEqualizer,
};
use crate::compound::{CompoundId, CompoundStore};
use crate::config::EngineConfig;
use crate::error::InvariantViolation;
use crate::geometry::Viewport;
use crate::resources::ChannelId;
use crate::statistics::Statistic;

/// Which equalizer a [`LoadBalancer`] runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadBalancerMode {
    /// Split the viewport, alternating vertical and horizontal splits.
    #[default]
    TwoD,
    /// Split the viewport into columns.
    Vertical,
    /// Split the viewport into rows.
    Horizontal,
    /// Split the data range.
    Db,
    /// Zoom to hold a target frame rate.
    Dfr,
    /// Cap child frame rates to the slowest child.
    Framerate,
    /// Share pipes between views.
    View,
    /// Distribute tiles.
    Tile,
}

impl LoadBalancerMode {
    /// Returns `true` for the modes handled by [`LoadEqualizer`].
    #[must_use]
    pub const fn is_split(self) -> bool {
        matches!(self, Self::TwoD | Self::Vertical | Self::Horizontal | Self::Db)
    }
}

#[derive(Debug)]
enum Equalizer {
    Load(LoadEqualizer),
    Dfr(DfrEqualizer),
    Framerate(FramerateEqualizer),
    View(ViewEqualizer),
    Tile(TileEqualizer),
}

impl Equalizer {
    fn for_mode(mode: LoadBalancerMode, config: &EngineConfig) -> Self {
        match mode {
            LoadBalancerMode::TwoD
            | LoadBalancerMode::Vertical
            | LoadBalancerMode::Horizontal
            | LoadBalancerMode::Db => Self::Load(LoadEqualizer::new(mode)),
            LoadBalancerMode::Dfr => Self::Dfr(DfrEqualizer::new(config.dfr_target_fps)),
            LoadBalancerMode::Framerate => Self::Framerate(FramerateEqualizer::new()),
            LoadBalancerMode::View => Self::View(ViewEqualizer::new()),
            LoadBalancerMode::Tile => Self::Tile(TileEqualizer::new("")),
        }
    }
}

/// An equalizer attached to a compound, with the controls all equalizers
/// share.
///
/// A balancer is created detached; attaching it with
/// [`CompoundStore::add_equalizer`] assigns its [`EqualizerId`]. The store
/// calls it once per frame during the data pass and forwards the statistics
/// of the channels it subscribed to.
#[derive(Debug)]
pub struct LoadBalancer {
    id: EqualizerId,
    mode: LoadBalancerMode,
    frozen: bool,
    damping: f64,
    equalizer: Equalizer,
    backup: Option<(LoadBalancerMode, bool, f64)>,
    /// A replaced tile equalizer whose queues are still attached.
    retired: Option<TileEqualizer>,
}

/// Binary-tree load balancer: a [`LoadBalancer`] in one of the split modes.
pub type TreeLoadBalancer = LoadBalancer;
/// Dynamic frame resolution: a [`LoadBalancer`] in [`LoadBalancerMode::Dfr`].
pub type DfrLoadBalancer = LoadBalancer;
/// Frame rate smoothing: a [`LoadBalancer`] in [`LoadBalancerMode::Framerate`].
pub type SmoothLoadBalancer = LoadBalancer;

impl LoadBalancer {
    const DETACHED: EqualizerId = EqualizerId(u32::MAX);

    /// Creates a detached balancer running the equalizer for `mode`.
    #[must_use]
    pub fn new(mode: LoadBalancerMode, config: &EngineConfig) -> Self {
        Self::wrap(mode, config.default_damping, Equalizer::for_mode(mode, config))
    }

    fn wrap(mode: LoadBalancerMode, damping: f64, equalizer: Equalizer) -> Self {
        Self {
            id: Self::DETACHED,
            mode,
            frozen: false,
            damping,
            equalizer,
            backup: None,
            retired: None,
        }
    }

    /// The id assigned on attachment.
    #[must_use]
    pub fn id(&self) -> EqualizerId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EqualizerId) {
        self.id = id;
    }

    /// The current mode.
    #[must_use]
    pub fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    /// Switches the mode.
    ///
    /// Switching between split modes keeps the collected statistics.
    /// Switching to another kind of equalizer starts over. Tile queues of a
    /// replaced tile equalizer are removed on the next update, or at once
    /// through [`CompoundStore::set_equalizer_mode`].
    pub fn set_mode(&mut self, mode: LoadBalancerMode, config: &EngineConfig) {
        if mode == self.mode {
            return;
        }
        match &mut self.equalizer {
            Equalizer::Load(load) if mode.is_split() => load.set_mode(mode),
            _ => {
                let old = core::mem::replace(&mut self.equalizer, Equalizer::for_mode(mode, config));
                if let Equalizer::Tile(tile) = old
                    && tile.queue_name().is_some()
                {
                    self.retired = Some(tile);
                }
            }
        }
        log::debug!("{:?} mode {:?} -> {mode:?}", self.id, self.mode);
        self.mode = mode;
    }

    /// Stops or resumes rebalancing. A frozen balancer keeps the last
    /// assignment but still collects statistics.
    pub fn freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Returns `true` if rebalancing is suspended.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Weight of the previous measurement when smoothing, in `[0, 1]`.
    #[must_use]
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Sets the damping, clamped to `[0, 1]`.
    pub fn set_damping(&mut self, damping: f64) {
        self.damping = damping.clamp(0.0, 1.0);
    }

    /// The wrapped load equalizer, in split modes.
    #[must_use]
    pub fn load(&self) -> Option<&LoadEqualizer> {
        match &self.equalizer {
            Equalizer::Load(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped DFR equalizer.
    #[must_use]
    pub fn dfr(&self) -> Option<&DfrEqualizer> {
        match &self.equalizer {
            Equalizer::Dfr(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped DFR equalizer, for tuning.
    pub fn dfr_mut(&mut self) -> Option<&mut DfrEqualizer> {
        match &mut self.equalizer {
            Equalizer::Dfr(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped framerate equalizer.
    #[must_use]
    pub fn framerate(&self) -> Option<&FramerateEqualizer> {
        match &self.equalizer {
            Equalizer::Framerate(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped framerate equalizer, for tuning.
    pub fn framerate_mut(&mut self) -> Option<&mut FramerateEqualizer> {
        match &mut self.equalizer {
            Equalizer::Framerate(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped view equalizer.
    #[must_use]
    pub fn view(&self) -> Option<&ViewEqualizer> {
        match &self.equalizer {
            Equalizer::View(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped tile equalizer.
    #[must_use]
    pub fn tile(&self) -> Option<&TileEqualizer> {
        match &self.equalizer {
            Equalizer::Tile(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped tile equalizer, for tuning.
    pub fn tile_mut(&mut self) -> Option<&mut TileEqualizer> {
        match &mut self.equalizer {
            Equalizer::Tile(e) => Some(e),
            _ => None,
        }
    }

    /// Remembers mode, freezing and damping.
    pub fn backup(&mut self) {
        self.backup = Some((self.mode, self.frozen, self.damping));
    }

    /// Returns to the last [`backup`](Self::backup).
    pub fn restore(&mut self) {
        let Some((mode, frozen, damping)) = self.backup else {
            return;
        };
        self.set_mode(mode, &EngineConfig::DEFAULT);
        self.frozen = frozen;
        self.damping = damping;
    }

    /// Drops everything derived from the children of the compound, such as
    /// split trees and subscriptions. Called when the child list changes.
    pub fn reset(&mut self) {
        match &mut self.equalizer {
            Equalizer::Load(e) => e.reset(),
            Equalizer::Dfr(e) => e.reset(),
            Equalizer::Framerate(e) => e.reset(),
            Equalizer::View(e) => e.reset(),
            Equalizer::Tile(_) => {}
        }
    }

    /// Removes the queues of a tile equalizer replaced by a mode switch.
    pub(crate) fn release_retired(&mut self, store: &mut CompoundStore, compound: CompoundId) {
        if let Some(mut tile) = self.retired.take() {
            tile.detach(store, compound);
        }
    }

    /// Like [`reset`](Self::reset), and also drops tile queues so the next
    /// update hands them to the current leaves.
    pub(crate) fn restructure(&mut self, store: &mut CompoundStore, compound: CompoundId) {
        self.reset();
        self.release_retired(store, compound);
        if let Equalizer::Tile(e) = &mut self.equalizer {
            e.detach(store, compound);
        }
    }

    /// Releases all per-run state, including tile queues the balancer
    /// created on `compound`.
    pub(crate) fn exit(&mut self, store: &mut CompoundStore, compound: CompoundId) {
        self.reset();
        self.release_retired(store, compound);
        match &mut self.equalizer {
            Equalizer::Load(e) => e.clear(),
            Equalizer::Tile(e) => e.detach(store, compound),
            Equalizer::Dfr(_) | Equalizer::Framerate(_) | Equalizer::View(_) => {}
        }
    }

    /// Runs the equalizer for the frame in `ctx`, before `compound`
    /// inherits its data.
    ///
    /// # Errors
    ///
    /// Returns an error if the equalizer finds a compound configuration it
    /// cannot balance.
    pub fn notify_update_pre(
        &mut self,
        store: &mut CompoundStore,
        compound: CompoundId,
        ctx: &mut EqualizerContext<'_, '_>,
    ) -> Result<(), InvariantViolation> {
        self.release_retired(store, compound);
        let control = Control {
            id: self.id,
            frozen: self.frozen,
            damping: self.damping,
        };
        match &mut self.equalizer {
            Equalizer::Load(e) => e.update_pre(store, compound, control, ctx),
            Equalizer::Dfr(e) => {
                e.update_pre(store, compound, control, ctx);
                Ok(())
            }
            Equalizer::Framerate(e) => {
                e.update_pre(store, compound, control, ctx);
                Ok(())
            }
            Equalizer::View(e) => e.update_pre(store, compound, control, ctx),
            Equalizer::Tile(e) => {
                e.update_pre(store, compound, ctx);
                Ok(())
            }
        }
    }

    /// Feeds the statistics `channel` measured for `frame_number` to the
    /// subscription `slot`.
    pub fn notify_load_data(
        &mut self,
        slot: u32,
        channel: ChannelId,
        frame_number: u32,
        statistics: &[Statistic],
        region: Viewport,
    ) {
        match &mut self.equalizer {
            Equalizer::Load(e) => e.notify_load_data(slot, frame_number, statistics, region),
            Equalizer::Dfr(e) => e.notify_load_data(frame_number, statistics),
            Equalizer::Framerate(e) => e.notify_load_data(slot, frame_number, statistics),
            Equalizer::View(e) => e.notify_load_data(slot, channel, frame_number, statistics),
            Equalizer::Tile(_) => {}
        }
    }
}

impl From<LoadEqualizer> for LoadBalancer {
    fn from(e: LoadEqualizer) -> Self {
        Self::wrap(e.mode(), EngineConfig::DEFAULT.default_damping, Equalizer::Load(e))
    }
}

impl From<DfrEqualizer> for LoadBalancer {
    fn from(e: DfrEqualizer) -> Self {
        Self::wrap(
            LoadBalancerMode::Dfr,
            EngineConfig::DEFAULT.default_damping,
            Equalizer::Dfr(e),
        )
    }
}

impl From<FramerateEqualizer> for LoadBalancer {
    fn from(e: FramerateEqualizer) -> Self {
        Self::wrap(
            LoadBalancerMode::Framerate,
            EngineConfig::DEFAULT.default_damping,
            Equalizer::Framerate(e),
        )
    }
}

impl From<ViewEqualizer> for LoadBalancer {
    fn from(e: ViewEqualizer) -> Self {
        Self::wrap(
            LoadBalancerMode::View,
            EngineConfig::DEFAULT.default_damping,
            Equalizer::View(e),
        )
    }
}

impl From<TileEqualizer> for LoadBalancer {
    fn from(e: TileEqualizer) -> Self {
        Self::wrap(
            LoadBalancerMode::Tile,
            EngineConfig::DEFAULT.default_damping,
            Equalizer::Tile(e),
        )
    }
}
