// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Load equalizers.
//!
//! An equalizer is attached to a compound and runs once per frame, right
//! before the compound inherits its data. It reads the timing statistics the
//! channels below it reported for earlier frames and rewrites the data of
//! the compound or its children so the next frame is better balanced:
//!
//! - [`LoadEqualizer`] splits the viewport or the data range of the children
//!   along a binary tree so every child finishes at the same time.
//! - [`ViewEqualizer`] hands out the usage of the pipes rendering several
//!   views, so each view gets its share of resources.
//! - [`DfrEqualizer`] zooms a compound to keep a target frame rate.
//! - [`FramerateEqualizer`] caps the frame rate of the children to the
//!   slowest one, for smooth frame delivery.
//! - [`TileEqualizer`] attaches tile queues to the compound and its leaves.
//!
//! All of them are wrapped in a [`LoadBalancer`], which owns the common
//! controls (freezing, damping, backup) and is what
//! [`CompoundStore::add_equalizer`](crate::compound::CompoundStore::add_equalizer)
//! accepts.
//!
//! Statistics reach an equalizer through the store's
//! [`ListenerRegistry`](crate::listener::ListenerRegistry): equalizers
//! subscribe to the channels they observe, keyed by a slot of their choice,
//! and [`CompoundStore::notify_load_data`](crate::compound::CompoundStore::notify_load_data)
//! routes each report to the subscribed slots.

mod balancer;
mod dfr;
mod framerate;
mod load;
mod tile;
mod view;

use alloc::vec::Vec;
use core::fmt;

pub use balancer::{
    DfrLoadBalancer, LoadBalancer, LoadBalancerMode, SmoothLoadBalancer, TreeLoadBalancer,
};
pub use dfr::DfrEqualizer;
pub use framerate::{FramerateEqualizer, FramerateReduction};
pub use load::LoadEqualizer;
pub use tile::TileEqualizer;
pub use view::ViewEqualizer;

use crate::config::EngineConfig;
use crate::report::Diagnostic;
use crate::resources::Resources;
use crate::statistics::{Statistic, StatisticKind};
use crate::trace::Tracer;

/// Identifies an equalizer attached to a compound store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EqualizerId(pub u32);

impl fmt::Debug for EqualizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EqualizerId({})", self.0)
    }
}

/// Everything an equalizer may consult while updating one frame.
pub struct EqualizerContext<'a, 't> {
    /// Frame being updated.
    pub frame_number: u32,
    /// Channel, view, segment and window lookup.
    pub resources: &'a dyn Resources,
    /// Tuning constants.
    pub config: &'a EngineConfig,
    /// Receives split, usage and zoom events.
    pub tracer: &'a mut Tracer<'t>,
    /// Receives recoverable problems.
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

impl fmt::Debug for EqualizerContext<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqualizerContext")
            .field("frame_number", &self.frame_number)
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

/// The controls a [`LoadBalancer`] hands to the equalizer it wraps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Control {
    pub(crate) id: EqualizerId,
    pub(crate) frozen: bool,
    pub(crate) damping: f64,
}

/// Time a task spent rendering, in milliseconds.
///
/// The span runs from the first clear, draw or readback start to the last
/// end. Asynchronous readbacks and frame transmissions extend it, time spent
/// waiting for a send token shortens it, and everything after the first
/// assemble is ignored. Returns `None` if the task did not render.
pub(crate) fn task_time(statistics: &[Statistic], task_id: u32) -> Option<i64> {
    let mut start = i64::MAX;
    let mut end = i64::MIN;
    let mut transmit = 0_i64;
    for stat in statistics.iter().filter(|s| s.task_id == task_id) {
        match stat.kind {
            StatisticKind::Clear | StatisticKind::Draw | StatisticKind::Readback => {
                start = start.min(stat.start_time);
                end = end.max(stat.end_time);
            }
            StatisticKind::AsyncReadback | StatisticKind::FrameTransmit => {
                transmit += stat.duration();
            }
            StatisticKind::FrameWaitSendToken => transmit -= stat.duration(),
            StatisticKind::Assemble => break,
            StatisticKind::Transmit | StatisticKind::FrameWaitReady => {}
        }
    }
    (start != i64::MAX).then(|| (end - start).max(1).max(transmit))
}
