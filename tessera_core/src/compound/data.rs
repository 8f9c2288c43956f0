// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configured and inherited per-compound parameters.
//!
//! [`CompoundData`] is what a caller (or an equalizer) sets on a compound.
//! Every optional field means "inherit from the parent" when `None`.
//! [`InheritData`] is the fully resolved snapshot derived from the parent's
//! snapshot and the compound's own data. It is recomputed from scratch on
//! every inheritance pass and never edited anywhere else.

use crate::attributes::{Buffers, ColorMask, Eyes, StereoMode, Tasks};
use crate::frustum::{Frustum, FrustumData};
use crate::geometry::{Overdraw, Pixel, PixelViewport, Range, SubPixel, Viewport, Zoom};
use crate::resources::ChannelId;

/// Parameters configured on a compound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompoundData {
    /// Channel the compound renders on.
    pub channel: Option<ChannelId>,
    /// Fractional 2D restriction relative to the parent.
    pub viewport: Viewport,
    /// Data range restriction relative to the parent.
    pub range: Range,
    /// Pixel-interleave decomposition.
    pub pixel: Pixel,
    /// Sub-pixel (anti-aliasing) decomposition.
    pub sub_pixel: SubPixel,
    /// Resolution scale.
    pub zoom: Zoom,
    /// Frustum override. [`FrustumType::None`](crate::frustum::FrustumType::None)
    /// inherits.
    pub frustum: Frustum,
    /// Eye passes, `None` to inherit.
    pub eyes: Option<Eyes>,
    /// Tasks, `None` for the default set.
    pub tasks: Option<Tasks>,
    /// Frame buffer attachments, `None` to inherit.
    pub buffers: Option<Buffers>,
    /// Time-multiplex period, `None` to inherit.
    pub period: Option<u32>,
    /// Time-multiplex phase, `None` to inherit.
    pub phase: Option<u32>,
    /// Stereo mode, `None` to inherit.
    pub stereo_mode: Option<StereoMode>,
    /// Anaglyph mask for the left eye, `None` to inherit.
    pub left_mask: Option<ColorMask>,
    /// Anaglyph mask for the right eye, `None` to inherit.
    pub right_mask: Option<ColorMask>,
    /// Frame rate cap.
    pub max_fps: f32,
    /// Per-eye activation counts of a destination compound.
    pub active: [u32; 3],
}

impl Default for CompoundData {
    fn default() -> Self {
        Self {
            channel: None,
            viewport: Viewport::FULL,
            range: Range::ALL,
            pixel: Pixel::ALL,
            sub_pixel: SubPixel::ALL,
            zoom: Zoom::NONE,
            frustum: Frustum::default(),
            eyes: None,
            tasks: None,
            buffers: None,
            period: None,
            phase: None,
            stereo_mode: None,
            left_mask: None,
            right_mask: None,
            max_fps: f32::MAX,
            active: [1; 3],
        }
    }
}

/// Parameters resolved for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InheritData {
    /// Destination or source channel the compound renders on.
    pub channel: Option<ChannelId>,
    /// Pixel viewport on the inherited channel, with overdraw.
    pub pvp: PixelViewport,
    /// Remaining overdraw of this compound's pixel viewport.
    pub overdraw: Overdraw,
    /// Fractional viewport relative to the destination.
    pub viewport: Viewport,
    /// Data range.
    pub range: Range,
    /// Pixel decomposition.
    pub pixel: Pixel,
    /// Sub-pixel decomposition.
    pub sub_pixel: SubPixel,
    /// Effective zoom, back-computed from the rounded pixel viewports.
    pub zoom: Zoom,
    /// Plane transform of the destination frustum.
    pub frustum_data: FrustumData,
    /// Eye passes.
    pub eyes: Eyes,
    /// Tasks to execute this frame.
    pub tasks: Tasks,
    /// Frame buffer attachments.
    pub buffers: Buffers,
    /// Time-multiplex period.
    pub period: u32,
    /// Time-multiplex phase.
    pub phase: u32,
    /// Resolved stereo mode.
    pub stereo_mode: StereoMode,
    /// Anaglyph mask for the left eye.
    pub left_mask: ColorMask,
    /// Anaglyph mask for the right eye.
    pub right_mask: ColorMask,
    /// Frame rate cap.
    pub max_fps: f32,
    /// Per-eye activity this frame.
    pub active: [bool; 3],
}

impl Default for InheritData {
    fn default() -> Self {
        Self {
            channel: None,
            pvp: PixelViewport::INVALID,
            overdraw: Overdraw::ZERO,
            viewport: Viewport::FULL,
            range: Range::ALL,
            pixel: Pixel::ALL,
            sub_pixel: SubPixel::ALL,
            zoom: Zoom::NONE,
            frustum_data: FrustumData::INVALID,
            eyes: Eyes::empty(),
            tasks: Tasks::empty(),
            buffers: Buffers::COLOR,
            period: 1,
            phase: 0,
            stereo_mode: StereoMode::Auto,
            left_mask: ColorMask::RED,
            right_mask: ColorMask::GREEN.union(ColorMask::BLUE),
            max_fps: f32::MAX,
            active: [false; 3],
        }
    }
}

impl InheritData {
    /// Returns `true` if any eye is active.
    #[inline]
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.active.iter().any(|a| *a)
    }
}
