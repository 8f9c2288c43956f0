// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interfaces to the channels, views, segments and windows a compound tree
//! renders to.
//!
//! The compound tree never owns these resources. It addresses them through
//! small `Copy` ids and resolves them through a [`Resources`] implementation
//! supplied to each update. [`StaticResources`] is a plain in-memory
//! implementation for tests, simulators, and applications that keep their
//! configuration in a single place.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::attributes::{Eye, Eyes};
use crate::frustum::Frustum;
use crate::geometry::{Overdraw, PixelViewport, Vec3, Viewport};
use crate::swap_barrier::SwapBarrier;
use crate::transform::Transform3d;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

resource_id!(
    /// Identifies a render channel.
    ChannelId
);
resource_id!(
    /// Identifies a view.
    ViewId
);
resource_id!(
    /// Identifies a display segment.
    SegmentId
);
resource_id!(
    /// Identifies a window.
    WindowId
);
resource_id!(
    /// Identifies a pipe (GPU).
    PipeId
);
resource_id!(
    /// Identifies a distributed swap barrier.
    BarrierId
);

/// A render target: a viewport inside a window on one pipe.
pub trait Channel {
    /// Human-readable name, used for default frame and queue names.
    fn name(&self) -> &str;

    /// On-screen pixel viewport, without overdraw.
    fn pixel_viewport(&self) -> PixelViewport;

    /// Fractional viewport inside the window.
    fn viewport(&self) -> Viewport;

    /// Current per-side overdraw.
    fn overdraw(&self) -> Overdraw;

    /// Maximum pixel size including overdraw. `(0, 0)` means unlimited.
    fn max_size(&self) -> (i32, i32);

    /// Returns `false` after a runtime failure.
    fn is_running(&self) -> bool;

    /// The view this channel displays, if it is a destination channel.
    fn view(&self) -> Option<ViewId>;

    /// The display segment this channel belongs to.
    fn segment(&self) -> Option<SegmentId>;

    /// The window holding this channel.
    fn window(&self) -> WindowId;

    /// The pipe rendering this channel.
    fn pipe(&self) -> PipeId;

    /// Returns `true` if this channel can render `view`.
    fn supports_view(&self, view: Option<ViewId>) -> bool {
        _ = view;
        true
    }

    /// Near and far plane distances.
    fn near_far(&self) -> (f64, f64) {
        (0.1, 100.0)
    }
}

/// A tracked viewer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observer {
    /// Eye positions in world space, indexed by [`Eye::index`].
    pub eye_world: [Vec3; 3],
    /// Eye positions relative to the head, indexed by [`Eye::index`].
    pub eye_relative: [Vec3; 3],
    /// Inverse of the tracked head matrix.
    pub inverse_head_matrix: Transform3d,
}

impl Observer {
    /// Creates an untracked observer with eyes `eye_base` apart.
    #[must_use]
    pub fn with_eye_base(eye_base: f64) -> Self {
        let half = 0.5 * eye_base;
        let eyes = [
            Vec3::ZERO,
            Vec3::new(-half, 0.0, 0.0),
            Vec3::new(half, 0.0, 0.0),
        ];
        Self {
            eye_world: eyes,
            eye_relative: eyes,
            inverse_head_matrix: Transform3d::IDENTITY,
        }
    }

    /// World-space position of `eye`.
    #[must_use]
    pub fn eye_world(&self, eye: Eye) -> Vec3 {
        self.eye_world[eye.index()]
    }

    /// Head-relative position of `eye`.
    #[must_use]
    pub fn eye_relative(&self, eye: Eye) -> Vec3 {
        self.eye_relative[eye.index()]
    }
}

/// A logical view onto the scene, possibly spanning several segments.
pub trait View {
    /// The view frustum. [`FrustumType::None`](crate::frustum::FrustumType::None)
    /// defers to the segments.
    fn frustum(&self) -> &Frustum;

    /// Fractional viewport of the view on its canvas.
    fn viewport(&self) -> Viewport;

    /// Horizontal and vertical overdraw in pixels for edge blending.
    fn overdraw(&self) -> [i32; 2];

    /// Tracked viewer, if any.
    fn observer(&self) -> Option<&Observer>;

    /// Scale from model units to meters.
    fn model_unit(&self) -> f64 {
        1.0
    }

    /// Focus distance correction applied to the wall.
    fn focus_ratio(&self) -> f64 {
        1.0
    }
}

/// One display surface of a canvas.
pub trait Segment {
    /// Fractional viewport of the segment on its canvas.
    fn viewport(&self) -> Viewport;

    /// The segment frustum, already inherited from its canvas if unset.
    fn frustum(&self) -> &Frustum;

    /// Eye passes the segment displays.
    fn eyes(&self) -> Eyes;

    /// The output channel of this segment.
    fn channel(&self) -> Option<ChannelId>;
}

/// A drawable.
pub trait Window {
    /// Returns `true` for a quad-buffered stereo drawable.
    fn is_stereo(&self) -> bool;

    /// Returns `true` if the drawable is an offscreen framebuffer object.
    fn uses_fbo(&self) -> bool;

    /// Returns `true` if the window already joined a hardware swap group.
    fn has_nv_swap_barrier(&self) -> bool;
}

/// Resolves resource ids and performs the few mutations the compound tree
/// needs.
pub trait Resources {
    /// Looks up a channel.
    fn channel(&self, id: ChannelId) -> Option<&dyn Channel>;

    /// Looks up a view.
    fn view(&self, id: ViewId) -> Option<&dyn View>;

    /// Looks up a segment.
    fn segment(&self, id: SegmentId) -> Option<&dyn Segment>;

    /// Looks up a window.
    fn window(&self, id: WindowId) -> Option<&dyn Window>;

    /// Stores the overdraw computed for a destination channel.
    fn set_overdraw(&mut self, channel: ChannelId, overdraw: Overdraw);

    /// Joins `window` to a software swap barrier.
    ///
    /// Creates a new barrier when `barrier` is `None`. Returns the barrier
    /// joined.
    fn join_swap_barrier(&mut self, window: WindowId, barrier: Option<BarrierId>) -> BarrierId;

    /// Joins `window` to the hardware swap group described by `swap_barrier`,
    /// protected by a software barrier created on demand.
    fn join_nv_swap_barrier(
        &mut self,
        window: WindowId,
        swap_barrier: &SwapBarrier,
        barrier: Option<BarrierId>,
    ) -> BarrierId;

    /// Number of frames the configuration may run ahead.
    fn latency(&self) -> u32 {
        1
    }

    /// Last frame finished by every node.
    fn finished_frame(&self) -> u32 {
        0
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// A channel with fixed properties.
#[derive(Clone, Debug)]
pub struct StaticChannel {
    /// Channel name.
    pub name: String,
    /// On-screen pixel viewport.
    pub pixel_viewport: PixelViewport,
    /// Fractional viewport in the window.
    pub viewport: Viewport,
    /// Current overdraw.
    pub overdraw: Overdraw,
    /// Maximum size, `(0, 0)` for unlimited.
    pub max_size: (i32, i32),
    /// Runtime state.
    pub running: bool,
    /// Displayed view.
    pub view: Option<ViewId>,
    /// Owning segment.
    pub segment: Option<SegmentId>,
    /// Owning window.
    pub window: WindowId,
    /// Owning pipe.
    pub pipe: PipeId,
    /// Near and far planes.
    pub near_far: (f64, f64),
}

impl StaticChannel {
    /// Creates a running channel with the given pixel viewport.
    #[must_use]
    pub fn new(name: impl Into<String>, pixel_viewport: PixelViewport) -> Self {
        Self {
            name: name.into(),
            pixel_viewport,
            viewport: Viewport::FULL,
            overdraw: Overdraw::ZERO,
            max_size: (0, 0),
            running: true,
            view: None,
            segment: None,
            window: WindowId(0),
            pipe: PipeId(0),
            near_far: (0.1, 100.0),
        }
    }

    /// Places the channel on `window` and `pipe`.
    #[must_use]
    pub fn on(mut self, window: WindowId, pipe: PipeId) -> Self {
        self.window = window;
        self.pipe = pipe;
        self
    }

    /// Makes the channel display `view` on `segment`.
    #[must_use]
    pub fn displaying(mut self, view: ViewId, segment: SegmentId) -> Self {
        self.view = Some(view);
        self.segment = Some(segment);
        self
    }
}

impl Channel for StaticChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn pixel_viewport(&self) -> PixelViewport {
        self.pixel_viewport
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn overdraw(&self) -> Overdraw {
        self.overdraw
    }

    fn max_size(&self) -> (i32, i32) {
        self.max_size
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn view(&self) -> Option<ViewId> {
        self.view
    }

    fn segment(&self) -> Option<SegmentId> {
        self.segment
    }

    fn window(&self) -> WindowId {
        self.window
    }

    fn pipe(&self) -> PipeId {
        self.pipe
    }

    fn near_far(&self) -> (f64, f64) {
        self.near_far
    }
}

/// A view with fixed properties.
#[derive(Clone, Debug, Default)]
pub struct StaticView {
    /// View frustum.
    pub frustum: Frustum,
    /// Viewport on the canvas.
    pub viewport: Viewport,
    /// Edge-blend overdraw.
    pub overdraw: [i32; 2],
    /// Tracked viewer.
    pub observer: Option<Observer>,
    /// Model unit.
    pub model_unit: f64,
    /// Focus ratio.
    pub focus_ratio: f64,
}

impl StaticView {
    /// Creates a full-canvas view without its own frustum.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model_unit: 1.0,
            focus_ratio: 1.0,
            ..Self::default()
        }
    }
}

impl View for StaticView {
    fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn overdraw(&self) -> [i32; 2] {
        self.overdraw
    }

    fn observer(&self) -> Option<&Observer> {
        self.observer.as_ref()
    }

    fn model_unit(&self) -> f64 {
        self.model_unit
    }

    fn focus_ratio(&self) -> f64 {
        self.focus_ratio
    }
}

/// A segment with fixed properties.
#[derive(Clone, Debug)]
pub struct StaticSegment {
    /// Viewport on the canvas.
    pub viewport: Viewport,
    /// Segment frustum.
    pub frustum: Frustum,
    /// Displayed eyes.
    pub eyes: Eyes,
    /// Output channel.
    pub channel: Option<ChannelId>,
}

impl StaticSegment {
    /// Creates a monoscopic full-canvas segment with `frustum`.
    #[must_use]
    pub fn new(frustum: Frustum, channel: ChannelId) -> Self {
        Self {
            viewport: Viewport::FULL,
            frustum,
            eyes: Eyes::CYCLOP,
            channel: Some(channel),
        }
    }
}

impl Segment for StaticSegment {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    fn eyes(&self) -> Eyes {
        self.eyes
    }

    fn channel(&self) -> Option<ChannelId> {
        self.channel
    }
}

/// A window with fixed capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StaticWindow {
    /// Quad-buffered stereo drawable.
    pub stereo: bool,
    /// Offscreen drawable.
    pub fbo: bool,
    /// Already in a hardware swap group.
    pub nv_swap_barrier: bool,
}

impl Window for StaticWindow {
    fn is_stereo(&self) -> bool {
        self.stereo
    }

    fn uses_fbo(&self) -> bool {
        self.fbo
    }

    fn has_nv_swap_barrier(&self) -> bool {
        self.nv_swap_barrier
    }
}

/// A swap-barrier join recorded by [`StaticResources`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrierJoin {
    /// Joining window.
    pub window: WindowId,
    /// Joined barrier.
    pub barrier: BarrierId,
    /// Whether this was a hardware swap group join.
    pub nv: bool,
}

/// In-memory [`Resources`] keyed by id.
#[derive(Clone, Debug, Default)]
pub struct StaticResources {
    /// Channels.
    pub channels: BTreeMap<ChannelId, StaticChannel>,
    /// Views.
    pub views: BTreeMap<ViewId, StaticView>,
    /// Segments.
    pub segments: BTreeMap<SegmentId, StaticSegment>,
    /// Windows.
    pub windows: BTreeMap<WindowId, StaticWindow>,
    /// Every swap-barrier join, in order.
    pub joins: Vec<BarrierJoin>,
    /// Number of barriers created.
    pub barriers_created: u32,
    /// Reported latency.
    pub latency: u32,
    /// Reported finished frame.
    pub finished_frame: u32,
}

impl StaticResources {
    /// Creates empty resources with a latency of one frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latency: 1,
            ..Self::default()
        }
    }

    /// Adds a channel, creating a default window for it if needed.
    pub fn add_channel(&mut self, id: ChannelId, channel: StaticChannel) -> &mut Self {
        self.windows.entry(channel.window).or_default();
        self.channels.insert(id, channel);
        self
    }

    /// Adds a view.
    pub fn add_view(&mut self, id: ViewId, view: StaticView) -> &mut Self {
        self.views.insert(id, view);
        self
    }

    /// Adds a segment.
    pub fn add_segment(&mut self, id: SegmentId, segment: StaticSegment) -> &mut Self {
        self.segments.insert(id, segment);
        self
    }

    /// Adds or replaces a window.
    pub fn add_window(&mut self, id: WindowId, window: StaticWindow) -> &mut Self {
        self.windows.insert(id, window);
        self
    }

    /// Returns a channel for mutation.
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut StaticChannel> {
        self.channels.get_mut(&id)
    }

    fn next_barrier(&mut self) -> BarrierId {
        let id = BarrierId(self.barriers_created);
        self.barriers_created += 1;
        id
    }
}

impl Resources for StaticResources {
    fn channel(&self, id: ChannelId) -> Option<&dyn Channel> {
        self.channels.get(&id).map(|c| c as &dyn Channel)
    }

    fn view(&self, id: ViewId) -> Option<&dyn View> {
        self.views.get(&id).map(|v| v as &dyn View)
    }

    fn segment(&self, id: SegmentId) -> Option<&dyn Segment> {
        self.segments.get(&id).map(|s| s as &dyn Segment)
    }

    fn window(&self, id: WindowId) -> Option<&dyn Window> {
        self.windows.get(&id).map(|w| w as &dyn Window)
    }

    fn set_overdraw(&mut self, channel: ChannelId, overdraw: Overdraw) {
        if let Some(c) = self.channels.get_mut(&channel) {
            c.overdraw = overdraw;
        }
    }

    fn join_swap_barrier(&mut self, window: WindowId, barrier: Option<BarrierId>) -> BarrierId {
        let barrier = barrier.unwrap_or_else(|| self.next_barrier());
        self.joins.push(BarrierJoin {
            window,
            barrier,
            nv: false,
        });
        barrier
    }

    fn join_nv_swap_barrier(
        &mut self,
        window: WindowId,
        swap_barrier: &SwapBarrier,
        barrier: Option<BarrierId>,
    ) -> BarrierId {
        _ = swap_barrier;
        let barrier = barrier.unwrap_or_else(|| self.next_barrier());
        if let Some(w) = self.windows.get_mut(&window) {
            w.nv_swap_barrier = true;
        }
        self.joins.push(BarrierJoin {
            window,
            barrier,
            nv: true,
        });
        barrier
    }

    fn latency(&self) -> u32 {
        self.latency
    }

    fn finished_frame(&self) -> u32 {
        self.finished_frame
    }
}
