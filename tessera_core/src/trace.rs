// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for compound updates.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! update passes and equalizers call as they work. All method bodies default
//! to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::compound::CompoundId;
use crate::geometry::Zoom;
use crate::report::Diagnostic;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which traversal of the compound tree is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Task id assignment and initial inheritance.
    Init,
    /// Release of per-pass state and equalizer trees.
    Exit,
    /// Equalizer callbacks and inheritance recompute.
    UpdateData,
    /// Output frame, tile queue and swap barrier resolution.
    UpdateOutput,
    /// Input frame and tile queue linking.
    UpdateInput,
}

/// The axis a load equalizer split along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SplitAxis {
    /// Split along X: left and right halves.
    Vertical,
    /// Split along Y: bottom and top halves.
    Horizontal,
    /// Split the data range.
    Db,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a traversal starts.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Traversal.
    pub pass: PassKind,
    /// Root compound of the traversal.
    pub root: CompoundId,
}

/// Emitted when a traversal finishes.
#[derive(Clone, Copy, Debug)]
pub struct PassEndEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Traversal.
    pub pass: PassKind,
    /// Root compound of the traversal.
    pub root: CompoundId,
    /// Number of compounds visited.
    pub visited: u32,
}

/// Emitted for every split position a load equalizer computes.
#[derive(Clone, Copy, Debug)]
pub struct SplitEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Compound owning the equalizer.
    pub compound: CompoundId,
    /// Split axis.
    pub axis: SplitAxis,
    /// Split position in the parent's coordinates.
    pub position: f64,
    /// Target time of the left side, in milliseconds.
    pub left_time: f64,
}

/// Emitted for every leaf target time a load equalizer assigns.
#[derive(Clone, Copy, Debug)]
pub struct TargetTimeEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Leaf compound.
    pub compound: CompoundId,
    /// Usage of the leaf.
    pub usage: f64,
    /// Target time, in milliseconds.
    pub time: f64,
}

/// Emitted when a DFR equalizer adjusts the zoom.
#[derive(Clone, Copy, Debug)]
pub struct ZoomEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Zoomed compound.
    pub compound: CompoundId,
    /// Measured frame rate.
    pub fps: f64,
    /// New zoom.
    pub zoom: Zoom,
}

/// Emitted when a framerate equalizer updates the frame rate cap.
#[derive(Clone, Copy, Debug)]
pub struct MaxFpsEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Capped compound.
    pub compound: CompoundId,
    /// New cap, `f32::MAX` when unlimited.
    pub max_fps: f32,
}

/// Emitted when a view equalizer assigns a usage.
#[derive(Clone, Copy, Debug)]
pub struct UsageEvent {
    /// Frame being updated.
    pub frame_number: u32,
    /// Leaf compound.
    pub compound: CompoundId,
    /// Assigned usage.
    pub usage: f32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from compound updates.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a traversal starts.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called when a traversal finishes.
    fn on_pass_end(&mut self, e: &PassEndEvent) {
        _ = e;
    }

    /// Called for every load equalizer split.
    fn on_split(&mut self, e: &SplitEvent) {
        _ = e;
    }

    /// Called for every leaf target time.
    fn on_target_time(&mut self, e: &TargetTimeEvent) {
        _ = e;
    }

    /// Called when a DFR equalizer changes the zoom.
    fn on_zoom(&mut self, e: &ZoomEvent) {
        _ = e;
    }

    /// Called when a framerate equalizer changes the cap.
    fn on_max_fps(&mut self, e: &MaxFpsEvent) {
        _ = e;
    }

    /// Called when a view equalizer assigns a usage.
    fn on_usage(&mut self, e: &UsageEvent) {
        _ = e;
    }

    /// Called for every recoverable problem.
    fn on_diagnostic(&mut self, frame_number: u32, diagnostic: &Diagnostic) {
        _ = (frame_number, diagnostic);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PassBeginEvent`].
    #[inline]
    pub fn pass_begin(&mut self, e: &PassBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pass_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PassEndEvent`].
    #[inline]
    pub fn pass_end(&mut self, e: &PassEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pass_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SplitEvent`].
    #[inline]
    pub fn split(&mut self, e: &SplitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_split(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TargetTimeEvent`].
    #[inline]
    pub fn target_time(&mut self, e: &TargetTimeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_target_time(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ZoomEvent`].
    #[inline]
    pub fn zoom(&mut self, e: &ZoomEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_zoom(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`MaxFpsEvent`].
    #[inline]
    pub fn max_fps(&mut self, e: &MaxFpsEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_max_fps(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`UsageEvent`].
    #[inline]
    pub fn usage(&mut self, e: &UsageEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_usage(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a diagnostic.
    #[inline]
    pub fn diagnostic(&mut self, frame_number: u32, diagnostic: &Diagnostic) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_diagnostic(frame_number, diagnostic);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (frame_number, diagnostic);
        }
    }
}
