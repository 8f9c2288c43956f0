// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Image transfer descriptors.
//!
//! A compound reads back pixels into its output [`Frame`]s and assembles the
//! input [`Frame`]s of its children. Frames are matched by name: during the
//! output pass every output frame registers under its name, and the input
//! pass links every input frame to the output frame of the same name.
//!
//! The per-frame result of the output pass lives in [`FrameData`]. It is
//! regenerated with [`Frame::cycle_data`] every frame and cleared with
//! [`Frame::unset_data`] when the frame cannot be used.

use alloc::string::String;
use alloc::vec::Vec;

use crate::attributes::Buffers;
use crate::compound::{CompoundId, RenderContext};
use crate::geometry::{PixelViewport, Viewport, Zoom};

/// Storage used to transport a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameKind {
    /// Read back to main memory.
    #[default]
    Memory,
    /// Copied to a texture on the same GPU.
    Texture,
}

/// Addresses a frame owned by a compound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRef {
    /// Owning compound.
    pub compound: CompoundId,
    /// Index into the compound's input or output frame list.
    pub index: usize,
}

/// Geometry of one frame's pixels, produced by the output pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameData {
    /// Frame this data was produced for.
    pub frame_number: u32,
    /// Pixel viewport of the read back region, relative to the source
    /// compound's pixel viewport.
    pub pvp: PixelViewport,
    /// Position of the image on the destination.
    pub offset: (i32, i32),
    /// Buffers to read back.
    pub buffers: Buffers,
    /// Transport storage.
    pub kind: FrameKind,
    /// Zoom applied during readback.
    pub zoom: Zoom,
    /// Render context of the producing compound.
    pub context: RenderContext,
}

/// A named image transfer between compounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Name used to match input and output frames.
    pub name: String,
    /// Region of the compound to read back.
    pub viewport: Viewport,
    /// Buffers, `None` to use the compound's inherited buffers.
    pub buffers: Option<Buffers>,
    /// Transport storage.
    pub kind: FrameKind,
    /// Explicit zoom, `None` to derive it from the compound.
    pub native_zoom: Option<Zoom>,

    zoom: Zoom,
    offset: (i32, i32),
    data: Option<FrameData>,
    source: Option<FrameRef>,
    inputs: Vec<FrameRef>,
}

impl Frame {
    /// Creates a full-viewport memory frame.
    ///
    /// An empty name is replaced by a default derived from the compound when
    /// the frame is added.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            viewport: Viewport::FULL,
            buffers: None,
            kind: FrameKind::Memory,
            native_zoom: None,
            zoom: Zoom::NONE,
            offset: (0, 0),
            data: None,
            source: None,
            inputs: Vec::new(),
        }
    }

    /// Restricts the frame to `viewport`.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Sets the buffers to transport.
    #[must_use]
    pub fn with_buffers(mut self, buffers: Buffers) -> Self {
        self.buffers = Some(buffers);
        self
    }

    /// Sets the transport storage.
    #[must_use]
    pub fn with_kind(mut self, kind: FrameKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets an explicit zoom.
    #[must_use]
    pub fn with_zoom(mut self, zoom: Zoom) -> Self {
        self.native_zoom = Some(zoom);
        self
    }

    /// Zoom resolved for this frame.
    #[must_use]
    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    /// Offset resolved for this frame.
    #[must_use]
    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    /// Data of the current frame, `None` if the frame is unused.
    #[must_use]
    pub fn data(&self) -> Option<&FrameData> {
        self.data.as_ref()
    }

    /// Output frame an input frame was linked to.
    #[must_use]
    pub fn source(&self) -> Option<FrameRef> {
        self.source
    }

    /// Input frames linked to an output frame.
    #[must_use]
    pub fn inputs(&self) -> &[FrameRef] {
        &self.inputs
    }

    pub(crate) fn set_zoom(&mut self, zoom: Zoom) {
        self.zoom = zoom;
    }

    pub(crate) fn set_offset(&mut self, offset: (i32, i32)) {
        self.offset = offset;
    }

    pub(crate) fn set_source(&mut self, source: FrameRef) {
        self.source = Some(source);
    }

    pub(crate) fn add_input(&mut self, input: FrameRef) {
        self.inputs.push(input);
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut FrameData> {
        self.data.as_mut()
    }

    /// Starts a new version of the frame data for `frame_number`.
    pub fn cycle_data(&mut self, data: FrameData) {
        self.data = Some(data);
        self.source = None;
        self.inputs.clear();
    }

    /// Marks the frame unused for the current frame.
    pub fn unset_data(&mut self) {
        self.data = None;
        self.source = None;
        self.inputs.clear();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(frame_number: u32) -> FrameData {
        FrameData {
            frame_number,
            pvp: PixelViewport::new(0, 0, 10, 10),
            offset: (0, 0),
            buffers: Buffers::COLOR,
            kind: FrameKind::Memory,
            zoom: Zoom::NONE,
            context: RenderContext::default(),
        }
    }

    #[test]
    fn cycle_replaces_links() {
        let mut store = crate::compound::CompoundStore::new();
        let c = store.create_compound();
        let mut frame = Frame::new("f").with_buffers(Buffers::COLOR | Buffers::DEPTH);
        frame.cycle_data(data(1));
        frame.add_input(FrameRef {
            compound: c,
            index: 0,
        });
        assert_eq!(frame.inputs().len(), 1);
        frame.cycle_data(data(2));
        assert!(frame.inputs().is_empty());
        assert_eq!(frame.data().map(|d| d.frame_number), Some(2));
    }

    #[test]
    fn unset_clears_data() {
        let mut frame = Frame::new("f");
        frame.cycle_data(data(1));
        frame.unset_data();
        assert!(frame.data().is_none());
        assert!(frame.source().is_none());
    }
}
