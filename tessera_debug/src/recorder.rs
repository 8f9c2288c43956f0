// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records. [`decode`] reads them back as an
//! iterator of [`RecordedEvent`].
//!
//! Compound handles are stored as index and generation. Diagnostic names are
//! stored length-prefixed as UTF-8.

use tessera_core::compound::CompoundId;
use tessera_core::geometry::Zoom;
use tessera_core::report::Diagnostic;
use tessera_core::trace::{
    MaxFpsEvent, PassBeginEvent, PassEndEvent, PassKind, SplitAxis, SplitEvent, TargetTimeEvent,
    TraceSink, UsageEvent, ZoomEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PASS_BEGIN: u8 = 1;
const TAG_PASS_END: u8 = 2;
const TAG_SPLIT: u8 = 3;
const TAG_TARGET_TIME: u8 = 4;
const TAG_ZOOM: u8 = 5;
const TAG_MAX_FPS: u8 = 6;
const TAG_USAGE: u8 = 7;
const TAG_DIAGNOSTIC: u8 = 8;

const DIAG_DUPLICATE_FRAME: u8 = 0;
const DIAG_DUPLICATE_QUEUE: u8 = 1;
const DIAG_EMPTY_FRAME: u8 = 2;
const DIAG_MISSING_FRAME: u8 = 3;
const DIAG_MISSING_QUEUE: u8 = 4;
const DIAG_UNASSIGNED_LOAD: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_compound(&mut self, id: CompoundId) {
        self.write_u32(id.index());
        self.write_u32(id.generation());
    }

    fn write_str(&mut self, s: &str) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "names longer than u32::MAX bytes are truncated for recording"
        )]
        let len = s.len().min(u32::MAX as usize) as u32;
        self.write_u32(len);
        self.buf.extend_from_slice(&s.as_bytes()[..len as usize]);
    }

    fn write_pass(&mut self, p: PassKind) {
        self.write_u8(match p {
            PassKind::Init => 0,
            PassKind::Exit => 1,
            PassKind::UpdateData => 2,
            PassKind::UpdateOutput => 3,
            PassKind::UpdateInput => 4,
        });
    }

    fn write_axis(&mut self, a: SplitAxis) {
        self.write_u8(match a {
            SplitAxis::Vertical => 0,
            SplitAxis::Horizontal => 1,
            SplitAxis::Db => 2,
        });
    }

    fn write_named(&mut self, kind: u8, compound: CompoundId, name: &str) {
        self.write_u8(kind);
        self.write_compound(compound);
        self.write_str(name);
    }
}

impl TraceSink for RecorderSink {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.write_u8(TAG_PASS_BEGIN);
        self.write_u32(e.frame_number);
        self.write_pass(e.pass);
        self.write_compound(e.root);
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.write_u8(TAG_PASS_END);
        self.write_u32(e.frame_number);
        self.write_pass(e.pass);
        self.write_compound(e.root);
        self.write_u32(e.visited);
    }

    fn on_split(&mut self, e: &SplitEvent) {
        self.write_u8(TAG_SPLIT);
        self.write_u32(e.frame_number);
        self.write_compound(e.compound);
        self.write_axis(e.axis);
        self.write_f64(e.position);
        self.write_f64(e.left_time);
    }

    fn on_target_time(&mut self, e: &TargetTimeEvent) {
        self.write_u8(TAG_TARGET_TIME);
        self.write_u32(e.frame_number);
        self.write_compound(e.compound);
        self.write_f64(e.usage);
        self.write_f64(e.time);
    }

    fn on_zoom(&mut self, e: &ZoomEvent) {
        self.write_u8(TAG_ZOOM);
        self.write_u32(e.frame_number);
        self.write_compound(e.compound);
        self.write_f64(e.fps);
        self.write_f64(e.zoom.x);
        self.write_f64(e.zoom.y);
    }

    fn on_max_fps(&mut self, e: &MaxFpsEvent) {
        self.write_u8(TAG_MAX_FPS);
        self.write_u32(e.frame_number);
        self.write_compound(e.compound);
        self.write_f32(e.max_fps);
    }

    fn on_usage(&mut self, e: &UsageEvent) {
        self.write_u8(TAG_USAGE);
        self.write_u32(e.frame_number);
        self.write_compound(e.compound);
        self.write_f32(e.usage);
    }

    fn on_diagnostic(&mut self, frame_number: u32, diagnostic: &Diagnostic) {
        self.write_u8(TAG_DIAGNOSTIC);
        self.write_u32(frame_number);
        match diagnostic {
            Diagnostic::DuplicateOutputFrame { compound, name } => {
                self.write_named(DIAG_DUPLICATE_FRAME, *compound, name);
            }
            Diagnostic::DuplicateOutputQueue { compound, name } => {
                self.write_named(DIAG_DUPLICATE_QUEUE, *compound, name);
            }
            Diagnostic::EmptyOutputFrame { compound, name } => {
                self.write_named(DIAG_EMPTY_FRAME, *compound, name);
            }
            Diagnostic::MissingOutputFrame { compound, name } => {
                self.write_named(DIAG_MISSING_FRAME, *compound, name);
            }
            Diagnostic::MissingOutputQueue { compound, name } => {
                self.write_named(DIAG_MISSING_QUEUE, *compound, name);
            }
            Diagnostic::UnassignedLoad { compound, leftover } => {
                self.write_u8(DIAG_UNASSIGNED_LOAD);
                self.write_compound(*compound);
                self.write_f64(*leftover);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PassBeginEvent`].
    PassBegin(PassBeginEvent),
    /// A [`PassEndEvent`].
    PassEnd(PassEndEvent),
    /// A [`SplitEvent`].
    Split(SplitEvent),
    /// A [`TargetTimeEvent`].
    TargetTime(TargetTimeEvent),
    /// A [`ZoomEvent`].
    Zoom(ZoomEvent),
    /// A [`MaxFpsEvent`].
    MaxFps(MaxFpsEvent),
    /// A [`UsageEvent`].
    Usage(UsageEvent),
    /// A [`Diagnostic`] and the frame it was reported in.
    Diagnostic {
        /// Updated frame.
        frame_number: u32,
        /// The diagnostic.
        diagnostic: Diagnostic,
    },
}

impl RecordedEvent {
    /// The frame the event belongs to.
    #[must_use]
    pub fn frame_number(&self) -> u32 {
        match self {
            Self::PassBegin(e) => e.frame_number,
            Self::PassEnd(e) => e.frame_number,
            Self::Split(e) => e.frame_number,
            Self::TargetTime(e) => e.frame_number,
            Self::Zoom(e) => e.frame_number,
            Self::MaxFps(e) => e.frame_number,
            Self::Usage(e) => e.frame_number,
            Self::Diagnostic { frame_number, .. } => *frame_number,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        if self.data.len() - self.pos < n {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_f32(&mut self) -> Option<f32> {
        Some(f32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_f64(&mut self) -> Option<f64> {
        Some(f64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_compound(&mut self) -> Option<CompoundId> {
        let index = self.read_u32()?;
        let generation = self.read_u32()?;
        Some(CompoundId::from_raw(index, generation))
    }

    fn read_string(&mut self) -> Option<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).ok()
    }

    fn read_pass(&mut self) -> Option<PassKind> {
        Some(match self.read_u8()? {
            0 => PassKind::Init,
            1 => PassKind::Exit,
            2 => PassKind::UpdateData,
            3 => PassKind::UpdateOutput,
            _ => PassKind::UpdateInput,
        })
    }

    fn read_axis(&mut self) -> Option<SplitAxis> {
        Some(match self.read_u8()? {
            0 => SplitAxis::Vertical,
            1 => SplitAxis::Horizontal,
            _ => SplitAxis::Db,
        })
    }

    fn decode_pass_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassBegin(PassBeginEvent {
            frame_number: self.read_u32()?,
            pass: self.read_pass()?,
            root: self.read_compound()?,
        }))
    }

    fn decode_pass_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassEnd(PassEndEvent {
            frame_number: self.read_u32()?,
            pass: self.read_pass()?,
            root: self.read_compound()?,
            visited: self.read_u32()?,
        }))
    }

    fn decode_split(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Split(SplitEvent {
            frame_number: self.read_u32()?,
            compound: self.read_compound()?,
            axis: self.read_axis()?,
            position: self.read_f64()?,
            left_time: self.read_f64()?,
        }))
    }

    fn decode_target_time(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TargetTime(TargetTimeEvent {
            frame_number: self.read_u32()?,
            compound: self.read_compound()?,
            usage: self.read_f64()?,
            time: self.read_f64()?,
        }))
    }

    fn decode_zoom(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Zoom(ZoomEvent {
            frame_number: self.read_u32()?,
            compound: self.read_compound()?,
            fps: self.read_f64()?,
            zoom: Zoom::new(self.read_f64()?, self.read_f64()?),
        }))
    }

    fn decode_max_fps(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::MaxFps(MaxFpsEvent {
            frame_number: self.read_u32()?,
            compound: self.read_compound()?,
            max_fps: self.read_f32()?,
        }))
    }

    fn decode_usage(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Usage(UsageEvent {
            frame_number: self.read_u32()?,
            compound: self.read_compound()?,
            usage: self.read_f32()?,
        }))
    }

    fn decode_diagnostic(&mut self) -> Option<RecordedEvent> {
        let frame_number = self.read_u32()?;
        let kind = self.read_u8()?;
        let compound = self.read_compound()?;
        let diagnostic = match kind {
            DIAG_UNASSIGNED_LOAD => Diagnostic::UnassignedLoad {
                compound,
                leftover: self.read_f64()?,
            },
            _ => {
                let name = self.read_string()?;
                match kind {
                    DIAG_DUPLICATE_FRAME => Diagnostic::DuplicateOutputFrame { compound, name },
                    DIAG_DUPLICATE_QUEUE => Diagnostic::DuplicateOutputQueue { compound, name },
                    DIAG_EMPTY_FRAME => Diagnostic::EmptyOutputFrame { compound, name },
                    DIAG_MISSING_FRAME => Diagnostic::MissingOutputFrame { compound, name },
                    DIAG_MISSING_QUEUE => Diagnostic::MissingOutputQueue { compound, name },
                    _ => return None,
                }
            }
        };
        Some(RecordedEvent::Diagnostic {
            frame_number,
            diagnostic,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PASS_BEGIN => self.decode_pass_begin(),
            TAG_PASS_END => self.decode_pass_end(),
            TAG_SPLIT => self.decode_split(),
            TAG_TARGET_TIME => self.decode_target_time(),
            TAG_ZOOM => self.decode_zoom(),
            TAG_MAX_FPS => self.decode_max_fps(),
            TAG_USAGE => self.decode_usage(),
            TAG_DIAGNOSTIC => self.decode_diagnostic(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::compound::CompoundStore;
    use tessera_core::config::EngineConfig;
    use tessera_core::equalizer::{LoadBalancer, LoadBalancerMode};
    use tessera_core::frame::Frame;
    use tessera_core::geometry::PixelViewport;
    use tessera_core::resources::{ChannelId, StaticChannel, StaticResources};
    use tessera_core::trace::Tracer;

    const EPS: f64 = 1e-9;

    #[test]
    fn records_a_split() {
        let mut rec = RecorderSink::new();
        let compound = CompoundId::from_raw(4, 2);
        rec.on_split(&SplitEvent {
            frame_number: 11,
            compound,
            axis: SplitAxis::Horizontal,
            position: 0.375,
            left_time: 12.5,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Split(e) => {
                assert_eq!(e.frame_number, 11);
                assert_eq!(e.compound, compound);
                assert_eq!(e.axis, SplitAxis::Horizontal);
                assert!((e.position - 0.375).abs() < EPS);
                assert!((e.left_time - 12.5).abs() < EPS);
            }
            other => panic!("expected Split, got {other:?}"),
        }
    }

    #[test]
    fn diagnostics_keep_their_names() {
        let mut rec = RecorderSink::new();
        let compound = CompoundId::from_raw(1, 0);
        let missing = Diagnostic::MissingOutputQueue {
            compound,
            name: String::from("queue.wall"),
        };
        let leftover = Diagnostic::UnassignedLoad {
            compound,
            leftover: 3.5,
        };
        rec.on_diagnostic(2, &missing);
        rec.on_diagnostic(2, &leftover);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::Diagnostic {
                frame_number,
                diagnostic,
            } => {
                assert_eq!(*frame_number, 2);
                assert_eq!(diagnostic, &missing);
            }
            other => panic!("expected Diagnostic, got {other:?}"),
        }
        assert!(matches!(
            &events[1],
            RecordedEvent::Diagnostic { diagnostic, .. } if *diagnostic == leftover
        ));
    }

    #[test]
    fn truncated_recording_stops_cleanly() {
        let mut rec = RecorderSink::new();
        rec.on_usage(&UsageEvent {
            frame_number: 1,
            compound: CompoundId::from_raw(0, 0),
            usage: 0.5,
        });
        rec.on_usage(&UsageEvent {
            frame_number: 2,
            compound: CompoundId::from_raw(0, 0),
            usage: 1.0,
        });
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame_number(), 1);
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn records_a_load_balanced_update() {
        let mut res = StaticResources::new();
        res.add_channel(
            ChannelId(0),
            StaticChannel::new("dest", PixelViewport::new(0, 0, 640, 480)),
        );
        res.add_channel(
            ChannelId(1),
            StaticChannel::new("source", PixelViewport::new(0, 0, 640, 480)),
        );
        let mut store = CompoundStore::new();
        let root = store.create_compound();
        store.set_channel(root, Some(ChannelId(0)));
        store.create_child(root);
        let source = store.create_child(root);
        store.set_channel(source, Some(ChannelId(1)));
        store.add_input_frame(root, Frame::new("missing"));
        let config = EngineConfig::DEFAULT;
        store.add_equalizer(root, LoadBalancer::new(LoadBalancerMode::Vertical, &config));
        store.init(root, &mut res).unwrap();

        let mut rec = RecorderSink::new();
        let mut tracer = Tracer::new(&mut rec);
        store.update(root, 1, &mut res, &config, &mut tracer).unwrap();
        drop(tracer);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        let begins: Vec<PassKind> = events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::PassBegin(b) => Some(b.pass),
                _ => None,
            })
            .collect();
        assert_eq!(
            begins,
            [
                PassKind::UpdateData,
                PassKind::UpdateOutput,
                PassKind::UpdateInput
            ]
        );
        assert!(events.iter().any(|e| matches!(e, RecordedEvent::Split(_))));
        assert!(events.iter().any(|e| matches!(
            e,
            RecordedEvent::Diagnostic {
                diagnostic: Diagnostic::MissingOutputFrame { .. },
                ..
            }
        )));
        assert!(events.iter().all(|e| e.frame_number() == 1));
    }
}
