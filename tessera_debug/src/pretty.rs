// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use tessera_core::compound::CompoundId;
use tessera_core::report::Diagnostic;
use tessera_core::trace::{
    MaxFpsEvent, PassBeginEvent, PassEndEvent, PassKind, SplitAxis, SplitEvent, TargetTimeEvent,
    TraceSink, UsageEvent, ZoomEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn pass_name(pass: PassKind) -> &'static str {
    match pass {
        PassKind::Init => "init",
        PassKind::Exit => "exit",
        PassKind::UpdateData => "data",
        PassKind::UpdateOutput => "output",
        PassKind::UpdateInput => "input",
    }
}

fn axis_name(axis: SplitAxis) -> &'static str {
    match axis {
        SplitAxis::Vertical => "x",
        SplitAxis::Horizontal => "y",
        SplitAxis::Db => "db",
    }
}

fn compound(id: CompoundId) -> String {
    format!("#{}.{}", id.index(), id.generation())
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:begin] frame={} {} root={}",
            e.frame_number,
            pass_name(e.pass),
            compound(e.root),
        );
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:end] frame={} {} root={} visited={}",
            e.frame_number,
            pass_name(e.pass),
            compound(e.root),
            e.visited,
        );
    }

    fn on_split(&mut self, e: &SplitEvent) {
        let _ = writeln!(
            self.writer,
            "[split] frame={} {} {}={:.4} left={:.2}ms",
            e.frame_number,
            compound(e.compound),
            axis_name(e.axis),
            e.position,
            e.left_time,
        );
    }

    fn on_target_time(&mut self, e: &TargetTimeEvent) {
        let _ = writeln!(
            self.writer,
            "[target] frame={} {} usage={:.2} time={:.2}ms",
            e.frame_number,
            compound(e.compound),
            e.usage,
            e.time,
        );
    }

    fn on_zoom(&mut self, e: &ZoomEvent) {
        let _ = writeln!(
            self.writer,
            "[zoom] frame={} {} fps={:.1} zoom={:.3}x{:.3}",
            e.frame_number,
            compound(e.compound),
            e.fps,
            e.zoom.x,
            e.zoom.y,
        );
    }

    fn on_max_fps(&mut self, e: &MaxFpsEvent) {
        if e.max_fps == f32::MAX {
            let _ = writeln!(
                self.writer,
                "[max-fps] frame={} {} unlimited",
                e.frame_number,
                compound(e.compound),
            );
        } else {
            let _ = writeln!(
                self.writer,
                "[max-fps] frame={} {} {:.1}",
                e.frame_number,
                compound(e.compound),
                e.max_fps,
            );
        }
    }

    fn on_usage(&mut self, e: &UsageEvent) {
        let _ = writeln!(
            self.writer,
            "[usage] frame={} {} {:.2}",
            e.frame_number,
            compound(e.compound),
            e.usage,
        );
    }

    fn on_diagnostic(&mut self, frame_number: u32, diagnostic: &Diagnostic) {
        let line = match diagnostic {
            Diagnostic::DuplicateOutputFrame { compound: c, name } => {
                format!("{} duplicate output frame {name:?}", compound(*c))
            }
            Diagnostic::DuplicateOutputQueue { compound: c, name } => {
                format!("{} duplicate output queue {name:?}", compound(*c))
            }
            Diagnostic::EmptyOutputFrame { compound: c, name } => {
                format!("{} empty output frame {name:?}", compound(*c))
            }
            Diagnostic::MissingOutputFrame { compound: c, name } => {
                format!("{} no output frame {name:?}", compound(*c))
            }
            Diagnostic::MissingOutputQueue { compound: c, name } => {
                format!("{} no output queue {name:?}", compound(*c))
            }
            Diagnostic::UnassignedLoad {
                compound: c,
                leftover,
            } => format!("{} {leftover:.2}ms unassigned", compound(*c)),
        };
        let _ = writeln!(self.writer, "[diag] frame={frame_number} {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_writer()).unwrap()
    }

    #[test]
    fn pretty_print_pass() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        let root = CompoundId::from_raw(0, 1);
        sink.on_pass_end(&PassEndEvent {
            frame_number: 4,
            pass: PassKind::UpdateOutput,
            root,
            visited: 7,
        });
        let output = lines(sink);
        assert!(output.starts_with("[pass:end]"), "got: {output}");
        assert!(output.contains("frame=4 output root=#0.1 visited=7"), "got: {output}");
    }

    #[test]
    fn unlimited_frame_rate_is_spelled_out() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_max_fps(&MaxFpsEvent {
            frame_number: 2,
            compound: CompoundId::from_raw(3, 0),
            max_fps: f32::MAX,
        });
        let output = lines(sink);
        assert!(output.contains("unlimited"), "got: {output}");
    }

    #[test]
    fn diagnostics_name_the_frame() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_diagnostic(
            9,
            &Diagnostic::MissingOutputFrame {
                compound: CompoundId::from_raw(1, 0),
                name: String::from("left"),
            },
        );
        let output = lines(sink);
        assert_eq!(output, "[diag] frame=9 #1.0 no output frame \"left\"\n");
    }
}
