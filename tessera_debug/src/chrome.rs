// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Recorded events carry no wall-clock time. Each frame is laid out as a
//! [`FRAME_SPAN_US`] slot, with its events one microsecond apart in
//! recorded order, so passes nest and frames line up side by side.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use tessera_core::compound::CompoundId;
use tessera_core::report::Diagnostic;

use crate::recorder::{RecordedEvent, decode};

/// Width of one frame on the exported timeline, in microseconds.
pub const FRAME_SPAN_US: u64 = 10_000;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Pass events become duration events on thread 0; equalizer decisions
/// become counters and instants on the thread of their compound.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut clock = Clock::default();

    for recorded in decode(bytes) {
        let ts = clock.tick(recorded.frame_number());
        match recorded {
            RecordedEvent::PassBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.pass),
                    "cat": "Update",
                    "ts": ts,
                    "pid": e.root.index(),
                    "tid": 0,
                    "args": {
                        "frame_number": e.frame_number,
                    }
                }));
            }
            RecordedEvent::PassEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.pass),
                    "cat": "Update",
                    "ts": ts,
                    "pid": e.root.index(),
                    "tid": 0,
                    "args": {
                        "frame_number": e.frame_number,
                        "visited": e.visited,
                    }
                }));
            }
            RecordedEvent::Split(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Split",
                    "cat": "Load",
                    "ts": ts,
                    "pid": 0,
                    "tid": thread(e.compound),
                    "s": "t",
                    "args": {
                        "frame_number": e.frame_number,
                        "axis": format!("{:?}", e.axis),
                        "position": e.position,
                        "left_ms": e.left_time,
                    }
                }));
            }
            RecordedEvent::TargetTime(e) => {
                events.push(counter("TargetTime", ts, e.compound, json!({ "ms": e.time })));
            }
            RecordedEvent::Zoom(e) => {
                events.push(counter(
                    "Zoom",
                    ts,
                    e.compound,
                    json!({ "x": e.zoom.x, "y": e.zoom.y, "fps": e.fps }),
                ));
            }
            RecordedEvent::MaxFps(e) => {
                // Unlimited is exported as zero.
                let fps = if e.max_fps == f32::MAX {
                    0.0
                } else {
                    f64::from(e.max_fps)
                };
                events.push(counter("MaxFps", ts, e.compound, json!({ "fps": fps })));
            }
            RecordedEvent::Usage(e) => {
                events.push(counter(
                    "Usage",
                    ts,
                    e.compound,
                    json!({ "usage": f64::from(e.usage) }),
                ));
            }
            RecordedEvent::Diagnostic {
                frame_number,
                diagnostic,
            } => {
                let (name, compound, detail) = describe(&diagnostic);
                events.push(json!({
                    "ph": "i",
                    "name": name,
                    "cat": "Diagnostic",
                    "ts": ts,
                    "pid": 0,
                    "tid": thread(compound),
                    "s": "g",
                    "args": {
                        "frame_number": frame_number,
                        "detail": detail,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

/// Logical timeline: frame slots with one microsecond per event.
#[derive(Debug, Default)]
struct Clock {
    frame: Option<u32>,
    step: u64,
}

impl Clock {
    fn tick(&mut self, frame_number: u32) -> u64 {
        if self.frame != Some(frame_number) {
            self.frame = Some(frame_number);
            self.step = 0;
        }
        let ts = u64::from(frame_number) * FRAME_SPAN_US + self.step.min(FRAME_SPAN_US - 1);
        self.step += 1;
        ts
    }
}

fn thread(compound: CompoundId) -> u32 {
    compound.index() + 1
}

fn counter(name: &str, ts: u64, compound: CompoundId, args: Value) -> Value {
    json!({
        "ph": "C",
        "name": format!("{name} #{}", compound.index()),
        "cat": "Equalizer",
        "ts": ts,
        "pid": 0,
        "tid": thread(compound),
        "args": args,
    })
}

fn describe(diagnostic: &Diagnostic) -> (&'static str, CompoundId, Value) {
    match diagnostic {
        Diagnostic::DuplicateOutputFrame { compound, name } => {
            ("DuplicateOutputFrame", *compound, json!(name))
        }
        Diagnostic::DuplicateOutputQueue { compound, name } => {
            ("DuplicateOutputQueue", *compound, json!(name))
        }
        Diagnostic::EmptyOutputFrame { compound, name } => {
            ("EmptyOutputFrame", *compound, json!(name))
        }
        Diagnostic::MissingOutputFrame { compound, name } => {
            ("MissingOutputFrame", *compound, json!(name))
        }
        Diagnostic::MissingOutputQueue { compound, name } => {
            ("MissingOutputQueue", *compound, json!(name))
        }
        Diagnostic::UnassignedLoad { compound, leftover } => {
            ("UnassignedLoad", *compound, json!(leftover))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use tessera_core::trace::{PassBeginEvent, PassEndEvent, PassKind, TraceSink, UsageEvent};

    fn export_to_values(rec: &RecorderSink) -> Vec<Value> {
        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        serde_json::from_str(&json_str).unwrap()
    }

    #[test]
    fn export_produces_valid_json() {
        let root = CompoundId::from_raw(0, 0);
        let mut rec = RecorderSink::new();
        rec.on_pass_begin(&PassBeginEvent {
            frame_number: 3,
            pass: PassKind::UpdateData,
            root,
        });
        rec.on_usage(&UsageEvent {
            frame_number: 3,
            compound: CompoundId::from_raw(2, 0),
            usage: 0.5,
        });
        rec.on_pass_end(&PassEndEvent {
            frame_number: 3,
            pass: PassKind::UpdateData,
            root,
            visited: 3,
        });

        let parsed = export_to_values(&rec);
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "UpdateData");
        assert_eq!(parsed[0]["ts"], 30_000);

        assert_eq!(parsed[1]["ph"], "C");
        assert_eq!(parsed[1]["name"], "Usage #2");
        assert_eq!(parsed[1]["tid"], 3);

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["ts"], 30_002);
        assert_eq!(parsed[2]["args"]["visited"], 3);
    }

    #[test]
    fn each_frame_starts_its_own_slot() {
        let root = CompoundId::from_raw(0, 0);
        let mut rec = RecorderSink::new();
        for frame_number in [1, 2] {
            rec.on_pass_begin(&PassBeginEvent {
                frame_number,
                pass: PassKind::UpdateInput,
                root,
            });
        }
        let parsed = export_to_values(&rec);
        assert_eq!(parsed[0]["ts"], FRAME_SPAN_US);
        assert_eq!(parsed[1]["ts"], 2 * FRAME_SPAN_US);
    }

    #[test]
    fn diagnostics_become_global_instants() {
        let mut rec = RecorderSink::new();
        rec.on_diagnostic(
            1,
            &Diagnostic::EmptyOutputFrame {
                compound: CompoundId::from_raw(5, 1),
                name: String::from("frame.5"),
            },
        );
        let parsed = export_to_values(&rec);
        assert_eq!(parsed[0]["name"], "EmptyOutputFrame");
        assert_eq!(parsed[0]["s"], "g");
        assert_eq!(parsed[0]["args"]["detail"], "frame.5");
    }

    #[test]
    fn export_empty_recording() {
        let parsed = export_to_values(&RecorderSink::new());
        assert!(parsed.is_empty());
    }
}
