// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Cycles, phases and tiles land on separate tracks so nesting stays
//! well-formed even though tiles from several workers overlap in time.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use fresco_core::trace::TraceEvent;

use crate::recorder::decode;

const TID_CYCLES: u32 = 0;
const TID_PHASES: u32 = 1;
const TID_TILES: u32 = 2;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            TraceEvent::CycleBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("cycle {}", e.cycle),
                    "cat": "Cycle",
                    "ts": ns_to_us(e.timestamp_ns),
                    "pid": 0,
                    "tid": TID_CYCLES,
                    "args": {
                        "first_phase": e.first_phase,
                        "visible": [e.visible.x0, e.visible.y0, e.visible.x1, e.visible.y1],
                    }
                }));
            }
            TraceEvent::CycleEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("cycle {}", e.cycle),
                    "cat": "Cycle",
                    "ts": ns_to_us(e.timestamp_ns),
                    "pid": 0,
                    "tid": TID_CYCLES,
                    "args": {
                        "tiles": e.tiles,
                        "outcome": format!("{:?}", e.outcome),
                    }
                }));
            }
            TraceEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("phase {}", e.phase),
                    "cat": "Phase",
                    "ts": ns_to_us(e.timestamp_ns),
                    "pid": 0,
                    "tid": TID_PHASES,
                    "args": { "cycle": e.cycle }
                }));
            }
            TraceEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("phase {}", e.phase),
                    "cat": "Phase",
                    "ts": ns_to_us(e.timestamp_ns),
                    "pid": 0,
                    "tid": TID_PHASES,
                    "args": { "cycle": e.cycle }
                }));
            }
            TraceEvent::TilePainted(e) => {
                events.push(json!({
                    "ph": "X",
                    "name": "tile",
                    "cat": "Tile",
                    "ts": ns_to_us(e.start_ns),
                    "dur": ns_to_us(e.end_ns.saturating_sub(e.start_ns)),
                    "pid": 0,
                    "tid": TID_TILES,
                    "args": {
                        "cycle": e.cycle,
                        "phase": e.phase,
                        "rect": [e.rect.x0, e.rect.y0, e.rect.x1, e.rect.y1],
                    }
                }));
            }
            TraceEvent::StoresTransition(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "StoresTransition",
                    "cat": "Stores",
                    "ts": ns_to_us(e.timestamp_ns),
                    "pid": 0,
                    "tid": TID_CYCLES,
                    "s": "t",
                    "args": {
                        "cycle": e.cycle,
                        "from": format!("{:?}", e.from),
                        "to": format!("{:?}", e.to),
                        "action": format!("{:?}", e.action),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use fresco_core::geom::IntRect;
    use fresco_core::trace::{
        CycleBeginEvent, CycleEndEvent, CycleOutcome, TilePaintedEvent, TraceSink,
    };

    use super::*;
    use crate::recorder::RecorderSink;

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_cycle_begin(&CycleBeginEvent {
            cycle: 1,
            timestamp_ns: 1_000,
            first_phase: 0,
            visible: IntRect::new(0, 0, 100, 80),
        });
        rec.on_tile_painted(&TilePaintedEvent {
            cycle: 1,
            phase: 2,
            rect: IntRect::new(0, 0, 50, 40),
            start_ns: 2_000,
            end_ns: 5_000,
        });
        rec.on_cycle_end(&CycleEndEvent {
            cycle: 1,
            timestamp_ns: 6_000,
            tiles: 1,
            outcome: CycleOutcome::Finished,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "cycle 1");

        assert_eq!(parsed[1]["ph"], "X");
        assert_eq!(parsed[1]["ts"], 2.0);
        assert_eq!(parsed[1]["dur"], 3.0);
        assert_eq!(parsed[1]["tid"], TID_TILES, "tiles on their own track");

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["args"]["outcome"], "Finished");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty(), "no events");
    }
}
