// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds since the canvas was created.

use std::io::Write;

use fresco_core::geom::IntRect;
use fresco_core::trace::{
    CycleBeginEvent, CycleEndEvent, PhaseBeginEvent, PhaseEndEvent, StoresTransitionEvent,
    TilePaintedEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    tiles: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("tiles", &self.tiles)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            tiles: true,
        }
    }

    /// Turns per-tile lines on or off. Cycle and phase lines are always
    /// written.
    #[must_use]
    pub fn with_tiles(mut self, tiles: bool) -> Self {
        self.tiles = tiles;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

fn phase_name(phase: u8) -> &'static str {
    match phase {
        0 => "decoupled",
        1 => "grabbed",
        2 => "visible",
        3 => "prerender",
        _ => "?",
    }
}

fn rect(r: IntRect) -> String {
    format!("({},{})+{}x{}", r.x0, r.y0, r.width(), r.height())
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[cycle:begin] cycle={} at {:.1}µs first_phase={} visible={}",
            e.cycle,
            us(e.timestamp_ns),
            phase_name(e.first_phase),
            rect(e.visible),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] cycle={} {} at {:.1}µs",
            e.cycle,
            phase_name(e.phase),
            us(e.timestamp_ns),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] cycle={} {} at {:.1}µs",
            e.cycle,
            phase_name(e.phase),
            us(e.timestamp_ns),
        );
    }

    fn on_tile_painted(&mut self, e: &TilePaintedEvent) {
        if !self.tiles {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[tile] cycle={} {} {} took {:.1}µs",
            e.cycle,
            phase_name(e.phase),
            rect(e.rect),
            us(e.end_ns.saturating_sub(e.start_ns)),
        );
    }

    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        let _ = writeln!(
            self.writer,
            "[cycle:end] cycle={} at {:.1}µs tiles={} outcome={:?}",
            e.cycle,
            us(e.timestamp_ns),
            e.tiles,
            e.outcome,
        );
    }

    fn on_stores_transition(&mut self, e: &StoresTransitionEvent) {
        let _ = writeln!(
            self.writer,
            "[stores] cycle={} {:?} -> {:?} ({:?})",
            e.cycle, e.from, e.to, e.action,
        );
    }
}
