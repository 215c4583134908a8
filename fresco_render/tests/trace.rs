// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trace events reported by redraw cycles.

use std::sync::Arc;

use fresco_backend_soft::SoftGraphics;
use fresco_core::config::CanvasConfig;
use fresco_core::stores::{Action, Mode};
use fresco_core::surface::{RenderError, Surface};
use fresco_core::trace::{
    CycleBeginEvent, CycleEndEvent, CycleOutcome, PhaseBeginEvent, StoresTransitionEvent,
    TilePaintedEvent, TraceEvent, TraceSink,
};
use fresco_render::{Canvas, Drawing, TileContext};
use kurbo::Affine;
use parking_lot::Mutex;

#[derive(Debug)]
struct Solid;

impl Drawing for Solid {
    fn render(&self, target: &mut Surface, _: &TileContext) -> Result<(), RenderError> {
        target.fill(0xff80_8080);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<TraceEvent>>>);

impl TraceSink for Log {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        self.0.lock().push(TraceEvent::CycleBegin(*e));
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.0.lock().push(TraceEvent::PhaseBegin(*e));
    }

    fn on_tile_painted(&mut self, e: &TilePaintedEvent) {
        self.0.lock().push(TraceEvent::TilePainted(*e));
    }

    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        self.0.lock().push(TraceEvent::CycleEnd(*e));
    }

    fn on_stores_transition(&mut self, e: &StoresTransitionEvent) {
        self.0.lock().push(TraceEvent::StoresTransition(*e));
    }
}

fn traced() -> (Canvas, Log) {
    let config = CanvasConfig {
        tile_size: 64,
        prerender: 16,
        padding: 32,
        num_threads: 2,
        ..CanvasConfig::default()
    };
    let mut c = Canvas::new(config, Box::new(SoftGraphics::new()), Arc::new(Solid), || {}).unwrap();
    c.set_dimensions(160, 120);
    let log = Log::default();
    c.set_trace_sink(Some(Box::new(log.clone())));
    (c, log)
}

#[test]
fn first_cycle_reports_store_creation_and_tiles() {
    let (mut c, log) = traced();
    let report = c.finish_cycle().unwrap();
    let events = log.0.lock().clone();

    assert!(
        events.iter().any(|e| matches!(
            e,
            TraceEvent::StoresTransition(StoresTransitionEvent {
                from: Mode::None,
                to: Mode::Normal,
                action: Action::Recreated,
                ..
            })
        )),
        "store creation traced"
    );
    assert!(
        events.iter().any(|e| matches!(e, TraceEvent::CycleBegin(b) if b.cycle == report.cycle)),
        "cycle begin traced"
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, TraceEvent::PhaseBegin(p) if p.phase == 2)),
        "visible phase traced"
    );

    let tiles = events
        .iter()
        .filter(|e| matches!(e, TraceEvent::TilePainted(t) if t.cycle == report.cycle))
        .count();
    assert_eq!(u32::try_from(tiles).unwrap(), report.tiles, "one event per committed tile");

    match events.last() {
        Some(TraceEvent::CycleEnd(end)) => {
            assert_eq!(end.outcome, CycleOutcome::Finished);
            assert_eq!(end.tiles, report.tiles);
        }
        other => panic!("expected cycle end last, got {other:?}"),
    }
}

#[test]
fn tile_timestamps_are_ordered() {
    let (mut c, log) = traced();
    c.redraw_now();
    for e in log.0.lock().iter() {
        if let TraceEvent::TilePainted(t) = e {
            assert!(t.start_ns <= t.end_ns, "{t:?}");
        }
    }
}

#[test]
fn zoom_traces_decoupled_round_trip() {
    let (mut c, log) = traced();
    c.redraw_now();
    log.0.lock().clear();

    c.set_affine(Affine::scale(1.5));
    c.redraw_now();
    let events = log.0.lock().clone();
    let transitions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TraceEvent::StoresTransition(t) => Some((t.from, t.to)),
            _ => None,
        })
        .collect();
    assert_eq!(transitions.first(), Some(&(Mode::Normal, Mode::Decoupled)), "{transitions:?}");
    assert_eq!(transitions.last(), Some(&(Mode::Decoupled, Mode::Normal)), "{transitions:?}");
}
