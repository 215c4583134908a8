// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for redraw cycles.
//!
//! This module provides a [`TraceSink`] trait with one method per event the
//! redraw engine reports. All method bodies default to no-ops, so implementing
//! only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! Workers never call a sink directly. Events raised off the UI thread are
//! queued as [`TraceEvent`] values and replayed through a [`Tracer`] when the
//! cycle is committed.
//!
//! Timestamps are nanoseconds since the owning canvas was created.

use crate::geom::IntRect;
use crate::stores::{Action, Mode};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a redraw cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CycleOutcome {
    /// Every phase ran to completion.
    Finished,
    /// The render time limit expired; work resumes in the next cycle.
    TimedOut,
    /// New damage interrupted the idle prerender phase.
    SoftAborted,
    /// The canvas was torn down or reconfigured mid-cycle.
    HardAborted,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a redraw cycle is launched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleBeginEvent {
    /// Monotonic cycle counter.
    pub cycle: u64,
    /// Launch time.
    pub timestamp_ns: u64,
    /// Phase the tiler starts in (non-zero when resuming).
    pub first_phase: u8,
    /// Visible area in store space.
    pub visible: IntRect,
}

/// Marks the beginning of a tiler phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBeginEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Phase index, 0 to 3.
    pub phase: u8,
    /// Time the phase's work list was built.
    pub timestamp_ns: u64,
}

/// Marks the end of a tiler phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEndEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Phase index, 0 to 3.
    pub phase: u8,
    /// Time the phase's work list drained.
    pub timestamp_ns: u64,
}

/// Emitted once per tile handed to the scene painter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilePaintedEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Phase the tile belonged to.
    pub phase: u8,
    /// Tile bounds in store space.
    pub rect: IntRect,
    /// Painting start.
    pub start_ns: u64,
    /// Painting end.
    pub end_ns: u64,
}

/// Emitted after a cycle's tiles have been committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleEndEvent {
    /// Cycle counter.
    pub cycle: u64,
    /// Commit time.
    pub timestamp_ns: u64,
    /// Tiles committed to the store.
    pub tiles: u32,
    /// Why the cycle stopped.
    pub outcome: CycleOutcome,
}

/// Emitted when the stores change mode or are rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoresTransitionEvent {
    /// Cycle counter of the cycle being launched or finished.
    pub cycle: u64,
    /// Time of the transition.
    pub timestamp_ns: u64,
    /// Mode before.
    pub from: Mode,
    /// Mode after.
    pub to: Mode,
    /// What happened to the store.
    pub action: Action,
}

/// Any event, for queueing until the UI thread can dispatch it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TraceEvent {
    /// See [`CycleBeginEvent`].
    CycleBegin(CycleBeginEvent),
    /// See [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// See [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// See [`TilePaintedEvent`].
    TilePainted(TilePaintedEvent),
    /// See [`CycleEndEvent`].
    CycleEnd(CycleEndEvent),
    /// See [`StoresTransitionEvent`].
    StoresTransition(StoresTransitionEvent),
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the redraw engine, on the UI thread.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called when a cycle is launched.
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        _ = e;
    }

    /// Called when a tiler phase starts.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called when a tiler phase's work list is exhausted.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called for each painted tile.
    fn on_tile_painted(&mut self, e: &TilePaintedEvent) {
        _ = e;
    }

    /// Called after a cycle's tiles are committed.
    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        _ = e;
    }

    /// Called when the stores change.
    fn on_stores_transition(&mut self, e: &StoresTransitionEvent) {
        _ = e;
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
/// When the `trace` feature is **off**, every method compiles to nothing.
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

    /// Returns `true` if events would reach a sink.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Dispatches a queued event to the matching sink method.
    #[inline]
    pub fn emit(&mut self, e: &TraceEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            match e {
                TraceEvent::CycleBegin(e) => s.on_cycle_begin(e),
                TraceEvent::PhaseBegin(e) => s.on_phase_begin(e),
                TraceEvent::PhaseEnd(e) => s.on_phase_end(e),
                TraceEvent::TilePainted(e) => s.on_tile_painted(e),
                TraceEvent::CycleEnd(e) => s.on_cycle_end(e),
                TraceEvent::StoresTransition(e) => s.on_stores_transition(e),
            }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Dispatches every event in order.
    #[inline]
    pub fn emit_all(&mut self, events: &[TraceEvent]) {
        for e in events {
            self.emit(e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        tiles: usize,
        ends: Vec<CycleOutcome>,
    }

    impl TraceSink for Counting {
        fn on_tile_painted(&mut self, _: &TilePaintedEvent) {
            self.tiles += 1;
        }

        fn on_cycle_end(&mut self, e: &CycleEndEvent) {
            self.ends.push(e.outcome);
        }
    }

    fn tile(cycle: u64) -> TraceEvent {
        TraceEvent::TilePainted(TilePaintedEvent {
            cycle,
            phase: 2,
            rect: IntRect::new(0, 0, 10, 10),
            start_ns: 5,
            end_ns: 9,
        })
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        let mut tracer = Tracer::new(&mut sink);
        tracer.emit_all(&[tile(1), tile(2)]);
    }

    #[test]
    fn none_tracer_is_inactive() {
        assert!(!Tracer::none().is_active(), "no sink attached");
    }

    #[cfg(feature = "trace")]
    #[test]
    fn emit_routes_to_matching_method() {
        let mut sink = Counting::default();
        {
            let mut tracer = Tracer::new(&mut sink);
            assert!(tracer.is_active());
            tracer.emit_all(&[
                tile(1),
                tile(1),
                TraceEvent::CycleEnd(CycleEndEvent {
                    cycle: 1,
                    timestamp_ns: 10,
                    tiles: 2,
                    outcome: CycleOutcome::TimedOut,
                }),
            ]);
        }
        assert_eq!(sink.tiles, 2, "two tile events");
        assert_eq!(sink.ends, [CycleOutcome::TimedOut]);
    }

    #[cfg(not(feature = "trace"))]
    #[test]
    fn emit_is_inert_without_feature() {
        let mut sink = Counting::default();
        {
            let mut tracer = Tracer::new(&mut sink);
            tracer.emit(&tile(1));
        }
        assert_eq!(sink.tiles, 0, "events compiled out");
        assert!(sink.ends.is_empty());
    }
}
