// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as tagged little-endian records. [`decode`] reads them back as
//! an iterator of [`TraceEvent`].

use fresco_core::geom::IntRect;
use fresco_core::stores::{Action, Mode};
use fresco_core::trace::{
    CycleBeginEvent, CycleEndEvent, CycleOutcome, PhaseBeginEvent, PhaseEndEvent,
    StoresTransitionEvent, TilePaintedEvent, TraceEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_CYCLE_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_TILE_PAINTED: u8 = 4;
const TAG_CYCLE_END: u8 = 5;
const TAG_STORES_TRANSITION: u8 = 6;

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

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_rect(&mut self, r: IntRect) {
        for v in [r.x0, r.y0, r.x1, r.y1] {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn write_mode(&mut self, m: Mode) {
        self.write_u8(match m {
            Mode::None => 0,
            Mode::Normal => 1,
            Mode::Decoupled => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_cycle_begin(&mut self, e: &CycleBeginEvent) {
        self.write_u8(TAG_CYCLE_BEGIN);
        self.write_u64(e.cycle);
        self.write_u64(e.timestamp_ns);
        self.write_u8(e.first_phase);
        self.write_rect(e.visible);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.cycle);
        self.write_u8(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.cycle);
        self.write_u8(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_tile_painted(&mut self, e: &TilePaintedEvent) {
        self.write_u8(TAG_TILE_PAINTED);
        self.write_u64(e.cycle);
        self.write_u8(e.phase);
        self.write_rect(e.rect);
        self.write_u64(e.start_ns);
        self.write_u64(e.end_ns);
    }

    fn on_cycle_end(&mut self, e: &CycleEndEvent) {
        self.write_u8(TAG_CYCLE_END);
        self.write_u64(e.cycle);
        self.write_u64(e.timestamp_ns);
        self.write_u32(e.tiles);
        self.write_u8(match e.outcome {
            CycleOutcome::Finished => 0,
            CycleOutcome::TimedOut => 1,
            CycleOutcome::SoftAborted => 2,
            CycleOutcome::HardAborted => 3,
        });
    }

    fn on_stores_transition(&mut self, e: &StoresTransitionEvent) {
        self.write_u8(TAG_STORES_TRANSITION);
        self.write_u64(e.cycle);
        self.write_u64(e.timestamp_ns);
        self.write_mode(e.from);
        self.write_mode(e.to);
        self.write_u8(match e.action {
            Action::None => 0,
            Action::Recreated => 1,
            Action::Shifted => 2,
        });
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`TraceEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
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
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_rect(&mut self) -> Option<IntRect> {
        Some(IntRect::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        ))
    }

    fn read_mode(&mut self) -> Option<Mode> {
        Some(match self.read_u8()? {
            0 => Mode::None,
            1 => Mode::Normal,
            _ => Mode::Decoupled,
        })
    }

    fn decode_cycle_begin(&mut self) -> Option<TraceEvent> {
        Some(TraceEvent::CycleBegin(CycleBeginEvent {
            cycle: self.read_u64()?,
            timestamp_ns: self.read_u64()?,
            first_phase: self.read_u8()?,
            visible: self.read_rect()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<TraceEvent> {
        Some(TraceEvent::PhaseBegin(PhaseBeginEvent {
            cycle: self.read_u64()?,
            phase: self.read_u8()?,
            timestamp_ns: self.read_u64()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<TraceEvent> {
        Some(TraceEvent::PhaseEnd(PhaseEndEvent {
            cycle: self.read_u64()?,
            phase: self.read_u8()?,
            timestamp_ns: self.read_u64()?,
        }))
    }

    fn decode_tile_painted(&mut self) -> Option<TraceEvent> {
        Some(TraceEvent::TilePainted(TilePaintedEvent {
            cycle: self.read_u64()?,
            phase: self.read_u8()?,
            rect: self.read_rect()?,
            start_ns: self.read_u64()?,
            end_ns: self.read_u64()?,
        }))
    }

    fn decode_cycle_end(&mut self) -> Option<TraceEvent> {
        Some(TraceEvent::CycleEnd(CycleEndEvent {
            cycle: self.read_u64()?,
            timestamp_ns: self.read_u64()?,
            tiles: self.read_u32()?,
            outcome: match self.read_u8()? {
                0 => CycleOutcome::Finished,
                1 => CycleOutcome::TimedOut,
                2 => CycleOutcome::SoftAborted,
                _ => CycleOutcome::HardAborted,
            },
        }))
    }

    fn decode_stores_transition(&mut self) -> Option<TraceEvent> {
        Some(TraceEvent::StoresTransition(StoresTransitionEvent {
            cycle: self.read_u64()?,
            timestamp_ns: self.read_u64()?,
            from: self.read_mode()?,
            to: self.read_mode()?,
            action: match self.read_u8()? {
                0 => Action::None,
                1 => Action::Recreated,
                _ => Action::Shifted,
            },
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = TraceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_CYCLE_BEGIN => self.decode_cycle_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_TILE_PAINTED => self.decode_tile_painted(),
            TAG_CYCLE_END => self.decode_cycle_end(),
            TAG_STORES_TRANSITION => self.decode_stores_transition(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use fresco_core::trace::Tracer;

    use super::*;

    fn sample_cycle() -> Vec<TraceEvent> {
        vec![
            TraceEvent::StoresTransition(StoresTransitionEvent {
                cycle: 3,
                timestamp_ns: 900,
                from: Mode::Normal,
                to: Mode::Decoupled,
                action: Action::Recreated,
            }),
            TraceEvent::CycleBegin(CycleBeginEvent {
                cycle: 3,
                timestamp_ns: 1_000,
                first_phase: 0,
                visible: IntRect::new(-20, -10, 180, 140),
            }),
            TraceEvent::PhaseBegin(PhaseBeginEvent {
                cycle: 3,
                phase: 2,
                timestamp_ns: 1_100,
            }),
            TraceEvent::TilePainted(TilePaintedEvent {
                cycle: 3,
                phase: 2,
                rect: IntRect::new(0, 0, 64, 64),
                start_ns: 1_200,
                end_ns: 5_200,
            }),
            TraceEvent::PhaseEnd(PhaseEndEvent {
                cycle: 3,
                phase: 2,
                timestamp_ns: 6_000,
            }),
            TraceEvent::CycleEnd(CycleEndEvent {
                cycle: 3,
                timestamp_ns: 7_000,
                tiles: 1,
                outcome: CycleOutcome::TimedOut,
            }),
        ]
    }

    fn record(events: &[TraceEvent]) -> RecorderSink {
        let mut rec = RecorderSink::new();
        Tracer::new(&mut rec).emit_all(events);
        rec
    }

    #[test]
    fn recorded_cycle_decodes_in_order() {
        let events = sample_cycle();
        let rec = record(&events);
        let decoded: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(decoded, events, "every field survives, including negative rects");
    }

    #[test]
    fn truncated_record_ends_iteration() {
        let rec = record(&sample_cycle());
        let bytes = rec.into_bytes();
        let cut = &bytes[..bytes.len() - 3];
        let decoded: Vec<_> = decode(cut).collect();
        assert_eq!(decoded.len(), 5, "partial cycle end dropped");
    }

    #[test]
    fn unknown_tag_ends_iteration() {
        let mut bytes = record(&sample_cycle()[..1]).into_bytes();
        bytes.push(0xee);
        bytes.extend_from_slice(record(&sample_cycle()[1..2]).as_bytes());
        assert_eq!(decode(&bytes).count(), 1, "stops at the bad tag");
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        assert_eq!(decode(&[]).count(), 0, "no events");
    }
}
