// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous tiled redrawing for a zoomable, rotatable canvas.
//!
//! `fresco_render` runs the threaded half of the redraw engine. A
//! [`Canvas`](canvas::Canvas) on the UI thread tracks the viewport and what
//! needs repainting; a fixed pool of workers paints tiles into the backing
//! store described by [`fresco_core::stores`], nearest the mouse first, in
//! short time-boxed cycles.
//!
//! # Architecture
//!
//! ```text
//!   host event loop                     worker pool
//!   ───────────────                     ───────────
//!   Canvas::redraw_area ─┐
//!   Canvas::set_affine  ─┼─► schedule ─► launch ─► tiler phases 0..3
//!   Canvas::set_pos     ─┘                          │ coarsen, bisect
//!                                                   │ Drawing::render
//!   Canvas::dispatch ◄── Synchronizer ◄─────────────┘ tiles
//!        │
//!        ▼
//!   commit tiles ─► Graphics::draw_tile ─► Canvas::paint_widget
//! ```
//!
//! **[`canvas`]** — The [`Canvas`](canvas::Canvas) orchestrator: viewport
//! state, invalidation, cycle launch and commit.
//!
//! **[`drawing`]** — The [`Drawing`](drawing::Drawing) trait the scene
//! implements to paint tiles.
//!
//! **[`coarsen`]** — Merging a dirty region into fewer, larger rectangles,
//! and splitting oversized ones.
//!
//! **[`sync`]** — The [`Synchronizer`](sync::Synchronizer) connecting
//! workers to the UI thread.
//!
//! **[`pool`]** — The fixed-size [`WorkerPool`](pool::WorkerPool).
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Collects redraw-cycle events for the sink
//!   installed with [`Canvas::set_trace_sink`](canvas::Canvas::set_trace_sink).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod canvas;
pub mod coarsen;
pub mod drawing;
pub mod pool;
pub mod sync;
mod tiler;

pub use canvas::{Canvas, CycleReport};
pub use drawing::{Drawing, TileContext};
