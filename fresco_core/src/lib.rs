// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for a tiled, asynchronously redrawn 2D canvas.
//!
//! `fresco_core` holds the pieces of the redraw engine that do not involve
//! threads: geometry and regions, the store/snapshot state machine, dirty
//! tracking, configuration, and the backend contract.
//!
//! # Architecture
//!
//! A redraw cycle flows through these types:
//!
//! ```text
//!   view Fragment ──► Stores::update ──► Action ──► Updater (dirty tracking)
//!                         │                              │
//!                         ▼                              ▼
//!                  Graphics (pixels)          clean Region ──► tiler
//!                         ▲                                      │
//!                         └──────────── Tile ◄───────────────────┘
//! ```
//!
//! **[`geom`]** — Integer rectangles plus the affine helpers used to place
//! fragments (minimum bounding boxes, identity and dihedral tests).
//!
//! **[`region`]** — Sets of disjoint rectangles with union, subtraction and
//! approximate affine mapping.
//!
//! **[`fragment`]** — An affine plus a pixel rectangle: where a buffer sits
//! relative to the document.
//!
//! **[`stores`]** — The backing store and snapshot, and the transitions
//! between normal and decoupled mode.
//!
//! **[`updater`]** — Dirty-region strategies deciding what the tiler treats
//! as clean on each frame.
//!
//! **[`surface`]** — CPU pixel buffers and colours.
//!
//! **[`backend`]** — The [`Graphics`](backend::Graphics) trait a pixel
//! backend implements, and the tile surface source workers draw into.
//!
//! **[`config`]** — [`CanvasConfig`](config::CanvasConfig) and its presets.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) and the redraw-cycle
//! events, with a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `serde` (disabled by default): Derives `Serialize`/`Deserialize` for
//!   [`CanvasConfig`](config::CanvasConfig) and its field types.
//! - `trace` (disabled by default): Enables `Tracer` method bodies.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod backend;
pub mod config;
pub mod fragment;
pub mod geom;
pub mod region;
pub mod stores;
pub mod surface;
pub mod trace;
pub mod updater;
