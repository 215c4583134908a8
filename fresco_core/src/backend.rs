// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for pixel storage and compositing.
//!
//! A backend owns the pixels of the backing store and the snapshot, and
//! knows how to move them around when [`Stores`] changes state. The state
//! machine itself lives in [`Stores`]; it tells the backend *what* happened
//! (recreated, shifted, swapped, combined) and the backend performs the
//! matching pixel operation.
//!
//! ```text
//!   UI thread                         worker threads
//!   ─────────                         ──────────────
//!   Stores::update ──► Graphics        TileSurfaceSource::request_tile_surface
//!                      recreate/shift        │
//!                      swap/combine          ▼
//!   commit_tiles ───► Graphics::draw_tile ◄── Tile (painted surface)
//!   paint ──────────► Graphics::paint_widget
//! ```
//!
//! [`Graphics`] is only ever used from the UI thread. Workers reach the
//! backend's buffer pool through the [`TileSurfaceSource`] it hands out,
//! which must be `Send + Sync`. A source may refuse a request made off the
//! UI thread (returning `None`); the caller then repeats the request on the
//! UI thread with `allow_blocking` set.

use std::sync::Arc;

use kurbo::{Affine, Point, Rect};

use crate::fragment::Fragment;
use crate::geom::IntRect;
use crate::stores::{Store, Stores};
use crate::surface::{Rgba, Surface};

/// A painted rectangle of the store, travelling from a worker to the UI
/// thread.
#[derive(Debug)]
pub struct Tile {
    /// Where the pixels belong: the store's affine and the tile's rect in
    /// store space.
    pub fragment: Fragment,
    /// The normal-mode pixels.
    pub surface: Surface,
    /// Outline-mode pixels, present while outline overlays are enabled.
    pub outline_surface: Option<Surface>,
}

/// Hands out tile-sized surfaces to worker threads.
pub trait TileSurfaceSource: Send + Sync {
    /// Returns a surface large enough for `rect` at the current device
    /// scale, contents unspecified.
    ///
    /// With `allow_blocking` false the source may decline (for example when
    /// allocation must happen on the UI thread); the caller retries on the
    /// UI thread with `allow_blocking` true, where the request must succeed
    /// unless the size is unrepresentable.
    fn request_tile_surface(&self, rect: IntRect, allow_blocking: bool) -> Option<Surface>;

    /// Returns a surface to the pool.
    fn junk_tile_surface(&self, surface: Surface);
}

/// Document-space page rectangles used when painting the background.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageInfo {
    /// Page bounds in document coordinates.
    pub pages: Vec<Rect>,
}

impl PageInfo {
    /// Returns `true` if the document point lies on any page.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.pages.iter().any(|r| r.contains(p))
    }
}

/// Options for compositing the stores onto the widget.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PaintArgs {
    /// Draw the outline store over the normal content, behind a white wash
    /// of this opacity.
    pub outline_overlay: Option<f64>,
}

/// Pixel operations on the backing store and snapshot, driven from the UI
/// thread.
pub trait Graphics: core::fmt::Debug {
    /// Whether this backend composites on a GPU. Affects how large a
    /// combined snapshot may become.
    fn is_accelerated(&self) -> bool;

    /// Sets device pixels per logical pixel for subsequently allocated
    /// surfaces.
    fn set_scale_factor(&mut self, scale: i32);

    /// Enables or disables the secondary outline buffers.
    fn set_outlines_enabled(&mut self, enabled: bool);

    /// Sets whether page and desk colours are baked into the stores.
    fn set_background_in_stores(&mut self, enabled: bool);

    /// Sets page, desk and border colours.
    fn set_colours(&mut self, page: Rgba, desk: Rgba, border: Rgba);

    /// Sets the page layout used for background painting.
    fn set_pages(&mut self, pages: PageInfo);

    /// Replaces the store with a blank one covering `store`.
    fn recreate_store(&mut self, store: &Fragment);

    /// Moves the store to `dest`, keeping the drawn pixels of `old` that
    /// still fall inside it. `dest` shares `old`'s affine.
    fn shift_store(&mut self, old: &Store, dest: &Fragment);

    /// Exchanges the store and snapshot buffers.
    fn swap_stores(&mut self);

    /// Pastes the drawn part of `store` onto the snapshot in place. Only
    /// called when the snapshot's fragment is unchanged by the combine.
    fn fast_snapshot_combine(&mut self, store: &Store, snapshot: &Store);

    /// Builds a new snapshot at `dest` from the old snapshot with the drawn
    /// part of `store` painted over it.
    fn snapshot_combine(&mut self, store: &Store, snapshot: &Store, dest: &Fragment);

    /// Releases the snapshot's pixels once it is no longer shown.
    fn invalidate_snapshot(&mut self);

    /// The buffer pool workers draw tiles into.
    fn tile_surfaces(&self) -> Arc<dyn TileSurfaceSource>;

    /// Blits a finished tile into the store.
    fn draw_tile(&mut self, store: &Store, tile: &Tile);

    /// Returns a tile surface to the pool.
    fn junk_tile_surface(&mut self, surface: Surface) {
        self.tile_surfaces().junk_tile_surface(surface);
    }

    /// Composites the stores onto `target`, which covers `view`.
    fn paint_widget(&mut self, view: &Fragment, stores: &Stores, args: &PaintArgs, target: &mut Surface);
}

/// Paints desk colour over `target`, then page colour wherever the pixel
/// centre falls on a page.
///
/// `target` covers `frag.rect` at the surface's device scale.
pub fn paint_background(
    target: &mut Surface,
    frag: &Fragment,
    pages: &PageInfo,
    page: Rgba,
    desk: Rgba,
) {
    target.fill(desk.to_premul_argb());
    if pages.pages.is_empty() {
        return;
    }
    let page_argb = page.to_premul_argb();
    let scale = f64::from(target.scale());
    // Device pixel -> document space.
    let to_doc = frag.affine.inverse()
        * Affine::translate((f64::from(frag.rect.x0), f64::from(frag.rect.y0)))
        * Affine::scale(1.0 / scale);
    let to_device = to_doc.inverse();
    for r in &pages.pages {
        let Some(area) = IntRect::round_out(to_device.transform_rect_bbox(*r)).intersect(&target.bounds())
        else {
            continue;
        };
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let centre = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if r.contains(to_doc * centre) {
                    target.set_pixel(x, y, page_argb);
                }
            }
        }
    }
}
