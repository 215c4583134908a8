// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU implementation of the fresco [`Graphics`] backend.
//!
//! Stores, snapshots and tiles are plain [`Surface`]s of premultiplied ARGB.
//! Moving pixels between fragments with different affines (snapshot
//! combines, decoupled painting) resamples with nearest-neighbour lookup at
//! each destination pixel centre.
//!
//! Tile surfaces come from a shared [`SurfacePool`], which workers reach
//! through [`Graphics::tile_surfaces`].

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod pool;

use std::sync::Arc;

use fresco_core::backend::{
    Graphics, PageInfo, PaintArgs, Tile, TileSurfaceSource, paint_background,
};
use fresco_core::fragment::Fragment;
use fresco_core::geom::{IntPoint, IntRect};
use fresco_core::region::Region;
use fresco_core::stores::{Mode, Store, Stores};
use fresco_core::surface::{Rgba, Surface, over};
use kurbo::{Affine, Point};

pub use pool::SurfacePool;

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Source,
    Over,
}

/// Pixels of `surface` placed at `frag`, limited to `clip` (in the
/// fragment's pixel space) when present.
struct Layer<'a> {
    surface: &'a Surface,
    frag: Fragment,
    clip: Option<&'a Region>,
}

/// Draws `layer` onto `dst`, which covers `dst_frag`.
///
/// Destination pixels whose centre maps into `exclude` (a region in
/// `exclude_frag`'s space) are left alone.
fn composite(
    dst: &mut Surface,
    dst_frag: &Fragment,
    layer: &Layer<'_>,
    exclude: Option<(&Fragment, &Region)>,
    op: Op,
) {
    let whole = [layer.frag.rect];
    let rects = layer.clip.map_or(&whole[..], Region::rects);
    if rects.is_empty() {
        return;
    }

    let dst_scale = f64::from(dst.scale());
    let src_scale = f64::from(layer.surface.scale());
    // Destination logical pixel space -> source logical pixel space.
    let to_src = dst_frag.to_space_of(&layer.frag);
    let to_dst = to_src.inverse();
    let to_excl = exclude.map(|(f, r)| (dst_frag.to_space_of(f), r));
    let dst_origin = Point::new(f64::from(dst_frag.rect.x0), f64::from(dst_frag.rect.y0));
    let src_origin = (f64::from(layer.frag.rect.x0), f64::from(layer.frag.rect.y0));

    for &r in rects {
        let Some(r) = r.intersect(&layer.frag.rect) else {
            continue;
        };
        // Footprint of `r` in destination device pixels.
        let footprint = (Affine::scale(dst_scale) * Affine::translate(-dst_origin.to_vec2()) * to_dst)
            .transform_rect_bbox(r.to_rect());
        let Some(area) = IntRect::round_out(footprint).intersect(&dst.bounds()) else {
            continue;
        };
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let p = Point::new(
                    dst_origin.x + (f64::from(x) + 0.5) / dst_scale,
                    dst_origin.y + (f64::from(y) + 0.5) / dst_scale,
                );
                let q = to_src * p;
                if !r.to_rect().contains(q) {
                    continue;
                }
                if let Some((m, region)) = to_excl {
                    let e = m * p;
                    if region.contains_point(floor_point(e)) {
                        continue;
                    }
                }
                let sx = floor_i32((q.x - src_origin.0) * src_scale);
                let sy = floor_i32((q.y - src_origin.1) * src_scale);
                let Some(s) = layer.surface.pixel(sx, sy) else {
                    continue;
                };
                let out = match op {
                    Op::Source => s,
                    Op::Over => dst.pixel(x, y).map_or(s, |d| over(s, d)),
                };
                dst.set_pixel(x, y, out);
            }
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "inputs are pixel coordinates clamped well inside i32"
)]
fn floor_i32(v: f64) -> i32 {
    v.floor().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

fn floor_point(p: Point) -> IntPoint {
    IntPoint::new(floor_i32(p.x), floor_i32(p.y))
}

// ---------------------------------------------------------------------------
// SoftGraphics
// ---------------------------------------------------------------------------

/// A normal buffer and its outline twin.
#[derive(Debug, Default)]
struct Buffers {
    surface: Option<Surface>,
    outline: Option<Surface>,
}

fn pick(b: &Buffers, outline: bool) -> Option<&Surface> {
    if outline {
        b.outline.as_ref()
    } else {
        b.surface.as_ref()
    }
}

/// Software [`Graphics`] backend.
///
/// All operations run on the calling thread; only the [`SurfacePool`] is
/// shared with workers.
pub struct SoftGraphics {
    store: Buffers,
    snapshot: Buffers,
    scale: i32,
    outlines_enabled: bool,
    background_in_stores: bool,
    page: Rgba,
    desk: Rgba,
    border: Rgba,
    pages: PageInfo,
    pool: Arc<SurfacePool>,
}

impl core::fmt::Debug for SoftGraphics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoftGraphics")
            .field("scale", &self.scale)
            .field("outlines_enabled", &self.outlines_enabled)
            .field("background_in_stores", &self.background_in_stores)
            .field("has_store", &self.store.surface.is_some())
            .field("has_snapshot", &self.snapshot.surface.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SoftGraphics {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftGraphics {
    /// Creates a backend with a fresh surface pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool(Arc::new(SurfacePool::new()))
    }

    /// Creates a backend drawing tiles from `pool`.
    #[must_use]
    pub fn with_pool(pool: Arc<SurfacePool>) -> Self {
        Self {
            store: Buffers::default(),
            snapshot: Buffers::default(),
            scale: 1,
            outlines_enabled: false,
            background_in_stores: false,
            page: Rgba::WHITE,
            desk: Rgba::WHITE,
            border: Rgba::BLACK,
            pages: PageInfo::default(),
            pool,
        }
    }

    /// The tile surface pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    /// The store's pixels, if allocated.
    #[must_use]
    pub fn store_surface(&self) -> Option<&Surface> {
        self.store.surface.as_ref()
    }

    /// The store's outline pixels, if allocated.
    #[must_use]
    pub fn store_outline_surface(&self) -> Option<&Surface> {
        self.store.outline.as_ref()
    }

    /// The snapshot's pixels, if allocated.
    #[must_use]
    pub fn snapshot_surface(&self) -> Option<&Surface> {
        self.snapshot.surface.as_ref()
    }

    /// The border colour last set. Borders are drawn by the host widget.
    #[must_use]
    pub fn border(&self) -> Rgba {
        self.border
    }

    /// Makes a surface for `frag`, reusing `spare` when it has the right
    /// size.
    fn alloc(&self, frag: &Fragment, spare: Option<Surface>) -> Option<Surface> {
        let (w, h) = frag.rect.dimensions();
        if let Some(s) = spare
            && s.logical_size() == (w, h)
            && s.scale() == self.scale
        {
            return Some(s);
        }
        match Surface::new(w, h, self.scale) {
            Ok(s) => Some(s),
            Err(e) => {
                log::error!("Cannot allocate store surface for {:?}: {e}", frag.rect);
                None
            }
        }
    }

    fn clear_for(&self, surface: &mut Surface, frag: &Fragment, outline: bool) {
        if self.background_in_stores && !outline {
            paint_background(surface, frag, &self.pages, self.page, self.desk);
        } else {
            surface.fill(0);
        }
    }

    fn paint_layers(
        &self,
        target: &mut Surface,
        view: &Fragment,
        stores: &Stores,
        outline: bool,
        op: Op,
    ) {
        let store = stores.store();
        match stores.mode() {
            Mode::None => {}
            Mode::Normal => {
                if let Some(s) = pick(&self.store, outline) {
                    let layer = Layer {
                        surface: s,
                        frag: store.fragment(),
                        clip: None,
                    };
                    composite(target, view, &layer, None, op);
                }
            }
            Mode::Decoupled => {
                let store_frag = store.fragment();
                if let Some(s) = pick(&self.snapshot, outline) {
                    let layer = Layer {
                        surface: s,
                        frag: stores.snapshot().fragment(),
                        clip: None,
                    };
                    composite(target, view, &layer, Some((&store_frag, &store.drawn)), op);
                }
                if let Some(s) = pick(&self.store, outline) {
                    let layer = Layer {
                        surface: s,
                        frag: store_frag,
                        clip: Some(&store.drawn),
                    };
                    composite(target, view, &layer, None, op);
                }
            }
        }
    }
}

impl Graphics for SoftGraphics {
    fn is_accelerated(&self) -> bool {
        false
    }

    fn set_scale_factor(&mut self, scale: i32) {
        self.scale = scale.max(1);
        self.pool.set_scale(self.scale);
    }

    fn set_outlines_enabled(&mut self, enabled: bool) {
        self.outlines_enabled = enabled;
        if !enabled {
            self.store.outline = None;
            self.snapshot.outline = None;
        }
    }

    fn set_background_in_stores(&mut self, enabled: bool) {
        self.background_in_stores = enabled;
    }

    fn set_colours(&mut self, page: Rgba, desk: Rgba, border: Rgba) {
        self.page = page;
        self.desk = desk;
        self.border = border;
    }

    fn set_pages(&mut self, pages: PageInfo) {
        self.pages = pages;
    }

    fn recreate_store(&mut self, store: &Fragment) {
        let spare = self.store.surface.take();
        self.store.surface = self.alloc(store, spare).map(|mut s| {
            self.clear_for(&mut s, store, false);
            s
        });
        self.store.outline = if self.outlines_enabled {
            let spare = self.store.outline.take();
            self.alloc(store, spare).map(|mut s| {
                s.fill(0);
                s
            })
        } else {
            None
        };
    }

    fn shift_store(&mut self, old: &Store, dest: &Fragment) {
        let reuse = old
            .drawn
            .extents()
            .and_then(|ext| ext.intersect(&dest.rect))
            .and_then(|r| r.intersect(&old.rect));
        let scale = self.scale;
        let shift = |src: Option<&Surface>, mut dst: Surface| {
            if let (Some(src), Some(r)) = (src, reuse) {
                let from = r.translate(-old.rect.x0, -old.rect.y0);
                let from = IntRect::new(from.x0 * scale, from.y0 * scale, from.x1 * scale, from.y1 * scale);
                dst.copy_from(
                    src,
                    from,
                    (r.x0 - dest.rect.x0) * scale,
                    (r.y0 - dest.rect.y0) * scale,
                );
            }
            dst
        };

        // The old store buffer is kept as the snapshot's spare.
        let spare = self.snapshot.surface.take();
        let fresh = self.alloc(dest, spare).map(|mut s| {
            self.clear_for(&mut s, dest, false);
            s
        });
        let old_surface = self.store.surface.take();
        self.store.surface = fresh.map(|s| shift(old_surface.as_ref(), s));
        self.snapshot.surface = old_surface;

        if self.outlines_enabled {
            let spare = self.snapshot.outline.take();
            let fresh = self.alloc(dest, spare).map(|mut s| {
                s.fill(0);
                s
            });
            let old_outline = self.store.outline.take();
            self.store.outline = fresh.map(|s| shift(old_outline.as_ref(), s));
            self.snapshot.outline = old_outline;
        }
    }

    fn swap_stores(&mut self) {
        core::mem::swap(&mut self.store, &mut self.snapshot);
    }

    fn fast_snapshot_combine(&mut self, store: &Store, snapshot: &Store) {
        let snap_frag = snapshot.fragment();
        let store_frag = store.fragment();
        if let (Some(dst), Some(src)) = (self.snapshot.surface.as_mut(), self.store.surface.as_ref()) {
            let layer = Layer {
                surface: src,
                frag: store_frag,
                clip: Some(&store.drawn),
            };
            composite(dst, &snap_frag, &layer, None, Op::Source);
        }
        if let (Some(dst), Some(src)) = (self.snapshot.outline.as_mut(), self.store.outline.as_ref()) {
            let layer = Layer {
                surface: src,
                frag: store_frag,
                clip: Some(&store.drawn),
            };
            composite(dst, &snap_frag, &layer, None, Op::Source);
        }
    }

    fn snapshot_combine(&mut self, store: &Store, snapshot: &Store, dest: &Fragment) {
        let combine = |this: &Self, outline: bool| -> Option<Surface> {
            let mut out = this.alloc(dest, None)?;
            this.clear_for(&mut out, dest, outline);
            if let Some(s) = pick(&this.snapshot, outline) {
                let layer = Layer {
                    surface: s,
                    frag: snapshot.fragment(),
                    clip: None,
                };
                composite(&mut out, dest, &layer, None, Op::Source);
            }
            if let Some(s) = pick(&this.store, outline) {
                let layer = Layer {
                    surface: s,
                    frag: store.fragment(),
                    clip: Some(&store.drawn),
                };
                composite(&mut out, dest, &layer, None, Op::Source);
            }
            Some(out)
        };
        let surface = combine(self, false);
        let outline = if self.outlines_enabled {
            combine(self, true)
        } else {
            None
        };
        self.snapshot = Buffers { surface, outline };
    }

    fn invalidate_snapshot(&mut self) {
        self.snapshot = Buffers::default();
    }

    fn tile_surfaces(&self) -> Arc<dyn TileSurfaceSource> {
        self.pool.clone()
    }

    fn draw_tile(&mut self, store: &Store, tile: &Tile) {
        let rect = tile.fragment.rect;
        let dx = (rect.x0 - store.rect.x0) * self.scale;
        let dy = (rect.y0 - store.rect.y0) * self.scale;
        if let Some(dst) = self.store.surface.as_mut() {
            dst.copy_from(&tile.surface, tile.surface.bounds(), dx, dy);
        }
        if let (Some(dst), Some(src)) = (self.store.outline.as_mut(), tile.outline_surface.as_ref()) {
            dst.copy_from(src, src.bounds(), dx, dy);
        }
    }

    fn paint_widget(
        &mut self,
        view: &Fragment,
        stores: &Stores,
        args: &PaintArgs,
        target: &mut Surface,
    ) {
        // Where the stores have no pixels the background shows through.
        paint_background(target, view, &self.pages, self.page, self.desk);
        let op = if self.background_in_stores { Op::Source } else { Op::Over };
        self.paint_layers(target, view, stores, false, op);

        if let Some(opacity) = args.outline_overlay {
            let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round();
            #[expect(clippy::cast_possible_truncation, reason = "clamped to 0..=255")]
            let wash = Rgba(0xffff_ff00 | u32::from(alpha as u8));
            target.blend_rect(target.bounds(), wash.to_premul_argb());
            self.paint_layers(target, view, stores, true, Op::Over);
        }
    }
}
