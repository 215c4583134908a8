// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The backing store and snapshot state machine.
//!
//! The *store* holds rendered content at the current view affine, over the
//! viewport grown by the prerender and padding margins. While the view
//! affine differs from the store's (during a zoom or rotation), the canvas
//! is *decoupled*: the previous store becomes the *snapshot*, shown
//! transformed underneath the parts of the new store drawn so far.
//!
//! ```text
//!             update (first use)
//!   None ───────────────────────────► Normal ◄──────────────┐
//!    ▲                                  │                   │
//!    │ reset                            │ affine changed    │ finished_draw with
//!    │                                  ▼                   │ matching affine
//!    └────────────────────────────── Decoupled ─────────────┘
//!                                     │   ▲
//!                                     └───┘ restart: snapshot_combine
//! ```
//!
//! Every region stored here, including the snapshot's drawn region, is in
//! the *store's* pixel space; only the snapshot's rect and affine describe
//! the snapshot buffer itself.

use kurbo::{Affine, Point, Rect};

use crate::backend::Graphics;
use crate::config::CanvasConfig;
use crate::fragment::Fragment;
use crate::geom::{IntRect, is_identity, min_bounding_box, preserves_unit_square, safe_clamp};
use crate::region::Region;

/// Chunk size used when mapping drawn regions between affines.
const APPROX_CHUNK: i32 = 200;

/// A buffer's placement and the part of it holding valid pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Store {
    /// Document to store pixel space.
    pub affine: Affine,
    /// Bounds in store pixel space.
    pub rect: IntRect,
    /// Pixels holding rendered content. Always inside `rect` for the store.
    pub drawn: Region,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            affine: Affine::IDENTITY,
            rect: IntRect::default(),
            drawn: Region::new(),
        }
    }
}

impl Store {
    /// The store's placement as a fragment.
    #[must_use]
    pub fn fragment(&self) -> Fragment {
        Fragment::new(self.affine, self.rect)
    }
}

/// Lifecycle state of the stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No store exists yet, or it was just reset.
    #[default]
    None,
    /// The store is at the view affine.
    Normal,
    /// The store is at a new affine and the snapshot fills in behind it.
    Decoupled,
}

/// What happened to the store during an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing changed.
    None,
    /// The store was replaced; everything in it needs redrawing.
    Recreated,
    /// The store moved; content outside its new rect is gone.
    Shifted,
}

#[derive(Clone, Copy, Debug)]
struct Params {
    prerender: i32,
    padding: i32,
    zoom_in_ratio: f64,
    zoom_out_ratio: f64,
    identity_tolerance: f64,
    sticky_decoupled: bool,
}

impl From<&CanvasConfig> for Params {
    fn from(c: &CanvasConfig) -> Self {
        Self {
            prerender: c.prerender,
            padding: c.padding,
            zoom_in_ratio: c.restart_zoom_in_ratio,
            zoom_out_ratio: c.restart_zoom_out_ratio,
            identity_tolerance: c.snapshot_identity_tolerance,
            sticky_decoupled: c.debug_sticky_decoupled,
        }
    }
}

/// Store and snapshot bookkeeping, plus the transitions between modes.
///
/// Pixel work is delegated to a [`Graphics`] passed into each call.
#[derive(Debug)]
pub struct Stores {
    mode: Mode,
    store: Store,
    snapshot: Store,
    params: Params,
}

impl Stores {
    /// Creates stores in [`Mode::None`].
    #[must_use]
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            mode: Mode::None,
            store: Store::default(),
            snapshot: Store::default(),
            params: Params::from(config),
        }
    }

    /// Picks up new margins and thresholds.
    pub fn set_config(&mut self, config: &CanvasConfig) {
        self.params = Params::from(config);
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The snapshot. Meaningful only in [`Mode::Decoupled`].
    #[must_use]
    pub fn snapshot(&self) -> &Store {
        &self.snapshot
    }

    /// Records that `rect` of the store now holds rendered content.
    pub fn mark_drawn(&mut self, rect: IntRect) {
        debug_assert!(
            self.store.rect.contains_rect(&rect),
            "drawn {rect:?} outside store {:?}",
            self.store.rect
        );
        self.store.drawn.union_rect(rect);
    }

    /// Forgets both buffers; the next [`update`](Self::update) recreates
    /// the store.
    pub fn reset(&mut self) {
        self.mode = Mode::None;
        self.store.drawn.clear();
        self.snapshot.drawn.clear();
    }

    /// Brings the stores in line with a new view.
    pub fn update(&mut self, view: &Fragment, graphics: &mut dyn Graphics) -> Action {
        match self.mode {
            Mode::None => {
                self.recreate_store(view, graphics);
                self.mode = Mode::Normal;
                log::debug!("Full reset");
                Action::Recreated
            }
            Mode::Normal => {
                let mut result = Action::None;
                if view.affine != self.store.affine {
                    self.take_snapshot(view, graphics);
                    self.mode = Mode::Decoupled;
                    log::debug!("Enter decoupled mode");
                    result = Action::Recreated;
                } else if !self
                    .store
                    .rect
                    .contains_rect(&view.rect.expand(self.params.prerender))
                {
                    let wanted = view.rect.expand(self.params.prerender + self.params.padding);
                    let reusable = self
                        .store
                        .drawn
                        .extents()
                        .is_some_and(|ext| ext.intersects(&wanted));
                    if reusable {
                        self.shift_store(view, graphics);
                        log::debug!("Shift store");
                        result = Action::Shifted;
                    } else {
                        self.recreate_store(view, graphics);
                        log::debug!("Recreate store");
                        result = Action::Recreated;
                    }
                }
                debug_assert!(
                    self.store
                        .rect
                        .contains_rect(&view.rect.expand(self.params.prerender)),
                    "store must cover the view and prerender margin"
                );
                result
            }
            Mode::Decoupled => {
                if self.should_restart(view) {
                    self.snapshot_combine(view, graphics);
                    Action::Recreated
                } else {
                    Action::None
                }
            }
        }
    }

    /// Handles the end of a redraw cycle.
    ///
    /// In decoupled mode this either returns to normal mode (the store has
    /// caught up with the view) or snapshots again and asks for another
    /// cycle at the new affine.
    pub fn finished_draw(&mut self, view: &Fragment, graphics: &mut dyn Graphics) -> Action {
        if self.mode != Mode::Decoupled || self.params.sticky_decoupled {
            return Action::None;
        }
        if self.store.affine == view.affine {
            log::debug!("Exit decoupled mode");
            self.mode = Mode::Normal;
            graphics.invalidate_snapshot();
            Action::None
        } else {
            self.take_snapshot(view, graphics);
            log::debug!("Remain in decoupled mode");
            Action::Recreated
        }
    }

    fn centered(&self, view: &Fragment) -> IntRect {
        view.rect.expand(self.params.prerender + self.params.padding)
    }

    fn recreate_store(&mut self, view: &Fragment, graphics: &mut dyn Graphics) {
        self.store.affine = view.affine;
        self.store.rect = self.centered(view);
        self.store.drawn.clear();
        graphics.recreate_store(&self.store.fragment());
    }

    fn shift_store(&mut self, view: &Fragment, graphics: &mut dyn Graphics) {
        let dest = Fragment::new(self.store.affine, self.centered(view));
        graphics.shift_store(&self.store, &dest);
        self.store.rect = dest.rect;
        self.store.drawn.intersect_rect(dest.rect);
    }

    fn take_snapshot(&mut self, view: &Fragment, graphics: &mut dyn Graphics) {
        self.snapshot = core::mem::take(&mut self.store);
        graphics.swap_stores();
        self.recreate_store(view, graphics);
        let to_store = self.store.affine * self.snapshot.affine.inverse();
        self.snapshot.drawn = self
            .snapshot
            .drawn
            .affine_approx_inwards(to_store, self.store.rect, APPROX_CHUNK)
            .shrink(4, -2);
    }

    fn should_restart(&self, view: &Fragment) -> bool {
        if self.params.sticky_decoupled {
            return false;
        }

        // The store must still cover the middle half of the screen.
        let centre = view.rect.center();
        let to_store = self.store.affine * view.affine.inverse();
        let bounds = self.store.rect.to_rect().inflate(1e-6, 1e-6);
        let covered = view.rect.corners().iter().all(|&c| {
            let half = centre + (c - centre) * 0.5;
            bounds.contains(to_store * half)
        });
        if !covered {
            log::debug!("Restart redraw (store not fully covering screen)");
            return true;
        }

        let ratio = (view.affine.determinant() / self.store.affine.determinant()).abs();
        if ratio > self.params.zoom_in_ratio || ratio < self.params.zoom_out_ratio {
            log::debug!("Restart redraw (zoom changed too much)");
            return true;
        }

        false
    }

    fn snapshot_combine(&mut self, view: &Fragment, graphics: &mut dyn Graphics) {
        self.snapshot.drawn.union(&self.store.drawn);
        let old_store_affine = self.store.affine;

        // Corners of everything worth keeping, at the view's affine.
        let mut pts: Vec<Point> = Vec::new();
        let store_to_view = view.affine * self.store.affine.inverse();
        for r in self.store.drawn.rects() {
            pts.extend(r.corners().iter().map(|&c| store_to_view * c));
        }
        let snap_to_view = view.affine * self.snapshot.affine.inverse();
        pts.extend(self.snapshot.rect.corners().iter().map(|&c| snap_to_view * c));

        let (rotation, mut rect) = min_bounding_box(&pts);
        let mut affine = rotation * view.affine;

        // Keep the snapshot's own fragment if the new one is just a flip or
        // quarter turn of it.
        if self.paste_transform(affine, rect).is_some_and(|p| preserves_unit_square(p, 1e-3)) {
            rect = self.snapshot.rect.to_rect();
            affine = self.snapshot.affine;
        }

        // Gain detail when the store is much sharper than the new fragment.
        let ratio = (self.store.affine.determinant() / affine.determinant()).abs().sqrt();
        if ratio > 4.0 {
            let grow = ratio / 2.0;
            rect = scale_rect(rect, grow);
            affine = Affine::scale(grow) * affine;
        }

        // Never be sharper than the view.
        let ratio = (affine.determinant() / view.affine.determinant()).abs().sqrt();
        if ratio > 1.0 {
            let shrink = 1.0 / ratio;
            rect = scale_rect(rect, shrink);
            affine = Affine::scale(shrink) * affine;
        }

        let view_to_new = affine * view.affine.inverse();
        let renderable = view_to_new
            .transform_rect_bbox(view.rect.expand(self.params.prerender).to_rect())
            .intersect(rect);

        // Cap the size, clipping towards the centre of the screen.
        let factor = if graphics.is_accelerated() { 1.7 } else { 0.8 };
        let max_dim = f64::from(view.rect.max_extent()) * factor;
        let (w, h) = (rect.width().min(max_dim), rect.height().min(max_dim));
        let c = view_to_new * view.rect.center();
        let c = Point::new(
            safe_clamp(c.x, rect.x0 + w * 0.5, rect.x1 - w * 0.5),
            safe_clamp(c.y, rect.y0 + h * 0.5, rect.y1 - h * 0.5),
        );
        rect = Rect::from_center_size(c, (w, h));

        // Never clip away what is about to be shown; lose resolution instead.
        if renderable.area() > 0.0 && !rect_contains(rect, renderable) {
            let old = rect;
            rect = rect.union(renderable);
            let shrink = 1.0 / (rect.width() / old.width()).max(rect.height() / old.height());
            rect = scale_rect(rect, shrink);
            affine = Affine::scale(shrink) * affine;
        }

        log::debug!(
            "New fragment dimensions {:.1} {:.1}",
            rect.width(),
            rect.height()
        );

        let (sw, sh) = self.snapshot.rect.dimensions();
        let same_size =
            rect.width().round() == f64::from(sw) && rect.height().round() == f64::from(sh);
        let fast = same_size
            && self
                .paste_transform(affine, rect)
                .is_some_and(|p| is_identity(p, self.params.identity_tolerance));
        if fast {
            log::debug!("Fast snapshot combine");
            graphics.fast_snapshot_combine(&self.store, &self.snapshot);
        } else {
            let dest = Fragment::new(affine, IntRect::round_out(rect));
            graphics.snapshot_combine(&self.store, &self.snapshot, &dest);
            self.snapshot.rect = dest.rect;
            self.snapshot.affine = dest.affine;
        }

        self.recreate_store(view, graphics);
        let to_store = self.store.affine * old_store_affine.inverse();
        self.snapshot.drawn = self
            .snapshot
            .drawn
            .affine_approx_inwards(to_store, self.store.rect, APPROX_CHUNK)
            .shrink(4, -2);
    }

    /// Maps the snapshot's unit square onto the unit square of the
    /// candidate fragment `(affine, rect)`.
    fn paste_transform(&self, affine: Affine, rect: Rect) -> Option<Affine> {
        if rect.width() <= 0.0 || rect.height() <= 0.0 || self.snapshot.rect.is_empty() {
            return None;
        }
        let snap = self.snapshot.rect.to_rect();
        Some(
            Affine::scale_non_uniform(1.0 / rect.width(), 1.0 / rect.height())
                * Affine::translate(-rect.origin().to_vec2())
                * affine
                * self.snapshot.affine.inverse()
                * Affine::translate(snap.origin().to_vec2())
                * Affine::scale_non_uniform(snap.width(), snap.height()),
        )
    }
}

fn scale_rect(r: Rect, s: f64) -> Rect {
    Rect::new(r.x0 * s, r.y0 * s, r.x1 * s, r.y1 * s)
}

fn rect_contains(outer: Rect, inner: Rect) -> bool {
    const EPS: f64 = 1e-9;
    inner.x0 >= outer.x0 - EPS
        && inner.y0 >= outer.y0 - EPS
        && inner.x1 <= outer.x1 + EPS
        && inner.y1 <= outer.y1 + EPS
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{PageInfo, PaintArgs, Tile, TileSurfaceSource};
    use crate::surface::{Rgba, Surface};

    #[derive(Debug, Default)]
    struct RecordingGraphics {
        calls: Vec<&'static str>,
    }

    struct NoSurfaces;

    impl TileSurfaceSource for NoSurfaces {
        fn request_tile_surface(&self, _: IntRect, _: bool) -> Option<Surface> {
            None
        }
        fn junk_tile_surface(&self, _: Surface) {}
    }

    impl Graphics for RecordingGraphics {
        fn is_accelerated(&self) -> bool {
            false
        }
        fn set_scale_factor(&mut self, _: i32) {}
        fn set_outlines_enabled(&mut self, _: bool) {}
        fn set_background_in_stores(&mut self, _: bool) {}
        fn set_colours(&mut self, _: Rgba, _: Rgba, _: Rgba) {}
        fn set_pages(&mut self, _: PageInfo) {}
        fn recreate_store(&mut self, _: &Fragment) {
            self.calls.push("recreate");
        }
        fn shift_store(&mut self, _: &Store, _: &Fragment) {
            self.calls.push("shift");
        }
        fn swap_stores(&mut self) {
            self.calls.push("swap");
        }
        fn fast_snapshot_combine(&mut self, _: &Store, _: &Store) {
            self.calls.push("fast_combine");
        }
        fn snapshot_combine(&mut self, _: &Store, _: &Store, _: &Fragment) {
            self.calls.push("combine");
        }
        fn invalidate_snapshot(&mut self) {
            self.calls.push("invalidate_snapshot");
        }
        fn tile_surfaces(&self) -> Arc<dyn TileSurfaceSource> {
            Arc::new(NoSurfaces)
        }
        fn draw_tile(&mut self, _: &Store, _: &Tile) {}
        fn paint_widget(&mut self, _: &Fragment, _: &Stores, _: &PaintArgs, _: &mut Surface) {}
    }

    fn view(affine: Affine, x: i32, y: i32) -> Fragment {
        Fragment::new(affine, IntRect::from_xywh(x, y, 800, 600))
    }

    #[test]
    fn first_update_recreates() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        let v = view(Affine::IDENTITY, 0, 0);
        assert_eq!(stores.update(&v, &mut g), Action::Recreated);
        assert_eq!(stores.mode(), Mode::Normal);
        assert_eq!(stores.store().rect, v.rect.expand(450));
        assert_eq!(g.calls, ["recreate"]);
        assert_eq!(stores.update(&v, &mut g), Action::None, "unchanged view");
    }

    #[test]
    fn small_pan_keeps_store() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        assert_eq!(
            stores.update(&view(Affine::IDENTITY, 300, 0), &mut g),
            Action::None,
            "prerender margin still inside padding"
        );
    }

    #[test]
    fn pan_past_padding_shifts_and_keeps_drawn_content() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        let v0 = view(Affine::IDENTITY, 0, 0);
        stores.update(&v0, &mut g);
        let drawn = IntRect::new(-450, -450, 1250, 1050);
        stores.mark_drawn(drawn);

        let v1 = view(Affine::IDENTITY, 400, 0);
        assert_eq!(stores.update(&v1, &mut g), Action::Shifted);
        let new_rect = v1.rect.expand(450);
        assert_eq!(stores.store().rect, new_rect);
        let mut expected = Region::from_rect(drawn);
        expected.intersect_rect(new_rect);
        assert_eq!(stores.store().drawn, expected);
        assert_eq!(g.calls, ["recreate", "shift"]);
    }

    #[test]
    fn pan_by_fifty_shifts_store_once_margin_reached() {
        // A store whose prerender margin sits exactly at the edge.
        let config = CanvasConfig {
            padding: 0,
            ..CanvasConfig::default()
        };
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&config);
        let v0 = view(Affine::IDENTITY, 0, 0);
        stores.update(&v0, &mut g);
        stores.mark_drawn(stores.store().rect);
        let before = stores.store().drawn.clone();

        let old_rect = stores.store().rect;

        let v1 = view(Affine::IDENTITY, 50, 0);
        assert_eq!(stores.update(&v1, &mut g), Action::Shifted, "shift, not recreate");
        let new_rect = stores.store().rect;
        let mut expected = before;
        expected.intersect_rect(new_rect);
        assert_eq!(stores.store().drawn, expected);

        // Relative to the buffer origin, content moved left by the pan.
        let mut local_after = stores.store().drawn.clone();
        local_after.translate(-new_rect.x0, -new_rect.y0);
        let mut local_expected = expected;
        local_expected.translate(-old_rect.x0 - 50, -old_rect.y0);
        assert_eq!(local_after, local_expected, "store-local content shifted by -50");
        assert_eq!(
            stores.store().drawn,
            Region::from_rect(IntRect::new(-50, -100, 900, 700))
        );
    }

    #[test]
    fn far_jump_recreates_instead_of_shifting() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        stores.mark_drawn(IntRect::new(0, 0, 100, 100));
        assert_eq!(
            stores.update(&view(Affine::IDENTITY, 10_000, 0), &mut g),
            Action::Recreated
        );
        assert!(stores.store().drawn.is_empty());
    }

    #[test]
    fn zoom_enters_decoupled_mode_with_snapshot() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        let a = Affine::IDENTITY;
        let b = Affine::scale(2.0);
        stores.update(&view(a, 0, 0), &mut g);
        stores.mark_drawn(IntRect::new(0, 0, 800, 600));

        assert_eq!(stores.update(&view(b, 800, 600), &mut g), Action::Recreated);
        assert_eq!(stores.mode(), Mode::Decoupled);
        assert_eq!(stores.snapshot().affine, a);
        assert!(!stores.snapshot().drawn.is_empty(), "snapshot keeps content");
        assert_eq!(stores.store().affine, b);
        assert!(stores.store().drawn.is_empty(), "fresh store");
        assert_eq!(g.calls, ["recreate", "swap", "recreate"]);
    }

    #[test]
    fn finished_draw_leaves_decoupled_when_caught_up() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        let zoomed = view(Affine::scale(2.0), 800, 600);
        stores.update(&zoomed, &mut g);

        assert_eq!(stores.finished_draw(&zoomed, &mut g), Action::None);
        assert_eq!(stores.mode(), Mode::Normal);
        assert_eq!(g.calls.last(), Some(&"invalidate_snapshot"));
    }

    #[test]
    fn finished_draw_resnapshots_when_view_moved_on() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        stores.update(&view(Affine::scale(2.0), 800, 600), &mut g);

        let further = view(Affine::scale(2.5), 1200, 900);
        assert_eq!(stores.finished_draw(&further, &mut g), Action::Recreated);
        assert_eq!(stores.mode(), Mode::Decoupled);
        assert_eq!(stores.store().affine, further.affine);
    }

    #[test]
    fn large_zoom_restarts_with_combined_snapshot() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        stores.mark_drawn(IntRect::new(0, 0, 800, 600));
        stores.update(&view(Affine::scale(1.2), 80, 60), &mut g);
        assert_eq!(stores.mode(), Mode::Decoupled);

        // det ratio 6.25 / 1.44 > 3
        let action = stores.update(&view(Affine::scale(2.5), 500, 375), &mut g);
        assert_eq!(action, Action::Recreated);
        assert!(
            g.calls.iter().any(|c| *c == "combine" || *c == "fast_combine"),
            "restart combines the snapshot: {:?}",
            g.calls
        );
        assert_eq!(stores.store().affine, Affine::scale(2.5));
        assert_eq!(stores.mode(), Mode::Decoupled);
    }

    #[test]
    fn small_zoom_does_not_restart() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        stores.update(&view(Affine::scale(1.1), 40, 30), &mut g);
        let before = g.calls.len();
        assert_eq!(
            stores.update(&view(Affine::scale(1.2), 80, 60), &mut g),
            Action::None
        );
        assert_eq!(g.calls.len(), before, "no backend work");
    }

    #[test]
    fn sticky_decoupled_never_restarts_or_exits() {
        let config = CanvasConfig {
            debug_sticky_decoupled: true,
            ..CanvasConfig::default()
        };
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&config);
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        let zoomed = view(Affine::scale(2.0), 800, 600);
        stores.update(&zoomed, &mut g);
        assert_eq!(stores.update(&view(Affine::scale(8.0), 0, 0), &mut g), Action::None);
        assert_eq!(stores.finished_draw(&zoomed, &mut g), Action::None);
        assert_eq!(stores.mode(), Mode::Decoupled);
    }

    #[test]
    fn reset_returns_to_none() {
        let mut g = RecordingGraphics::default();
        let mut stores = Stores::new(&CanvasConfig::default());
        stores.update(&view(Affine::IDENTITY, 0, 0), &mut g);
        stores.mark_drawn(IntRect::new(0, 0, 10, 10));
        stores.reset();
        assert_eq!(stores.mode(), Mode::None);
        assert!(stores.store().drawn.is_empty());
    }
}
