// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The background tiling loop.
//!
//! A redraw cycle walks through up to four phases in priority order. Each
//! phase turns a target rectangle minus a clean region into a heap of
//! rectangles ordered by distance from the mouse, and the workers pull from
//! that heap until it is empty, then move on to the next phase.
//!
//! ```text
//!   phase 0  visible ∖ (clean ∪ snapshot)   decoupled mode only
//!   phase 1  grabbed item ∖ clean           no time budget, no widening
//!   phase 2  visible ∖ next clean region    repeated while the updater asks
//!   phase 3  prerender margin ∖ clean       abandoned on soft abort
//! ```
//!
//! Worker loop, holding the scheduler lock except while painting:
//!
//! ```text
//!   heap empty? ──► end_redraw ──► next phase or stop
//!   abort?      ──► stop
//!   pop nearest ──► empty or clean? skip
//!               ──► overlaps a busy tile? push the rest
//!               ──► too big? split, push halves
//!               ──► widen thin edge slivers
//!               ──► mark clean ─ unlock ─ paint ─ lock ─► over budget? stop
//! ```
//!
//! The last worker to stop clears the heap and signals the synchronizer.

use core::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use fresco_core::backend::{PageInfo, Tile, TileSurfaceSource, paint_background};
use fresco_core::fragment::Fragment;
use fresco_core::geom::IntRect;
use fresco_core::region::{Overlap, Region};
use fresco_core::surface::{Rgba, Surface};
use fresco_core::trace::{CycleOutcome, PhaseBeginEvent, PhaseEndEvent, TilePaintedEvent, TraceEvent};
use fresco_core::updater::Updater;
use kurbo::Point;
use parking_lot::{Mutex, MutexGuard};

use crate::coarsen::{bisect, coarsen, split};
use crate::drawing::{Drawing, TileContext};
use crate::pool::WorkerPool;
use crate::sync::Synchronizer;

/// Abort the prerender phase.
pub(crate) const ABORT_SOFT: u8 = 1;
/// Abort everything.
pub(crate) const ABORT_HARD: u8 = 2;

/// Published phase while no cycle is running.
pub(crate) const PHASE_IDLE: u8 = u8::MAX;

/// The prerender phase, the only one a soft abort interrupts.
pub(crate) const PHASE_PRERENDER: u8 = 3;

/// Everything a cycle needs, fixed at launch.
pub(crate) struct CycleParams {
    pub(crate) cycle: u64,
    pub(crate) store: Fragment,
    pub(crate) decoupled: bool,
    pub(crate) snapshot_drawn: Region,
    pub(crate) visible: IntRect,
    pub(crate) grabbed: Option<IntRect>,
    pub(crate) mouse: Point,
    pub(crate) first_phase: u8,
    pub(crate) margin: i32,
    pub(crate) preempt: i32,
    pub(crate) tile_size: i32,
    pub(crate) coarsener_min_size: i32,
    pub(crate) coarsener_glue_size: i32,
    pub(crate) coarsener_min_fullness: f64,
    pub(crate) render_time_limit: Duration,
    pub(crate) num_threads: usize,
    pub(crate) device_scale: i32,
    pub(crate) outlines: bool,
    pub(crate) background_in_stores: bool,
    pub(crate) page: Rgba,
    pub(crate) desk: Rgba,
    pub(crate) pages: PageInfo,
    pub(crate) debug_show_redraw: bool,
    pub(crate) debug_delay: Option<Duration>,
    pub(crate) tracing: bool,
    pub(crate) surfaces: Arc<dyn TileSurfaceSource>,
    pub(crate) pool: Weak<WorkerPool>,
}

/// A heap entry; the nearest rectangle compares greatest.
#[derive(Clone, Copy, Debug)]
struct Queued {
    distance_sq: f64,
    rect: IntRect,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.distance_sq.total_cmp(&self.distance_sq)
    }
}

/// Scheduler state guarded by [`Shared::data`].
pub(crate) struct RedrawData {
    pub(crate) updater: Box<dyn Updater>,
    pub(crate) params: Option<Arc<CycleParams>>,
    pub(crate) phase: u8,
    pub(crate) timed_out: bool,
    pub(crate) aborted: Option<CycleOutcome>,
    pub(crate) events: Vec<TraceEvent>,
    vis_store: Option<IntRect>,
    bounds: IntRect,
    clean: Region,
    interruptible: bool,
    preemptible: bool,
    rects: BinaryHeap<Queued>,
    in_flight: Vec<IntRect>,
    mouse: Point,
    effective_tile_size: i32,
    start_time: Instant,
    num_active: usize,
}

impl RedrawData {
    pub(crate) fn new(updater: Box<dyn Updater>) -> Self {
        Self {
            updater,
            params: None,
            phase: 0,
            timed_out: false,
            aborted: None,
            events: Vec::new(),
            vis_store: None,
            bounds: IntRect::default(),
            clean: Region::new(),
            interruptible: true,
            preemptible: true,
            rects: BinaryHeap::new(),
            in_flight: Vec::new(),
            mouse: Point::ZERO,
            effective_tile_size: 1,
            start_time: Instant::now(),
            num_active: 0,
        }
    }

    fn push(&mut self, rect: IntRect) {
        self.rects.push(Queued {
            distance_sq: rect.distance_sq(self.mouse),
            rect,
        });
    }

    /// Loads the work list for one phase.
    fn process_redraw(
        &mut self,
        params: &CycleParams,
        bounds: IntRect,
        clean: Region,
        interruptible: bool,
        preemptible: bool,
    ) {
        debug_assert!(
            params.store.rect.contains_rect(&bounds),
            "redraw target {bounds:?} outside store {:?}",
            params.store.rect
        );
        self.bounds = bounds;
        self.clean = clean;
        // Tiles still being painted from the previous phase count as clean.
        for r in &self.in_flight {
            self.clean.union_rect(*r);
        }
        self.interruptible = interruptible;
        self.preemptible = preemptible;

        let mut region = Region::from_rect(bounds);
        region.subtract(&self.clean);

        let half_tile = params.tile_size / 2;
        let rects = coarsen(
            &region,
            params.coarsener_min_size.min(half_tile),
            params.coarsener_glue_size.min(half_tile),
            params.coarsener_min_fullness,
        );
        self.rects.clear();
        for r in rects {
            self.push(r);
        }

        // Smaller tiles when the area is a small part of the screen, so
        // partial results show up sooner.
        let visible = params.visible.max_extent();
        let adjust = match region.extents() {
            Some(ext) if visible > 0 => {
                (f64::from(ext.max_extent()) / f64::from(visible)).clamp(0.3, 1.0)
            }
            Some(_) => 1.0,
            None => 0.3,
        };
        #[expect(
            clippy::cast_possible_truncation,
            reason = "product of a positive i32 and a factor at most one"
        )]
        let size = (f64::from(params.tile_size) * adjust) as i32;
        self.effective_tile_size = size.max(1);
    }

    /// Thin rectangles on the edge of the target grow towards the outside,
    /// staying within the store.
    fn widen(&self, mut rect: IntRect, params: &CycleParams) -> IntRect {
        let store = params.store.rect;
        let preempt = params.preempt;
        if rect.width() < preempt {
            if rect.x0 == self.bounds.x0 {
                rect.x0 = (rect.x1 - preempt).max(store.x0);
            }
            if rect.x1 == self.bounds.x1 {
                rect.x1 = (rect.x0 + preempt).min(store.x1);
            }
        }
        if rect.height() < preempt {
            if rect.y0 == self.bounds.y0 {
                rect.y0 = (rect.y1 - preempt).max(store.y0);
            }
            if rect.y1 == self.bounds.y1 {
                rect.y1 = (rect.y0 + preempt).min(store.y1);
            }
        }
        rect
    }
}

/// State shared between the canvas and its workers.
pub(crate) struct Shared {
    pub(crate) data: Mutex<RedrawData>,
    pub(crate) tiles: Mutex<Vec<Tile>>,
    pub(crate) abort: AtomicU8,
    pub(crate) phase: AtomicU8,
    pub(crate) damage_pending: AtomicBool,
    pub(crate) sync: Synchronizer,
    pub(crate) drawing: Arc<dyn Drawing>,
    pub(crate) epoch: Instant,
}

impl Shared {
    pub(crate) fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn publish_phase(&self, phase: u8) {
        self.phase.store(phase, Ordering::Release);
    }
}

/// Starts a cycle. Runs on a worker thread.
pub(crate) fn init_tiler(shared: &Arc<Shared>) {
    let mut rd = shared.data.lock();
    let Some(params) = rd.params.clone() else {
        drop(rd);
        shared.sync.signal_exit();
        return;
    };

    rd.start_time = Instant::now();
    rd.phase = params.first_phase;
    rd.timed_out = false;
    rd.aborted = None;
    rd.mouse = params.mouse;
    rd.vis_store = params.visible.intersect(&params.store.rect);

    if !init_redraw(&mut rd, shared, &params) {
        shared.publish_phase(PHASE_IDLE);
        drop(rd);
        shared.sync.signal_exit();
        return;
    }

    let pool = params.pool.upgrade();
    let helpers = match &pool {
        Some(_) => params.num_threads.max(1) - 1,
        None => 0,
    };
    rd.num_active = helpers + 1;
    drop(rd);

    if let Some(pool) = pool {
        for _ in 0..helpers {
            let shared = Arc::clone(shared);
            pool.execute(move || render_tile(&shared));
        }
    }

    render_tile(shared);
}

/// Picks the next phase with work, starting from the current one.
fn init_redraw(rd: &mut RedrawData, shared: &Shared, params: &CycleParams) -> bool {
    debug_assert!(rd.rects.is_empty(), "previous phase left work behind");

    loop {
        match rd.phase {
            0 => {
                if let (Some(vis), true) = (rd.vis_store, params.decoupled) {
                    let mut clean = rd.updater.clean_region().clone();
                    clean.union(&params.snapshot_drawn);
                    rd.process_redraw(params, vis, clean, true, true);
                    break;
                }
            }
            1 => {
                if let Some(grabbed) = params.grabbed {
                    let clean = rd.updater.clean_region().clone();
                    rd.process_redraw(params, grabbed, clean, false, false);
                    break;
                }
            }
            2 => {
                if let Some(vis) = rd.vis_store {
                    let clean = rd.updater.next_clean_region();
                    rd.process_redraw(params, vis, clean, true, true);
                    break;
                }
            }
            PHASE_PRERENDER => {
                if shared.damage_pending.load(Ordering::Acquire) {
                    log::debug!("Skipping prerender for pending damage");
                    return false;
                }
                let prerender = params.visible.expand(params.margin);
                let Some(target) = prerender.intersect(&params.store.rect) else {
                    return false;
                };
                let clean = rd.updater.clean_region().clone();
                rd.process_redraw(params, target, clean, true, true);
                break;
            }
            _ => {
                debug_assert!(false, "invalid phase {}", rd.phase);
                return false;
            }
        }
        rd.phase += 1;
    }

    shared.publish_phase(rd.phase);
    if params.tracing {
        let e = PhaseBeginEvent {
            cycle: params.cycle,
            phase: rd.phase,
            timestamp_ns: shared.now_ns(),
        };
        rd.events.push(TraceEvent::PhaseBegin(e));
    }
    true
}

/// Moves past a drained phase. Returns `true` if there is more work.
fn end_redraw(rd: &mut RedrawData, shared: &Shared, params: &CycleParams) -> bool {
    if params.tracing {
        let e = PhaseEndEvent {
            cycle: params.cycle,
            phase: rd.phase,
            timestamp_ns: shared.now_ns(),
        };
        rd.events.push(TraceEvent::PhaseEnd(e));
    }

    match rd.phase {
        0 => {
            rd.phase = 1;
            init_redraw(rd, shared, params)
        }
        1 => {
            rd.phase = 2;
            // Fresh budget for clearing up after the grabbed item.
            rd.start_time = Instant::now();
            init_redraw(rd, shared, params)
        }
        2 => {
            if !rd.updater.report_finished() {
                rd.phase = PHASE_PRERENDER;
            }
            init_redraw(rd, shared, params)
        }
        _ => false,
    }
}

/// Processes rectangles until none are left, the budget runs out, or the
/// cycle is aborted.
pub(crate) fn render_tile(shared: &Arc<Shared>) {
    let mut rd = shared.data.lock();
    let Some(params) = rd.params.clone() else {
        return;
    };

    loop {
        if rd.rects.is_empty() {
            if end_redraw(&mut rd, shared, &params) {
                continue;
            }
            break;
        }

        let flags = shared.abort.load(Ordering::Acquire);
        if flags & ABORT_HARD != 0 {
            rd.aborted = Some(CycleOutcome::HardAborted);
            break;
        }
        // Damage noticed after the phase began but before the flag could be
        // raised also ends the prerender.
        let soft = flags & ABORT_SOFT != 0 || shared.damage_pending.load(Ordering::Acquire);
        if soft && rd.phase == PHASE_PRERENDER {
            rd.aborted = Some(CycleOutcome::SoftAborted);
            break;
        }

        let Some(Queued { rect, .. }) = rd.rects.pop() else {
            continue;
        };

        if rect.is_empty() {
            continue;
        }

        // Partly clean rects are painted whole; only fully clean ones go.
        if rd.clean.contains_rect(rect) == Overlap::In {
            continue;
        }

        // Tiles painted at the same time stay disjoint. Whatever another
        // worker is not busy with goes back in the heap.
        if rd.in_flight.iter().any(|r| r.intersects(&rect)) {
            let mut rest = Region::from_rect(rect);
            for r in &rd.in_flight {
                rest.subtract_rect(*r);
            }
            for r in rest.rects().to_vec() {
                rd.push(r);
            }
            continue;
        }

        if let Some(axis) = bisect(&rect, rd.effective_tile_size) {
            let (lo, hi) = split(&rect, axis);
            rd.push(lo);
            rd.push(hi);
            continue;
        }

        let rect = if rd.preemptible {
            let widened = rd.widen(rect, &params);
            if rd.in_flight.iter().any(|r| r.intersects(&widened)) {
                rect
            } else {
                widened
            }
        } else {
            rect
        };

        rd.updater.mark_clean(rect);
        rd.clean.union_rect(rect);
        rd.in_flight.push(rect);
        let phase = rd.phase;

        let start_ns = shared.now_ns();
        let painted = MutexGuard::unlocked(&mut rd, || paint_rect(shared, &params, rect));
        if let Some(i) = rd.in_flight.iter().position(|r| *r == rect) {
            rd.in_flight.swap_remove(i);
        }
        if !painted {
            rd.updater.mark_dirty_rect(rect);
        }

        if params.tracing {
            let e = TilePaintedEvent {
                cycle: params.cycle,
                phase,
                rect,
                start_ns,
                end_ns: shared.now_ns(),
            };
            rd.events.push(TraceEvent::TilePainted(e));
        }

        if rd.interruptible && rd.start_time.elapsed() > params.render_time_limit {
            rd.timed_out = true;
            break;
        }
    }

    rd.num_active -= 1;
    let done = rd.num_active == 0;
    if done {
        rd.rects.clear();
        shared.publish_phase(PHASE_IDLE);
    }
    drop(rd);

    if done {
        shared.sync.signal_exit();
    }
}

/// Paints one tile and queues it for the UI thread. Returns `false` if no
/// surface could be obtained.
fn paint_rect(shared: &Arc<Shared>, params: &CycleParams, rect: IntRect) -> bool {
    debug_assert!(
        params.store.rect.contains_rect(&rect),
        "tile {rect:?} outside store {:?}",
        params.store.rect
    );

    let Some(surface) = paint_pass(shared, params, rect, params.background_in_stores, false) else {
        return false;
    };
    let outline_surface = if params.outlines {
        paint_pass(shared, params, rect, false, true)
    } else {
        None
    };

    if let Some(delay) = params.debug_delay {
        std::thread::sleep(delay);
    }

    let tile = Tile {
        fragment: Fragment::new(params.store.affine, rect),
        surface,
        outline_surface,
    };
    shared.tiles.lock().push(tile);
    true
}

fn paint_pass(
    shared: &Arc<Shared>,
    params: &CycleParams,
    rect: IntRect,
    need_background: bool,
    outline_pass: bool,
) -> Option<Surface> {
    let mut surface = match params.surfaces.request_tile_surface(rect, false) {
        Some(s) => s,
        None => {
            let source = Arc::clone(&params.surfaces);
            let result = shared.sync.run_in_main(move || {
                log::debug!("Blocked - buffer mapping");
                source.request_tile_surface(rect, true)
            });
            match result {
                Ok(Some(s)) => s,
                Ok(None) => {
                    log::error!("No surface available for tile {rect:?}");
                    return None;
                }
                Err(e) => {
                    log::error!("Surface request for tile {rect:?} failed: {e}");
                    return None;
                }
            }
        }
    };

    if need_background {
        let frag = Fragment::new(params.store.affine, rect);
        paint_background(&mut surface, &frag, &params.pages, params.page, params.desk);
    } else {
        surface.fill(0);
    }

    let ctx = TileContext {
        rect,
        affine: params.store.affine,
        device_scale: params.device_scale,
        outline_pass,
    };
    match shared.drawing.render(&mut surface, &ctx) {
        Ok(()) => {
            if params.debug_show_redraw {
                let bounds = surface.bounds();
                surface.blend_rect(bounds, redraw_tint(params.cycle, rect));
            }
            Some(surface)
        }
        Err(e) => {
            let source = Arc::clone(&params.surfaces);
            let fallback = shared.sync.run_in_main(move || {
                log::warn!("Rendering failure. You probably need to zoom out! ({e})");
                source.junk_tile_surface(surface);
                let mut s = source.request_tile_surface(rect, true)?;
                s.fill(Rgba::BLACK.to_premul_argb());
                Some(s)
            });
            fallback.ok().flatten()
        }
    }
}

/// A translucent colour that differs between neighbouring tiles and cycles.
fn redraw_tint(cycle: u64, rect: IntRect) -> u32 {
    let mut h = cycle ^ 0x9e37_79b9_7f4a_7c15;
    for v in [rect.x0, rect.y0, rect.x1, rect.y1] {
        h ^= u64::from(v.cast_unsigned());
        h = h.wrapping_mul(0x0100_0000_01b3);
        h ^= h >> 29;
    }
    #[expect(clippy::cast_possible_truncation, reason = "keeps the low 24 bits")]
    let rgb = (h as u32) & 0x00ff_ffff;
    // Alpha 0.2.
    Rgba((rgb << 8) | 51).to_premul_argb()
}

#[cfg(test)]
mod tests {
    use fresco_core::updater::Strategy;
    use kurbo::Affine;

    use super::*;

    fn params(store: IntRect, visible: IntRect) -> CycleParams {
        struct NoSurfaces;
        impl TileSurfaceSource for NoSurfaces {
            fn request_tile_surface(&self, _: IntRect, _: bool) -> Option<Surface> {
                None
            }
            fn junk_tile_surface(&self, _: Surface) {}
        }
        CycleParams {
            cycle: 1,
            store: Fragment::new(Affine::IDENTITY, store),
            decoupled: false,
            snapshot_drawn: Region::new(),
            visible,
            grabbed: None,
            mouse: visible.center(),
            first_phase: 0,
            margin: 100,
            preempt: 250,
            tile_size: 300,
            coarsener_min_size: 200,
            coarsener_glue_size: 80,
            coarsener_min_fullness: 0.3,
            render_time_limit: Duration::from_millis(80),
            num_threads: 1,
            device_scale: 1,
            outlines: false,
            background_in_stores: false,
            page: Rgba::WHITE,
            desk: Rgba::WHITE,
            pages: PageInfo::default(),
            debug_show_redraw: false,
            debug_delay: None,
            tracing: false,
            surfaces: Arc::new(NoSurfaces),
            pool: Weak::new(),
        }
    }

    #[test]
    fn heap_pops_nearest_first() {
        let mut rd = RedrawData::new(Strategy::Responsive.create(Region::new()));
        rd.mouse = Point::new(0.0, 0.0);
        rd.push(IntRect::new(500, 0, 600, 100));
        rd.push(IntRect::new(0, 0, 100, 100));
        rd.push(IntRect::new(200, 0, 300, 100));
        let order: Vec<i32> = core::iter::from_fn(|| rd.rects.pop().map(|q| q.rect.x0)).collect();
        assert_eq!(order, [0, 200, 500], "ascending distance from the mouse");
    }

    #[test]
    fn effective_tile_size_shrinks_for_small_areas() {
        let store = IntRect::new(-450, -450, 1250, 1050);
        let visible = IntRect::new(0, 0, 800, 600);
        let p = params(store, visible);
        let mut rd = RedrawData::new(Strategy::Responsive.create(Region::new()));

        rd.process_redraw(&p, visible, Region::new(), true, true);
        assert_eq!(rd.effective_tile_size, 300, "full screen uses full tiles");

        rd.process_redraw(&p, IntRect::new(0, 0, 80, 80), Region::new(), true, true);
        assert_eq!(rd.effective_tile_size, 90, "clamped at 0.3");
    }

    #[test]
    fn widen_grows_edge_slivers_within_store() {
        let store = IntRect::new(-450, -450, 1250, 1050);
        let visible = IntRect::new(0, 0, 800, 600);
        let p = params(store, visible);
        let mut rd = RedrawData::new(Strategy::Responsive.create(Region::new()));
        rd.process_redraw(&p, visible, Region::new(), true, true);

        let sliver = IntRect::new(790, 0, 800, 300);
        let widened = rd.widen(sliver, &p);
        assert_eq!(widened, IntRect::new(790, 0, 1040, 300), "grows outwards by preempt");

        let interior = IntRect::new(300, 100, 310, 400);
        assert_eq!(rd.widen(interior, &p), interior, "not touching the bounds");

        let corner = IntRect::new(0, 400, 5, 600);
        let w = rd.widen(corner, &p);
        assert_eq!(w.x0, -245, "grows left from its right edge");
        assert_eq!(w.y1, 650, "grows down from its top edge");
    }

    #[test]
    fn widen_stops_at_store_edge() {
        let store = IntRect::new(0, 0, 900, 700);
        let visible = IntRect::new(0, 0, 800, 600);
        let p = params(store, visible);
        let mut rd = RedrawData::new(Strategy::Responsive.create(Region::new()));
        rd.process_redraw(&p, visible, Region::new(), true, true);
        let w = rd.widen(IntRect::new(790, 100, 800, 400), &p);
        assert_eq!(w.x1, 900, "clamped to the store");
    }

    #[test]
    fn clean_target_produces_no_work() {
        let store = IntRect::new(-450, -450, 1250, 1050);
        let visible = IntRect::new(0, 0, 800, 600);
        let p = params(store, visible);
        let mut rd = RedrawData::new(Strategy::Responsive.create(Region::new()));
        rd.process_redraw(&p, visible, Region::from_rect(store), true, true);
        assert!(rd.rects.is_empty(), "nothing dirty");
    }

    #[test]
    fn tints_are_translucent() {
        let t = redraw_tint(3, IntRect::new(0, 0, 10, 10));
        assert_eq!(t >> 24, 51, "alpha 0.2");
        assert_ne!(t, redraw_tint(3, IntRect::new(10, 0, 20, 10)), "neighbours differ");
    }
}
