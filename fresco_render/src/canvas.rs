// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The canvas: viewport state, invalidation, and the redraw loop.
//!
//! [`Canvas`] lives on the UI thread. Requests that need new pixels
//! ([`redraw_area`](Canvas::redraw_area), [`set_affine`](Canvas::set_affine),
//! ...) schedule a redraw and call the host waker; the host responds by
//! calling [`dispatch`](Canvas::dispatch) from its event loop. A redraw runs
//! as a chain of cycles:
//!
//! ```text
//!   schedule_redraw ─► waker ─► dispatch ─► launch_redraw
//!                                            │ Stores::update
//!                                            │ updater.mark_dirty(invalidated)
//!                                            ▼
//!                                       worker pool: init_tiler ─► render_tile × N
//!                                                                   │
//!   dispatch ◄─ waker ◄─ Synchronizer::signal_exit ◄─────────────────┘
//!      │
//!      ▼
//!   after_redraw: commit tiles, Stores::finished_draw,
//!                 relaunch if timed out, requested again, or stores changed
//! ```
//!
//! Committed tiles add to [`take_repaint_region`](Canvas::take_repaint_region),
//! which the host uses to decide what to repaint with
//! [`paint_widget`](Canvas::paint_widget).

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fresco_core::backend::{Graphics, PageInfo, PaintArgs, Tile};
use fresco_core::config::{BackgroundPolicy, CanvasConfig, ConfigError};
use fresco_core::fragment::Fragment;
use fresco_core::geom::{IntPoint, IntRect, round_point};
use fresco_core::region::Region;
use fresco_core::stores::{Action, Mode, Stores};
use fresco_core::surface::{Rgba, Surface};
use fresco_core::trace::{
    CycleBeginEvent, CycleEndEvent, CycleOutcome, StoresTransitionEvent, TraceEvent, TraceSink,
    Tracer,
};
use fresco_core::updater::Strategy;
use kurbo::{Affine, Point, Rect, Vec2};
use parking_lot::Mutex;

use crate::drawing::Drawing;
use crate::pool::WorkerPool;
use crate::sync::Synchronizer;
use crate::tiler::{
    ABORT_HARD, ABORT_SOFT, CycleParams, PHASE_IDLE, PHASE_PRERENDER, RedrawData, Shared,
    init_tiler,
};

/// Smallest and largest coordinates accepted by [`Canvas::redraw_area`].
const MIN_COORD: i32 = -(1 << 30);
const MAX_COORD: i32 = (1 << 30) - 1;

/// Summary of a finished redraw cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle counter, starting at 1.
    pub cycle: u64,
    /// Phase the cycle started in. Non-zero when resuming after a timeout.
    pub first_phase: u8,
    /// Phase the cycle was in when it stopped.
    pub last_phase: u8,
    /// Tiles committed to the store during the cycle.
    pub tiles: u32,
    /// Why the cycle stopped.
    pub outcome: CycleOutcome,
}

/// A zoomable, rotatable view onto a document, redrawn asynchronously in
/// tiles.
pub struct Canvas {
    config: CanvasConfig,
    graphics: Box<dyn Graphics>,
    stores: Stores,
    shared: Arc<Shared>,
    pool: Arc<WorkerPool>,
    pool_stale: bool,
    waker: Arc<dyn Fn() + Send + Sync>,

    // Viewport.
    pos: IntPoint,
    dimensions: (i32, i32),
    affine: Affine,
    scale_factor: i32,
    applied_scale_factor: i32,
    outlines_requested: bool,
    outlines_enabled: bool,
    page: Rgba,
    desk: Rgba,
    border: Rgba,
    pages: PageInfo,
    background_in_stores: bool,
    grabbed: Option<Rect>,
    last_mouse: Option<Point>,

    // Invalidation.
    invalidated: Region,
    need_update: bool,
    drawing_affine: Option<Affine>,
    repaint: Region,

    // Redraw loop.
    active: bool,
    redraw_active: bool,
    redraw_requested: bool,
    launch_pending: bool,
    last_visible: Option<IntRect>,
    resume_phase: u8,
    cycle: u64,
    cycle_first_phase: u8,
    committed: u32,
    last_cycle: Option<CycleReport>,

    trace_sink: Option<Box<dyn TraceSink>>,
    pending_events: Vec<TraceEvent>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("pos", &self.pos)
            .field("dimensions", &self.dimensions)
            .field("affine", &self.affine)
            .field("mode", &self.stores.mode())
            .field("active", &self.active)
            .field("redraw_active", &self.redraw_active)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Creates an active canvas and schedules its first redraw.
    ///
    /// `waker` is called from any thread whenever [`dispatch`](Self::dispatch)
    /// should be run on the UI thread. It must not block.
    pub fn new<W>(
        config: CanvasConfig,
        graphics: Box<dyn Graphics>,
        drawing: Arc<dyn Drawing>,
        waker: W,
    ) -> Result<Self, ConfigError>
    where
        W: Fn() + Send + Sync + 'static,
    {
        config.validate()?;

        let waker: Arc<dyn Fn() + Send + Sync> = Arc::new(waker);
        let sync_waker = Arc::clone(&waker);
        let shared = Arc::new(Shared {
            data: Mutex::new(RedrawData::new(config.update_strategy.create(Region::new()))),
            tiles: Mutex::new(Vec::new()),
            abort: AtomicU8::new(0),
            phase: AtomicU8::new(PHASE_IDLE),
            damage_pending: AtomicBool::new(false),
            sync: Synchronizer::new(move || sync_waker()),
            drawing,
            epoch: Instant::now(),
        });
        let pool = Arc::new(WorkerPool::new(config.resolved_num_threads()));

        let mut canvas = Self {
            stores: Stores::new(&config),
            config,
            graphics,
            shared,
            pool,
            pool_stale: false,
            waker,
            pos: IntPoint::default(),
            dimensions: (0, 0),
            affine: Affine::IDENTITY,
            scale_factor: 1,
            applied_scale_factor: 1,
            outlines_requested: false,
            outlines_enabled: false,
            page: Rgba::WHITE,
            desk: Rgba::WHITE,
            border: Rgba::BLACK,
            pages: PageInfo::default(),
            background_in_stores: false,
            grabbed: None,
            last_mouse: None,
            invalidated: Region::new(),
            need_update: true,
            drawing_affine: None,
            repaint: Region::new(),
            active: false,
            redraw_active: false,
            redraw_requested: false,
            launch_pending: false,
            last_visible: None,
            resume_phase: 0,
            cycle: 0,
            cycle_first_phase: 0,
            committed: 0,
            last_cycle: None,
            trace_sink: None,
            pending_events: Vec::new(),
        };
        canvas.background_in_stores = canvas.background_in_stores_required();
        canvas.activate();
        Ok(canvas)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts accepting redraw requests and schedules a full redraw.
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.need_update = true;
        self.schedule_redraw();
    }

    /// Stops the redraw loop, waiting for any running cycle to abort.
    ///
    /// Requests are ignored until [`activate`](Self::activate) is called.
    pub fn deactivate(&mut self) {
        self.active = false;
        if !self.redraw_active {
            return;
        }
        if self.launch_pending {
            self.launch_pending = false;
        } else {
            self.shared.abort.fetch_or(ABORT_HARD, Ordering::AcqRel);
            log::debug!("Hard exit request");
            self.shared.sync.wait_for_exit();
            self.shared.drawing.unsnapshot();
            self.commit_tiles();
            self.drain_worker_events();
            self.flush_trace();
        }
        self.redraw_active = false;
        self.redraw_requested = false;
    }

    /// Runs pending redraw work. Call from the UI event loop after the
    /// waker fires.
    ///
    /// Returns `true` if part of the widget needs repainting; see
    /// [`take_repaint_region`](Self::take_repaint_region).
    pub fn dispatch(&mut self) -> bool {
        if self.launch_pending {
            log::debug!("Redraw start");
            self.launch_redraw();
        }
        if self.shared.sync.process_pending() && self.redraw_active {
            self.after_redraw();
        }
        !self.repaint.is_empty()
    }

    /// Blocks until the running cycle (launching one if scheduled) has been
    /// committed, and returns its report.
    ///
    /// A follow-up cycle may already be running when this returns. Returns
    /// `None` if no cycle was pending or running.
    pub fn finish_cycle(&mut self) -> Option<CycleReport> {
        if self.launch_pending {
            log::debug!("Redraw start");
            self.launch_redraw();
        }
        if !self.redraw_active {
            return None;
        }
        self.shared.sync.wait_for_exit();
        self.after_redraw();
        self.last_cycle
    }

    /// Blocks until the canvas is fully redrawn and idle.
    pub fn redraw_now(&mut self) {
        while self.finish_cycle().is_some() {}
    }

    /// Registers a callback fired from [`dispatch`](Self::dispatch) whenever
    /// a cycle ends.
    pub fn connect_exit<F: FnMut() + Send + 'static>(&self, slot: F) {
        self.shared.sync.connect_exit(slot);
    }

    /// Installs a sink receiving trace events, replayed on the UI thread at
    /// the end of each cycle. Only effective with the `trace` feature.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace_sink = sink;
    }

    // -----------------------------------------------------------------------
    // Invalidation
    // -----------------------------------------------------------------------

    /// Marks the whole store dirty.
    pub fn redraw_all(&mut self) {
        if !self.active {
            return;
        }
        let rect = self.stores.store().rect;
        self.invalidated.union_rect(rect);
        self.schedule_redraw();
    }

    /// Marks `rect` of store pixel space dirty.
    ///
    /// Coordinates are clamped to ±2³⁰; empty rectangles are ignored.
    pub fn redraw_area(&mut self, rect: IntRect) {
        if !self.active {
            return;
        }
        let rect = IntRect::new(
            rect.x0.clamp(MIN_COORD, MAX_COORD),
            rect.y0.clamp(MIN_COORD, MAX_COORD),
            rect.x1.clamp(MIN_COORD, MAX_COORD),
            rect.y1.clamp(MIN_COORD, MAX_COORD),
        );
        if rect.is_empty() {
            return;
        }

        if self.redraw_active && self.invalidated.is_empty() {
            // Fresh damage beats prerendering. Before the prerender phase
            // the scheduler is told to skip it instead.
            let phase = self.shared.phase.load(Ordering::Acquire);
            if !self.launch_pending && phase == PHASE_PRERENDER {
                self.shared.abort.fetch_or(ABORT_SOFT, Ordering::AcqRel);
                log::debug!("Soft exit request");
            } else {
                self.shared.damage_pending.store(true, Ordering::Release);
            }
        }

        self.invalidated.union_rect(rect);
        self.schedule_redraw();
    }

    /// Marks a continuous rectangle dirty, rounding outwards.
    pub fn redraw_area_f64(&mut self, rect: Rect) {
        if !(rect.x0 < rect.x1 && rect.y0 < rect.y1) {
            return;
        }
        self.redraw_area(IntRect::round_out(rect));
    }

    /// Flags that item geometry changed, not just pixels.
    pub fn request_update(&mut self) {
        self.need_update = true;
        self.schedule_redraw();
    }

    /// Takes the widget-space area that needs repainting.
    pub fn take_repaint_region(&mut self) -> Region {
        core::mem::take(&mut self.repaint)
    }

    // -----------------------------------------------------------------------
    // Viewport and appearance
    // -----------------------------------------------------------------------

    /// Scrolls so that world pixel `pos` is at the widget's top-left.
    pub fn set_pos(&mut self, pos: IntPoint) {
        if pos == self.pos {
            return;
        }
        self.pos = pos;
        self.schedule_redraw();
        self.queue_draw();
    }

    /// Sets the document to world transform.
    pub fn set_affine(&mut self, affine: Affine) {
        if affine == self.affine {
            return;
        }
        self.affine = affine;
        self.schedule_redraw();
        self.queue_draw();
    }

    /// Sets the widget size in logical pixels.
    pub fn set_dimensions(&mut self, width: i32, height: i32) {
        let dims = (width.max(0), height.max(0));
        if dims == self.dimensions {
            return;
        }
        self.dimensions = dims;
        self.schedule_redraw();
        self.queue_draw();
    }

    /// Sets device pixels per logical pixel. Takes effect at the next cycle
    /// and rebuilds the stores.
    pub fn set_scale_factor(&mut self, scale: i32) {
        let scale = scale.max(1);
        if scale == self.scale_factor {
            return;
        }
        self.scale_factor = scale;
        self.schedule_redraw();
        self.queue_draw();
    }

    /// Enables the outline overlay, rendered into secondary buffers.
    pub fn set_outlines_enabled(&mut self, enabled: bool) {
        if enabled == self.outlines_requested {
            return;
        }
        self.outlines_requested = enabled;
        self.schedule_redraw();
        self.queue_draw();
    }

    /// Sets the page colour.
    pub fn set_page(&mut self, rgba: Rgba) {
        if rgba == self.page {
            return;
        }
        self.page = rgba;
        self.background_changed();
    }

    /// Sets the desk colour.
    pub fn set_desk(&mut self, rgba: Rgba) {
        if rgba == self.desk {
            return;
        }
        self.desk = rgba;
        self.background_changed();
    }

    /// Sets the page border colour. Never baked into the stores.
    pub fn set_border(&mut self, rgba: Rgba) {
        if rgba == self.border {
            return;
        }
        self.border = rgba;
        self.queue_draw();
    }

    /// Sets the page rectangles, in document coordinates.
    pub fn set_pages(&mut self, pages: PageInfo) {
        if pages == self.pages {
            return;
        }
        self.pages = pages;
        if self.background_in_stores {
            self.redraw_all();
        }
        self.queue_draw();
    }

    /// Sets the bounds of the item being dragged, in document coordinates.
    /// It is painted first while `block_updates` is on.
    pub fn set_grabbed(&mut self, bounds: Option<Rect>) {
        self.grabbed = bounds;
    }

    /// Sets the mouse position in widget coordinates. Tiles nearest to it
    /// are painted first.
    pub fn set_mouse(&mut self, pos: Option<Point>) {
        self.last_mouse = pos;
    }

    /// Installs a new configuration.
    pub fn set_config(&mut self, config: CanvasConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.resolved_num_threads() != self.config.resolved_num_threads() {
            self.pool_stale = true;
        }
        self.stores.set_config(&config);
        self.config = config;

        let was = self.background_in_stores;
        self.background_in_stores = self.background_in_stores_required();
        if was != self.background_in_stores {
            self.redraw_all();
        }
        self.schedule_redraw();
        self.queue_draw();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Current scroll position.
    #[must_use]
    pub fn pos(&self) -> IntPoint {
        self.pos
    }

    /// Current document to world transform.
    #[must_use]
    pub fn affine(&self) -> Affine {
        self.affine
    }

    /// Widget size in logical pixels.
    #[must_use]
    pub fn dimensions(&self) -> (i32, i32) {
        self.dimensions
    }

    /// The visible area in world pixel coordinates.
    #[must_use]
    pub fn area_world(&self) -> IntRect {
        IntRect::from_xywh(self.pos.x, self.pos.y, self.dimensions.0, self.dimensions.1)
    }

    /// Returns `true` while a redraw is scheduled or running.
    #[must_use]
    pub fn is_redraw_active(&self) -> bool {
        self.redraw_active
    }

    /// The store and snapshot.
    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Strategy of the updater currently tracking dirty regions.
    #[must_use]
    pub fn updater_strategy(&self) -> Strategy {
        self.shared.data.lock().updater.strategy()
    }

    /// Report of the most recently committed cycle.
    #[must_use]
    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle
    }

    /// Whether page and desk colours are currently baked into the stores.
    #[must_use]
    pub fn background_in_stores(&self) -> bool {
        self.background_in_stores
    }

    // -----------------------------------------------------------------------
    // Painting
    // -----------------------------------------------------------------------

    /// Composites the stores onto `target`, which covers the widget at the
    /// current scale factor.
    pub fn paint_widget(&mut self, target: &mut Surface) {
        if !self.active {
            log::error!("paint_widget: Called while not active!");
            return;
        }
        if self.stores.mode() == Mode::None {
            log::error!("paint_widget: Called while active but uninitialised!");
            return;
        }

        if !self.redraw_active {
            self.commit_tiles();
        }

        let args = PaintArgs {
            outline_overlay: self
                .outlines_enabled
                .then_some(self.config.outline_overlay_opacity),
        };
        let view = self.view();
        self.graphics.paint_widget(&view, &self.stores, &args, target);
    }

    // -----------------------------------------------------------------------
    // Redraw loop
    // -----------------------------------------------------------------------

    fn view(&self) -> Fragment {
        Fragment::new(self.affine, self.area_world())
    }

    fn background_in_stores_required(&self) -> bool {
        self.config.background_in_stores == BackgroundPolicy::Auto
            && !self.graphics.is_accelerated()
            && self.page.is_opaque()
            && self.desk.is_opaque()
    }

    fn background_changed(&mut self) {
        let was = self.background_in_stores;
        self.background_in_stores = self.background_in_stores_required();
        if was || self.background_in_stores {
            self.redraw_all();
        }
        self.queue_draw();
    }

    fn queue_draw(&mut self) {
        self.repaint
            .union_rect(IntRect::from_size(self.dimensions.0, self.dimensions.1));
    }

    fn tracing(&self) -> bool {
        cfg!(feature = "trace") && self.trace_sink.is_some()
    }

    fn schedule_redraw(&mut self) {
        if !self.active {
            return;
        }
        self.redraw_requested = true;
        if self.redraw_active {
            return;
        }
        self.redraw_active = true;
        self.launch_pending = true;
        (self.waker)();
    }

    fn launch_redraw(&mut self) {
        debug_assert!(self.redraw_active, "launching without an active redraw");
        self.launch_pending = false;
        self.redraw_requested = false;

        if self.pool_stale {
            self.pool = Arc::new(WorkerPool::new(self.config.resolved_num_threads()));
            self.pool_stale = false;
        }

        // Rendering parameters that invalidate every stored pixel.
        if (self.outlines_requested && !self.outlines_enabled)
            || self.scale_factor != self.applied_scale_factor
        {
            self.stores.reset();
        }
        self.outlines_enabled = self.outlines_requested;
        self.applied_scale_factor = self.scale_factor;

        self.graphics.set_outlines_enabled(self.outlines_enabled);
        self.graphics.set_scale_factor(self.scale_factor);
        self.graphics.set_pages(self.pages.clone());
        self.graphics.set_colours(self.page, self.desk, self.border);
        self.graphics
            .set_background_in_stores(self.background_in_stores);

        self.cycle += 1;

        // Stores.
        let view = self.view();
        let from = self.stores.mode();
        let action = self.stores.update(&view, self.graphics.as_mut());
        self.handle_stores_action(action, from);

        // Geometry.
        let store = self.stores.store().fragment();
        let affine_changed = self.drawing_affine != Some(store.affine);
        if self.need_update || affine_changed {
            self.need_update = false;
            self.drawing_affine = Some(store.affine);
            self.shared.drawing.update(store.affine, affine_changed);
        }

        // Updater.
        {
            let mut rd = self.shared.data.lock();
            if rd.updater.strategy() != self.config.update_strategy {
                let clean = rd.updater.take_clean_region();
                rd.updater = self.config.update_strategy.create(clean);
            }
            rd.updater.mark_dirty(&self.invalidated);
            rd.updater.next_frame();
        }
        self.invalidated.clear();

        if self.config.debug_disable_redraw {
            self.redraw_active = false;
            return;
        }

        self.shared.drawing.snapshot();

        let decoupled = self.stores.mode() == Mode::Decoupled;
        let to_store = view.to_space_of(&store);

        let (w, h) = self.dimensions;
        let screen_mouse = self.last_mouse.unwrap_or_else(|| {
            round_point(Point::new(f64::from(w) / 2.0, f64::from(h) / 2.0)).to_point()
        });
        let mut mouse = screen_mouse + Vec2::new(f64::from(self.pos.x), f64::from(self.pos.y));
        if decoupled {
            mouse = round_point(to_store * mouse).to_point();
        }

        let visible = if decoupled {
            view.bounds_in(&store)
        } else {
            view.rect
        };

        let grabbed = match self.grabbed {
            Some(bounds) if self.config.block_updates => {
                IntRect::round_out(store.affine.transform_rect_bbox(bounds))
                    .intersect(&visible)
                    .and_then(|g| g.intersect(&store.rect))
            }
            _ => None,
        };

        // A timed-out cycle picks up where it left off, provided nothing
        // moved in between.
        let unchanged = action == Action::None && self.last_visible == Some(visible);
        let first_phase = if unchanged { self.resume_phase } else { 0 };
        self.resume_phase = 0;
        self.last_visible = Some(visible);

        let tracing = self.tracing();
        if tracing {
            let e = CycleBeginEvent {
                cycle: self.cycle,
                timestamp_ns: self.shared.now_ns(),
                first_phase,
                visible,
            };
            self.pending_events.push(TraceEvent::CycleBegin(e));
        }

        let params = CycleParams {
            cycle: self.cycle,
            store,
            decoupled,
            snapshot_drawn: if decoupled {
                self.stores.snapshot().drawn.clone()
            } else {
                Region::new()
            },
            visible,
            grabbed,
            mouse,
            first_phase,
            margin: self.config.prerender,
            preempt: self.config.preempt,
            tile_size: self.config.tile_size,
            coarsener_min_size: self.config.coarsener_min_size,
            coarsener_glue_size: self.config.coarsener_glue_size,
            coarsener_min_fullness: self.config.coarsener_min_fullness,
            render_time_limit: self.config.render_time_limit,
            num_threads: self.pool.size(),
            device_scale: self.scale_factor,
            outlines: self.outlines_enabled,
            background_in_stores: self.background_in_stores,
            page: self.page,
            desk: self.desk,
            pages: self.pages.clone(),
            debug_show_redraw: self.config.debug_show_redraw,
            debug_delay: self.config.debug_delay_redraw,
            tracing,
            surfaces: self.graphics.tile_surfaces(),
            pool: Arc::downgrade(&self.pool),
        };
        self.shared.data.lock().params = Some(Arc::new(params));
        self.shared.abort.store(0, Ordering::Release);
        self.shared.damage_pending.store(false, Ordering::Release);
        self.committed = 0;
        self.cycle_first_phase = first_phase;

        let shared = Arc::clone(&self.shared);
        self.pool.execute(move || init_tiler(&shared));
    }

    fn after_redraw(&mut self) {
        debug_assert!(self.redraw_active, "cycle ended without an active redraw");

        self.shared.drawing.unsnapshot();

        // Tiles belong to the current store, so they go in before the
        // stores can change.
        self.commit_tiles();

        let (timed_out, last_phase, outcome) = {
            let rd = self.shared.data.lock();
            let outcome = rd.aborted.unwrap_or(if rd.timed_out {
                CycleOutcome::TimedOut
            } else {
                CycleOutcome::Finished
            });
            (rd.timed_out, rd.phase, outcome)
        };
        self.drain_worker_events();

        if timed_out {
            self.resume_phase = if last_phase >= 2 { 2 } else { 0 };
        }

        let mut stores_changed = false;
        if !timed_out {
            let from = self.stores.mode();
            let view = self.view();
            let action = self.stores.finished_draw(&view, self.graphics.as_mut());
            self.handle_stores_action(action, from);
            stores_changed = action != Action::None;
        }

        self.last_cycle = Some(CycleReport {
            cycle: self.cycle,
            first_phase: self.cycle_first_phase,
            last_phase,
            tiles: self.committed,
            outcome,
        });
        if self.tracing() {
            let e = CycleEndEvent {
                cycle: self.cycle,
                timestamp_ns: self.shared.now_ns(),
                tiles: self.committed,
                outcome,
            };
            self.pending_events.push(TraceEvent::CycleEnd(e));
        }
        self.flush_trace();

        if timed_out || self.redraw_requested || stores_changed {
            log::debug!("Continuing redrawing");
            self.launch_redraw();
        } else {
            log::debug!("Redraw exit");
            self.redraw_active = false;
        }
    }

    fn handle_stores_action(&mut self, action: Action, from: Mode) {
        let rect = self.stores.store().rect;
        match action {
            Action::Recreated => {
                self.invalidated.union_rect(rect);
                self.shared.data.lock().updater.reset();
            }
            Action::Shifted => {
                self.invalidated.intersect_rect(rect);
                self.shared.data.lock().updater.intersect(rect);
            }
            Action::None => {}
        }

        if action != Action::None {
            self.shared.drawing.set_cache_limit(rect);
        }

        let to = self.stores.mode();
        if self.tracing() && (action != Action::None || from != to) {
            let e = StoresTransitionEvent {
                cycle: self.cycle,
                timestamp_ns: self.shared.now_ns(),
                from,
                to,
                action,
            };
            self.pending_events.push(TraceEvent::StoresTransition(e));
        }
    }

    fn commit_tiles(&mut self) {
        let tiles = core::mem::take(&mut *self.shared.tiles.lock());
        if tiles.is_empty() {
            return;
        }

        let screen = IntRect::from_size(self.dimensions.0, self.dimensions.1);
        let to_screen = Affine::translate((-f64::from(self.pos.x), -f64::from(self.pos.y)))
            * self.affine
            * self.stores.store().affine.inverse();

        for tile in tiles {
            self.graphics.draw_tile(self.stores.store(), &tile);
            self.stores.mark_drawn(tile.fragment.rect);
            self.committed += 1;

            let repaint = if self.stores.mode() == Mode::Normal {
                tile.fragment.rect.translate(-self.pos.x, -self.pos.y)
            } else {
                tile.fragment.rect.transform_bounds(to_screen)
            };
            if let Some(r) = repaint.intersect(&screen) {
                self.repaint.union_rect(r);
            }

            let Tile {
                surface,
                outline_surface,
                ..
            } = tile;
            self.graphics.junk_tile_surface(surface);
            if let Some(s) = outline_surface {
                self.graphics.junk_tile_surface(s);
            }
        }
    }

    fn drain_worker_events(&mut self) {
        let events = core::mem::take(&mut self.shared.data.lock().events);
        self.pending_events.extend(events);
    }

    fn flush_trace(&mut self) {
        let events = core::mem::take(&mut self.pending_events);
        if let Some(sink) = self.trace_sink.as_deref_mut() {
            Tracer::new(sink).emit_all(&events);
        }
    }

    #[cfg(test)]
    fn pool_weak(&self) -> std::sync::Weak<WorkerPool> {
        Arc::downgrade(&self.pool)
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use fresco_backend_soft::SoftGraphics;
    use fresco_core::surface::RenderError;

    use super::*;
    use crate::drawing::TileContext;

    #[derive(Debug)]
    struct Solid(u32);

    impl Drawing for Solid {
        fn render(&self, target: &mut Surface, _: &TileContext) -> Result<(), RenderError> {
            target.fill(self.0);
            Ok(())
        }
    }

    fn canvas(config: CanvasConfig) -> Canvas {
        let mut c = Canvas::new(
            config,
            Box::new(SoftGraphics::new()),
            Arc::new(Solid(0xff00_00ff)),
            || {},
        )
        .unwrap();
        c.set_dimensions(200, 150);
        c
    }

    fn small() -> CanvasConfig {
        CanvasConfig {
            tile_size: 64,
            prerender: 16,
            padding: 32,
            preempt: 8,
            coarsener_min_size: 16,
            coarsener_glue_size: 8,
            num_threads: 2,
            ..CanvasConfig::default()
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = CanvasConfig {
            tile_size: 0,
            ..CanvasConfig::default()
        };
        let err = Canvas::new(config, Box::new(SoftGraphics::new()), Arc::new(Solid(0)), || {});
        assert!(err.is_err(), "zero tile size refused");
    }

    #[test]
    fn new_canvas_schedules_first_redraw() {
        let c = canvas(small());
        assert!(c.is_redraw_active(), "first redraw scheduled on activation");
        assert!(c.launch_pending, "waiting for dispatch");
    }

    #[test]
    fn redraw_area_clamps_coordinates() {
        let mut c = canvas(small());
        c.redraw_area(IntRect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX));
        assert_eq!(
            c.invalidated.extents(),
            Some(IntRect::new(MIN_COORD, MIN_COORD, MAX_COORD, MAX_COORD)),
            "clamped to ±2^30"
        );
    }

    #[test]
    fn redraw_area_ignores_empty_and_rounds_out() {
        let mut c = canvas(small());
        c.redraw_area(IntRect::new(10, 10, 10, 20));
        c.redraw_area_f64(Rect::new(5.0, 5.0, 1.0, 9.0));
        assert!(c.invalidated.is_empty(), "empty and inverted rects ignored");

        c.redraw_area_f64(Rect::new(0.5, 0.5, 10.2, 10.7));
        assert_eq!(c.invalidated.extents(), Some(IntRect::new(0, 0, 11, 11)));
    }

    #[test]
    fn inactive_canvas_ignores_requests_and_paints_nothing() {
        let mut c = canvas(small());
        c.redraw_now();
        c.deactivate();
        c.redraw_all();
        assert!(c.invalidated.is_empty(), "request dropped");
        assert!(!c.is_redraw_active());

        let mut target = Surface::new(200, 150, 1).unwrap();
        c.paint_widget(&mut target);
        assert!(target.pixels().iter().all(|&p| p == 0), "left untouched");
    }

    #[test]
    fn paint_before_first_redraw_is_refused() {
        let mut c = canvas(small());
        let mut target = Surface::new(200, 150, 1).unwrap();
        c.paint_widget(&mut target);
        assert!(target.pixels().iter().all(|&p| p == 0), "stores uninitialised");
    }

    #[test]
    fn redraw_now_fills_the_view() {
        let mut c = canvas(small());
        c.redraw_now();
        assert!(!c.is_redraw_active(), "idle afterwards");
        assert_eq!(c.stores().mode(), Mode::Normal);

        let mut target = Surface::new(200, 150, 1).unwrap();
        c.paint_widget(&mut target);
        assert_eq!(target.pixel(0, 0), Some(0xff00_00ff));
        assert_eq!(target.pixel(199, 149), Some(0xff00_00ff));
        assert!(!c.take_repaint_region().is_empty(), "tiles queued repaints");
    }

    #[test]
    fn soft_abort_only_during_prerender() {
        let mut c = canvas(small());
        c.redraw_now();

        // Pretend a cycle is running in the visible phase.
        c.redraw_active = true;
        c.shared.phase.store(2, Ordering::Release);
        c.redraw_area(IntRect::new(10, 10, 20, 20));
        assert_eq!(c.shared.abort.load(Ordering::Acquire), 0, "no abort outside prerender");
        assert!(
            c.shared.damage_pending.load(Ordering::Acquire),
            "prerender will be skipped instead"
        );

        c.invalidated.clear();
        c.shared.damage_pending.store(false, Ordering::Release);
        c.shared.phase.store(PHASE_PRERENDER, Ordering::Release);
        c.redraw_area(IntRect::new(10, 10, 20, 20));
        assert_eq!(
            c.shared.abort.load(Ordering::Acquire) & ABORT_SOFT,
            ABORT_SOFT,
            "prerender is interrupted"
        );

        // Once something is invalidated the flag is left alone.
        c.shared.abort.store(0, Ordering::Release);
        c.redraw_area(IntRect::new(30, 30, 40, 40));
        assert_eq!(c.shared.abort.load(Ordering::Acquire), 0, "already dirty");

        c.shared.phase.store(PHASE_IDLE, Ordering::Release);
        c.redraw_active = false;
    }

    #[test]
    fn opaque_colours_bake_background_into_stores() {
        let mut c = canvas(small());
        assert!(c.background_in_stores(), "white page and desk");
        c.redraw_now();

        c.set_desk(Rgba(0x8080_8080));
        assert!(!c.background_in_stores(), "translucent desk");
        assert!(!c.invalidated.is_empty(), "stores repainted without background");
        c.redraw_now();

        c.set_border(Rgba(0x1234_56ff));
        assert!(c.invalidated.is_empty(), "border never invalidates");
    }

    #[test]
    fn strategy_switch_keeps_clean_region() {
        let mut c = canvas(CanvasConfig {
            update_strategy: Strategy::Responsive,
            ..small()
        });
        c.redraw_now();
        let clean = c.shared.data.lock().updater.clean_region().clone();
        assert!(!clean.is_empty(), "something was drawn");

        c.set_config(CanvasConfig {
            update_strategy: Strategy::FullRedraw,
            ..small()
        })
        .unwrap();
        let report = c.finish_cycle().unwrap();
        assert_eq!(c.updater_strategy(), Strategy::FullRedraw);
        assert_eq!(report.tiles, 0, "migrated clean region needs no repainting");
        assert_eq!(
            c.shared.data.lock().updater.clean_region(),
            &clean,
            "clean region carried over"
        );
    }

    #[test]
    fn thread_count_change_replaces_pool_at_next_launch() {
        let mut c = canvas(small());
        c.redraw_now();
        let old = c.pool_weak();
        c.set_config(CanvasConfig {
            num_threads: 3,
            ..small()
        })
        .unwrap();
        assert!(old.upgrade().is_some(), "kept until the next launch");
        c.redraw_now();
        assert!(old.upgrade().is_none(), "old pool dropped");
        assert_eq!(c.pool.size(), 3);
    }

    #[test]
    fn disable_redraw_halts_without_painting() {
        let mut c = canvas(CanvasConfig {
            debug_disable_redraw: true,
            ..small()
        });
        assert!(c.finish_cycle().is_none(), "no cycle launched");
        assert!(!c.is_redraw_active());
        assert!(c.stores().store().drawn.is_empty(), "nothing drawn");
    }
}
