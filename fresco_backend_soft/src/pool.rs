// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recycled tile surfaces.

use std::collections::HashMap;

use fresco_core::backend::TileSurfaceSource;
use fresco_core::geom::IntRect;
use fresco_core::surface::Surface;
use parking_lot::Mutex;

/// Pixels kept in free surfaces before the oldest are dropped.
const DEFAULT_BUDGET: i64 = 16 << 20;

type Key = (i32, i32, i32);

#[derive(Debug, Default)]
struct State {
    scale: i32,
    free: HashMap<Key, Vec<Surface>>,
    // Insertion order, for eviction.
    order: Vec<Key>,
    pooled_pixels: i64,
}

impl State {
    fn evict_to(&mut self, budget: i64) {
        while self.pooled_pixels > budget && !self.order.is_empty() {
            let key = self.order.remove(0);
            if let Some(list) = self.free.get_mut(&key) {
                if let Some(s) = list.pop() {
                    self.pooled_pixels -= pixels(&s);
                }
                if list.is_empty() {
                    self.free.remove(&key);
                }
            }
        }
    }
}

fn pixels(s: &Surface) -> i64 {
    i64::from(s.width()) * i64::from(s.height())
}

/// A thread-safe pool of tile surfaces keyed by size.
///
/// Surfaces come back through [`junk_tile_surface`](TileSurfaceSource::junk_tile_surface)
/// once their tile is committed and are handed out again for tiles of the
/// same size. Changing the device scale empties the pool.
#[derive(Debug)]
pub struct SurfacePool {
    state: Mutex<State>,
    budget: i64,
    allocate_off_thread: bool,
}

impl Default for SurfacePool {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfacePool {
    /// Creates an empty pool at device scale 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                scale: 1,
                ..State::default()
            }),
            budget: DEFAULT_BUDGET,
            allocate_off_thread: true,
        }
    }

    /// Limits how many pixels free surfaces may hold in total.
    #[must_use]
    pub fn with_budget(mut self, pixels: i64) -> Self {
        self.budget = pixels.max(0);
        self
    }

    /// With `false`, only recycled surfaces are handed out unless the
    /// request allows blocking. New allocations then happen on the UI
    /// thread.
    #[must_use]
    pub fn with_off_thread_allocation(mut self, enabled: bool) -> Self {
        self.allocate_off_thread = enabled;
        self
    }

    /// Device pixels per logical pixel of new surfaces.
    #[must_use]
    pub fn scale(&self) -> i32 {
        self.state.lock().scale
    }

    /// Sets the device scale, dropping surfaces of the old scale.
    pub fn set_scale(&self, scale: i32) {
        let mut st = self.state.lock();
        let scale = scale.max(1);
        if st.scale == scale {
            return;
        }
        st.scale = scale;
        st.free.clear();
        st.order.clear();
        st.pooled_pixels = 0;
    }

    /// Number of surfaces waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.state.lock().free.values().map(Vec::len).sum()
    }
}

impl TileSurfaceSource for SurfacePool {
    fn request_tile_surface(&self, rect: IntRect, allow_blocking: bool) -> Option<Surface> {
        let (w, h) = rect.dimensions();
        let scale = {
            let mut st = self.state.lock();
            let key = (w, h, st.scale);
            let reused = st.free.get_mut(&key).and_then(Vec::pop);
            if let Some(s) = reused {
                st.pooled_pixels -= pixels(&s);
                if let Some(i) = st.order.iter().position(|k| *k == key) {
                    st.order.remove(i);
                }
                return Some(s);
            }
            st.scale
        };

        if !allow_blocking && !self.allocate_off_thread {
            return None;
        }
        match Surface::new(w, h, scale) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("Cannot allocate tile surface for {rect:?}: {e}");
                None
            }
        }
    }

    fn junk_tile_surface(&self, surface: Surface) {
        let mut st = self.state.lock();
        if surface.scale() != st.scale {
            return;
        }
        let (w, h) = surface.logical_size();
        let key = (w, h, st.scale);
        st.pooled_pixels += pixels(&surface);
        st.free.entry(key).or_default().push(surface);
        st.order.push(key);
        let budget = self.budget;
        st.evict_to(budget);
    }
}
