// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-region tracking strategies.
//!
//! An [`Updater`] owns the *clean region*: the pixels of the backing store
//! that are known to match the document. The tiler asks it which area to
//! treat as clean when planning work ([`Updater::next_clean_region`]), marks
//! tiles clean as they are claimed, and asks at the end of the visible pass
//! whether another pass is wanted ([`Updater::report_finished`]).
//!
//! The strategies differ only in how they react to damage that arrives while
//! a redraw is in progress:
//!
//! ```text
//!   Responsive   damage is redrawn as soon as possible
//!   FullRedraw   finish the pass against the old clean region, then redo
//!   Multiscale   hold newly cleaned areas back for 1, 2, 4, ... frames so
//!                continuous edits do not starve the rest of the screen
//! ```

use core::fmt;

use crate::geom::IntRect;
use crate::region::Region;

/// Which [`Updater`] implementation to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Redraw damage immediately.
    Responsive,
    /// Complete the current pass before redrawing damage.
    FullRedraw,
    /// Throttle damaged areas at ruler-spaced frame intervals.
    #[default]
    Multiscale,
}

impl Strategy {
    /// Creates an updater of this strategy, seeded with `clean`.
    #[must_use]
    pub fn create(self, clean: Region) -> Box<dyn Updater> {
        match self {
            Self::Responsive => Box::new(ResponsiveUpdater { clean }),
            Self::FullRedraw => Box::new(FullRedrawUpdater {
                base: ResponsiveUpdater { clean },
                ..FullRedrawUpdater::default()
            }),
            Self::Multiscale => Box::new(MultiscaleUpdater {
                base: ResponsiveUpdater { clean },
                ..MultiscaleUpdater::default()
            }),
        }
    }
}

/// Tracks which pixels of the store are up to date.
pub trait Updater: Send + fmt::Debug {
    /// Which strategy this is.
    fn strategy(&self) -> Strategy;

    /// Forgets everything: the clean region becomes empty and any
    /// in-progress bookkeeping is dropped.
    fn reset(&mut self);

    /// Clips all tracked regions to `rect` (used when the store shifts).
    fn intersect(&mut self, rect: IntRect);

    /// Marks `region` as needing redraw.
    fn mark_dirty(&mut self, region: &Region);

    /// Marks a single rectangle as needing redraw.
    fn mark_dirty_rect(&mut self, rect: IntRect) {
        self.mark_dirty(&Region::from_rect(rect));
    }

    /// Marks `rect` as up to date.
    fn mark_clean(&mut self, rect: IntRect);

    /// The region the tiler should treat as clean for the next pass.
    ///
    /// Calling this marks a pass as in progress.
    fn next_clean_region(&mut self) -> Region;

    /// Called when a pass over the visible area completes. Returns `true` if
    /// another pass is required.
    fn report_finished(&mut self) -> bool;

    /// Called once per redraw cycle launched.
    fn next_frame(&mut self);

    /// The authoritative clean region.
    fn clean_region(&self) -> &Region;

    /// Moves the clean region out, leaving this updater empty. Used to carry
    /// state across a strategy switch.
    fn take_clean_region(&mut self) -> Region;
}

/// Clean region only; never asks for a second pass.
#[derive(Clone, Debug, Default)]
pub struct ResponsiveUpdater {
    clean: Region,
}

impl ResponsiveUpdater {
    /// Creates an updater with nothing clean.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Updater for ResponsiveUpdater {
    fn strategy(&self) -> Strategy {
        Strategy::Responsive
    }

    fn reset(&mut self) {
        self.clean.clear();
    }

    fn intersect(&mut self, rect: IntRect) {
        self.clean.intersect_rect(rect);
    }

    fn mark_dirty(&mut self, region: &Region) {
        self.clean.subtract(region);
    }

    fn mark_clean(&mut self, rect: IntRect) {
        self.clean.union_rect(rect);
    }

    fn next_clean_region(&mut self) -> Region {
        self.clean.clone()
    }

    fn report_finished(&mut self) -> bool {
        false
    }

    fn next_frame(&mut self) {}

    fn clean_region(&self) -> &Region {
        &self.clean
    }

    fn take_clean_region(&mut self) -> Region {
        core::mem::take(&mut self.clean)
    }
}

/// Finishes the pass in progress against the clean region it started with,
/// then redraws whatever was damaged meanwhile.
#[derive(Clone, Debug, Default)]
pub struct FullRedrawUpdater {
    base: ResponsiveUpdater,
    in_progress: bool,
    // Snapshot of the clean region taken when damage first arrives mid-pass.
    old_clean: Option<Region>,
}

impl FullRedrawUpdater {
    /// Creates an updater with nothing clean.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Updater for FullRedrawUpdater {
    fn strategy(&self) -> Strategy {
        Strategy::FullRedraw
    }

    fn reset(&mut self) {
        self.base.reset();
        self.in_progress = false;
        self.old_clean = None;
    }

    fn intersect(&mut self, rect: IntRect) {
        self.base.intersect(rect);
        if let Some(old) = &mut self.old_clean {
            old.intersect_rect(rect);
        }
    }

    fn mark_dirty(&mut self, region: &Region) {
        if self.in_progress && self.old_clean.is_none() {
            self.old_clean = Some(self.base.clean.clone());
        }
        self.base.mark_dirty(region);
    }

    fn mark_clean(&mut self, rect: IntRect) {
        self.base.mark_clean(rect);
        if let Some(old) = &mut self.old_clean {
            old.union_rect(rect);
        }
    }

    fn next_clean_region(&mut self) -> Region {
        self.in_progress = true;
        match &self.old_clean {
            Some(old) => old.clone(),
            None => self.base.clean.clone(),
        }
    }

    fn report_finished(&mut self) -> bool {
        debug_assert!(self.in_progress, "report_finished without a pass");
        if self.old_clean.take().is_some() {
            true
        } else {
            self.in_progress = false;
            false
        }
    }

    fn next_frame(&mut self) {}

    fn clean_region(&self) -> &Region {
        &self.base.clean
    }

    fn take_clean_region(&mut self) -> Region {
        self.old_clean = None;
        self.base.take_clean_region()
    }
}

/// Responsive until damage arrives mid-pass, then withholds freshly cleaned
/// areas at a scale that hops like the marks on a ruler.
///
/// While activated, the tiler sees `clean ∪ blocked[scale]` as clean, so
/// areas cleaned at the current scale are not redrawn again until the scale
/// changes. The scale is the number of trailing ones of a frame counter that
/// advances every `2^scale` frames.
#[derive(Clone, Debug, Default)]
pub struct MultiscaleUpdater {
    base: ResponsiveUpdater,
    in_progress: bool,
    activated: bool,
    counter: u32,
    scale: usize,
    elapsed: u32,
    blocked: Vec<Region>,
}

impl MultiscaleUpdater {
    /// Creates an updater with nothing clean.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current throttling scale, if activated.
    #[must_use]
    pub fn scale(&self) -> Option<usize> {
        self.activated.then_some(self.scale)
    }

    fn post_mark_dirty(&mut self) {
        if self.in_progress && !self.activated {
            self.counter = 0;
            self.scale = 0;
            self.elapsed = 0;
            self.blocked = vec![Region::new()];
            self.activated = true;
        }
    }
}

impl Updater for MultiscaleUpdater {
    fn strategy(&self) -> Strategy {
        Strategy::Multiscale
    }

    fn reset(&mut self) {
        self.base.reset();
        self.in_progress = false;
        self.activated = false;
        self.blocked.clear();
    }

    fn intersect(&mut self, rect: IntRect) {
        self.base.intersect(rect);
        if self.activated {
            for reg in &mut self.blocked {
                reg.intersect_rect(rect);
            }
        }
    }

    fn mark_dirty(&mut self, region: &Region) {
        self.base.mark_dirty(region);
        self.post_mark_dirty();
    }

    fn mark_clean(&mut self, rect: IntRect) {
        self.base.mark_clean(rect);
        if self.activated {
            self.blocked[self.scale].union_rect(rect);
        }
    }

    fn next_clean_region(&mut self) -> Region {
        self.in_progress = true;
        let mut result = self.base.clean.clone();
        if self.activated {
            result.union(&self.blocked[self.scale]);
        }
        result
    }

    fn report_finished(&mut self) -> bool {
        debug_assert!(self.in_progress, "report_finished without a pass");
        if self.activated {
            self.activated = false;
            self.blocked.clear();
            true
        } else {
            self.in_progress = false;
            false
        }
    }

    fn next_frame(&mut self) {
        if !self.activated {
            return;
        }
        self.elapsed += 1;
        if self.elapsed < 1 << self.scale.min(31) {
            return;
        }
        self.elapsed = 0;

        self.counter = self.counter.wrapping_add(1);
        let new_scale = self.counter.trailing_ones() as usize;
        if new_scale >= self.blocked.len() {
            self.blocked.resize_with(new_scale + 1, Region::new);
        }
        let mut zone = self.base.clean.clone();
        for lower in &self.blocked[..new_scale] {
            zone.union(lower);
        }
        self.blocked[new_scale] = zone;
        self.scale = new_scale;
    }

    fn clean_region(&self) -> &Region {
        &self.base.clean
    }

    fn take_clean_region(&mut self) -> Region {
        self.activated = false;
        self.blocked.clear();
        self.base.take_clean_region()
    }
}
