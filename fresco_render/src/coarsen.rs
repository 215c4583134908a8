// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning a dirty region into a work list of reasonably sized rectangles.
//!
//! A dirty region left behind by continuous panning or editing tends to be a
//! scatter of thin slivers. [`coarsen`] merges small rectangles with nearby
//! ones so the tiler paints a few larger tiles instead. [`bisect`] does the
//! opposite for rectangles that are too big to paint in one go.

use fresco_core::geom::IntRect;
use fresco_core::region::Region;

/// Axis along which a rectangle is split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Split with a vertical cut.
    X,
    /// Split with a horizontal cut.
    Y,
}

/// Replaces `region` with fewer, larger rectangles covering it.
///
/// Rectangles whose smaller side is below `min_size` absorb every rectangle
/// lying wholly inside a zone `glue_size` pixels around them. If a merge
/// would leave the result less than `min_fullness` real work, the glue
/// distance is halved and the merge retried. The output covers the input
/// and may overlap itself slightly.
#[must_use]
pub fn coarsen(region: &Region, min_size: i32, glue_size: i32, min_fullness: f64) -> Vec<IntRect> {
    // Ascending by smaller side; equal keys keep insertion order.
    let mut rects: Vec<IntRect> = region.rects().to_vec();
    rects.sort_by_key(IntRect::min_extent);

    let mut processed: Vec<IntRect> = Vec::with_capacity(rects.len());

    while rects.first().is_some_and(|r| r.min_extent() < min_size) {
        let mut rect = rects.remove(0);
        let mut glue = glue_size;

        loop {
            let zone = rect.expand(glue);
            let mut merged = rect;
            let mut absorbed: i64 = 0;

            let mut take_rects = Vec::new();
            for (i, r) in rects.iter().enumerate() {
                if zone.contains_rect(r) {
                    merged = merged.union(r);
                    absorbed += r.area();
                    take_rects.push(i);
                }
            }
            let mut take_processed = Vec::new();
            for (i, r) in processed.iter().enumerate() {
                if zone.contains_rect(r) {
                    merged = merged.union(r);
                    absorbed += r.area();
                    take_processed.push(i);
                }
            }

            #[expect(clippy::cast_precision_loss, reason = "areas are far below 2^52")]
            let fullness = (rect.area() + absorbed) as f64 / merged.area() as f64;
            if fullness < min_fullness {
                glue /= 2;
                continue;
            }

            rect = merged;
            for &i in take_rects.iter().rev() {
                rects.remove(i);
            }
            for &i in take_processed.iter().rev() {
                processed.swap_remove(i);
            }

            if absorbed == 0 || rect.min_extent() >= min_size {
                break;
            }
            glue = glue_size;
        }

        processed.push(rect);
    }

    processed.extend(rects);
    processed
}

/// Returns the axis to split `rect` along if its longer side exceeds
/// `tile_size`.
#[must_use]
pub fn bisect(rect: &IntRect, tile_size: i32) -> Option<Axis> {
    let (w, h) = rect.dimensions();
    if w > h {
        (w > tile_size).then_some(Axis::X)
    } else {
        (h > tile_size).then_some(Axis::Y)
    }
}

/// Cuts `rect` in half across `axis`.
#[must_use]
pub fn split(rect: &IntRect, axis: Axis) -> (IntRect, IntRect) {
    match axis {
        Axis::X => {
            let mid = (rect.x0 + rect.x1) / 2;
            (
                IntRect::new(rect.x0, rect.y0, mid, rect.y1),
                IntRect::new(mid, rect.y0, rect.x1, rect.y1),
            )
        }
        Axis::Y => {
            let mid = (rect.y0 + rect.y1) / 2;
            (
                IntRect::new(rect.x0, rect.y0, rect.x1, mid),
                IntRect::new(rect.x0, mid, rect.x1, rect.y1),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covers(rects: &[IntRect], region: &Region) -> bool {
        let mut rest = region.clone();
        for r in rects {
            rest.subtract_rect(*r);
        }
        rest.is_empty()
    }

    #[test]
    fn large_rects_pass_through() {
        let region = Region::from_rect(IntRect::new(0, 0, 500, 400));
        let out = coarsen(&region, 150, 80, 0.3);
        assert_eq!(out, [IntRect::new(0, 0, 500, 400)]);
    }

    #[test]
    fn nearby_slivers_merge() {
        let mut region = Region::new();
        for i in 0..10 {
            region.union_rect(IntRect::new(i * 12, 0, i * 12 + 10, 100));
        }
        let out = coarsen(&region, 150, 80, 0.3);
        assert!(out.len() < 10, "fewer rects after coarsening: {out:?}");
        assert!(covers(&out, &region), "coarsened set covers the input");
    }

    #[test]
    fn sparse_merge_is_rejected() {
        // Two 10x10 squares 60 px apart: merging would be 200/4900 full.
        let mut region = Region::new();
        region.union_rect(IntRect::new(0, 0, 10, 10));
        region.union_rect(IntRect::new(60, 60, 70, 70));
        let out = coarsen(&region, 150, 80, 0.3);
        assert_eq!(out.len(), 2, "kept apart: {out:?}");
        assert!(covers(&out, &region));
    }

    #[test]
    fn merged_rects_respect_fullness() {
        let mut region = Region::new();
        for (x, y) in [(0, 0), (30, 0), (0, 30), (30, 30), (200, 200), (230, 260)] {
            region.union_rect(IntRect::from_xywh(x, y, 20, 20));
        }
        let min_fullness = 0.3;
        let out = coarsen(&region, 150, 80, min_fullness);
        assert!(covers(&out, &region));
        for r in &out {
            let mut work = region.clone();
            work.intersect_rect(*r);
            #[expect(clippy::cast_precision_loss, reason = "test areas are small")]
            let fullness = work.area() as f64 / r.area() as f64;
            assert!(fullness >= min_fullness, "{r:?} only {fullness} full");
        }
    }

    #[test]
    fn empty_region_gives_no_rects() {
        assert!(coarsen(&Region::new(), 150, 80, 0.3).is_empty());
    }

    #[test]
    fn bisect_picks_longer_axis() {
        assert_eq!(bisect(&IntRect::new(0, 0, 400, 100), 300), Some(Axis::X));
        assert_eq!(bisect(&IntRect::new(0, 0, 100, 400), 300), Some(Axis::Y));
        assert_eq!(bisect(&IntRect::new(0, 0, 300, 300), 300), None, "fits exactly");
    }

    #[test]
    fn split_halves_cover_original() {
        let r = IntRect::new(-5, 0, 10, 7);
        let (lo, hi) = split(&r, Axis::X);
        assert_eq!(lo.x1, hi.x0);
        assert_eq!(lo.area() + hi.area(), r.area());
        let (top, bottom) = split(&r, Axis::Y);
        assert_eq!((top.y1, bottom.y0), (3, 3));
    }
}
