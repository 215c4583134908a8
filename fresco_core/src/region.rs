// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel regions as sets of pairwise-disjoint rectangles.
//!
//! [`Region`] is the currency of dirty tracking: the clean region of an
//! updater, the drawn region of a store, and the work list of the tiler are
//! all regions. Every operation preserves the invariant that the stored
//! rectangles are non-empty and never overlap, so [`Region::area`] is a plain
//! sum and [`Region::rects`] can be handed to a painter as a clip.
//!
//! Rectangles are kept in y-x banded form: sorted by `y0` then `x0`, every
//! rectangle of a band shares its `y0` and `y1`, spans within a band never
//! touch, and vertically adjacent bands with identical spans are merged.
//! The form is canonical, so two regions covering the same pixels hold the
//! same rectangle list, and every set operation is one sweep over the bands
//! of both operands.

use kurbo::{Affine, Point, Vec2};

use crate::geom::{IntPoint, IntRect, is_identity, is_scale, round_point};

/// How a rectangle relates to a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Overlap {
    /// The rectangle lies entirely inside the region.
    In,
    /// The rectangle shares no pixels with the region.
    Out,
    /// The rectangle is partly inside.
    Part,
}

/// A set of pixels, stored as disjoint non-empty rectangles.
///
/// Equality compares point sets, which the banded form reduces to comparing
/// rectangle lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<IntRect>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering a single rectangle.
    #[must_use]
    pub fn from_rect(rect: IntRect) -> Self {
        let mut r = Self::new();
        if !rect.is_empty() {
            r.rects.push(rect);
        }
        r
    }

    /// The rectangles making up the region, in banded order.
    #[must_use]
    pub fn rects(&self) -> &[IntRect] {
        &self.rects
    }

    /// Number of rectangles.
    #[must_use]
    pub fn num_rects(&self) -> usize {
        self.rects.len()
    }

    /// Returns `true` if the region covers no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Removes all pixels.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Total number of pixels covered.
    #[must_use]
    pub fn area(&self) -> i64 {
        self.rects.iter().map(IntRect::area).sum()
    }

    /// Bounding box, or `None` for an empty region.
    #[must_use]
    pub fn extents(&self) -> Option<IntRect> {
        let mut it = self.rects.iter();
        let first = *it.next()?;
        Some(it.fold(first, |acc, r| acc.union(r)))
    }

    /// Adds the pixels of `rect`.
    pub fn union_rect(&mut self, rect: IntRect) {
        if rect.is_empty() || self.contains_rect(rect) == Overlap::In {
            return;
        }
        self.rects = combine(&self.rects, &[rect], SetOp::Union);
    }

    /// Adds the pixels of `other`.
    pub fn union(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.rects = combine(&self.rects, &other.rects, SetOp::Union);
    }

    /// Removes the pixels of `rect`.
    pub fn subtract_rect(&mut self, rect: IntRect) {
        if rect.is_empty() || !self.rects.iter().any(|r| r.intersects(&rect)) {
            return;
        }
        self.rects = combine(&self.rects, &[rect], SetOp::Subtract);
    }

    /// Removes the pixels of `other`.
    pub fn subtract(&mut self, other: &Self) {
        if self.is_empty() || other.is_empty() {
            return;
        }
        self.rects = combine(&self.rects, &other.rects, SetOp::Subtract);
    }

    /// Keeps only the pixels inside `rect`.
    pub fn intersect_rect(&mut self, rect: IntRect) {
        if rect.is_empty() {
            self.rects.clear();
            return;
        }
        self.rects = combine(&self.rects, &[rect], SetOp::Intersect);
    }

    /// Keeps only the pixels also in `other`.
    pub fn intersect(&mut self, other: &Self) {
        self.rects = combine(&self.rects, &other.rects, SetOp::Intersect);
    }

    /// Returns a copy intersected with `rect`.
    #[must_use]
    pub fn clipped(&self, rect: IntRect) -> Self {
        let mut r = self.clone();
        r.intersect_rect(rect);
        r
    }

    /// Classifies `rect` against the region.
    ///
    /// Empty rectangles are reported as [`Overlap::In`].
    #[must_use]
    pub fn contains_rect(&self, rect: IntRect) -> Overlap {
        if rect.is_empty() {
            return Overlap::In;
        }
        let covered: i64 = self
            .rects
            .iter()
            .filter_map(|r| r.intersect(&rect))
            .map(|r| r.area())
            .sum();
        if covered == 0 {
            Overlap::Out
        } else if covered == rect.area() {
            Overlap::In
        } else {
            Overlap::Part
        }
    }

    /// Returns `true` if the pixel at `p` is in the region.
    #[must_use]
    pub fn contains_point(&self, p: IntPoint) -> bool {
        self.rects.iter().any(|r| r.contains_point(p))
    }

    /// Shifts every rectangle by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.translate(dx, dy);
        }
    }

    /// Erodes the region, shifting as it goes.
    ///
    /// Every rectangle of the complement (taken within the extents grown by
    /// one pixel) is moved by `(t, t)` and grown by `d` on its right and
    /// bottom edges, and the result is complemented again. With `t = -d/2`
    /// this erodes the region by `d/2` on every side.
    #[must_use]
    pub fn shrink(&self, d: i32, t: i32) -> Self {
        let Some(ext) = self.extents() else {
            return Self::new();
        };
        let frame = ext.expand(1);
        let mut complement = Self::from_rect(frame);
        complement.subtract(self);
        let mut grown = Self::new();
        for r in &complement.rects {
            grown.union_rect(IntRect::new(r.x0 + t, r.y0 + t, r.x1 + t + d, r.y1 + t + d));
        }
        let mut out = Self::from_rect(frame);
        out.subtract(&grown);
        out
    }

    /// Maps the region through `affine` and returns a region contained in
    /// the image, built from chunks roughly `chunk` pixels across.
    ///
    /// Only the part of the result inside `bounds` is meaningful; work
    /// outside it is skipped.
    #[must_use]
    pub fn affine_approx_inwards(&self, affine: Affine, bounds: IntRect, chunk: i32) -> Self {
        if self.is_empty() {
            return Self::new();
        }
        if is_identity(affine, 0.001) {
            return self.clone();
        }

        let linear = affine.with_translation(Vec2::ZERO);
        if is_scale(linear, 0.001) {
            let mut out = Self::new();
            for r in &self.rects {
                let a = round_point(affine * r.min().to_point());
                let b = round_point(affine * r.max().to_point());
                out.union_rect(IntRect::from_points(a, b));
            }
            return out;
        }

        let Some(ext) = self.extents() else {
            return Self::new();
        };
        let Some(dst) = ext.transform_bounds(affine).intersect(&bounds) else {
            return Self::new();
        };
        let src = dst.transform_bounds(affine.inverse());

        let mut out = Self::from_rect(dst);
        let mut outside = Self::from_rect(src);
        outside.subtract(self);

        let fx = (linear * Point::new(1.0, 0.0)).to_vec2();
        let fy = (linear * Point::new(0.0, 1.0)).to_vec2();
        let fx = fx.x.abs().min(fx.y.abs());
        let fy = fy.x.abs().min(fy.y.abs());
        let chunk = f64::from(chunk.max(1));

        for r in &outside.rects {
            let nx = chunk_count(f64::from(r.width()) * fx / chunk);
            let ny = chunk_count(f64::from(r.height()) * fy / chunk);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "interpolates between two i32 coordinates"
            )]
            let at = |x: i32, y: i32| {
                IntPoint::new(
                    r.x0 + (i64::from(r.width()) * i64::from(x) / i64::from(nx)) as i32,
                    r.y0 + (i64::from(r.height()) * i64::from(y) / i64::from(ny)) as i32,
                )
            };
            for x in 0..nx {
                for y in 0..ny {
                    let piece = IntRect::from_points(at(x, y), at(x + 1, y + 1));
                    out.subtract_rect(piece.transform_bounds(affine));
                }
            }
        }
        out
    }
}

impl From<IntRect> for Region {
    fn from(rect: IntRect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<IntRect> for Region {
    fn from_iter<I: IntoIterator<Item = IntRect>>(iter: I) -> Self {
        let mut r = Self::new();
        for rect in iter {
            r.union_rect(rect);
        }
        r
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "saturating float to int conversion of a chunk count"
)]
fn chunk_count(v: f64) -> i32 {
    (v.ceil() as i32).max(1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SetOp {
    Union,
    Subtract,
    Intersect,
}

impl SetOp {
    fn keep(self, in_a: bool, in_b: bool) -> bool {
        match self {
            Self::Union => in_a || in_b,
            Self::Subtract => in_a && !in_b,
            Self::Intersect => in_a && in_b,
        }
    }
}

/// Combines two banded rectangle lists into a new banded list.
///
/// The plane is cut into horizontal slabs at every `y0` and `y1` of either
/// operand. Each slab's spans are combined, and a slab whose spans equal
/// those of the slab right above it extends that band instead of starting a
/// new one.
fn combine(a: &[IntRect], b: &[IntRect], op: SetOp) -> Vec<IntRect> {
    let mut ys: Vec<i32> = a.iter().chain(b).flat_map(|r| [r.y0, r.y1]).collect();
    ys.sort_unstable();
    ys.dedup();

    let mut out: Vec<IntRect> = Vec::with_capacity(a.len() + b.len());
    let mut last_band = 0..0;
    let mut spans: Vec<(i32, i32)> = Vec::new();
    let (mut ia, mut ib) = (0, 0);

    for w in ys.windows(2) {
        let (y0, y1) = (w[0], w[1]);
        let band_a = band_at(a, &mut ia, y0);
        let band_b = band_at(b, &mut ib, y0);
        spans.clear();
        combine_spans(band_a, band_b, op, &mut spans);
        if spans.is_empty() {
            continue;
        }

        let prev = &out[last_band.clone()];
        let extends = prev.first().is_some_and(|r| r.y1 == y0)
            && prev.len() == spans.len()
            && prev.iter().zip(&spans).all(|(r, &(x0, x1))| r.x0 == x0 && r.x1 == x1);
        if extends {
            for r in &mut out[last_band.clone()] {
                r.y1 = y1;
            }
        } else {
            let start = out.len();
            out.extend(spans.iter().map(|&(x0, x1)| IntRect::new(x0, y0, x1, y1)));
            last_band = start..out.len();
        }
    }
    out
}

/// Returns the band of `rects` covering row `y`, or an empty slice.
///
/// `cursor` only moves forward, so successive calls must ask for rows in
/// ascending order.
fn band_at<'a>(rects: &'a [IntRect], cursor: &mut usize, y: i32) -> &'a [IntRect] {
    while rects.get(*cursor).is_some_and(|r| r.y1 <= y) {
        *cursor += 1;
    }
    let start = *cursor;
    let Some(first) = rects.get(start) else {
        return &[];
    };
    if first.y0 > y {
        return &[];
    }
    let len = rects[start..]
        .iter()
        .take_while(|r| r.y0 == first.y0)
        .count();
    &rects[start..start + len]
}

/// Combines the x-spans of two bands, appending maximal spans to `out`.
fn combine_spans(a: &[IntRect], b: &[IntRect], op: SetOp, out: &mut Vec<(i32, i32)>) {
    let mut xs: Vec<i32> = a.iter().chain(b).flat_map(|r| [r.x0, r.x1]).collect();
    xs.sort_unstable();
    xs.dedup();

    let (mut ia, mut ib) = (0, 0);
    for w in xs.windows(2) {
        let (x0, x1) = (w[0], w[1]);
        if !op.keep(covers(a, &mut ia, x0), covers(b, &mut ib, x0)) {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.1 == x0 => last.1 = x1,
            _ => out.push((x0, x1)),
        }
    }
}

/// Returns `true` if one of the sorted spans covers column `x`.
fn covers(spans: &[IntRect], cursor: &mut usize, x: i32) -> bool {
    while spans.get(*cursor).is_some_and(|r| r.x1 <= x) {
        *cursor += 1;
    }
    spans.get(*cursor).is_some_and(|r| r.x0 <= x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(r: &Region) {
        let rects = r.rects();
        for (i, a) in rects.iter().enumerate() {
            assert!(!a.is_empty(), "empty rect {a:?} stored");
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    fn assert_banded(r: &Region) {
        assert_disjoint(r);
        for w in r.rects().windows(2) {
            let (a, b) = (w[0], w[1]);
            if a.y0 == b.y0 {
                assert_eq!(a.y1, b.y1, "{a:?} and {b:?} share a band");
                assert!(a.x1 < b.x0, "{a:?} and {b:?} out of order or touching");
            } else {
                assert!(a.y1 <= b.y0, "bands {a:?} and {b:?} out of order");
            }
        }
    }

    #[test]
    fn checkerboard_stays_banded_and_fills_to_one_rect() {
        let cell = |i: i32, j: i32| IntRect::from_xywh(i * 10, j * 10, 10, 10);
        let mut r = Region::new();
        for j in 0..40 {
            for i in 0..40 {
                if (i + j) % 2 == 0 {
                    r.union_rect(cell(i, j));
                }
            }
        }
        assert_banded(&r);
        assert_eq!(r.num_rects(), 800, "one rect per cell");
        assert_eq!(r.area(), 800 * 100);

        for j in 0..40 {
            for i in 0..40 {
                if (i + j) % 2 == 1 {
                    r.union_rect(cell(i, j));
                }
            }
        }
        assert_eq!(r.rects(), &[IntRect::new(0, 0, 400, 400)], "gaps filled");
    }

    #[test]
    fn subtract_keeps_bands_sorted() {
        let mut r = Region::from_rect(IntRect::new(0, 0, 100, 100));
        r.subtract_rect(IntRect::new(10, 10, 20, 90));
        r.subtract_rect(IntRect::new(50, 30, 60, 40));
        r.subtract_rect(IntRect::new(-5, 95, 200, 200));
        assert_banded(&r);
        assert_eq!(r.area(), 100 * 95 - 10 * 80 - 10 * 10);
        assert_eq!(r.extents(), Some(IntRect::new(0, 0, 100, 95)));
    }

    #[test]
    fn intersect_rect_clips_and_recoalesces() {
        let mut r: Region = [IntRect::new(0, 0, 10, 10), IntRect::new(0, 10, 20, 20)]
            .into_iter()
            .collect();
        r.intersect_rect(IntRect::new(0, 5, 10, 15));
        assert_eq!(r.rects(), &[IntRect::new(0, 5, 10, 15)], "bands with equal spans merge");
        r.intersect_rect(IntRect::new(3, 3, 3, 3));
        assert!(r.is_empty(), "empty clip empties the region");
    }

    #[test]
    fn union_of_overlapping_rects_counts_pixels_once() {
        let mut r = Region::from_rect(IntRect::new(0, 0, 10, 10));
        r.union_rect(IntRect::new(5, 5, 15, 15));
        assert_banded(&r);
        assert_eq!(r.area(), 100 + 100 - 25);
        assert_eq!(r.extents(), Some(IntRect::new(0, 0, 15, 15)));
    }

    #[test]
    fn adjacent_rects_coalesce() {
        let mut r = Region::from_rect(IntRect::new(0, 0, 10, 10));
        r.union_rect(IntRect::new(10, 0, 20, 10));
        assert_eq!(r.num_rects(), 1, "side-by-side rects merge");
        r.union_rect(IntRect::new(0, 10, 20, 30));
        assert_eq!(r.rects(), &[IntRect::new(0, 0, 20, 30)]);
    }

    #[test]
    fn subtract_punches_hole() {
        let mut r = Region::from_rect(IntRect::new(0, 0, 30, 30));
        r.subtract_rect(IntRect::new(10, 10, 20, 20));
        assert_disjoint(&r);
        assert_eq!(r.area(), 900 - 100);
        assert_eq!(r.contains_rect(IntRect::new(10, 10, 20, 20)), Overlap::Out);
        assert_eq!(r.contains_rect(IntRect::new(0, 0, 10, 30)), Overlap::In);
        assert_eq!(r.contains_rect(IntRect::new(5, 5, 15, 15)), Overlap::Part);
        assert!(!r.contains_point(IntPoint::new(15, 15)));
        assert!(r.contains_point(IntPoint::new(25, 25)));
    }

    #[test]
    fn intersect_with_region() {
        let mut a: Region = [IntRect::new(0, 0, 10, 10), IntRect::new(20, 0, 30, 10)]
            .into_iter()
            .collect();
        let b = Region::from_rect(IntRect::new(5, 0, 25, 5));
        a.intersect(&b);
        assert_disjoint(&a);
        assert_eq!(a.area(), 25 + 25);
    }

    #[test]
    fn equality_is_by_point_set() {
        let a: Region = [IntRect::new(0, 0, 10, 5), IntRect::new(0, 5, 10, 10)]
            .into_iter()
            .collect();
        let b: Region = [IntRect::new(0, 0, 5, 10), IntRect::new(5, 0, 10, 10)]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_ne!(a, Region::from_rect(IntRect::new(0, 0, 10, 9)));
    }

    #[test]
    fn empty_rects_are_ignored() {
        let mut r = Region::new();
        r.union_rect(IntRect::new(5, 5, 5, 10));
        assert!(r.is_empty());
        assert_eq!(r.extents(), None);
        assert_eq!(r.contains_rect(IntRect::new(1, 1, 1, 1)), Overlap::In);
    }

    #[test]
    fn shrink_erodes_every_side() {
        let r = Region::from_rect(IntRect::new(0, 0, 20, 20));
        let s = r.shrink(4, -2);
        assert_eq!(s, Region::from_rect(IntRect::new(2, 2, 18, 18)));
    }

    #[test]
    fn shrink_removes_thin_slivers() {
        let r = Region::from_rect(IntRect::new(0, 0, 3, 100));
        assert!(r.shrink(4, -2).is_empty(), "3px sliver vanishes");
    }

    #[test]
    fn approx_inwards_identity_is_copy() {
        let r = Region::from_rect(IntRect::new(0, 0, 50, 50));
        let out = r.affine_approx_inwards(Affine::IDENTITY, IntRect::new(0, 0, 100, 100), 200);
        assert_eq!(out, r);
    }

    #[test]
    fn approx_inwards_scale_maps_corners() {
        let r = Region::from_rect(IntRect::new(10, 10, 20, 30));
        let out = r.affine_approx_inwards(
            Affine::scale(2.0),
            IntRect::new(0, 0, 1000, 1000),
            200,
        );
        assert_eq!(out, Region::from_rect(IntRect::new(20, 20, 40, 60)));
    }

    #[test]
    fn approx_inwards_rotation_stays_inside_image() {
        let r = Region::from_rect(IntRect::new(0, 0, 400, 400));
        let rot = Affine::translate((500.0, 500.0)) * Affine::rotate(0.3);
        let bounds = IntRect::new(-2000, -2000, 2000, 2000);
        let out = r.affine_approx_inwards(rot, bounds, 50);
        assert!(!out.is_empty(), "a rotated square keeps an interior");
        let inv = rot.inverse();
        for rect in out.rects() {
            for p in rect.corners() {
                let q = inv * p;
                assert!(
                    q.x >= -1e-6 && q.y >= -1e-6 && q.x <= 400.0 + 1e-6 && q.y <= 400.0 + 1e-6,
                    "corner {p:?} maps back outside the source: {q:?}"
                );
            }
        }
    }
}
