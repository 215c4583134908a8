// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry and a few affine helpers.
//!
//! Pixel-space quantities (store bounds, tiles, dirty rectangles) are
//! [`IntRect`]s: half-open `[x0, x1) × [y0, y1)` boxes on the integer grid.
//! Continuous geometry uses [`kurbo`] directly.
//!
//! Affines follow kurbo's column-vector convention: `a * b` applies `b`
//! first.

use core::fmt;

use kurbo::{Affine, Point, Rect, Vec2};

/// An integer point in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntPoint {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl IntPoint {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to a kurbo [`Point`].
    #[inline]
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

/// A half-open axis-aligned rectangle on the integer pixel grid.
///
/// A rectangle with `x1 <= x0` or `y1 <= y0` is *empty*. Operations that
/// can produce an empty result return `Option<IntRect>` so that empty boxes
/// do not leak into regions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge (inclusive).
    pub x0: i32,
    /// Top edge (inclusive).
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl fmt::Debug for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntRect({}, {})-({}, {})",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

impl IntRect {
    /// Creates a rectangle from its edges.
    #[inline]
    #[must_use]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a rectangle from an origin and a size.
    #[inline]
    #[must_use]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Creates a rectangle at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(w: i32, h: i32) -> Self {
        Self::new(0, 0, w, h)
    }

    /// Creates a rectangle from two corner points.
    #[inline]
    #[must_use]
    pub fn from_points(a: IntPoint, b: IntPoint) -> Self {
        Self::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    /// Width in pixels (zero for empty rectangles).
    #[inline]
    #[must_use]
    pub const fn width(&self) -> i32 {
        if self.x1 > self.x0 {
            self.x1 - self.x0
        } else {
            0
        }
    }

    /// Height in pixels (zero for empty rectangles).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> i32 {
        if self.y1 > self.y0 {
            self.y1 - self.y0
        } else {
            0
        }
    }

    /// Top-left corner.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> IntPoint {
        IntPoint::new(self.x0, self.y0)
    }

    /// Bottom-right corner (exclusive).
    #[inline]
    #[must_use]
    pub const fn max(&self) -> IntPoint {
        IntPoint::new(self.x1, self.y1)
    }

    /// Dimensions as `(width, height)`.
    #[inline]
    #[must_use]
    pub const fn dimensions(&self) -> (i32, i32) {
        (self.width(), self.height())
    }

    /// The larger of width and height.
    #[inline]
    #[must_use]
    pub fn max_extent(&self) -> i32 {
        self.width().max(self.height())
    }

    /// The smaller of width and height.
    #[inline]
    #[must_use]
    pub fn min_extent(&self) -> i32 {
        self.width().min(self.height())
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub fn area(&self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    /// Intersection, or `None` if the rectangles do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Returns `true` if the rectangles share at least one pixel.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }

    /// Smallest rectangle containing both. Empty operands are ignored.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    ///
    /// Every rectangle contains the empty rectangle.
    #[must_use]
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.is_empty()
            || (self.x0 <= other.x0
                && self.y0 <= other.y0
                && self.x1 >= other.x1
                && self.y1 >= other.y1)
    }

    /// Returns `true` if the pixel at `p` is inside the rectangle.
    #[inline]
    #[must_use]
    pub fn contains_point(&self, p: IntPoint) -> bool {
        p.x >= self.x0 && p.x < self.x1 && p.y >= self.y0 && p.y < self.y1
    }

    /// Grows the rectangle by `d` on every side (shrinks if negative).
    #[must_use]
    pub const fn expand(&self, d: i32) -> Self {
        Self::new(self.x0 - d, self.y0 - d, self.x1 + d, self.y1 + d)
    }

    /// Translates the rectangle.
    #[must_use]
    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    /// Converts to a kurbo [`Rect`].
    #[must_use]
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Centre of the rectangle in continuous coordinates.
    #[must_use]
    pub fn center(&self) -> Point {
        self.to_rect().center()
    }

    /// The four corners in continuous coordinates, clockwise from top-left.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let r = self.to_rect();
        [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ]
    }

    /// Squared distance from `p` to the nearest point of the rectangle.
    ///
    /// Zero when `p` is inside.
    #[must_use]
    pub fn distance_sq(&self, p: Point) -> f64 {
        let r = self.to_rect();
        let dx = (r.x0 - p.x).max(0.0).max(p.x - r.x1);
        let dy = (r.y0 - p.y).max(0.0).max(p.y - r.y1);
        dx * dx + dy * dy
    }

    /// The smallest integer rectangle containing `rect`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "callers clamp coordinates into i32 range before rounding"
    )]
    pub fn round_out(rect: Rect) -> Self {
        let r = clamp_rect(rect);
        Self::new(
            r.x0.floor() as i32,
            r.y0.floor() as i32,
            r.x1.ceil() as i32,
            r.y1.ceil() as i32,
        )
    }

    /// The largest integer rectangle contained in `rect`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "callers clamp coordinates into i32 range before rounding"
    )]
    pub fn round_in(rect: Rect) -> Self {
        let r = clamp_rect(rect);
        Self::new(
            r.x0.ceil() as i32,
            r.y0.ceil() as i32,
            r.x1.floor() as i32,
            r.y1.floor() as i32,
        )
    }

    /// Bounding box of this rectangle's image under `affine`, rounded
    /// outwards.
    #[must_use]
    pub fn transform_bounds(&self, affine: Affine) -> Self {
        Self::round_out(affine.transform_rect_bbox(self.to_rect()))
    }
}

/// Largest coordinate magnitude accepted from continuous geometry.
///
/// Keeps room for margins to be added without overflowing `i32`.
pub const COORD_LIMIT: f64 = (1_u32 << 30) as f64;

fn clamp_rect(r: Rect) -> Rect {
    let r = r.abs();
    Rect::new(
        r.x0.clamp(-COORD_LIMIT, COORD_LIMIT),
        r.y0.clamp(-COORD_LIMIT, COORD_LIMIT),
        r.x1.clamp(-COORD_LIMIT, COORD_LIMIT),
        r.y1.clamp(-COORD_LIMIT, COORD_LIMIT),
    )
}

/// Rounds a point to the nearest integer grid point.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "input is clamped into i32 range"
)]
pub fn round_point(p: Point) -> IntPoint {
    IntPoint::new(
        p.x.round().clamp(-COORD_LIMIT, COORD_LIMIT) as i32,
        p.y.round().clamp(-COORD_LIMIT, COORD_LIMIT) as i32,
    )
}

/// Returns `true` if every coefficient of `a` is within `eps` of `b`.
#[must_use]
pub fn affine_approx_eq(a: Affine, b: Affine, eps: f64) -> bool {
    a.as_coeffs()
        .iter()
        .zip(b.as_coeffs())
        .all(|(x, y)| (x - y).abs() <= eps)
}

/// Returns `true` if `affine` is the identity to within `eps`.
#[must_use]
pub fn is_identity(affine: Affine, eps: f64) -> bool {
    affine_approx_eq(affine, Affine::IDENTITY, eps)
}

/// Returns `true` if the linear part of `affine` is a pure (possibly
/// non-uniform) scale to within `eps`.
#[must_use]
pub fn is_scale(affine: Affine, eps: f64) -> bool {
    let [_, b, c, _, _, _] = affine.as_coeffs();
    b.abs() <= eps && c.abs() <= eps
}

/// Returns `true` if `affine` is approximately one of the eight symmetries
/// of the square: no translation and a signed permutation matrix.
#[must_use]
pub fn approx_dihedral(affine: Affine, eps: f64) -> bool {
    let c = affine.as_coeffs();
    if c[4].abs() > eps || c[5].abs() > eps {
        return false;
    }
    let mut pattern = [0_u8; 4];
    for (slot, &v) in pattern.iter_mut().zip(&c[..4]) {
        let r = v.round();
        if (v - r).abs() > eps {
            return false;
        }
        *slot = match r.abs() {
            x if x == 0.0 => 0,
            x if x == 1.0 => 1,
            _ => return false,
        };
    }
    pattern == [1, 0, 0, 1] || pattern == [0, 1, 1, 0]
}

/// Returns `true` if `affine` maps the unit square approximately onto
/// itself (some combination of flips and quarter turns about its centre).
#[must_use]
pub fn preserves_unit_square(affine: Affine, eps: f64) -> bool {
    let centred = Affine::translate((-0.5, -0.5)) * affine * Affine::translate((0.5, 0.5));
    approx_dihedral(centred, eps)
}

/// Convex hull of a point set, counter-clockwise in a y-up frame, without
/// repeated points.
#[must_use]
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: Point, a: Point, b: Point) -> f64 {
        (a - o).cross(b - o)
    }

    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Finds the rotation that lets `points` be wrapped in the smallest-area
/// axis-aligned rectangle.
///
/// Returns the rotation together with the rectangle, which bounds the
/// rotated points. Uses rotating calipers over the convex hull.
#[must_use]
pub fn min_bounding_box(points: &[Point]) -> (Affine, Rect) {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return (Affine::IDENTITY, Rect::ZERO),
        1 => return (Affine::IDENTITY, Rect::from_points(hull[0], hull[0])),
        _ => {}
    }

    let n_pts = hull.len();
    let advance = |i: &mut usize, n: Vec2| {
        let mut ih = hull[*i].to_vec2().dot(n);
        loop {
            let j = (*i + 1) % n_pts;
            let jh = hull[j].to_vec2().dot(n);
            if ih >= jh {
                break;
            }
            *i = j;
            ih = jh;
        }
    };

    let mut min_area = f64::MAX;
    let mut result = (Affine::IDENTITY, Rect::ZERO);
    let (mut j, mut k, mut l) = (0, 0, 0);

    for i in 0..n_pts {
        let p1 = hull[i];
        let p2 = hull[(i + 1) % n_pts];
        let v = (p2 - p1).normalize();
        let n = Vec2::new(-v.y, v.x);

        if i == 0 {
            advance(&mut j, v);
            k = j;
            advance(&mut k, n);
            l = k;
            advance(&mut l, -v);
        } else {
            advance(&mut j, v);
            advance(&mut k, n);
            advance(&mut l, -v);
        }

        let w = (hull[j] - hull[l]).dot(v);
        let h = (hull[k] - hull[i]).dot(n);
        let area = w * h;

        if area < min_area {
            min_area = area;
            let x0 = hull[l].to_vec2().dot(v);
            let y0 = hull[i].to_vec2().dot(n);
            result = (
                Affine::new([v.x, -v.y, v.y, v.x, 0.0, 0.0]),
                Rect::new(x0, y0, x0 + w, y0 + h),
            );
        }
    }

    result
}

/// Clamps `v` into `[lo, hi]`, returning the midpoint when the range is
/// inverted.
#[must_use]
pub fn safe_clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if lo > hi {
        (lo + hi) * 0.5
    } else {
        v.clamp(lo, hi)
    }
}
