// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel fragments: a rectangle of pixels at a given document transform.

use kurbo::{Affine, Point};

use crate::geom::IntRect;

/// A rectangle of pixels together with the transform that places document
/// space into its pixel space.
///
/// The viewport, the backing store and the snapshot are all fragments. Two
/// fragments with equal affines share a pixel grid, so their rectangles can
/// be compared directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    /// Maps document coordinates to the fragment's pixel coordinates.
    pub affine: Affine,
    /// Pixel bounds in the fragment's own coordinates.
    pub rect: IntRect,
}

impl Default for Fragment {
    fn default() -> Self {
        Self {
            affine: Affine::IDENTITY,
            rect: IntRect::default(),
        }
    }
}

impl Fragment {
    /// Creates a fragment.
    #[must_use]
    pub const fn new(affine: Affine, rect: IntRect) -> Self {
        Self { affine, rect }
    }

    /// Transform taking this fragment's pixel space to `other`'s.
    #[must_use]
    pub fn to_space_of(&self, other: &Self) -> Affine {
        other.affine * self.affine.inverse()
    }

    /// Maps a point in this fragment's pixel space into `other`'s.
    #[must_use]
    pub fn map_point_to(&self, other: &Self, p: Point) -> Point {
        self.to_space_of(other) * p
    }

    /// The bounding box of this fragment's rectangle expressed in `other`'s
    /// pixel space, rounded outwards.
    #[must_use]
    pub fn bounds_in(&self, other: &Self) -> IntRect {
        self.rect.transform_bounds(self.to_space_of(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_affine_maps_identically() {
        let a = Fragment::new(Affine::scale(2.0), IntRect::new(0, 0, 10, 10));
        let b = Fragment::new(Affine::scale(2.0), IntRect::new(5, 5, 20, 20));
        assert_eq!(a.bounds_in(&b), a.rect);
    }

    #[test]
    fn zoom_maps_between_spaces() {
        let store = Fragment::new(Affine::scale(1.0), IntRect::new(0, 0, 100, 100));
        let view = Fragment::new(Affine::scale(2.0), IntRect::new(0, 0, 100, 100));
        assert_eq!(
            store.map_point_to(&view, Point::new(10.0, 20.0)),
            Point::new(20.0, 40.0)
        );
        assert_eq!(view.bounds_in(&store), IntRect::new(0, 0, 50, 50));
    }
}
