// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene painter the canvas renders tiles with.

use fresco_core::geom::IntRect;
use fresco_core::surface::{RenderError, Surface};
use kurbo::Affine;

/// Where a tile sits and how it should be painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileContext {
    /// Tile bounds in store pixel space.
    pub rect: IntRect,
    /// Document to store pixel space.
    pub affine: Affine,
    /// Device pixels per store pixel; the surface is `rect` times this.
    pub device_scale: i32,
    /// Paint the outline rendition instead of the normal one.
    pub outline_pass: bool,
}

impl TileContext {
    /// Transform from document space to the tile surface's device pixels.
    #[must_use]
    pub fn device_transform(&self) -> Affine {
        Affine::scale(f64::from(self.device_scale))
            * Affine::translate((-f64::from(self.rect.x0), -f64::from(self.rect.y0)))
            * self.affine
    }
}

/// Paints document content into tiles.
///
/// [`render`](Self::render) is called concurrently from worker threads,
/// between [`snapshot`](Self::snapshot) and [`unsnapshot`](Self::unsnapshot).
/// The other methods are called on the UI thread while no worker is
/// rendering.
pub trait Drawing: Send + Sync {
    /// Paints the document over `target`, which already holds the background
    /// (or is transparent) for `ctx.rect`.
    fn render(&self, target: &mut Surface, ctx: &TileContext) -> Result<(), RenderError>;

    /// Brings cached geometry up to date before a cycle. `affine_changed`
    /// is set when the store affine differs from the one last passed.
    fn update(&self, affine: Affine, affine_changed: bool) {
        _ = (affine, affine_changed);
    }

    /// Limits caches to content inside `rect` of store space.
    fn set_cache_limit(&self, rect: IntRect) {
        _ = rect;
    }

    /// Freezes the document for concurrent rendering.
    fn snapshot(&self) {}

    /// Releases the freeze taken by [`snapshot`](Self::snapshot).
    fn unsnapshot(&self) {}
}

#[cfg(test)]
mod tests {
    use kurbo::Point;

    use super::*;

    #[test]
    fn device_transform_maps_tile_origin_to_zero() {
        let ctx = TileContext {
            rect: IntRect::new(100, 50, 200, 150),
            affine: Affine::scale(2.0),
            device_scale: 2,
            outline_pass: false,
        };
        let t = ctx.device_transform();
        assert_eq!(t * Point::new(50.0, 25.0), Point::new(0.0, 0.0));
        assert_eq!(t * Point::new(60.0, 25.0), Point::new(40.0, 0.0), "zoom times device scale");
    }
}
