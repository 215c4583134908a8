// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU pixel buffers handed between worker threads and the backend.
//!
//! Pixels are 32-bit premultiplied ARGB (`0xAARRGGBB`), one `u32` per pixel,
//! rows packed without padding. Colours supplied by the host are straight
//! RGBA ([`Rgba`]) and converted on use.

use core::fmt;

use crate::geom::IntRect;

/// A straight-alpha colour packed as `0xRRGGBBAA`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgba(pub u32);

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self(0);
    /// Opaque white.
    pub const WHITE: Self = Self(0xffff_ffff);
    /// Opaque black.
    pub const BLACK: Self = Self(0x0000_00ff);

    /// Alpha channel.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "masked to one byte")]
    pub const fn alpha(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// Returns `true` if the colour has full alpha.
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        self.alpha() == 0xff
    }

    /// Converts to premultiplied `0xAARRGGBB`.
    #[must_use]
    pub fn to_premul_argb(self) -> u32 {
        let a = u32::from(self.alpha());
        let premul = |shift: u32| ((self.0 >> shift) & 0xff) * a / 255;
        (a << 24) | (premul(24) << 16) | (premul(16) << 8) | premul(8)
    }
}

/// Failure to allocate a [`Surface`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceError {
    /// The requested dimensions exceed what can be addressed.
    TooLarge {
        /// Requested width in device pixels.
        width: i64,
        /// Requested height in device pixels.
        height: i64,
    },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { width, height } => {
                write!(f, "surface of {width}x{height} pixels is too large")
            }
        }
    }
}

impl core::error::Error for SurfaceError {}

/// Largest pixel count a single surface may hold.
pub const MAX_SURFACE_PIXELS: i64 = 1 << 28;

/// A premultiplied ARGB pixel buffer.
///
/// The buffer is `width × height` device pixels; `scale` records how many
/// device pixels make up one logical pixel along each axis.
#[derive(Clone)]
pub struct Surface {
    width: i32,
    height: i32,
    scale: i32,
    data: Vec<u32>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

impl Surface {
    /// Allocates a transparent surface covering `logical` pixels at the given
    /// device scale.
    pub fn new(width: i32, height: i32, scale: i32) -> Result<Self, SurfaceError> {
        let scale = scale.max(1);
        let w = i64::from(width.max(0)) * i64::from(scale);
        let h = i64::from(height.max(0)) * i64::from(scale);
        if w * h > MAX_SURFACE_PIXELS || w > i64::from(i32::MAX) || h > i64::from(i32::MAX) {
            return Err(SurfaceError::TooLarge {
                width: w,
                height: h,
            });
        }
        let len = usize::try_from(w * h).map_err(|_| SurfaceError::TooLarge {
            width: w,
            height: h,
        })?;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "bounded by the i32::MAX check above"
        )]
        Ok(Self {
            width: w as i32,
            height: h as i32,
            scale,
            data: vec![0; len],
        })
    }

    /// Width in device pixels.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in device pixels.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Device pixels per logical pixel.
    #[must_use]
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Logical size as `(width, height)`.
    #[must_use]
    pub fn logical_size(&self) -> (i32, i32) {
        (self.width / self.scale, self.height / self.scale)
    }

    /// Bounds in device pixels, anchored at the origin.
    #[must_use]
    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.width, self.height)
    }

    /// All pixels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.data
    }

    /// All pixels, row-major, mutably.
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }

    /// Reads one device pixel, or `None` outside the buffer.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.data[i])
    }

    /// Writes one device pixel; out-of-range writes are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, argb: u32) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = argb;
        }
    }

    /// Fills the whole surface with a premultiplied colour.
    pub fn fill(&mut self, argb: u32) {
        self.data.fill(argb);
    }

    /// Fills a device-pixel rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, rect: IntRect, argb: u32) {
        let Some(r) = rect.intersect(&self.bounds()) else {
            return;
        };
        for y in r.y0..r.y1 {
            let row = self.row_range(y, r.x0, r.x1);
            self.data[row].fill(argb);
        }
    }

    /// Composites a premultiplied colour over a device-pixel rectangle.
    pub fn blend_rect(&mut self, rect: IntRect, argb: u32) {
        let Some(r) = rect.intersect(&self.bounds()) else {
            return;
        };
        for y in r.y0..r.y1 {
            let row = self.row_range(y, r.x0, r.x1);
            for px in &mut self.data[row] {
                *px = over(argb, *px);
            }
        }
    }

    /// Copies `src_rect` of `src` so that its top-left lands at `(dx, dy)`,
    /// replacing destination pixels. Both rectangles are clipped.
    pub fn copy_from(&mut self, src: &Self, src_rect: IntRect, dx: i32, dy: i32) {
        self.transfer(src, src_rect, dx, dy, |_, s| s);
    }

    /// Like [`copy_from`](Self::copy_from) but composites source-over.
    pub fn composite_from(&mut self, src: &Self, src_rect: IntRect, dx: i32, dy: i32) {
        self.transfer(src, src_rect, dx, dy, |d, s| over(s, d));
    }

    fn transfer(
        &mut self,
        src: &Self,
        src_rect: IntRect,
        dx: i32,
        dy: i32,
        op: impl Fn(u32, u32) -> u32,
    ) {
        let Some(sr) = src_rect.intersect(&src.bounds()) else {
            return;
        };
        let (ox, oy) = (dx - src_rect.x0, dy - src_rect.y0);
        let Some(dr) = sr.translate(ox, oy).intersect(&self.bounds()) else {
            return;
        };
        for y in dr.y0..dr.y1 {
            let drow = self.row_range(y, dr.x0, dr.x1);
            let srow = src.row_range(y - oy, dr.x0 - ox, dr.x1 - ox);
            for (d, s) in self.data[drow].iter_mut().zip(&src.data[srow]) {
                *d = op(*d, *s);
            }
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        usize::try_from(i64::from(y) * i64::from(self.width) + i64::from(x)).ok()
    }

    fn row_range(&self, y: i32, x0: i32, x1: i32) -> core::ops::Range<usize> {
        let base = usize::try_from(i64::from(y) * i64::from(self.width)).unwrap_or(0);
        let x0 = usize::try_from(x0).unwrap_or(0);
        let x1 = usize::try_from(x1).unwrap_or(0);
        base + x0..base + x1
    }
}

/// Porter-Duff source-over for premultiplied ARGB.
#[must_use]
pub fn over(src: u32, dst: u32) -> u32 {
    let sa = src >> 24;
    if sa == 0xff {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xff;
        let d = (dst >> shift) & 0xff;
        (s + (d * inv + 127) / 255).min(255)
    };
    (channel(24) << 24) | (channel(16) << 16) | (channel(8) << 8) | channel(0)
}

/// Failure reported by the scene painter for a single tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// The painter could not obtain memory for intermediate buffers.
    OutOfMemory,
    /// Any other painter-specific failure.
    Other(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("out of memory while rendering tile"),
            Self::Other(msg) => write!(f, "tile rendering failed: {msg}"),
        }
    }
}

impl core::error::Error for RenderError {}

impl From<SurfaceError> for RenderError {
    fn from(_: SurfaceError) -> Self {
        Self::OutOfMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiplies_straight_colour() {
        assert_eq!(Rgba::WHITE.to_premul_argb(), 0xffff_ffff);
        assert_eq!(Rgba(0xff00_0080).to_premul_argb(), 0x8080_0000);
        assert!(Rgba::BLACK.is_opaque());
        assert!(!Rgba::TRANSPARENT.is_opaque());
    }

    #[test]
    fn rejects_oversized_surface() {
        let err = Surface::new(1 << 16, 1 << 16, 1).unwrap_err();
        assert!(matches!(err, SurfaceError::TooLarge { .. }), "{err}");
    }

    #[test]
    fn scale_multiplies_device_size() {
        let s = Surface::new(10, 20, 2).unwrap();
        assert_eq!((s.width(), s.height()), (20, 40));
        assert_eq!(s.logical_size(), (10, 20));
    }

    #[test]
    fn copy_from_clips_both_sides() {
        let mut src = Surface::new(4, 4, 1).unwrap();
        src.fill(0xff11_2233);
        let mut dst = Surface::new(4, 4, 1).unwrap();
        dst.copy_from(&src, IntRect::new(0, 0, 4, 4), 2, 3);
        assert_eq!(dst.pixel(2, 3), Some(0xff11_2233));
        assert_eq!(dst.pixel(3, 3), Some(0xff11_2233));
        assert_eq!(dst.pixel(1, 3), Some(0), "left of paste untouched");
        assert_eq!(dst.pixel(2, 2), Some(0), "above paste untouched");
    }

    #[test]
    fn over_respects_alpha() {
        assert_eq!(over(0xff00_00ff, 0xffff_0000), 0xff00_00ff, "opaque wins");
        assert_eq!(over(0, 0xffff_0000), 0xffff_0000, "transparent is no-op");
        let half_red = 0x8080_0000;
        let mixed = over(half_red, 0xff00_00ff);
        assert_eq!(mixed >> 24, 0xff, "result stays opaque");
    }
}
