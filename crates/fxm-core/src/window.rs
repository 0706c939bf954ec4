//! Background sampling window around a region centroid.

use serde::{Deserialize, Serialize};

/// Half-width of the square background sampling window, in pixels.
///
/// The edge-proximity filter in [`crate::segment`] uses the same margin, so
/// for surviving regions the full window fits in-frame and the clamping in
/// [`bg_window`] is only a fallback for undersized images.
pub const BG_WINDOW_HALF_PX: i64 = 100;

/// Half-open pixel bounds `rows r0..r1, cols c0..c1` of a sampling window.
///
/// Bounds are clamped independently, so windows at a true image boundary
/// may be non-square or even empty; callers must tolerate variable shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub r0: u32,
    pub r1: u32,
    pub c0: u32,
    pub c1: u32,
}

/// Compute the background sampling window centered at `(row, col)`.
///
/// Each of the four bounds is clamped to `[0, img_size]`. Callers are
/// expected to pass a positive `img_size`; the square-image convention means
/// the same size bounds both axes.
pub fn bg_window(row: i64, col: i64, img_size: u32) -> WindowBounds {
    let clamp = |v: i64| v.clamp(0, img_size as i64) as u32;
    WindowBounds {
        r0: clamp(row - BG_WINDOW_HALF_PX),
        r1: clamp(row + BG_WINDOW_HALF_PX),
        c0: clamp(col - BG_WINDOW_HALF_PX),
        c1: clamp(col + BG_WINDOW_HALF_PX),
    }
}
