//! Shared synthetic-image helpers for unit tests.

use image::{GrayImage, Luma};

use crate::FloatImage;

/// Paint a filled square of `2 * half + 1` pixels centered at
/// `(row, col) = center` with mask value 255.
pub(crate) fn paint_square(mask: &mut GrayImage, center: [u32; 2], half: u32) {
    let [crow, ccol] = center;
    for row in crow.saturating_sub(half)..=(crow + half).min(mask.height() - 1) {
        for col in ccol.saturating_sub(half)..=(ccol + half).min(mask.width() - 1) {
            mask.put_pixel(col, row, Luma([255]));
        }
    }
}

/// A `size` x `size` mask containing one filled square.
pub(crate) fn square_mask(size: u32, center: [u32; 2], half: u32) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    paint_square(&mut mask, center, half);
    mask
}

/// A `size` x `size` intensity image with every pixel at `value`.
pub(crate) fn flat_image(size: u32, value: f32) -> FloatImage {
    FloatImage::from_pixel(size, size, Luma([value]))
}

/// Overwrite the square region around `center` with intensity `value`.
pub(crate) fn paint_region_value(image: &mut FloatImage, center: [u32; 2], half: u32, value: f32) {
    let [crow, ccol] = center;
    for row in crow.saturating_sub(half)..=(crow + half).min(image.height() - 1) {
        for col in ccol.saturating_sub(half)..=(ccol + half).min(image.width() - 1) {
            image.put_pixel(col, row, Luma([value]));
        }
    }
}
