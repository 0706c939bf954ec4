//! Dense label-map arena over connected components.
//!
//! A [`LabelMap`] wraps an integer image where `0` is background and region
//! labels form a dense range `1..=n_labels`. All removal operations relabel
//! immediately, so downstream consumers never see gaps in the label space
//! and can index per-region attributes by label value.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::LabelImage;

/// Pixel connectivity used for component extraction.
///
/// The reference mask format uses 4-connectivity; 8-connectivity merges
/// regions that touch only diagonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Edge-adjacent neighbors only.
    Four,
    /// Edge- and corner-adjacent neighbors.
    Eight,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::Four
    }
}

impl Connectivity {
    fn to_imageproc(self) -> imageproc::region_labelling::Connectivity {
        match self {
            Self::Four => imageproc::region_labelling::Connectivity::Four,
            Self::Eight => imageproc::region_labelling::Connectivity::Eight,
        }
    }
}

/// Integer-labeled regions of a binary mask with a dense label range.
#[derive(Debug, Clone)]
pub struct LabelMap {
    image: LabelImage,
    n_labels: u32,
}

impl LabelMap {
    /// Connected-component label every nonzero pixel of `mask`.
    ///
    /// A mask with no foreground pixels yields an empty map (`n_labels == 0`).
    pub fn from_mask(mask: &GrayImage, connectivity: Connectivity) -> Self {
        let image = imageproc::region_labelling::connected_components(
            mask,
            connectivity.to_imageproc(),
            Luma([0u8]),
        );
        let n_labels = image.pixels().map(|p| p[0]).max().unwrap_or(0);
        Self { image, n_labels }
    }

    /// Number of labeled regions (background excluded).
    pub fn n_labels(&self) -> u32 {
        self.n_labels
    }

    /// True when no region survived labeling or filtering.
    pub fn is_empty(&self) -> bool {
        self.n_labels == 0
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Label at `(row, col)`, `0` for background.
    pub fn label_at(&self, row: u32, col: u32) -> u32 {
        self.image.get_pixel(col, row)[0]
    }

    /// Backing label image.
    pub fn image(&self) -> &LabelImage {
        &self.image
    }

    /// Pixel count per label, indexed by label value (entry 0 counts
    /// background pixels).
    pub fn surfaces(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.n_labels as usize + 1];
        for p in self.image.pixels() {
            counts[p[0] as usize] += 1;
        }
        counts
    }

    /// Mean `(row, col)` coordinate per label, indexed by label value.
    ///
    /// Entry 0 is the background centroid; callers iterating regions must
    /// start at label 1.
    pub fn centroids(&self) -> Vec<[f64; 2]> {
        let n = self.n_labels as usize + 1;
        let mut sum_row = vec![0.0f64; n];
        let mut sum_col = vec![0.0f64; n];
        let mut counts = vec![0u64; n];
        for (col, row, p) in self.image.enumerate_pixels() {
            let label = p[0] as usize;
            sum_row[label] += row as f64;
            sum_col[label] += col as f64;
            counts[label] += 1;
        }
        (0..n)
            .map(|label| {
                if counts[label] == 0 {
                    [0.0, 0.0]
                } else {
                    let c = counts[label] as f64;
                    [sum_row[label] / c, sum_col[label] / c]
                }
            })
            .collect()
    }

    /// Per-label flag: does the region own a pixel on the image border?
    pub fn border_labels(&self) -> Vec<bool> {
        let mut on_border = vec![false; self.n_labels as usize + 1];
        let (w, h) = (self.width(), self.height());
        if w == 0 || h == 0 {
            return on_border;
        }
        for col in 0..w {
            on_border[self.label_at(0, col) as usize] = true;
            on_border[self.label_at(h - 1, col) as usize] = true;
        }
        for row in 0..h {
            on_border[self.label_at(row, 0) as usize] = true;
            on_border[self.label_at(row, w - 1) as usize] = true;
        }
        on_border
    }

    /// Drop every region for which `keep` returns false and compact the
    /// survivors to a dense `1..=n` range.
    ///
    /// The old-to-new mapping is built in one increasing pass over labels,
    /// then applied in one pass over pixels. Returns the number of regions
    /// removed.
    pub fn retain<F>(&mut self, mut keep: F) -> u32
    where
        F: FnMut(u32) -> bool,
    {
        let mut map = vec![0u32; self.n_labels as usize + 1];
        let mut next = 0u32;
        for label in 1..=self.n_labels {
            if keep(label) {
                next += 1;
                map[label as usize] = next;
            }
        }
        let removed = self.n_labels - next;
        if removed > 0 {
            for p in self.image.pixels_mut() {
                p[0] = map[p[0] as usize];
            }
            self.n_labels = next;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{paint_square, square_mask};

    #[test]
    fn empty_mask_yields_no_labels() {
        let mask = GrayImage::new(64, 64);
        let labels = LabelMap::from_mask(&mask, Connectivity::Four);
        assert!(labels.is_empty());
        assert_eq!(labels.surfaces(), vec![64 * 64]);
    }

    #[test]
    fn two_separated_squares_get_two_labels() {
        let mut mask = GrayImage::new(64, 64);
        paint_square(&mut mask, [10, 10], 3);
        paint_square(&mut mask, [40, 40], 5);
        let labels = LabelMap::from_mask(&mask, Connectivity::Four);
        assert_eq!(labels.n_labels(), 2);

        let surfaces = labels.surfaces();
        let mut region_sizes = surfaces[1..].to_vec();
        region_sizes.sort();
        assert_eq!(region_sizes, vec![7 * 7, 11 * 11]);
    }

    #[test]
    fn centroid_matches_square_center() {
        let mask = square_mask(64, [20, 30], 4);
        let labels = LabelMap::from_mask(&mask, Connectivity::Four);
        assert_eq!(labels.n_labels(), 1);
        let centroids = labels.centroids();
        assert_eq!(centroids[1], [20.0, 30.0]);
    }

    #[test]
    fn retain_relabels_densely() {
        let mut mask = GrayImage::new(64, 64);
        paint_square(&mut mask, [8, 8], 2);
        paint_square(&mut mask, [8, 40], 2);
        paint_square(&mut mask, [40, 8], 2);
        let mut labels = LabelMap::from_mask(&mask, Connectivity::Four);
        assert_eq!(labels.n_labels(), 3);

        let removed = labels.retain(|label| label != 2);
        assert_eq!(removed, 1);
        assert_eq!(labels.n_labels(), 2);

        // Surviving labels must form the dense range 1..=2.
        let max_label = labels.image().pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(max_label, 2);
        let surfaces = labels.surfaces();
        assert!(surfaces[1] > 0 && surfaces[2] > 0);
    }

    #[test]
    fn border_labels_flags_touching_region() {
        let mut mask = GrayImage::new(32, 32);
        // Region in the first row.
        for col in 4..9 {
            mask.put_pixel(col, 0, Luma([255]));
        }
        paint_square(&mut mask, [16, 16], 2);
        let labels = LabelMap::from_mask(&mask, Connectivity::Four);
        assert_eq!(labels.n_labels(), 2);

        let on_border = labels.border_labels();
        let flagged: Vec<u32> = (1..=labels.n_labels())
            .filter(|&l| on_border[l as usize])
            .collect();
        assert_eq!(flagged.len(), 1);
    }

    #[test]
    fn eight_connectivity_merges_diagonal_touch() {
        let mut mask = GrayImage::new(16, 16);
        mask.put_pixel(4, 4, Luma([255]));
        mask.put_pixel(5, 5, Luma([255]));
        let four = LabelMap::from_mask(&mask, Connectivity::Four);
        let eight = LabelMap::from_mask(&mask, Connectivity::Eight);
        assert_eq!(four.n_labels(), 2);
        assert_eq!(eight.n_labels(), 1);
    }
}
