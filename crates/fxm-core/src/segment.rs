//! Mask segmentation: connected components plus size, border and
//! edge-proximity filtering.
//!
//! The normalization mask marks both cells and the chamber's support
//! pillars. Pillars are rejected by their surface, partially-imaged objects
//! by border contact, and objects whose centroid sits within the sampling
//! margin of the frame edge are dropped so their background window fits
//! entirely in-frame.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::labeling::{Connectivity, LabelMap};
use crate::window::BG_WINDOW_HALF_PX;

/// Tuning parameters for [`segment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Maximum region surface in pixels. Larger regions are treated as
    /// support pillars, not cells.
    pub max_region_px: u64,
    /// Minimum centroid distance to any image edge, in pixels. Equal to the
    /// background window half-width so surviving regions sample a full
    /// window without clamping.
    pub edge_margin_px: u32,
    /// Pixel connectivity for component extraction.
    pub connectivity: Connectivity,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_region_px: 20_000,
            edge_margin_px: BG_WINDOW_HALF_PX as u32,
            connectivity: Connectivity::default(),
        }
    }
}

/// Region counts after each filter stage.
///
/// Counts are non-increasing from `n_initial` to `n_final`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Regions produced by connected-component labeling.
    pub n_initial: u32,
    /// Regions left after the surface cap.
    pub n_after_size: u32,
    /// Regions left after removing border-touching regions.
    pub n_after_border: u32,
    /// Regions left after the edge-proximity filter.
    pub n_final: u32,
}

/// Segment candidate cells out of a normalization mask.
///
/// Nonzero mask pixels are foreground. The result is a densely labeled map
/// of candidate cells together with per-stage counts; a mask with zero
/// surviving regions is a valid empty result, not an error.
pub fn segment(mask: &GrayImage, config: &SegmentConfig) -> (LabelMap, SegmentStats) {
    let mut labels = LabelMap::from_mask(mask, config.connectivity);
    let mut stats = SegmentStats {
        n_initial: labels.n_labels(),
        ..Default::default()
    };

    let surfaces = labels.surfaces();
    labels.retain(|label| surfaces[label as usize] <= config.max_region_px);
    stats.n_after_size = labels.n_labels();

    let on_border = labels.border_labels();
    labels.retain(|label| !on_border[label as usize]);
    stats.n_after_border = labels.n_labels();

    let margin = config.edge_margin_px as i64;
    let (height, width) = (labels.height() as i64, labels.width() as i64);
    let centroids = labels.centroids();
    labels.retain(|label| {
        let [row, col] = centroids[label as usize];
        // Truncation matches the integer centroid used for windowing.
        let (row, col) = (row as i64, col as i64);
        row - margin >= 0 && col - margin >= 0 && row + margin <= height && col + margin <= width
    });
    stats.n_final = labels.n_labels();

    tracing::info!(
        "Segmentation: {} regions, {} after size cap, {} after border removal, {} cells",
        stats.n_initial,
        stats.n_after_size,
        stats.n_after_border,
        stats.n_final,
    );

    (labels, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{paint_square, square_mask};
    use image::Luma;

    #[test]
    fn centered_square_survives_all_filters() {
        // 49x49 square at the center of a 2048x2048 field: below the size
        // cap, away from the border and the edge margin.
        let mask = square_mask(2048, [1024, 1024], 24);
        let (labels, stats) = segment(&mask, &SegmentConfig::default());
        assert_eq!(labels.n_labels(), 1);
        assert_eq!(stats.n_initial, 1);
        assert_eq!(stats.n_final, 1);
        assert_eq!(labels.surfaces()[1], 49 * 49);
    }

    #[test]
    fn oversized_region_is_rejected() {
        // 150x150 = 22500 px exceeds the 20000 px surface cap.
        let mut mask = square_mask(2048, [1024, 1024], 75);
        paint_square(&mut mask, [300, 300], 10);
        let (labels, stats) = segment(&mask, &SegmentConfig::default());
        assert_eq!(stats.n_initial, 2);
        assert_eq!(stats.n_after_size, 1);
        assert_eq!(labels.n_labels(), 1);
        assert_eq!(labels.surfaces()[1], 21 * 21);
    }

    #[test]
    fn border_touching_region_is_rejected() {
        let mut mask = GrayImage::new(512, 512);
        for col in 200..240 {
            for row in 0..30 {
                mask.put_pixel(col, row, Luma([255]));
            }
        }
        paint_square(&mut mask, [256, 256], 10);
        let (labels, stats) = segment(&mask, &SegmentConfig::default());
        assert_eq!(stats.n_initial, 2);
        assert_eq!(stats.n_after_size, 2);
        assert_eq!(stats.n_after_border, 1);
        assert_eq!(labels.n_labels(), 1);
    }

    #[test]
    fn near_edge_centroid_is_rejected() {
        // Centroid at (10, 10) is inside the 100 px edge margin.
        let mask = square_mask(2048, [10, 10], 5);
        let (labels, stats) = segment(&mask, &SegmentConfig::default());
        assert_eq!(stats.n_after_border, 1);
        assert_eq!(stats.n_final, 0);
        assert!(labels.is_empty());
    }

    #[test]
    fn empty_mask_is_a_valid_result() {
        let mask = GrayImage::new(256, 256);
        let (labels, stats) = segment(&mask, &SegmentConfig::default());
        assert!(labels.is_empty());
        assert_eq!(stats.n_initial, 0);
        assert_eq!(stats.n_final, 0);
    }

    #[test]
    fn stage_counts_are_monotonically_non_increasing() {
        let mut mask = GrayImage::new(512, 512);
        paint_square(&mut mask, [256, 256], 10); // survives
        paint_square(&mut mask, [150, 380], 80); // oversized
        paint_square(&mut mask, [40, 256], 8); // near edge
        for row in 500..512 {
            for col in 300..330 {
                mask.put_pixel(col, row, Luma([255]));
            }
        } // touches border
        let (labels, stats) = segment(&mask, &SegmentConfig::default());
        assert!(stats.n_after_size <= stats.n_initial);
        assert!(stats.n_after_border <= stats.n_after_size);
        assert!(stats.n_final <= stats.n_after_border);
        assert_eq!(labels.n_labels(), stats.n_final);
        assert_eq!(stats.n_final, 1);
    }

    #[test]
    fn smaller_margin_keeps_near_edge_region() {
        let mask = square_mask(512, [60, 60], 5);
        let config = SegmentConfig {
            edge_margin_px: 40,
            ..Default::default()
        };
        let (labels, _) = segment(&mask, &config);
        assert_eq!(labels.n_labels(), 1);
    }
}
