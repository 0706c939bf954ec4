//! fxm-core — cell volume quantification for fluorescence-exclusion
//! microscopy (FXm) images.
//!
//! In FXm the chamber is filled with a fluorescent dextran solution that
//! cells exclude, so a cell appears darker than the surrounding fluid in
//! proportion to its height. The pipeline stages are:
//!
//! 1. **Labeling** – connected-component labeling of the normalization mask
//!    into a dense integer label map.
//! 2. **Segment** – rejection of oversized structures (support pillars),
//!    regions touching the image border, and regions whose centroid sits
//!    too close to the frame edge for full background sampling.
//! 3. **Volume** – per-region foreground mean and local background median
//!    inside a fixed sampling window, converted to a physical volume from
//!    chamber height and pixel calibration.
//! 4. **Outlier** – IQR-based classification of the resulting volume
//!    distribution into accepted cells and outliers.
//!
//! # Public API
//! - [`segment`] and [`SegmentConfig`] for mask segmentation
//! - [`measure`] and [`Calibration`] for volume estimation
//! - [`classify_outliers`] and [`VolumeSummary`] for the filtering policy
//! - [`MeasurementTable`] for the tab-separated result table

pub mod labeling;
pub mod outlier;
pub mod segment;
pub mod table;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod volume;
pub mod window;

pub use labeling::{Connectivity, LabelMap};
pub use outlier::{
    classify_outliers, quartiles, OutlierColumn, OutlierCounts, Quartiles, VolumeSummary,
};
pub use segment::{segment, SegmentConfig, SegmentStats};
pub use table::{FilterColumn, MeasurementTable, TableError};
pub use volume::{measure, Calibration, Measurement, VolumeError};
pub use window::{bg_window, WindowBounds, BG_WINDOW_HALF_PX};

/// Normalized FXm intensity image (one `f32` sample per pixel).
pub type FloatImage = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// Label map storage: `0` is background, positive values are region labels.
pub type LabelImage = image::ImageBuffer<image::Luma<u32>, Vec<u32>>;
