//! FXm volume estimation for labeled regions.
//!
//! The fluorescence-exclusion principle: cells displace the fluorescent
//! medium, so the intensity deficit of a region relative to its local
//! background is proportional to the chamber height the cell occupies.
//! Volume is `(background − intensity) × surface × h × px²` with the
//! chamber height `h` and pixel edge length `px` in micrometers, yielding
//! cubic micrometers.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::labeling::LabelMap;
use crate::window::bg_window;
use crate::FloatImage;

/// Chamber and camera calibration for one analysis run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Height of the microfluidic chamber in µm.
    pub chamber_height_um: f64,
    /// Pixel edge length in µm, from the camera pixel size and the
    /// magnification used.
    pub pixel_size_um: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            chamber_height_um: 5.6,
            pixel_size_um: 0.325,
        }
    }
}

/// One quantified object.
///
/// `id` is the zero-based table identifier (`label − 1`); the real-valued
/// centroid keeps sub-pixel precision even though windowing truncates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: usize,
    /// Centroid row coordinate.
    pub center_row: f64,
    /// Centroid column coordinate.
    pub center_col: f64,
    /// Chamber height used for this measurement (µm).
    pub chamber_height_um: f64,
    /// Pixel edge length used for this measurement (µm).
    pub pixel_size_um: f64,
    /// Median background intensity inside the sampling window.
    pub background: f64,
    /// Region surface in pixels.
    pub surface: u64,
    /// Mean intensity over the region's exact pixel mask.
    pub intensity: f64,
    /// Computed volume in µm³. Negative when the region is brighter than
    /// its background; documented, not prevented.
    pub volume_um3: f64,
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by [`measure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeError {
    /// Image, mask and label map must share one square, nonzero shape.
    InvalidImageGeometry {
        /// Image dimensions `[width, height]`.
        image: [u32; 2],
        /// Background mask dimensions.
        mask: [u32; 2],
        /// Label map dimensions.
        labels: [u32; 2],
    },
    /// The background window of a region contained no non-structure pixel.
    InsufficientBackgroundSample {
        /// Label of the offending region.
        label: u32,
    },
}

impl std::fmt::Display for VolumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidImageGeometry { image, mask, labels } => write!(
                f,
                "invalid image geometry: image {}x{}, mask {}x{}, labels {}x{} (expected one square nonzero shape)",
                image[0], image[1], mask[0], mask[1], labels[0], labels[1]
            ),
            Self::InsufficientBackgroundSample { label } => write!(
                f,
                "background window of region {} contains no non-structure pixel",
                label
            ),
        }
    }
}

impl std::error::Error for VolumeError {}

// ── Estimation ─────────────────────────────────────────────────────────────

/// Quantify every labeled region of `labels`.
///
/// `bg_mask` marks structures (cells and pillars) with nonzero values;
/// background statistics are taken only over window pixels the mask leaves
/// at zero, which biases the estimate toward the cleared fluid. The output
/// is ordered by label, so `out[i].id == i`. An empty label map yields an
/// empty vector.
pub fn measure(
    image: &FloatImage,
    bg_mask: &GrayImage,
    labels: &LabelMap,
    calibration: &Calibration,
) -> Result<Vec<Measurement>, VolumeError> {
    let (w, h) = image.dimensions();
    let shapes_agree = bg_mask.dimensions() == (w, h) && (labels.width(), labels.height()) == (w, h);
    if w == 0 || w != h || !shapes_agree {
        return Err(VolumeError::InvalidImageGeometry {
            image: [w, h],
            mask: [bg_mask.width(), bg_mask.height()],
            labels: [labels.width(), labels.height()],
        });
    }

    let n_labels = labels.n_labels();
    if n_labels == 0 {
        return Ok(Vec::new());
    }

    let surfaces = labels.surfaces();
    let centroids = labels.centroids();

    // Foreground sums over the exact region masks, one pass for all labels.
    let mut fg_sum = vec![0.0f64; n_labels as usize + 1];
    for (col, row, p) in labels.image().enumerate_pixels() {
        let label = p[0] as usize;
        if label > 0 {
            fg_sum[label] += image.get_pixel(col, row)[0] as f64;
        }
    }

    let img_size = h;
    let mut out = Vec::with_capacity(n_labels as usize);
    for label in 1..=n_labels {
        let [center_row, center_col] = centroids[label as usize];
        let win = bg_window(center_row as i64, center_col as i64, img_size);

        let mut bg_samples = Vec::new();
        for row in win.r0..win.r1 {
            for col in win.c0..win.c1 {
                if bg_mask.get_pixel(col, row)[0] == 0 {
                    bg_samples.push(image.get_pixel(col, row)[0] as f64);
                }
            }
        }
        if bg_samples.is_empty() {
            return Err(VolumeError::InsufficientBackgroundSample { label });
        }
        let background = median(&mut bg_samples);

        let surface = surfaces[label as usize];
        let intensity = fg_sum[label as usize] / surface as f64;
        let volume_um3 = (background - intensity)
            * surface as f64
            * calibration.chamber_height_um
            * calibration.pixel_size_um.powi(2);

        out.push(Measurement {
            id: (label - 1) as usize,
            center_row,
            center_col,
            chamber_height_um: calibration.chamber_height_um,
            pixel_size_um: calibration.pixel_size_um,
            background,
            surface,
            intensity,
            volume_um3,
        });
    }

    tracing::debug!("Measured {} regions", out.len());
    Ok(out)
}

/// Median with averaging of the two middle elements for even lengths.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}
