//! IQR-based outlier classification and volume summary statistics.
//!
//! Quartiles are computed once per collection and shared across every
//! requested threshold, so multiple thresholds classify against the same
//! bounds. Degenerate collections (zero or one element) are valid input and
//! never fault.

use serde::{Deserialize, Serialize};

/// Distribution quartiles with linear interpolation between order
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    /// 25th percentile.
    pub q1: f64,
    /// 50th percentile.
    pub median: f64,
    /// 75th percentile.
    pub q3: f64,
}

impl Quartiles {
    /// Interquartile range, `q3 - q1`.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Compute the quartiles of `values`. An empty collection yields zeros.
pub fn quartiles(values: &[f64]) -> Quartiles {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Quartiles {
        q1: percentile(&sorted, 0.25),
        median: percentile(&sorted, 0.5),
        q3: percentile(&sorted, 0.75),
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (sorted.len() as f64 - 1.0) * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Outlier tallies for one threshold.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutlierCounts {
    /// Values below `Q1 - t*IQR`.
    pub n_low: usize,
    /// Values above `Q3 + t*IQR`.
    pub n_high: usize,
    pub n_total: usize,
    /// Percentages over the full collection (0 when it is empty).
    pub pct_low: f64,
    pub pct_high: f64,
    pub pct_total: f64,
}

/// One boolean filter column produced by [`classify_outliers`].
///
/// `flags[i]` is true when value `i` falls outside the `t*IQR` band; the
/// column name is deterministic in the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierColumn {
    pub name: String,
    pub threshold: f64,
    pub flags: Vec<bool>,
    pub counts: OutlierCounts,
}

/// Classify `values` against every threshold in `thresholds`.
///
/// Q1/Q3 are computed once over the full collection. For a threshold `t` a
/// value is an outlier when it exceeds `Q3 + t*IQR` or falls below
/// `Q1 - t*IQR`; smaller thresholds are more restrictive, so the flagged
/// set shrinks monotonically as `t` grows.
pub fn classify_outliers(values: &[f64], thresholds: &[f64]) -> Vec<OutlierColumn> {
    let q = quartiles(values);
    let iqr = q.iqr();

    thresholds
        .iter()
        .map(|&t| {
            let low = q.q1 - t * iqr;
            let high = q.q3 + t * iqr;
            let flags: Vec<bool> = values.iter().map(|&v| v < low || v > high).collect();
            let n_low = values.iter().filter(|&&v| v < low).count();
            let n_high = values.iter().filter(|&&v| v > high).count();
            let pct = |n: usize| {
                if values.is_empty() {
                    0.0
                } else {
                    n as f64 / values.len() as f64 * 100.0
                }
            };
            let counts = OutlierCounts {
                n_low,
                n_high,
                n_total: n_low + n_high,
                pct_low: pct(n_low),
                pct_high: pct(n_high),
                pct_total: pct(n_low + n_high),
            };
            tracing::info!(
                "IQR filter t={}: {} low / {} high outliers of {}",
                t,
                n_low,
                n_high,
                values.len()
            );
            OutlierColumn {
                name: format!("AutoFilterIQR_{t}"),
                threshold: t,
                flags,
                counts,
            }
        })
        .collect()
}

/// Descriptive statistics of a volume collection, in µm³.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n−1 denominator), 0 for fewer than two
    /// values.
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    /// Mean absolute deviation from the mean.
    pub mad: f64,
    pub q3: f64,
    pub max: f64,
}

impl VolumeSummary {
    /// Summarize `values`; an empty collection yields the zero summary.
    pub fn describe(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let std_dev = if n > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        let mad = values.iter().map(|v| (v - mean).abs()).sum::<f64>() / n as f64;
        let q = quartiles(values);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            count: n,
            mean,
            std_dev,
            min,
            q1: q.q1,
            median: q.median,
            mad,
            q3: q.q3,
            max,
        }
    }
}
