//! Summary Statistics
//!
//! Computes the summary statistics the engine's stopping rules consume.
//! The engine sees raw samples; no outlier cleaning happens here, because
//! convergence must be judged on what was actually measured.

use serde::{Deserialize, Serialize};

use crate::percentiles::compute_percentile;

/// Summary statistics over a sample set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStatistics {
    /// Arithmetic mean.
    pub mean: f64,
    /// Median (50th percentile).
    pub median: f64,
    /// Sample standard deviation (n-1 denominator).
    pub std_dev: f64,
    /// Minimum observed value.
    pub min: f64,
    /// Maximum observed value.
    pub max: f64,
    /// Number of samples.
    pub sample_count: usize,
}

/// Compute summary statistics over raw samples.
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    if samples.is_empty() {
        return SummaryStatistics {
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            sample_count: 0,
        };
    }

    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let median = compute_percentile(samples, 50.0);

    let std_dev = if samples.len() < 2 {
        0.0
    } else {
        let variance =
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
        variance.sqrt()
    };

    let min = samples
        .iter()
        .cloned()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);
    let max = samples
        .iter()
        .cloned()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);

    SummaryStatistics {
        mean,
        median,
        std_dev,
        min,
        max,
        sample_count: samples.len(),
    }
}

impl SummaryStatistics {
    /// Relative standard error: (std_dev / sqrt(n)) / mean.
    ///
    /// The engine's convergence target. Zero for fewer than two samples or
    /// a zero mean (a zero-cost workload has nothing left to converge on).
    pub fn relative_standard_error(&self) -> f64 {
        if self.sample_count < 2 || self.mean == 0.0 {
            return 0.0;
        }
        (self.std_dev / (self.sample_count as f64).sqrt()) / self.mean.abs()
    }

    /// Coefficient of variation (relative stddev), as a percentage.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }

    /// Check if distribution appears stable (low CV)
    pub fn is_stable(&self, cv_threshold: f64) -> bool {
        self.coefficient_of_variation() < cv_threshold
    }
}

/// Relative standard error of a raw sample set.
pub fn relative_standard_error(samples: &[f64]) -> f64 {
    compute_summary(samples).relative_standard_error()
}

/// Coefficient of variation over the trailing `window` samples, as a
/// fraction (0.05 = 5%).
///
/// Returns `None` until at least `window` samples exist, so stabilization
/// is never declared on a partial window.
pub fn trailing_window_cv(samples: &[f64], window: usize) -> Option<f64> {
    if window == 0 || samples.len() < window {
        return None;
    }
    let tail = &samples[samples.len() - window..];
    let summary = compute_summary(tail);
    if summary.mean == 0.0 {
        return Some(0.0);
    }
    Some(summary.std_dev / summary.mean.abs())
}
