#![warn(missing_docs)]
//! PulseBench Statistical Engine
//!
//! Provides the statistics the convergence policy is built on:
//! - Summary statistics (mean, median, sample standard deviation)
//! - Relative standard error for the stopping rule
//! - Trailing-window coefficient of variation for warmup stabilization
//! - Percentile calculation via linear interpolation

mod percentiles;
mod summary;

pub use percentiles::{compute_percentile, median};
pub use summary::{
    SummaryStatistics, compute_summary, relative_standard_error, trailing_window_cv,
};
