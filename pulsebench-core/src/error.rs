//! Contract-violation errors.
//!
//! These are programming or configuration errors that abort the affected
//! target before any timing side effects. Measurement-quality conditions
//! (pilot overflow, warmup instability, ...) are *not* errors; they travel
//! as diagnostics on the run result.

use thiserror::Error;

use crate::clock::ClockKind;

/// Errors raised for caller-contract violations. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The invocation count is not an exact multiple of the unroll factor.
    #[error("invoke count ({invoke_count}) must be a multiple of unroll factor ({unroll_factor})")]
    InvalidIterationShape {
        /// Requested invocation count.
        invoke_count: u64,
        /// Requested unroll factor.
        unroll_factor: u64,
    },

    /// An iteration was requested with zero invocations.
    #[error("invoke count must be greater than zero")]
    ZeroInvokeCount,

    /// An iteration was requested with a zero unroll factor.
    #[error("unroll factor must be at least 1")]
    ZeroUnrollFactor,

    /// The configured clock cannot be provided on this platform.
    #[error("clock '{0}' is not supported on this platform")]
    UnsupportedClock(ClockKind),

    /// The resolved job configuration is internally inconsistent.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
