//! Measurement-quality diagnostics.
//!
//! Diagnostics are advisory metadata attached to the run result so a
//! downstream consumer can decide whether to trust, re-run, or reject the
//! benchmark. They never abort a run; contract violations
//! ([`pulsebench_core::EngineError`]) do.

use serde::{Deserialize, Serialize};

/// Advisory quality conditions raised during Pilot/Warmup/Actual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// Pilot growth hit the invocation-count cap before reaching the
    /// minimum sample time; the engine proceeded with the capped value.
    PilotOverflow {
        /// Invocation count the pilot settled on.
        capped_invoke_count: u64,
    },
    /// Warmup reached its iteration ceiling without the trailing window
    /// stabilizing. Advisory only; warm-up behavior is best-effort.
    WarmupDidNotStabilize {
        /// Warmup iterations executed.
        iterations: u64,
        /// Last trailing-window CV observed, if a full window existed.
        last_cv: Option<f64>,
    },
    /// Overhead subtraction would have produced a negative per-op time;
    /// the affected samples were floored at zero. The workload is too
    /// cheap relative to harness overhead and the result is unreliable.
    OverheadExceedsSample {
        /// Sequence index of the first floored sample.
        first_index: u64,
        /// How many Actual-phase samples were floored.
        samples_floored: u64,
    },
    /// The hard sample ceiling was reached before the relative standard
    /// error dropped to the accuracy target.
    TargetAccuracyNotMet {
        /// Relative standard error at the ceiling.
        achieved_relative_error: f64,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::PilotOverflow {
                capped_invoke_count,
            } => write!(f, "pilot capped at {capped_invoke_count} invocations"),
            Diagnostic::WarmupDidNotStabilize {
                iterations,
                last_cv,
            } => match last_cv {
                Some(cv) => write!(
                    f,
                    "warmup did not stabilize after {iterations} iterations (cv {:.3})",
                    cv
                ),
                None => write!(f, "warmup did not stabilize after {iterations} iterations"),
            },
            Diagnostic::OverheadExceedsSample {
                first_index,
                samples_floored,
            } => write!(
                f,
                "overhead exceeded {samples_floored} sample(s) starting at index {first_index}"
            ),
            Diagnostic::TargetAccuracyNotMet {
                achieved_relative_error,
            } => write!(
                f,
                "accuracy target not met (relative error {:.4})",
                achieved_relative_error
            ),
        }
    }
}

/// Terminal state of an engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// All phases completed.
    Done,
    /// Cancellation was honored at a sample boundary; the result carries
    /// whatever complete samples existed at that point.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_informative() {
        let d = Diagnostic::PilotOverflow {
            capped_invoke_count: 1024,
        };
        assert!(d.to_string().contains("1024"));

        let d = Diagnostic::TargetAccuracyNotMet {
            achieved_relative_error: 0.0375,
        };
        assert!(d.to_string().contains("0.0375"));
    }

    #[test]
    fn serialization_keeps_kind_tag() {
        let d = Diagnostic::OverheadExceedsSample {
            first_index: 12,
            samples_floored: 3,
        };
        let serialized = toml::to_string(&d).unwrap();
        assert!(serialized.contains("overhead-exceeds-sample"));
        assert!(serialized.contains("samples_floored = 3"));
    }
}
