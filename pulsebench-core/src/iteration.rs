//! Iteration requests and measurements.
//!
//! An [`IterationRequest`] describes one timed sample; executing it yields
//! exactly one [`Measurement`]. Both are immutable once constructed, and a
//! request can only be built through [`IterationRequest::new`], which
//! enforces the invoke-count/unroll-factor contract before any timing
//! happens.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What a timed sample measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterationKind {
    /// Harness-only cost: loop control and timer reads, no workload body.
    Overhead,
    /// Workload plus harness cost.
    Workload,
}

/// Why a timed sample is being taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterationPhase {
    /// Sizing the invocation count before measurement begins.
    Pilot,
    /// Stabilizing caches/JIT-like effects; discarded from the result.
    Warmup,
    /// Contributing to the final measurement sequence.
    Actual,
}

/// Full mode tag of a timed sample: what is measured and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationMode {
    /// What the sample measures.
    pub kind: IterationKind,
    /// Which phase requested it.
    pub phase: IterationPhase,
}

impl IterationMode {
    /// Convenience constructor.
    pub const fn new(kind: IterationKind, phase: IterationPhase) -> Self {
        Self { kind, phase }
    }
}

impl std::fmt::Display for IterationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            IterationKind::Overhead => "Overhead",
            IterationKind::Workload => "Workload",
        };
        let phase = match self.phase {
            IterationPhase::Pilot => "Pilot",
            IterationPhase::Warmup => "Warmup",
            IterationPhase::Actual => "Actual",
        };
        write!(f, "{kind}{phase}")
    }
}

/// Immutable description of one timed sample request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRequest {
    mode: IterationMode,
    index: u64,
    invoke_count: u64,
    unroll_factor: u64,
}

impl IterationRequest {
    /// Build a request, validating the iteration-shape contract.
    ///
    /// Fails fast (before any timing) when `invoke_count` is zero, the
    /// unroll factor is zero, or `invoke_count` is not an exact multiple
    /// of `unroll_factor`.
    pub fn new(
        mode: IterationMode,
        index: u64,
        invoke_count: u64,
        unroll_factor: u64,
    ) -> Result<Self, EngineError> {
        if invoke_count == 0 {
            return Err(EngineError::ZeroInvokeCount);
        }
        if unroll_factor == 0 {
            return Err(EngineError::ZeroUnrollFactor);
        }
        if invoke_count % unroll_factor != 0 {
            return Err(EngineError::InvalidIterationShape {
                invoke_count,
                unroll_factor,
            });
        }
        Ok(Self {
            mode,
            index,
            invoke_count,
            unroll_factor,
        })
    }

    /// Mode tag of this request.
    pub fn mode(&self) -> IterationMode {
        self.mode
    }

    /// Sequence index within the engine run.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Total workload invocations in this sample.
    pub fn invoke_count(&self) -> u64 {
        self.invoke_count
    }

    /// Inline repetitions of the body per loop iteration.
    pub fn unroll_factor(&self) -> u64 {
        self.unroll_factor
    }
}

/// Immutable result of executing one [`IterationRequest`].
///
/// Produced exactly once per executed request; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Mode tag of the originating request.
    pub mode: IterationMode,
    /// Sequence index of the originating request.
    pub index: u64,
    /// Invocations executed.
    pub invoke_count: u64,
    /// Unroll factor used.
    pub unroll_factor: u64,
    /// Elapsed wall time for the whole sample, in nanoseconds.
    pub elapsed_ns: u64,
}

impl Measurement {
    /// Build a measurement from an executed request and its elapsed time.
    pub fn from_request(request: &IterationRequest, elapsed: std::time::Duration) -> Self {
        Self {
            mode: request.mode,
            index: request.index,
            invoke_count: request.invoke_count,
            unroll_factor: request.unroll_factor,
            elapsed_ns: elapsed.as_nanos() as u64,
        }
    }

    /// Derived per-operation time in nanoseconds.
    pub fn ns_per_op(&self) -> f64 {
        self.elapsed_ns as f64 / self.invoke_count as f64
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:>4}: {} op, {:.1} ns/op",
            self.mode,
            self.index,
            self.invoke_count,
            self.ns_per_op()
        )
    }
}
