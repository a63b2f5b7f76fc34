#![warn(missing_docs)]
//! # PulseBench
//!
//! Adaptive micro-benchmark measurement engine.
//!
//! PulseBench measures one workload at a time through four strictly
//! sequential phases:
//! - **Overhead**: estimates the fixed per-operation cost of the harness
//!   itself (median over repeated empty-body samples)
//! - **Pilot**: grows the per-sample invocation count geometrically until
//!   one sample comfortably exceeds the clock's resolution
//! - **Warmup**: runs until a trailing window of per-op times stabilizes
//! - **Actual**: collects overhead-corrected samples until the relative
//!   standard error meets the accuracy target
//!
//! Quality problems (pilot overflow, warmup that never settles, overhead
//! larger than the sample itself, unmet accuracy targets) surface as
//! diagnostics on the result; only contract violations abort a run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pulsebench::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let config = JobConfig::default();
//!     let executor = ClosureExecutor::new(resolve_clock(config.clock)?, || {
//!         expensive_operation()
//!     });
//!     let result = Engine::new(config, executor)?.run()?;
//!     println!("{:?}", result.summary());
//!     Ok(())
//! }
//! # fn expensive_operation() -> u64 { 42 }
//! ```
//!
//! ## Batches
//!
//! ```no_run
//! use pulsebench::prelude::*;
//!
//! let targets = vec![
//!     BenchmarkTarget::new("baseline", Box::new(SyntheticExecutor::fixed(100))),
//! ];
//! let outcomes = BatchRunner::new(JobConfig::default()).run(targets);
//! ```

// Re-export core types
pub use pulsebench_core::{
    Clock, ClockKind, ClosureExecutor, CycleClock, EngineError, HAS_CYCLE_COUNTER, IterationKind,
    IterationMode, IterationPhase, IterationRequest, Measurement, MonotonicClock,
    SyntheticExecutor, Timestamp, WorkloadExecutor, pin_to_cpu, resolve_clock,
};

// Re-export engine types
pub use pulsebench_engine::{
    AccuracyTarget, BatchRunner, BenchmarkTarget, CancellationToken, ConfigResolver, Diagnostic,
    Engine, EngineSettings, EngineStage, JobConfig, JobOverrides, MemorySink, NullSink,
    OverheadPolicy, PilotPolicy, ProgressSink, RunResult, RunStatus, StdoutSink, TargetOutcome,
    TracingSink, WarmupPolicy, init_tracing, parse_duration,
};

// Re-export stats
pub use pulsebench_stats::{
    SummaryStatistics, compute_percentile, compute_summary, median, relative_standard_error,
    trailing_window_cv,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BatchRunner, BenchmarkTarget, CancellationToken, ClockKind, ClosureExecutor, Diagnostic,
        Engine, EngineError, JobConfig, JobOverrides, Measurement, RunResult, RunStatus,
        SyntheticExecutor, WorkloadExecutor, resolve_clock,
    };
}
