//! Adaptive measurement engine for PulseBench.
//!
//! Drives a benchmark target through four phases — Overhead, Pilot,
//! Warmup, Actual — and produces a [`RunResult`] of overhead-corrected
//! per-operation times plus quality diagnostics. Configuration comes from
//! [`JobConfig`] (optionally layered through [`ConfigResolver`] or loaded
//! from `pulse.toml`); batches of targets run through [`BatchRunner`].

#![warn(missing_docs)]

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod resolver;
pub mod runner;
pub mod sink;
pub mod stage;

pub use config::{
    AccuracyTarget, EngineSettings, JobConfig, JobOverrides, OverheadPolicy, PilotPolicy,
    WarmupPolicy, parse_duration,
};
pub use diagnostics::{Diagnostic, RunStatus};
pub use engine::{CancellationToken, Engine, RunResult};
pub use resolver::ConfigResolver;
pub use runner::{BatchRunner, BenchmarkTarget, TargetOutcome, init_tracing};
pub use sink::{MemorySink, NullSink, ProgressSink, StdoutSink, TracingSink};
pub use stage::EngineStage;
