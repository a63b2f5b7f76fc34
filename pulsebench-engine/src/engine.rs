//! The measurement engine.
//!
//! One `Engine` measures one benchmark target, driving its phases strictly
//! sequentially: Overhead → Pilot → Warmup → Actual. All state lives in a
//! private `EngineState` owned exclusively by the engine; the engine is
//! consumed by [`Engine::run`] and a fresh one is built per target, so
//! nothing (clock calibration, overhead estimates) leaks across runs.
//!
//! Each timed sample is a blocking, uninterruptible unit. Cancellation is
//! honored only at sample boundaries: the token is checked before every
//! sample and never mid-sample, so a cancelled run contains only complete
//! measurements.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pulsebench_core::{
    Clock, EngineError, IterationKind, IterationMode, IterationPhase, IterationRequest,
    Measurement, WorkloadExecutor, resolve_clock,
};
use pulsebench_stats::{SummaryStatistics, compute_summary, median, relative_standard_error,
    trailing_window_cv};
use serde::Serialize;

use crate::config::JobConfig;
use crate::diagnostics::{Diagnostic, RunStatus};
use crate::sink::{NullSink, ProgressSink};

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Cooperative cancellation flag, checked between samples only.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The engine tears down the current phase
    /// cleanly before the next sample would start.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ─── Engine state and result ─────────────────────────────────────────────────

/// Mutable state of one engine run. Created at run start, owned
/// exclusively by its engine, discarded when the run ends.
#[derive(Debug, Default)]
struct EngineState {
    next_index: u64,
    overhead_ns_per_op: f64,
    invoke_count: u64,
    unroll_factor: u64,
    warmup: Vec<Measurement>,
    actual: Vec<Measurement>,
    corrected_ns_per_op: Vec<f64>,
    diagnostics: Vec<Diagnostic>,
    floored_samples: u64,
    first_floored_index: u64,
}

/// Final output of one engine run: the Actual-phase measurement sequence
/// plus resolved metadata and quality diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Actual-phase measurements, raw (overhead not subtracted).
    pub measurements: Vec<Measurement>,
    /// Overhead-corrected per-operation times, parallel to `measurements`.
    /// Floored at zero; never negative.
    pub corrected_ns_per_op: Vec<f64>,
    /// Overhead estimate that was subtracted, in ns per operation.
    pub overhead_ns_per_op: f64,
    /// Invocation count the pilot settled on.
    pub invoke_count: u64,
    /// Unroll factor used for the whole run.
    pub unroll_factor: u64,
    /// How the run ended.
    pub status: RunStatus,
    /// Quality diagnostics raised during Pilot/Warmup/Actual.
    pub diagnostics: Vec<Diagnostic>,
}

impl RunResult {
    /// Summary statistics over the corrected per-operation times.
    pub fn summary(&self) -> SummaryStatistics {
        compute_summary(&self.corrected_ns_per_op)
    }

    /// Relative standard error the run achieved.
    pub fn relative_standard_error(&self) -> f64 {
        relative_standard_error(&self.corrected_ns_per_op)
    }
}

/// Phase outcome: keep going, or tear down because cancellation was
/// requested at a sample boundary.
enum Flow {
    Continue,
    Cancelled,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Measures one benchmark target. Fresh instance per target; consumed by
/// [`Engine::run`].
pub struct Engine<E: WorkloadExecutor> {
    config: JobConfig,
    clock: Arc<dyn Clock>,
    executor: E,
    sink: Box<dyn ProgressSink>,
    token: CancellationToken,
    state: EngineState,
}

impl<E: WorkloadExecutor> std::fmt::Debug for Engine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("token", &self.token)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<E: WorkloadExecutor> Engine<E> {
    /// Build an engine, resolving the configured clock once for the whole
    /// run. Fails fast on inconsistent configuration or an unsupported
    /// clock, before any timing happens.
    pub fn new(config: JobConfig, executor: E) -> Result<Self, EngineError> {
        let clock = resolve_clock(config.clock)?;
        Self::from_parts(config, clock, executor)
    }

    /// Build an engine around an already-resolved clock (tests inject a
    /// fixed-resolution clock this way).
    pub fn from_parts(
        config: JobConfig,
        clock: Arc<dyn Clock>,
        executor: E,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            executor,
            sink: Box::new(NullSink),
            token: CancellationToken::new(),
            state: EngineState::default(),
        })
    }

    /// Replace the progress sink.
    pub fn with_sink(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle for requesting cancellation from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The clock resolved for this run.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// The job configuration this engine runs under.
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Emit a line through the progress sink.
    pub fn write_line(&self, line: &str) {
        self.sink.write_line(line);
    }

    /// Execute one validated iteration request and return its measurement.
    ///
    /// This is the single timed entry point; every phase (and
    /// [`crate::stage::EngineStage`]) funnels through it.
    pub fn run_iteration(&mut self, request: &IterationRequest) -> Measurement {
        let elapsed = self.executor.execute(request);
        let measurement = Measurement::from_request(request, elapsed);
        tracing::trace!(
            mode = %measurement.mode,
            index = measurement.index,
            invoke_count = measurement.invoke_count,
            ns_per_op = measurement.ns_per_op(),
            "sample",
        );
        if self.config.emit_progress {
            self.sink.write_line(&measurement.to_string());
        }
        measurement
    }

    /// Drive all phases and produce the final result.
    ///
    /// Contract violations abort immediately; quality problems surface as
    /// diagnostics on the result instead.
    pub fn run(mut self) -> Result<RunResult, EngineError> {
        self.state.unroll_factor = self.config.unroll_factor.unwrap_or(1);

        if let Flow::Cancelled = self.drive_phases()? {
            return Ok(self.finish(RunStatus::Cancelled));
        }
        Ok(self.finish(RunStatus::Done))
    }

    /// Runs the phases in order, stopping early on cancellation.
    fn drive_phases(&mut self) -> Result<Flow, EngineError> {
        if let Flow::Cancelled = self.overhead_phase()? {
            return Ok(Flow::Cancelled);
        }
        if let Flow::Cancelled = self.pilot_phase()? {
            return Ok(Flow::Cancelled);
        }
        if let Flow::Cancelled = self.warmup_phase()? {
            return Ok(Flow::Cancelled);
        }
        self.actual_phase()
    }

    /// Minimum wall time per sample: the configured floor, or the clock
    /// resolution scaled so quantization error cannot dominate.
    fn effective_min_sample_time(&self) -> Duration {
        let resolution_floor = self.clock.resolution() * self.config.pilot.resolution_multiplier;
        self.config.accuracy.min_sample_time.max(resolution_floor)
    }

    fn next_request(
        &mut self,
        kind: IterationKind,
        phase: IterationPhase,
        invoke_count: u64,
        unroll_factor: u64,
    ) -> Result<IterationRequest, EngineError> {
        // Same shape validation as the stage entry point, at every phase.
        let request = IterationRequest::new(
            IterationMode::new(kind, phase),
            self.state.next_index,
            invoke_count,
            unroll_factor,
        )?;
        self.state.next_index += 1;
        Ok(request)
    }

    /// Estimate the fixed per-operation cost of the harness itself.
    /// Median over the samples rejects single spikes from preemption.
    fn overhead_phase(&mut self) -> Result<Flow, EngineError> {
        if !self.config.overhead.enabled {
            self.state.overhead_ns_per_op = 0.0;
            return Ok(Flow::Continue);
        }

        let unroll = self.state.unroll_factor;
        let invoke = round_up(self.config.overhead.invoke_count.max(1), unroll);

        for _ in 0..self.config.overhead.warmup_count {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let request =
                self.next_request(IterationKind::Overhead, IterationPhase::Warmup, invoke, unroll)?;
            self.run_iteration(&request);
        }

        let mut per_op = Vec::with_capacity(self.config.overhead.sample_count as usize);
        for _ in 0..self.config.overhead.sample_count {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let request =
                self.next_request(IterationKind::Overhead, IterationPhase::Actual, invoke, unroll)?;
            let measurement = self.run_iteration(&request);
            per_op.push(measurement.ns_per_op());
        }

        self.state.overhead_ns_per_op = median(&per_op);
        tracing::debug!(
            overhead_ns_per_op = self.state.overhead_ns_per_op,
            "overhead phase complete",
        );
        Ok(Flow::Continue)
    }

    /// Grow the invocation count geometrically until one sample meets the
    /// minimum sample time, capping growth as a safety valve.
    fn pilot_phase(&mut self) -> Result<Flow, EngineError> {
        let unroll = self.state.unroll_factor;
        let min_time = self.effective_min_sample_time();
        // Cap rounded down to a shape-valid multiple, but never below one
        // unroll-width.
        let cap = (self.config.pilot.max_invoke_count / unroll).max(1) * unroll;
        let mut invoke = round_up(self.config.pilot.initial_invoke_count.max(1), unroll).min(cap);

        loop {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let request =
                self.next_request(IterationKind::Workload, IterationPhase::Pilot, invoke, unroll)?;
            let measurement = self.run_iteration(&request);

            if Duration::from_nanos(measurement.elapsed_ns) >= min_time {
                break;
            }
            if invoke >= cap {
                self.state.diagnostics.push(Diagnostic::PilotOverflow {
                    capped_invoke_count: invoke,
                });
                break;
            }
            invoke = invoke
                .saturating_mul(self.config.pilot.growth_factor)
                .min(cap);
        }

        self.state.invoke_count = invoke;
        tracing::debug!(invoke_count = invoke, unroll_factor = unroll, "pilot phase complete");
        Ok(Flow::Continue)
    }

    /// Run workload samples until the trailing window stabilizes or the
    /// ceiling is hit. Warmup measurements never reach the final result.
    fn warmup_phase(&mut self) -> Result<Flow, EngineError> {
        let policy = self.config.warmup.clone();
        if policy.max_iterations == 0 {
            return Ok(Flow::Continue);
        }

        let invoke = self.state.invoke_count;
        let unroll = self.state.unroll_factor;
        let mut per_op = Vec::new();
        let mut stabilized = false;
        let mut last_cv = None;

        while (per_op.len() as u64) < policy.max_iterations {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            let request =
                self.next_request(IterationKind::Workload, IterationPhase::Warmup, invoke, unroll)?;
            let measurement = self.run_iteration(&request);
            self.state.warmup.push(measurement);
            per_op.push(measurement.ns_per_op());

            if per_op.len() as u64 >= policy.min_iterations {
                if let Some(cv) = trailing_window_cv(&per_op, policy.window) {
                    last_cv = Some(cv);
                    if cv <= policy.cv_threshold {
                        stabilized = true;
                        break;
                    }
                }
            }
        }

        if !stabilized {
            self.state.diagnostics.push(Diagnostic::WarmupDidNotStabilize {
                iterations: per_op.len() as u64,
                last_cv,
            });
        }
        tracing::debug!(iterations = per_op.len(), stabilized, "warmup phase complete");
        Ok(Flow::Continue)
    }

    /// Collect overhead-corrected samples until the relative standard
    /// error meets the accuracy target, bounded by the sample ceiling.
    fn actual_phase(&mut self) -> Result<Flow, EngineError> {
        let accuracy = self.config.accuracy.clone();
        let overhead = self.state.overhead_ns_per_op;
        let invoke = self.state.invoke_count;
        let unroll = self.state.unroll_factor;

        loop {
            if self.token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            if self.state.corrected_ns_per_op.len() as u64 >= accuracy.max_samples {
                let achieved = relative_standard_error(&self.state.corrected_ns_per_op);
                self.state.diagnostics.push(Diagnostic::TargetAccuracyNotMet {
                    achieved_relative_error: achieved,
                });
                break;
            }

            let request =
                self.next_request(IterationKind::Workload, IterationPhase::Actual, invoke, unroll)?;
            let measurement = self.run_iteration(&request);

            let corrected = measurement.ns_per_op() - overhead;
            let corrected = if corrected < 0.0 {
                if self.state.floored_samples == 0 {
                    self.state.first_floored_index = measurement.index;
                }
                self.state.floored_samples += 1;
                0.0
            } else {
                corrected
            };

            self.state.actual.push(measurement);
            self.state.corrected_ns_per_op.push(corrected);

            if self.state.corrected_ns_per_op.len() as u64 >= accuracy.min_samples {
                let achieved = relative_standard_error(&self.state.corrected_ns_per_op);
                if achieved <= accuracy.max_relative_error {
                    break;
                }
            }
        }

        tracing::debug!(
            samples = self.state.actual.len(),
            "actual phase complete",
        );
        Ok(Flow::Continue)
    }

    fn finish(mut self, status: RunStatus) -> RunResult {
        if self.state.floored_samples > 0 {
            self.state.diagnostics.push(Diagnostic::OverheadExceedsSample {
                first_index: self.state.first_floored_index,
                samples_floored: self.state.floored_samples,
            });
        }

        let result = RunResult {
            measurements: self.state.actual,
            corrected_ns_per_op: self.state.corrected_ns_per_op,
            overhead_ns_per_op: self.state.overhead_ns_per_op,
            invoke_count: self.state.invoke_count,
            unroll_factor: self.state.unroll_factor,
            status,
            diagnostics: self.state.diagnostics,
        };

        if self.config.emit_progress {
            let summary = result.summary();
            self.sink.write_line(&format!(
                "{:?}: {} samples, mean {:.1} ns/op (overhead {:.1} ns/op)",
                result.status,
                summary.sample_count,
                summary.mean,
                result.overhead_ns_per_op,
            ));
        }
        result
    }
}

fn round_up(value: u64, multiple: u64) -> u64 {
    value.div_ceil(multiple) * multiple
}
