//! Integration tests for PulseBench
//!
//! These tests verify the end-to-end behavior of the measurement engine
//! through the public facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pulsebench::{
    AccuracyTarget, BatchRunner, BenchmarkTarget, Clock, Diagnostic, Engine, EngineError,
    EngineSettings, IterationKind, IterationMode, IterationPhase, IterationRequest, JobConfig,
    JobOverrides, ProgressSink, RunStatus, SyntheticExecutor, Timestamp, WorkloadExecutor,
};

/// Clock with a fixed 100ns resolution so pilot sizing does not depend on
/// the host timer.
struct CoarseClock {
    epoch: std::time::Instant,
}

impl Clock for CoarseClock {
    fn resolution(&self) -> Duration {
        Duration::from_nanos(100)
    }
    fn timestamp(&self) -> Timestamp {
        Timestamp::from_offset(self.epoch.elapsed())
    }
}

fn coarse_clock() -> Arc<dyn Clock> {
    Arc::new(CoarseClock {
        epoch: std::time::Instant::now(),
    })
}

fn scenario_config() -> JobConfig {
    JobConfig {
        accuracy: AccuracyTarget {
            max_relative_error: 0.01,
            min_samples: 5,
            max_samples: 100,
            min_sample_time: Duration::from_nanos(50_000),
        },
        ..JobConfig::default()
    }
}

/// End-to-end scenario: a steady 1000ns workload measured against a
/// 100ns-resolution clock with a 50µs minimum sample time and a 1% target.
#[test]
fn test_steady_workload_end_to_end() {
    let executor = SyntheticExecutor::fixed(1000).with_overhead(5);
    let engine = Engine::from_parts(scenario_config(), coarse_clock(), executor).unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.status, RunStatus::Done);
    // Pilot must reach the 50µs minimum: at least 50 calls of 1000ns each.
    assert!(result.invoke_count >= 50);
    // Zero variance, so the run stops as soon as the floor allows.
    assert_eq!(result.measurements.len(), 5);
    assert!(result.relative_standard_error() <= 0.01);

    // Per-op time is the raw cost minus the measured harness overhead.
    let summary = result.summary();
    assert!((summary.mean - 995.0).abs() < 10.0, "mean {}", summary.mean);
    assert!((result.overhead_ns_per_op - 5.0).abs() < f64::EPSILON);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

/// Executor that counts invocations through a shared handle, so tests can
/// observe it after the engine takes ownership.
struct CountingExecutor {
    invocations: Arc<AtomicU64>,
}

impl WorkloadExecutor for CountingExecutor {
    fn execute(&mut self, request: &IterationRequest) -> Duration {
        self.invocations
            .fetch_add(request.invoke_count(), Ordering::Relaxed);
        Duration::from_nanos(request.invoke_count() * 100)
    }
}

/// A request whose invocation count is not a multiple of the unroll factor
/// must fail before any timed execution happens.
#[test]
fn test_shape_violation_executes_nothing() {
    let mode = IterationMode::new(IterationKind::Workload, IterationPhase::Actual);

    let err = IterationRequest::new(mode, 0, 10, 3).unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidIterationShape {
            invoke_count: 10,
            unroll_factor: 3
        }
    );
    assert_eq!(
        IterationRequest::new(mode, 0, 0, 1).unwrap_err(),
        EngineError::ZeroInvokeCount
    );

    // An engine configured with a zero unroll factor rejects the whole run
    // up front, with zero workload executions.
    let invocations = Arc::new(AtomicU64::new(0));
    let executor = CountingExecutor {
        invocations: invocations.clone(),
    };
    let mut config = scenario_config();
    config.unroll_factor = Some(0);
    assert_eq!(
        Engine::from_parts(config, coarse_clock(), executor).unwrap_err(),
        EngineError::ZeroUnrollFactor
    );
    assert_eq!(invocations.load(Ordering::Relaxed), 0);
}

/// Sink that requests cancellation as soon as the warmup phase shows up in
/// the progress stream.
struct CancelDuringWarmup {
    token: pulsebench::CancellationToken,
}

impl ProgressSink for CancelDuringWarmup {
    fn write_line(&self, line: &str) {
        if line.contains("WorkloadWarmup") {
            self.token.cancel();
        }
    }
}

/// Cancellation lands between samples: the run ends with `Cancelled`, every
/// retained measurement is complete, and no Actual-phase sample exists when
/// the request arrived during warmup.
#[test]
fn test_cancellation_between_samples() {
    let mut config = scenario_config();
    config.emit_progress = true;

    let engine =
        Engine::from_parts(config, coarse_clock(), SyntheticExecutor::fixed(1000)).unwrap();
    let token = engine.cancellation_token();
    let engine = engine.with_sink(Box::new(CancelDuringWarmup { token }));
    let result = engine.run().unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.measurements.is_empty());
    assert_eq!(result.corrected_ns_per_op.len(), result.measurements.len());
}

/// When the measured overhead exceeds the workload itself, corrected
/// per-op times floor at zero and the run reports it as a diagnostic.
#[test]
fn test_overhead_floor_is_diagnosed_not_fatal() {
    let executor = SyntheticExecutor::fixed(10).with_overhead(50);
    let engine = Engine::from_parts(scenario_config(), coarse_clock(), executor).unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.status, RunStatus::Done);
    assert!(result.corrected_ns_per_op.iter().all(|&c| c >= 0.0));
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::OverheadExceedsSample { .. }))
    );
}

/// Batch runs resolve per-target overrides and isolate failures.
#[test]
fn test_batch_with_overrides() {
    let strict = BenchmarkTarget::new("strict", Box::new(SyntheticExecutor::fixed(500)))
        .with_overrides(JobOverrides {
            min_samples: Some(12),
            min_sample_time: Some(Duration::from_nanos(10_000)),
            ..Default::default()
        });
    let broken = BenchmarkTarget::new("broken", Box::new(SyntheticExecutor::fixed(500)))
        .with_overrides(JobOverrides {
            unroll_factor: Some(0),
            ..Default::default()
        });

    let mut base = scenario_config();
    base.accuracy.min_sample_time = Duration::from_nanos(10_000);
    let outcomes = BatchRunner::new(base)
        .show_progress(false)
        .run(vec![strict, broken]);

    let strict_result = outcomes[0].outcome.as_ref().unwrap();
    assert_eq!(strict_result.status, RunStatus::Done);
    assert!(strict_result.measurements.len() >= 12);

    assert_eq!(
        outcomes[1].outcome.as_ref().unwrap_err(),
        &EngineError::ZeroUnrollFactor
    );
}

/// Settings loaded from TOML flow all the way into a run.
#[test]
fn test_settings_drive_a_run() {
    let settings: EngineSettings = toml::from_str(
        r#"
        [accuracy]
        max_relative_error = 0.05
        min_samples = 4
        max_samples = 50
        min_sample_time = "20us"

        [warmup]
        min_iterations = 2
        max_iterations = 5
        window = 2
        "#,
    )
    .unwrap();
    let config = settings.to_job_config().unwrap();
    assert_eq!(config.accuracy.min_sample_time, Duration::from_micros(20));

    let engine =
        Engine::from_parts(config, coarse_clock(), SyntheticExecutor::fixed(2000)).unwrap();
    let result = engine.run().unwrap();
    assert_eq!(result.status, RunStatus::Done);
    assert_eq!(result.measurements.len(), 4);
}
