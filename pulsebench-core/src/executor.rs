//! Workload execution contract.
//!
//! The engine never knows how a workload is implemented; it hands an
//! executor an [`IterationRequest`] and gets wall-clock elapsed time back.
//! For [`IterationKind::Overhead`] requests the executor runs its harness
//! loop with no workload body, so the engine can price the harness itself.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::iteration::{IterationKind, IterationRequest};

/// Executes a workload `invoke_count` times, replicated `unroll_factor`-wide
/// per loop iteration, and reports elapsed wall time for the whole call.
///
/// Must have no observable side effect on engine state other than the
/// returned duration.
pub trait WorkloadExecutor {
    /// Execute one timed sample.
    fn execute(&mut self, request: &IterationRequest) -> Duration;
}

impl<T: WorkloadExecutor + ?Sized> WorkloadExecutor for Box<T> {
    fn execute(&mut self, request: &IterationRequest) -> Duration {
        (**self).execute(request)
    }
}

// ─── ClosureExecutor ─────────────────────────────────────────────────────────

/// Production executor wrapping a `FnMut` workload body.
///
/// Times through the clock the engine resolved for the run, so every phase
/// sees the same resolution. The body result is routed through
/// `black_box` to keep the optimizer from deleting the workload.
pub struct ClosureExecutor<F> {
    body: F,
    clock: Arc<dyn Clock>,
}

impl<F, R> ClosureExecutor<F>
where
    F: FnMut() -> R,
{
    /// Wrap a workload body with the run's resolved clock.
    pub fn new(clock: Arc<dyn Clock>, body: F) -> Self {
        Self { body, clock }
    }
}

impl<F, R> WorkloadExecutor for ClosureExecutor<F>
where
    F: FnMut() -> R,
{
    fn execute(&mut self, request: &IterationRequest) -> Duration {
        let outer = request.invoke_count() / request.unroll_factor();
        let unroll = request.unroll_factor();

        match request.mode().kind {
            IterationKind::Workload => {
                let start = self.clock.timestamp();
                for _ in 0..outer {
                    for _ in 0..unroll {
                        std::hint::black_box((self.body)());
                    }
                }
                let end = self.clock.timestamp();
                self.clock.elapsed(start, end)
            }
            IterationKind::Overhead => {
                // Same loop structure, empty body: loop control plus
                // timer reads only.
                let start = self.clock.timestamp();
                for _ in 0..outer {
                    for _ in 0..unroll {
                        std::hint::black_box(());
                    }
                }
                let end = self.clock.timestamp();
                self.clock.elapsed(start, end)
            }
        }
    }
}

// ─── SyntheticExecutor ───────────────────────────────────────────────────────

/// Deterministic executor for tests and engine calibration experiments.
///
/// Simulates a workload with a known per-call cost without touching a real
/// clock, and counts every invocation so tests can assert that contract
/// violations perform no timed execution.
pub struct SyntheticExecutor {
    cost_ns: u64,
    overhead_cost_ns: u64,
    /// Per-sample extra cost schedule (ns per call), consumed front to back.
    /// Lets tests script a noisy-then-stable warmup curve.
    schedule: Vec<u64>,
    next_scheduled: usize,
    workload_invocations: u64,
    overhead_invocations: u64,
}

impl SyntheticExecutor {
    /// Executor with a fixed, zero-variance per-call cost.
    pub fn fixed(cost_ns: u64) -> Self {
        Self {
            cost_ns,
            overhead_cost_ns: 0,
            schedule: Vec::new(),
            next_scheduled: 0,
            workload_invocations: 0,
            overhead_invocations: 0,
        }
    }

    /// Simulated per-call cost of the harness loop for overhead samples.
    pub fn with_overhead(mut self, overhead_cost_ns: u64) -> Self {
        self.overhead_cost_ns = overhead_cost_ns;
        self
    }

    /// Extra per-call cost added to successive workload samples.
    ///
    /// The first workload sample gets `schedule[0]` extra ns per call, the
    /// second `schedule[1]`, and so on; once exhausted the cost settles at
    /// the fixed value.
    pub fn with_schedule(mut self, schedule: Vec<u64>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Total workload invocations executed so far.
    pub fn workload_invocations(&self) -> u64 {
        self.workload_invocations
    }

    /// Total overhead-loop invocations executed so far.
    pub fn overhead_invocations(&self) -> u64 {
        self.overhead_invocations
    }
}

impl WorkloadExecutor for SyntheticExecutor {
    fn execute(&mut self, request: &IterationRequest) -> Duration {
        match request.mode().kind {
            IterationKind::Workload => {
                self.workload_invocations += request.invoke_count();
                let extra = self
                    .schedule
                    .get(self.next_scheduled)
                    .copied()
                    .unwrap_or(0);
                self.next_scheduled += 1;
                Duration::from_nanos((self.cost_ns + extra) * request.invoke_count())
            }
            IterationKind::Overhead => {
                self.overhead_invocations += request.invoke_count();
                Duration::from_nanos(self.overhead_cost_ns * request.invoke_count())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::iteration::{IterationMode, IterationPhase};

    fn workload_request(invoke: u64, unroll: u64) -> IterationRequest {
        IterationRequest::new(
            IterationMode::new(IterationKind::Workload, IterationPhase::Actual),
            0,
            invoke,
            unroll,
        )
        .unwrap()
    }

    fn overhead_request(invoke: u64) -> IterationRequest {
        IterationRequest::new(
            IterationMode::new(IterationKind::Overhead, IterationPhase::Actual),
            0,
            invoke,
            1,
        )
        .unwrap()
    }

    #[test]
    fn synthetic_cost_scales_with_invoke_count() {
        let mut exec = SyntheticExecutor::fixed(1000);
        let elapsed = exec.execute(&workload_request(50, 1));
        assert_eq!(elapsed, Duration::from_nanos(50_000));
        assert_eq!(exec.workload_invocations(), 50);
        assert_eq!(exec.overhead_invocations(), 0);
    }

    #[test]
    fn synthetic_overhead_mode_runs_no_workload() {
        let mut exec = SyntheticExecutor::fixed(1000).with_overhead(10);
        let elapsed = exec.execute(&overhead_request(100));
        assert_eq!(elapsed, Duration::from_nanos(1000));
        assert_eq!(exec.workload_invocations(), 0);
        assert_eq!(exec.overhead_invocations(), 100);
    }

    #[test]
    fn synthetic_schedule_decays_to_fixed_cost() {
        let mut exec = SyntheticExecutor::fixed(100).with_schedule(vec![900, 400]);
        assert_eq!(
            exec.execute(&workload_request(1, 1)),
            Duration::from_nanos(1000)
        );
        assert_eq!(
            exec.execute(&workload_request(1, 1)),
            Duration::from_nanos(500)
        );
        assert_eq!(
            exec.execute(&workload_request(1, 1)),
            Duration::from_nanos(100)
        );
    }

    #[test]
    fn closure_executor_runs_body_invoke_count_times() {
        let clock = Arc::new(MonotonicClock::new());
        let mut calls = 0u64;
        {
            let mut exec = ClosureExecutor::new(clock, || calls += 1);
            let elapsed = exec.execute(&workload_request(64, 8));
            assert!(elapsed >= Duration::ZERO);
        }
        assert_eq!(calls, 64);
    }

    #[test]
    fn closure_executor_overhead_skips_body() {
        let clock = Arc::new(MonotonicClock::new());
        let mut calls = 0u64;
        {
            let mut exec = ClosureExecutor::new(clock, || calls += 1);
            exec.execute(&overhead_request(64));
        }
        assert_eq!(calls, 0);
    }
}
