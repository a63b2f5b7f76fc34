//! Stage facade over a running engine.
//!
//! `EngineStage` is the entry point stage drivers use to request single
//! timed iterations. It is stateless: configuration projections go through
//! the resolver on every call (so overrides are honored per run), the
//! shape precondition is checked before any timing, and no measurement is
//! ever retained here.

use std::sync::Arc;

use pulsebench_core::{
    Clock, EngineError, IterationMode, IterationRequest, Measurement, WorkloadExecutor,
};

use crate::config::{AccuracyTarget, JobConfig};
use crate::engine::Engine;
use crate::resolver::ConfigResolver;

/// Thin facade exposing job-derived configuration and the guarded
/// iteration entry point of exactly one engine.
pub struct EngineStage<'a, E: WorkloadExecutor> {
    engine: &'a mut Engine<E>,
    resolver: &'a ConfigResolver,
}

impl<'a, E: WorkloadExecutor> EngineStage<'a, E> {
    /// Wrap an engine and its configuration resolver.
    pub fn new(engine: &'a mut Engine<E>, resolver: &'a ConfigResolver) -> Self {
        Self { engine, resolver }
    }

    /// Effective job configuration, resolved through the override layers.
    /// Never cached; every call sees current overrides.
    pub fn target_job(&self) -> JobConfig {
        self.resolver.effective()
    }

    /// Accuracy target of the effective job.
    pub fn accuracy(&self) -> AccuracyTarget {
        self.target_job().accuracy
    }

    /// The clock resolved for this engine's run.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.engine.clock()
    }

    /// Request one timed iteration.
    ///
    /// Precondition: `invoke_count` must be a positive multiple of
    /// `unroll_factor`. A violation fails before any timed execution and
    /// is never retried; on success the engine's measurement is returned
    /// unchanged.
    pub fn run_iteration(
        &mut self,
        mode: IterationMode,
        index: u64,
        invoke_count: u64,
        unroll_factor: u64,
    ) -> Result<Measurement, EngineError> {
        let request = IterationRequest::new(mode, index, invoke_count, unroll_factor)?;
        Ok(self.engine.run_iteration(&request))
    }

    /// Emit a progress/diagnostic line. Observational only.
    pub fn write_line(&self, line: &str) {
        self.engine.write_line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobOverrides;
    use crate::sink::MemorySink;
    use pulsebench_core::{IterationKind, IterationPhase, SyntheticExecutor};

    fn mode() -> IterationMode {
        IterationMode::new(IterationKind::Workload, IterationPhase::Actual)
    }

    fn engine() -> Engine<SyntheticExecutor> {
        Engine::new(JobConfig::default(), SyntheticExecutor::fixed(100)).unwrap()
    }

    #[test]
    fn valid_request_returns_matching_measurement() {
        let mut engine = engine();
        let resolver = ConfigResolver::new(JobConfig::default());
        let mut stage = EngineStage::new(&mut engine, &resolver);

        let m = stage.run_iteration(mode(), 7, 64, 16).unwrap();
        assert_eq!(m.index, 7);
        assert_eq!(m.invoke_count, 64);
        assert_eq!(m.unroll_factor, 16);
        assert_eq!(m.mode, mode());
    }

    /// Executor whose invocation counter outlives the engine that owns it.
    struct CountingExecutor {
        invocations: std::sync::Arc<std::sync::atomic::AtomicU64>,
    }

    impl WorkloadExecutor for CountingExecutor {
        fn execute(&mut self, request: &IterationRequest) -> std::time::Duration {
            self.invocations
                .fetch_add(request.invoke_count(), std::sync::atomic::Ordering::Relaxed);
            std::time::Duration::from_nanos(request.invoke_count() * 10)
        }
    }

    #[test]
    fn shape_violation_performs_no_timed_execution() {
        let invocations = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let mut engine = Engine::new(
            JobConfig::default(),
            CountingExecutor {
                invocations: invocations.clone(),
            },
        )
        .unwrap();
        let resolver = ConfigResolver::new(JobConfig::default());
        let mut stage = EngineStage::new(&mut engine, &resolver);

        let err = stage.run_iteration(mode(), 0, 10, 3).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidIterationShape {
                invoke_count: 10,
                unroll_factor: 3
            }
        );
        assert!(stage.run_iteration(mode(), 0, 0, 1).is_err());
        assert_eq!(
            invocations.load(std::sync::atomic::Ordering::Relaxed),
            0,
            "rejected requests must not execute anything"
        );

        let m = stage.run_iteration(mode(), 1, 4, 1).unwrap();
        assert_eq!(m.invoke_count, 4);
        assert_eq!(invocations.load(std::sync::atomic::Ordering::Relaxed), 4);
    }

    #[test]
    fn projections_resolve_through_layers_per_call() {
        let mut engine = engine();
        let mut resolver = ConfigResolver::new(JobConfig::default());
        resolver.push_layer(JobOverrides {
            min_samples: Some(3),
            ..Default::default()
        });
        let stage = EngineStage::new(&mut engine, &resolver);
        assert_eq!(stage.accuracy().min_samples, 3);
        assert_eq!(stage.target_job().accuracy.min_samples, 3);
    }

    #[test]
    fn write_line_reaches_sink() {
        let sink = MemorySink::new();
        let mut engine = Engine::new(JobConfig::default(), SyntheticExecutor::fixed(100))
            .unwrap()
            .with_sink(Box::new(sink.clone()));
        let resolver = ConfigResolver::new(JobConfig::default());
        let stage = EngineStage::new(&mut engine, &resolver);

        stage.write_line("pilot settled at 128 invocations");
        assert_eq!(sink.lines(), vec!["pilot settled at 128 invocations"]);
    }
}
