//! Batch execution of benchmark targets.
//!
//! Targets run strictly sequentially, one fresh engine per target, nothing
//! shared between runs: no clock calibration, no overhead estimates, no
//! engine state. A contract violation stops only the affected target;
//! remaining targets still run.

use indicatif::{ProgressBar, ProgressStyle};
use pulsebench_core::{EngineError, WorkloadExecutor, pin_to_cpu};

use crate::config::{JobConfig, JobOverrides};
use crate::engine::{Engine, RunResult};
use crate::resolver::ConfigResolver;

/// One benchmark target: an identifier, per-target configuration
/// overrides, and the executor measuring it.
pub struct BenchmarkTarget {
    /// Target identifier (for reporting).
    pub id: String,
    /// Per-target overrides layered over the runner's base job.
    pub overrides: JobOverrides,
    /// Workload executor for this target.
    pub executor: Box<dyn WorkloadExecutor>,
}

impl BenchmarkTarget {
    /// Target with no overrides.
    pub fn new(id: impl Into<String>, executor: Box<dyn WorkloadExecutor>) -> Self {
        Self {
            id: id.into(),
            overrides: JobOverrides::default(),
            executor,
        }
    }

    /// Attach per-target configuration overrides.
    pub fn with_overrides(mut self, overrides: JobOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Result of measuring one target in a batch.
#[derive(Debug)]
pub struct TargetOutcome {
    /// Target identifier.
    pub id: String,
    /// The run result, or the contract violation that stopped this target.
    pub outcome: Result<RunResult, EngineError>,
}

/// Runs a batch of targets sequentially.
pub struct BatchRunner {
    base: JobConfig,
    pin_cpu: Option<usize>,
    show_progress: bool,
}

impl BatchRunner {
    /// Runner with the given base job configuration.
    pub fn new(base: JobConfig) -> Self {
        Self {
            base,
            pin_cpu: None,
            show_progress: true,
        }
    }

    /// Pin the measuring thread to a CPU before running (stabilizes cycle
    /// counters).
    pub fn pin_cpu(mut self, cpu: usize) -> Self {
        self.pin_cpu = Some(cpu);
        self
    }

    /// Show or hide the progress bar.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Measure every target, strictly sequentially.
    pub fn run(&self, targets: Vec<BenchmarkTarget>) -> Vec<TargetOutcome> {
        if let Some(cpu) = self.pin_cpu {
            if let Err(e) = pin_to_cpu(cpu) {
                tracing::warn!(cpu, error = %e, "failed to pin measuring thread");
            }
        }

        let pb = if self.show_progress {
            ProgressBar::new(targets.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            pb.set_message(target.id.clone());
            let resolver = ConfigResolver::new(self.base.clone()).with_layer(target.overrides);
            let config = resolver.effective();

            // Fresh engine per target; a contract violation here affects
            // this target only.
            let outcome = Engine::new(config, target.executor).and_then(Engine::run);
            if let Err(ref e) = outcome {
                tracing::warn!(target = %target.id, error = %e, "target failed");
            }
            outcomes.push(TargetOutcome {
                id: target.id,
                outcome,
            });
            pb.inc(1);
        }

        pb.finish_with_message("Complete");
        outcomes
    }
}

/// Initialize tracing output for benchmark binaries.
///
/// Respects `RUST_LOG`; safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
