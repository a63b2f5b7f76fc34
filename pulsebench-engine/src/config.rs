//! Job configuration
//!
//! A job's measurement policy is described by [`JobConfig`]; the engine
//! treats it as read-only. All convergence tunables (pilot growth, warmup
//! stabilization thresholds, sample ceilings) live here rather than as
//! hardcoded constants — only the shape of the algorithm is fixed.
//!
//! Settings can also be loaded from a `pulse.toml` file discovered by
//! walking up from the current directory.

use std::path::Path;
use std::time::Duration;

use pulsebench_core::{ClockKind, EngineError};
use serde::{Deserialize, Serialize};

// ─── In-memory job configuration ─────────────────────────────────────────────

/// Statistical precision target for the Actual phase. Read-only to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyTarget {
    /// Maximum relative standard error allowed (0.02 = 2%).
    pub max_relative_error: f64,
    /// Minimum number of Actual-phase samples before stopping is allowed.
    pub min_samples: u64,
    /// Hard ceiling on Actual-phase samples. Always honored, even when the
    /// accuracy target was not met.
    pub max_samples: u64,
    /// Minimum wall time per sample, so clock-resolution error cannot
    /// dominate very fast workloads.
    pub min_sample_time: Duration,
}

impl Default for AccuracyTarget {
    fn default() -> Self {
        Self {
            max_relative_error: 0.02,
            min_samples: 10,
            max_samples: 100,
            min_sample_time: Duration::from_millis(100),
        }
    }
}

/// Invocation-count sizing policy for the Pilot phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PilotPolicy {
    /// Invocation count the pilot starts from.
    pub initial_invoke_count: u64,
    /// Geometric growth factor applied while samples are too short (>= 2).
    pub growth_factor: u64,
    /// Cap on invocation-count growth. Hitting it yields a `PilotOverflow`
    /// diagnostic and the engine proceeds with the capped value.
    pub max_invoke_count: u64,
    /// The effective minimum sample time is at least
    /// `clock.resolution() * resolution_multiplier`.
    pub resolution_multiplier: u32,
}

impl Default for PilotPolicy {
    fn default() -> Self {
        Self {
            initial_invoke_count: 1,
            growth_factor: 2,
            max_invoke_count: 1 << 30,
            resolution_multiplier: 256,
        }
    }
}

/// Warmup stabilization policy.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupPolicy {
    /// Iterations that must run before stabilization can be declared.
    pub min_iterations: u64,
    /// Ceiling after which warmup ends with a `WarmupDidNotStabilize`
    /// diagnostic. Zero disables warmup entirely.
    pub max_iterations: u64,
    /// Trailing-window length for the variability check.
    pub window: usize,
    /// Coefficient-of-variation threshold (fraction, 0.05 = 5%) under
    /// which the trailing window counts as stable.
    pub cv_threshold: f64,
}

impl Default for WarmupPolicy {
    fn default() -> Self {
        Self {
            min_iterations: 6,
            max_iterations: 50,
            window: 5,
            cv_threshold: 0.05,
        }
    }
}

/// Overhead estimation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct OverheadPolicy {
    /// When false the Overhead phase is skipped and the estimate is zero.
    /// Used for pure-overhead baseline jobs with no workload body.
    pub enabled: bool,
    /// Overhead-mode samples discarded before estimation.
    pub warmup_count: u64,
    /// Overhead-mode samples the estimate (median per-op time) is taken from.
    pub sample_count: u64,
    /// Invocations per overhead sample (rounded up to the unroll factor).
    pub invoke_count: u64,
}

impl Default for OverheadPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            warmup_count: 2,
            sample_count: 8,
            invoke_count: 16_384,
        }
    }
}

/// Complete measurement policy for one benchmark target.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobConfig {
    /// Convergence target for the Actual phase.
    pub accuracy: AccuracyTarget,
    /// Pilot sizing policy.
    pub pilot: PilotPolicy,
    /// Warmup stabilization policy.
    pub warmup: WarmupPolicy,
    /// Overhead estimation policy.
    pub overhead: OverheadPolicy,
    /// Which clock to resolve for the run.
    pub clock: ClockKind,
    /// Fixed unroll factor; `None` means 1.
    pub unroll_factor: Option<u64>,
    /// Emit per-sample progress lines through the sink.
    pub emit_progress: bool,
}

impl JobConfig {
    /// Check internal consistency. Violations are contract errors.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.unroll_factor == Some(0) {
            return Err(EngineError::ZeroUnrollFactor);
        }
        if self.pilot.growth_factor < 2 {
            return Err(EngineError::InvalidConfig(
                "pilot growth factor must be at least 2".into(),
            ));
        }
        if self.pilot.max_invoke_count == 0 {
            return Err(EngineError::InvalidConfig(
                "pilot max invoke count must be at least 1".into(),
            ));
        }
        if self.accuracy.max_samples == 0 {
            return Err(EngineError::InvalidConfig(
                "max samples must be at least 1".into(),
            ));
        }
        if self.accuracy.min_samples > self.accuracy.max_samples {
            return Err(EngineError::InvalidConfig(format!(
                "min samples ({}) exceeds max samples ({})",
                self.accuracy.min_samples, self.accuracy.max_samples
            )));
        }
        if self.accuracy.max_relative_error <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "max relative error must be positive".into(),
            ));
        }
        if self.warmup.max_iterations > 0 && self.warmup.window == 0 {
            return Err(EngineError::InvalidConfig(
                "warmup window must be at least 1".into(),
            ));
        }
        if self.overhead.enabled && self.overhead.sample_count == 0 {
            return Err(EngineError::InvalidConfig(
                "overhead sample count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// All-`Option` mirror of the override-able parts of [`JobConfig`], used
/// as one layer in the configuration resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOverrides {
    /// Override for [`AccuracyTarget::max_relative_error`].
    pub max_relative_error: Option<f64>,
    /// Override for [`AccuracyTarget::min_samples`].
    pub min_samples: Option<u64>,
    /// Override for [`AccuracyTarget::max_samples`].
    pub max_samples: Option<u64>,
    /// Override for [`AccuracyTarget::min_sample_time`].
    pub min_sample_time: Option<Duration>,
    /// Override for [`JobConfig::clock`].
    pub clock: Option<ClockKind>,
    /// Override for [`JobConfig::unroll_factor`].
    pub unroll_factor: Option<u64>,
    /// Override for [`OverheadPolicy::enabled`].
    pub measure_overhead: Option<bool>,
    /// Override for [`WarmupPolicy::max_iterations`].
    pub max_warmup_iterations: Option<u64>,
}

// ─── TOML settings surface ───────────────────────────────────────────────────

/// On-disk engine settings (`pulse.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineSettings {
    /// Accuracy section.
    #[serde(default)]
    pub accuracy: AccuracySettings,
    /// Pilot section.
    #[serde(default)]
    pub pilot: PilotSettings,
    /// Warmup section.
    #[serde(default)]
    pub warmup: WarmupSettings,
    /// Overhead section.
    #[serde(default)]
    pub overhead: OverheadSettings,
    /// Runner section.
    #[serde(default)]
    pub runner: RunnerSettings,
}

/// `[accuracy]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracySettings {
    /// Maximum relative standard error (0.02 = 2%).
    #[serde(default = "default_max_relative_error")]
    pub max_relative_error: f64,
    /// Minimum Actual-phase samples.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    /// Maximum Actual-phase samples.
    #[serde(default = "default_max_samples")]
    pub max_samples: u64,
    /// Minimum wall time per sample (e.g. "100ms").
    #[serde(default = "default_min_sample_time")]
    pub min_sample_time: String,
}

impl Default for AccuracySettings {
    fn default() -> Self {
        Self {
            max_relative_error: default_max_relative_error(),
            min_samples: default_min_samples(),
            max_samples: default_max_samples(),
            min_sample_time: default_min_sample_time(),
        }
    }
}

fn default_max_relative_error() -> f64 {
    0.02
}
fn default_min_samples() -> u64 {
    10
}
fn default_max_samples() -> u64 {
    100
}
fn default_min_sample_time() -> String {
    "100ms".to_string()
}

/// `[pilot]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotSettings {
    /// Starting invocation count.
    #[serde(default = "default_initial_invoke_count")]
    pub initial_invoke_count: u64,
    /// Geometric growth factor.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: u64,
    /// Invocation-count cap.
    #[serde(default = "default_max_invoke_count")]
    pub max_invoke_count: u64,
    /// Clock-resolution multiplier for the minimum sample time floor.
    #[serde(default = "default_resolution_multiplier")]
    pub resolution_multiplier: u32,
}

impl Default for PilotSettings {
    fn default() -> Self {
        Self {
            initial_invoke_count: default_initial_invoke_count(),
            growth_factor: default_growth_factor(),
            max_invoke_count: default_max_invoke_count(),
            resolution_multiplier: default_resolution_multiplier(),
        }
    }
}

fn default_initial_invoke_count() -> u64 {
    1
}
fn default_growth_factor() -> u64 {
    2
}
fn default_max_invoke_count() -> u64 {
    1 << 30
}
fn default_resolution_multiplier() -> u32 {
    256
}

/// `[warmup]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupSettings {
    /// Minimum warmup iterations.
    #[serde(default = "default_warmup_min")]
    pub min_iterations: u64,
    /// Maximum warmup iterations (0 disables warmup).
    #[serde(default = "default_warmup_max")]
    pub max_iterations: u64,
    /// Trailing-window length.
    #[serde(default = "default_warmup_window")]
    pub window: usize,
    /// CV stabilization threshold (fraction).
    #[serde(default = "default_warmup_cv")]
    pub cv_threshold: f64,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            min_iterations: default_warmup_min(),
            max_iterations: default_warmup_max(),
            window: default_warmup_window(),
            cv_threshold: default_warmup_cv(),
        }
    }
}

fn default_warmup_min() -> u64 {
    6
}
fn default_warmup_max() -> u64 {
    50
}
fn default_warmup_window() -> usize {
    5
}
fn default_warmup_cv() -> f64 {
    0.05
}

/// `[overhead]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverheadSettings {
    /// Measure and subtract harness overhead.
    #[serde(default = "default_overhead_enabled")]
    pub enabled: bool,
    /// Discarded overhead samples before estimation.
    #[serde(default = "default_overhead_warmup")]
    pub warmup_count: u64,
    /// Overhead samples the median is taken from.
    #[serde(default = "default_overhead_samples")]
    pub sample_count: u64,
    /// Invocations per overhead sample.
    #[serde(default = "default_overhead_invoke")]
    pub invoke_count: u64,
}

impl Default for OverheadSettings {
    fn default() -> Self {
        Self {
            enabled: default_overhead_enabled(),
            warmup_count: default_overhead_warmup(),
            sample_count: default_overhead_samples(),
            invoke_count: default_overhead_invoke(),
        }
    }
}

fn default_overhead_enabled() -> bool {
    true
}
fn default_overhead_warmup() -> u64 {
    2
}
fn default_overhead_samples() -> u64 {
    8
}
fn default_overhead_invoke() -> u64 {
    16_384
}

/// `[runner]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Clock implementation: "monotonic" or "cycles".
    #[serde(default)]
    pub clock: ClockKind,
    /// Fixed unroll factor.
    #[serde(default)]
    pub unroll_factor: Option<u64>,
    /// Pin the measuring thread to this CPU.
    #[serde(default)]
    pub pin_cpu: Option<usize>,
    /// Emit per-sample progress lines.
    #[serde(default)]
    pub emit_progress: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            clock: ClockKind::default(),
            unroll_factor: None,
            pin_cpu: None,
            emit_progress: false,
        }
    }
}

impl EngineSettings {
    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Try to discover and load settings by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("pulse.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Convert to the in-memory job configuration, parsing durations.
    pub fn to_job_config(&self) -> anyhow::Result<JobConfig> {
        let config = JobConfig {
            accuracy: AccuracyTarget {
                max_relative_error: self.accuracy.max_relative_error,
                min_samples: self.accuracy.min_samples,
                max_samples: self.accuracy.max_samples,
                min_sample_time: Duration::from_nanos(parse_duration(
                    &self.accuracy.min_sample_time,
                )?),
            },
            pilot: PilotPolicy {
                initial_invoke_count: self.pilot.initial_invoke_count,
                growth_factor: self.pilot.growth_factor,
                max_invoke_count: self.pilot.max_invoke_count,
                resolution_multiplier: self.pilot.resolution_multiplier,
            },
            warmup: WarmupPolicy {
                min_iterations: self.warmup.min_iterations,
                max_iterations: self.warmup.max_iterations,
                window: self.warmup.window,
                cv_threshold: self.warmup.cv_threshold,
            },
            overhead: OverheadPolicy {
                enabled: self.overhead.enabled,
                warmup_count: self.overhead.warmup_count,
                sample_count: self.overhead.sample_count,
                invoke_count: self.overhead.invoke_count,
            },
            clock: self.runner.clock,
            unroll_factor: self.runner.unroll_factor,
            emit_progress: self.runner.emit_progress,
        };
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# PulseBench Configuration

[accuracy]
# Maximum relative standard error before the engine stops sampling
max_relative_error = 0.02
# Minimum / maximum number of measured samples
min_samples = 10
max_samples = 100
# Minimum wall time per sample
min_sample_time = "100ms"

[pilot]
# Invocation count the pilot starts from
initial_invoke_count = 1
# Geometric growth factor while samples are too short
growth_factor = 2
# Cap on invocation-count growth
max_invoke_count = 1073741824
# Sample time must also exceed clock resolution times this multiplier
resolution_multiplier = 256

[warmup]
# Warmup iteration bounds (max_iterations = 0 disables warmup)
min_iterations = 6
max_iterations = 50
# Trailing-window stabilization check
window = 5
cv_threshold = 0.05

[overhead]
# Measure and subtract harness overhead
enabled = true
warmup_count = 2
sample_count = 8
invoke_count = 16384

[runner]
# Clock implementation: "monotonic" or "cycles"
clock = "monotonic"
# Fixed unroll factor (uncomment to enable)
# unroll_factor = 16
# Pin the measuring thread to a CPU (uncomment to enable)
# pin_cpu = 0
# Emit per-sample progress lines
emit_progress = false
"#
        .to_string()
    }
}

/// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("Empty duration string"));
    }

    // Find where the number ends and unit begins
    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "s"));

    let value: f64 = num_part
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

    let multiplier: u64 = match unit_part.to_lowercase().as_str() {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" | "" => 1_000_000_000,
        "m" | "min" => 60_000_000_000,
        _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
    };

    Ok((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = JobConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.accuracy.min_samples, 10);
        assert_eq!(config.pilot.growth_factor, 2);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let mut config = JobConfig::default();
        config.unroll_factor = Some(0);
        assert_eq!(config.validate(), Err(EngineError::ZeroUnrollFactor));

        let mut config = JobConfig::default();
        config.accuracy.min_samples = 200;
        config.accuracy.max_samples = 100;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));

        let mut config = JobConfig::default();
        config.pilot.growth_factor = 1;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(parse_duration("100us").unwrap(), 100_000);
        assert_eq!(parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5parsecs").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [accuracy]
            max_relative_error = 0.01
            min_sample_time = "50ms"

            [runner]
            clock = "cycles"
        "#;

        let settings: EngineSettings = toml::from_str(toml_str).unwrap();
        assert!((settings.accuracy.max_relative_error - 0.01).abs() < f64::EPSILON);
        assert_eq!(settings.runner.clock, ClockKind::Cycles);
        // Defaults should still apply
        assert_eq!(settings.warmup.max_iterations, 50);

        let config = settings.to_job_config().unwrap();
        assert_eq!(config.accuracy.min_sample_time, Duration::from_millis(50));
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = EngineSettings::default_toml();
        let settings: EngineSettings = toml::from_str(&default_toml).unwrap();
        let config = settings.to_job_config().unwrap();
        assert_eq!(config, EngineSettings::default().to_job_config().unwrap());
    }
}
