//! Layered configuration resolution.
//!
//! The engine never reads raw configuration directly: a [`ConfigResolver`]
//! holds an ordered stack of override layers over a base job, and every
//! query returns the first defined value. The resolver is an explicit
//! object passed to whoever needs it — there is no ambient/global context.

use crate::config::{JobConfig, JobOverrides};

/// Ordered override layers over a base [`JobConfig`].
///
/// Layers added later take precedence; the base supplies every value no
/// layer defines.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    base: JobConfig,
    layers: Vec<JobOverrides>,
}

impl ConfigResolver {
    /// Resolver with no override layers.
    pub fn new(base: JobConfig) -> Self {
        Self {
            base,
            layers: Vec::new(),
        }
    }

    /// Add an override layer with precedence over all existing layers.
    pub fn with_layer(mut self, layer: JobOverrides) -> Self {
        self.layers.push(layer);
        self
    }

    /// Add an override layer with precedence over all existing layers.
    pub fn push_layer(&mut self, layer: JobOverrides) {
        self.layers.push(layer);
    }

    /// First defined value for one characteristic, newest layer first.
    pub fn resolve<T>(&self, get: impl Fn(&JobOverrides) -> Option<T>) -> Option<T> {
        self.layers.iter().rev().find_map(|layer| get(layer))
    }

    /// The base configuration underneath all layers.
    pub fn base(&self) -> &JobConfig {
        &self.base
    }

    /// Materialize the effective job configuration with every override
    /// applied. Computed on demand so callers never cache stale values.
    pub fn effective(&self) -> JobConfig {
        let mut config = self.base.clone();
        if let Some(v) = self.resolve(|l| l.max_relative_error) {
            config.accuracy.max_relative_error = v;
        }
        if let Some(v) = self.resolve(|l| l.min_samples) {
            config.accuracy.min_samples = v;
        }
        if let Some(v) = self.resolve(|l| l.max_samples) {
            config.accuracy.max_samples = v;
        }
        if let Some(v) = self.resolve(|l| l.min_sample_time) {
            config.accuracy.min_sample_time = v;
        }
        if let Some(v) = self.resolve(|l| l.clock) {
            config.clock = v;
        }
        if let Some(v) = self.resolve(|l| l.unroll_factor) {
            config.unroll_factor = Some(v);
        }
        if let Some(v) = self.resolve(|l| l.measure_overhead) {
            config.overhead.enabled = v;
        }
        if let Some(v) = self.resolve(|l| l.max_warmup_iterations) {
            config.warmup.max_iterations = v;
            config.warmup.min_iterations = config.warmup.min_iterations.min(v);
        }
        config
    }
}
