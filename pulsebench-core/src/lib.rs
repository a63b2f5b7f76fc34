#![warn(missing_docs)]
//! PulseBench Core - Measurement Primitives
//!
//! This crate provides the building blocks of the measurement engine:
//! - `Clock` trait with monotonic and cycle-counter implementations
//! - `IterationRequest`/`Measurement` sample types and their contracts
//! - `WorkloadExecutor` trait with production and synthetic implementations
//! - CPU affinity pinning for stable cycle-counter readings

mod clock;
mod error;
mod executor;
mod iteration;

pub use clock::{Clock, ClockKind, CycleClock, MonotonicClock, Timestamp, resolve_clock};
/// Whether this platform provides hardware cycle counters (x86_64 RDTSCP or
/// AArch64 CNTVCT_EL0). When `false`, [`ClockKind::Cycles`] cannot be resolved.
pub use clock::HAS_CYCLE_COUNTER;
pub use clock::pin_to_cpu;
pub use error::EngineError;
pub use executor::{ClosureExecutor, SyntheticExecutor, WorkloadExecutor};
pub use iteration::{IterationKind, IterationMode, IterationPhase, IterationRequest, Measurement};
