//! Monotonic time sources
//!
//! Provides the `Clock` trait consumed by the measurement engine, a
//! `std::time::Instant`-backed default, and a cycle-counter clock using
//! RDTSCP on x86_64 and CNTVCT_EL0 on AArch64 where available.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ─── Inline cycle counter helpers ────────────────────────────────────────────

/// Read the CPU cycle/tick counter (platform-specific).
#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_cycles() -> u64 {
    // SAFETY: RDTSCP is available on all x86_64 CPUs since ~2006.
    // It is serializing by design — waits for all prior instructions
    // to complete before reading the cycle counter.
    unsafe {
        let mut _aux: u32 = 0;
        std::arch::x86_64::__rdtscp(&mut _aux)
    }
}

/// Read the virtual counter timer on AArch64 (comparable to x86 TSC).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_cycles() -> u64 {
    let cnt: u64;
    // SAFETY: CNTVCT_EL0 is accessible from EL0 (userspace) on all
    // AArch64 implementations. It provides a monotonically increasing
    // counter at a fixed frequency (typically the system timer frequency).
    unsafe {
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) cnt, options(nostack, nomem));
    }
    cnt
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_cycles() -> u64 {
    0
}

/// Whether this platform provides real cycle counters.
pub const HAS_CYCLE_COUNTER: bool = cfg!(target_arch = "x86_64") || cfg!(target_arch = "aarch64");

// ─── Clock contract ──────────────────────────────────────────────────────────

/// An opaque instant produced by a [`Clock`].
///
/// Timestamps are offsets from the clock's own epoch and are only
/// meaningful when compared through the clock that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Build a timestamp from an offset since the clock's epoch.
    /// For `Clock` implementations; not meaningful on its own.
    #[inline]
    pub fn from_offset(offset: Duration) -> Self {
        Self(offset)
    }

    /// Offset from the producing clock's epoch.
    #[inline]
    pub fn since_epoch(&self) -> Duration {
        self.0
    }
}

/// A monotonic time source with a known resolution.
///
/// The engine resolves exactly one clock per run and reads all sample
/// timestamps through it. Implementations must be monotonic and must not
/// allocate or take locks in `timestamp`.
pub trait Clock: Send + Sync {
    /// Smallest representable time unit of this clock.
    fn resolution(&self) -> Duration;

    /// Current monotonic instant.
    fn timestamp(&self) -> Timestamp;

    /// Duration between two timestamps taken from this clock.
    ///
    /// Saturates to zero if `end` precedes `start` (which a conforming
    /// implementation never produces).
    #[inline]
    fn elapsed(&self, start: Timestamp, end: Timestamp) -> Duration {
        end.0.saturating_sub(start.0)
    }
}

/// Which clock implementation a job wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockKind {
    /// `std::time::Instant`-backed clock (always available).
    #[default]
    Monotonic,
    /// Hardware cycle counter (RDTSCP / CNTVCT_EL0), calibrated against
    /// the monotonic clock at construction.
    Cycles,
}

impl std::fmt::Display for ClockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockKind::Monotonic => write!(f, "monotonic"),
            ClockKind::Cycles => write!(f, "cycles"),
        }
    }
}

/// Resolve a [`ClockKind`] into a usable clock instance.
///
/// Called once per engine run; the engine never re-resolves mid-run so all
/// phases see the same resolution. Requesting [`ClockKind::Cycles`] on a
/// platform without cycle counters is a contract violation.
pub fn resolve_clock(kind: ClockKind) -> Result<std::sync::Arc<dyn Clock>, EngineError> {
    match kind {
        ClockKind::Monotonic => Ok(std::sync::Arc::new(MonotonicClock::new())),
        ClockKind::Cycles => CycleClock::calibrate()
            .map(|c| std::sync::Arc::new(c) as std::sync::Arc<dyn Clock>)
            .ok_or(EngineError::UnsupportedClock(kind)),
    }
}

// ─── MonotonicClock ──────────────────────────────────────────────────────────

/// Default clock backed by `std::time::Instant`.
///
/// Resolution is probed once at construction: the smallest nonzero delta
/// observed between consecutive readings, clamped to at least 1ns.
pub struct MonotonicClock {
    epoch: std::time::Instant,
    resolution: Duration,
}

impl MonotonicClock {
    /// Create a clock and probe its effective resolution.
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
            resolution: probe_resolution(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn resolution(&self) -> Duration {
        self.resolution
    }

    #[inline(always)]
    fn timestamp(&self) -> Timestamp {
        Timestamp(self.epoch.elapsed())
    }
}

/// Smallest nonzero delta between consecutive `Instant` readings.
fn probe_resolution() -> Duration {
    let mut best = Duration::from_micros(1);
    for _ in 0..128 {
        let a = std::time::Instant::now();
        let mut b = std::time::Instant::now();
        while b == a {
            b = std::time::Instant::now();
        }
        let delta = b - a;
        if delta < best {
            best = delta;
        }
    }
    best.max(Duration::from_nanos(1))
}

// ─── CycleClock ──────────────────────────────────────────────────────────────

/// Cycle-counter clock, calibrated against the monotonic clock.
///
/// Converts raw counter ticks to nanoseconds using a frequency estimated
/// over a short calibration window at construction time.
pub struct CycleClock {
    origin: u64,
    cycles_per_ns: f64,
}

impl CycleClock {
    /// Calibration window length. Long enough for a stable frequency
    /// estimate, short enough not to dominate engine startup.
    const CALIBRATION_WINDOW: Duration = Duration::from_millis(5);

    /// Calibrate a cycle clock, or `None` when the platform has no
    /// usable cycle counter.
    pub fn calibrate() -> Option<Self> {
        if !HAS_CYCLE_COUNTER {
            return None;
        }
        let wall_start = std::time::Instant::now();
        let cycle_start = read_cycles();
        while wall_start.elapsed() < Self::CALIBRATION_WINDOW {
            std::hint::spin_loop();
        }
        let cycles = read_cycles().saturating_sub(cycle_start);
        let nanos = wall_start.elapsed().as_nanos() as f64;
        if cycles == 0 || nanos <= 0.0 {
            return None;
        }
        Some(Self {
            origin: read_cycles(),
            cycles_per_ns: cycles as f64 / nanos,
        })
    }
}

impl Clock for CycleClock {
    fn resolution(&self) -> Duration {
        let ns_per_cycle = (1.0 / self.cycles_per_ns).ceil().max(1.0);
        Duration::from_nanos(ns_per_cycle as u64)
    }

    #[inline(always)]
    fn timestamp(&self) -> Timestamp {
        let ticks = read_cycles().saturating_sub(self.origin);
        Timestamp(Duration::from_nanos(
            (ticks as f64 / self.cycles_per_ns) as u64,
        ))
    }
}

// ─── CPU affinity ────────────────────────────────────────────────────────────

/// Set CPU affinity to pin the current thread to a specific core
///
/// This improves cycle-counter stability by avoiding core migrations.
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), std::io::Error> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        libc::CPU_SET(cpu, set_ref);

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), std::io::Error> {
    // CPU pinning not supported on this platform
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_timestamps_advance() {
        let clock = MonotonicClock::new();
        let a = clock.timestamp();
        std::thread::sleep(Duration::from_millis(5));
        let b = clock.timestamp();
        assert!(b > a);
        assert!(clock.elapsed(a, b) >= Duration::from_millis(2));
    }

    #[test]
    fn elapsed_saturates_on_reversed_arguments() {
        let clock = MonotonicClock::new();
        let a = clock.timestamp();
        std::thread::sleep(Duration::from_millis(1));
        let b = clock.timestamp();
        assert_eq!(clock.elapsed(b, a), Duration::ZERO);
    }

    #[test]
    fn resolution_is_sane() {
        let clock = MonotonicClock::new();
        let res = clock.resolution();
        assert!(res >= Duration::from_nanos(1));
        assert!(res <= Duration::from_micros(1));
    }

    #[test]
    fn cycle_counter_is_monotonic() {
        if HAS_CYCLE_COUNTER {
            let a = read_cycles();
            let b = read_cycles();
            assert!(b >= a, "cycle counter should be monotonic");
        }
    }

    #[test]
    fn cycle_clock_tracks_wall_time() {
        let Some(clock) = CycleClock::calibrate() else {
            return;
        };
        let a = clock.timestamp();
        std::thread::sleep(Duration::from_millis(10));
        let b = clock.timestamp();
        let elapsed = clock.elapsed(a, b);
        // Loose bounds: scheduling jitter and calibration error both apply.
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(200));
    }

    #[test]
    fn resolve_monotonic_always_works() {
        let clock = resolve_clock(ClockKind::Monotonic).unwrap();
        assert!(clock.resolution() >= Duration::from_nanos(1));
    }
}
