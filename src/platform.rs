//! Platform abstraction layer for kernel operations.
//!
//! This module provides an abstraction over platform-specific operations
//! (monotonic time, CPU relax hint, CPU ID) so the delay and statistics
//! code can run unchanged in the kernel and in user-space tests.
//!
//! The embedding kernel installs its clock and CPU-id sources once during
//! boot through [`register_clock_hook`] and [`register_cpu_id_hook`]. Until a
//! clock is installed, a mock clock is used that advances on every
//! [`cpu_relax`], so spin loops always terminate.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Once;

/// Platform operations trait.
///
/// Abstracts over kernel-specific operations to enable mock testing.
pub trait PlatformOps {
    /// Get current monotonic time in nanoseconds.
    fn time_ns() -> u64;

    /// Low-power hint issued once per spin-loop iteration.
    fn cpu_relax();

    /// Get current CPU ID.
    fn cpu_id() -> u32;
}

/// Step the mock clock advances on every relax when no clock hook is registered.
pub const MOCK_RELAX_STEP_NS: u64 = 1_000;

static CLOCK_HOOK: Once<fn() -> u64> = Once::new();
static CPU_ID_HOOK: Once<fn() -> u32> = Once::new();

/// Mock time value for testing.
static MOCK_TIME_NS: AtomicU64 = AtomicU64::new(1_000_000_000); // 1 second

/// Mock CPU ID for testing.
static MOCK_CPU_ID: AtomicU64 = AtomicU64::new(0);

/// Install the kernel's monotonic clock.
///
/// Returns `false` if a clock was already installed; the first one wins.
pub fn register_clock_hook(hook: fn() -> u64) -> bool {
    let mut installed = false;
    CLOCK_HOOK.call_once(|| {
        installed = true;
        hook
    });
    installed
}

/// Install the kernel's current-CPU query.
///
/// Returns `false` if a CPU-id source was already installed.
pub fn register_cpu_id_hook(hook: fn() -> u32) -> bool {
    let mut installed = false;
    CPU_ID_HOOK.call_once(|| {
        installed = true;
        hook
    });
    installed
}

/// Whether a real clock has been installed.
pub fn has_clock() -> bool {
    CLOCK_HOOK.get().is_some()
}

// =============================================================================
// Kernel Implementation (hooks, mock fallback)
// =============================================================================

/// Platform operations backed by the registered hooks.
///
/// Falls back to the mock clock and CPU id for anything not registered.
pub struct KernelPlatform;

impl PlatformOps for KernelPlatform {
    fn time_ns() -> u64 {
        match CLOCK_HOOK.get() {
            Some(clock) => clock(),
            None => MOCK_TIME_NS.load(Ordering::Relaxed),
        }
    }

    fn cpu_relax() {
        if CLOCK_HOOK.get().is_none() {
            MOCK_TIME_NS.fetch_add(MOCK_RELAX_STEP_NS, Ordering::Relaxed);
        }
        core::hint::spin_loop();
    }

    fn cpu_id() -> u32 {
        match CPU_ID_HOOK.get() {
            Some(cpu_id) => cpu_id(),
            None => MOCK_CPU_ID.load(Ordering::Relaxed) as u32,
        }
    }
}

/// Set mock time for testing.
pub fn set_mock_time(ns: u64) {
    MOCK_TIME_NS.store(ns, Ordering::Relaxed);
}

/// Advance mock time by given nanoseconds.
pub fn advance_mock_time(ns: u64) {
    MOCK_TIME_NS.fetch_add(ns, Ordering::Relaxed);
}

/// Set mock CPU ID for testing.
pub fn set_mock_cpu_id(id: u32) {
    MOCK_CPU_ID.store(id as u64, Ordering::Relaxed);
}

// =============================================================================
// Platform Type Alias
// =============================================================================

/// The active platform implementation.
pub type Platform = KernelPlatform;

// =============================================================================
// Convenience Functions
// =============================================================================

/// Get current time in nanoseconds.
#[inline]
pub fn time_ns() -> u64 {
    Platform::time_ns()
}

/// Issue one relax hint.
#[inline]
pub fn cpu_relax() {
    Platform::cpu_relax()
}

/// Get current CPU ID.
#[inline]
pub fn cpu_id() -> u32 {
    Platform::cpu_id()
}

// =============================================================================
// Tests
// =============================================================================
