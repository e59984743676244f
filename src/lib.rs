//! Speed bump: uprobe-style delay injection.
//!
//! Injects a configurable busy-wait at function entry points of user-space
//! binaries. An administrator names a `PATH:SYMBOL`, the symbol is resolved
//! to a file offset inside the ELF64 image, and a probe is armed there
//! through a [`ProbeBackend`]. Every time a process runs through that probe
//! the handler spins for the target's delay and bumps its counters.
//!
//! # Quick Start
//!
//! ```ignore
//! use speedbump::{ControlPlane, Endpoint, Registry};
//!
//! // Install the kernel clock once during boot
//! speedbump::init_with_platform(kernel_time_ns, kernel_cpu_id);
//!
//! let control = ControlPlane::new(Registry::new(backend));
//! control.write(Endpoint::Targets, "+/usr/bin/app:main 5000\n")?;
//! control.write(Endpoint::Enabled, "1\n")?;
//!
//! print!("{}", control.read(Endpoint::TargetsList)?);
//! ```

#![no_std]

extern crate alloc;

#[macro_use]
extern crate log;

// =============================================================================
// Platform Abstraction (for testing support)
// =============================================================================

pub mod platform;

// =============================================================================
// Hot Path
// =============================================================================

pub mod delay;

pub mod stats;

pub mod target;

// =============================================================================
// Resolution and Matching
// =============================================================================

pub mod elf;

pub mod pattern;

// =============================================================================
// Probe Subsystem Seam
// =============================================================================

pub mod probe;

// =============================================================================
// Control Path
// =============================================================================

pub mod command;

pub mod config;

pub mod control;

pub mod error;

pub mod registry;

// Re-export key types for convenience
pub use command::{Command, TargetSpec};
pub use config::Config;
pub use control::{ControlPlane, Endpoint};
pub use elf::{ResolveError, ResolvedSymbol};
pub use error::Error;
pub use probe::{ProbeBackend, ProcessTree};
pub use registry::Registry;
pub use stats::StatsSnapshot;
pub use target::{FireOutcome, ProbeConsumer, TargetInfo, TargetKey};

#[cfg(feature = "sim")]
pub use probe::sim::SimulatedBackend;

// =============================================================================
// Initialization
// =============================================================================

/// Log the compiled-in limits.
///
/// Without a registered clock, delays run against the mock clock. Use
/// [`init_with_platform`] on real hardware.
pub fn init() {
    let config = Config::default();
    info!(
        "speed_bump: core loaded (max_targets={}, max_delay={} ns)",
        config.max_targets, config.max_delay_ns
    );
    if !platform::has_clock() {
        warn!("speed_bump: no clock registered, delays use the mock clock");
    }
}

/// Install the kernel's clock and CPU-id sources, then [`init`].
///
/// # Arguments
/// * `time_ns` - Monotonic clock in nanoseconds
/// * `cpu_id` - Index of the executing CPU
pub fn init_with_platform(time_ns: fn() -> u64, cpu_id: fn() -> u32) {
    if !platform::register_clock_hook(time_ns) {
        debug!("speed_bump: clock already registered");
    }
    platform::register_cpu_id_hook(cpu_id);
    init();
}
