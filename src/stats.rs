//! Global control state and aggregate statistics.
//!
//! Everything here is read or written from the probe handler, so it is all
//! atomics: no lock, no allocation. The registry lock never covers these
//! fields.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::platform;

/// Number of counter slots; CPU ids wrap modulo this.
pub const MAX_CPUS: usize = 8;

/// Counter sharded per CPU and summed on read.
///
/// Concurrent hits on different CPUs touch different slots; hits on the
/// same slot still never lose updates because each slot is atomic.
#[derive(Debug)]
pub struct PerCpuCounter {
    slots: [AtomicU64; MAX_CPUS],
}

impl PerCpuCounter {
    pub const fn new() -> Self {
        Self {
            slots: [
                AtomicU64::new(0), AtomicU64::new(0),
                AtomicU64::new(0), AtomicU64::new(0),
                AtomicU64::new(0), AtomicU64::new(0),
                AtomicU64::new(0), AtomicU64::new(0),
            ],
        }
    }

    /// Add `value` to the current CPU's slot.
    #[inline]
    pub fn add(&self, value: u64) {
        self.add_on(platform::cpu_id(), value);
    }

    /// Add `value` to the slot of an explicit CPU.
    #[inline]
    pub fn add_on(&self, cpu: u32, value: u64) {
        let slot = cpu as usize % MAX_CPUS;
        self.slots[slot].fetch_add(value, Ordering::Relaxed);
    }

    /// Sum across all CPUs.
    pub fn sum(&self) -> u64 {
        self.slots
            .iter()
            .fold(0u64, |acc, slot| acc.wrapping_add(slot.load(Ordering::Relaxed)))
    }

    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for PerCpuCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the control path and every probe handler.
#[derive(Debug)]
pub struct ControlState {
    enabled: AtomicBool,
    default_delay_ns: AtomicU64,
    total_hits: PerCpuCounter,
    total_delay_ns: PerCpuCounter,
}

impl ControlState {
    /// Starts disabled.
    pub const fn new(default_delay_ns: u64) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            default_delay_ns: AtomicU64::new(default_delay_ns),
            total_hits: PerCpuCounter::new(),
            total_delay_ns: PerCpuCounter::new(),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn default_delay_ns(&self) -> u64 {
        self.default_delay_ns.load(Ordering::Relaxed)
    }

    /// Only affects targets added afterwards.
    pub fn set_default_delay_ns(&self, delay_ns: u64) {
        self.default_delay_ns.store(delay_ns, Ordering::Relaxed);
    }

    /// Record one executed delay in the aggregate counters.
    #[inline]
    pub fn record_hit(&self, delay_ns: u64) {
        let cpu = platform::cpu_id();
        self.total_hits.add_on(cpu, 1);
        self.total_delay_ns.add_on(cpu, delay_ns);
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits.sum()
    }

    pub fn total_delay_ns(&self) -> u64 {
        self.total_delay_ns.sum()
    }

    /// Zero the aggregate counters.
    pub fn reset(&self) {
        self.total_hits.reset();
        self.total_delay_ns.reset();
    }
}

/// Point-in-time view of the global statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub enabled: bool,
    pub targets: usize,
    pub total_hits: u64,
    pub total_delay_ns: u64,
}
