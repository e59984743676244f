//! Instrumentation targets and the probe-trigger handler.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::delay;
use crate::probe::ProcessTree;
use crate::stats::ControlState;

/// Unique identity of a target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetKey {
    pub path: String,
    pub symbol: String,
}

impl TargetKey {
    pub fn new(path: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbol: symbol.into(),
        }
    }

    pub fn is(&self, path: &str, symbol: &str) -> bool {
        self.path == path && self.symbol == symbol
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.symbol)
    }
}

/// One instrumented (binary, symbol) pair.
///
/// Shared between the registry and the probe handler. Fields the handler
/// reads or writes are atomics; identity and offset never change after
/// construction.
#[derive(Debug)]
pub struct Target {
    key: TargetKey,
    offset: u64,
    delay_ns: AtomicU64,
    /// 0 = no filter
    pid_filter: AtomicU32,
    attached: AtomicBool,
    hit_count: AtomicU64,
    total_delay_ns: AtomicU64,
}

impl Target {
    /// A resolved but not yet attached target.
    pub fn new(key: TargetKey, offset: u64, delay_ns: u64, pid_filter: u32) -> Self {
        Self {
            key,
            offset,
            delay_ns: AtomicU64::new(delay_ns),
            pid_filter: AtomicU32::new(pid_filter),
            attached: AtomicBool::new(false),
            hit_count: AtomicU64::new(0),
            total_delay_ns: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn symbol(&self) -> &str {
        &self.key.symbol
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn delay_ns(&self) -> u64 {
        self.delay_ns.load(Ordering::Relaxed)
    }

    pub fn set_delay_ns(&self, delay_ns: u64) {
        self.delay_ns.store(delay_ns, Ordering::Relaxed);
    }

    pub fn pid_filter(&self) -> Option<u32> {
        match self.pid_filter.load(Ordering::Relaxed) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn set_pid_filter(&self, pid: u32) {
        self.pid_filter.store(pid, Ordering::Relaxed);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    pub fn total_delay_ns(&self) -> u64 {
        self.total_delay_ns.load(Ordering::Relaxed)
    }

    fn record_hit(&self, delay_ns: u64) {
        self.hit_count.fetch_add(1, Ordering::Relaxed);
        self.total_delay_ns.fetch_add(delay_ns, Ordering::Relaxed);
    }

    pub(crate) fn reset_stats(&self) {
        self.hit_count.store(0, Ordering::Relaxed);
        self.total_delay_ns.store(0, Ordering::Relaxed);
    }

    /// Immutable snapshot for the control path.
    pub fn info(&self) -> TargetInfo {
        TargetInfo {
            path: self.key.path.clone(),
            symbol: self.key.symbol.clone(),
            offset: self.offset,
            delay_ns: self.delay_ns(),
            pid_filter: self.pid_filter(),
            hits: self.hit_count(),
            total_delay_ns: self.total_delay_ns(),
        }
    }
}

/// Snapshot of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub path: String,
    pub symbol: String,
    pub offset: u64,
    pub delay_ns: u64,
    pub pid_filter: Option<u32>,
    pub hits: u64,
    pub total_delay_ns: u64,
}

impl fmt::Display for TargetInfo {
    /// `PATH:SYMBOL delay_ns=N hits=M[ pid=P]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} delay_ns={} hits={}",
            self.path, self.symbol, self.delay_ns, self.hits
        )?;
        if let Some(pid) = self.pid_filter {
            write!(f, " pid={}", pid)?;
        }
        Ok(())
    }
}

/// Trigger callback handed to the probe backend on attach.
///
/// Cloning is cheap (two `Arc`s) and [`ProbeConsumer::fire`] never blocks
/// or allocates, so backends may call it from trap context on any CPU.
#[derive(Debug, Clone)]
pub struct ProbeConsumer {
    target: Arc<Target>,
    control: Arc<ControlState>,
}

/// What a single trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Delay executed and counted.
    Delayed(u64),
    /// Globally disabled.
    Disabled,
    /// Target already detached.
    Detached,
    /// Process outside the PID filter's tree.
    Filtered,
}

impl ProbeConsumer {
    pub fn new(target: Arc<Target>, control: Arc<ControlState>) -> Self {
        Self { target, control }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Handle one probe hit by process `pid`.
    pub fn fire(&self, pid: u32, tree: &dyn ProcessTree) -> FireOutcome {
        if !self.control.is_enabled() {
            return FireOutcome::Disabled;
        }
        if !self.target.is_attached() {
            return FireOutcome::Detached;
        }
        if let Some(filter) = self.target.pid_filter()
            && !tree.is_descendant(pid, filter)
        {
            return FireOutcome::Filtered;
        }

        let delay_ns = self.target.delay_ns();
        delay::spin_delay_ns(delay_ns);

        self.target.record_hit(delay_ns);
        self.control.record_hit(delay_ns);
        FireOutcome::Delayed(delay_ns)
    }
}
