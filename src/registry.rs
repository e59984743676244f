//! Target registry.
//!
//! Owns every live target and drives its attach/detach lifecycle through a
//! [`ProbeBackend`]. All structural changes happen under one lock; the probe
//! handler never takes it.
//!
//! A target only becomes visible after the backend attached it, and is
//! detached (with the backend waiting out in-flight hits) before it leaves
//! the list.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::command::Command;
use crate::config::Config;
use crate::elf;
use crate::error::Error;
use crate::pattern;
use crate::probe::ProbeBackend;
use crate::stats::{ControlState, StatsSnapshot};
use crate::target::{ProbeConsumer, Target, TargetInfo, TargetKey};

/// A live target plus the backend handle that keeps it armed.
struct Slot<H> {
    target: Arc<Target>,
    handle: H,
}

/// The set of active targets.
pub struct Registry<B: ProbeBackend> {
    backend: B,
    config: Config,
    control: Arc<ControlState>,
    /// Insertion order.
    slots: Mutex<Vec<Slot<B::Handle>>>,
}

impl<B: ProbeBackend> Registry<B> {
    /// Create a registry with the compiled-in limits.
    pub fn new(backend: B) -> Self {
        Self::build(backend, Config::default())
    }

    /// Create a registry with custom limits.
    pub fn with_config(backend: B, config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::build(backend, config))
    }

    fn build(backend: B, config: Config) -> Self {
        Self {
            backend,
            config,
            control: Arc::new(ControlState::new(config.default_delay_ns)),
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State shared with the probe handlers.
    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    pub fn is_enabled(&self) -> bool {
        self.control.is_enabled()
    }

    /// Gate every probe handler. Does not shorten a delay already spinning.
    pub fn set_enabled(&self, enabled: bool) {
        self.control.set_enabled(enabled);
        info!("speed_bump: {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn default_delay_ns(&self) -> u64 {
        self.control.default_delay_ns()
    }

    /// Change the delay used by later adds that omit one.
    pub fn set_default_delay_ns(&self, delay_ns: u64) -> Result<(), Error> {
        self.check_delay(delay_ns)?;
        self.control.set_default_delay_ns(delay_ns);
        debug!("speed_bump: default delay set to {} ns", delay_ns);
        Ok(())
    }

    /// Resolve, attach and register a new target.
    ///
    /// The binary is read and resolved without the registry lock held, so a
    /// slow backend never stalls other control-path callers. Uniqueness and
    /// capacity are checked again under the lock before attaching. On any
    /// error the registry is left unchanged.
    pub fn add(
        &self,
        path: &str,
        symbol: &str,
        delay_ns: u64,
        pid_filter: Option<u32>,
    ) -> Result<(), Error> {
        self.check_delay(delay_ns)?;
        // Fail fast before touching the binary.
        self.check_insertable(&self.slots.lock(), path, symbol)?;

        let file = self.backend.open(path).map_err(Error::AttachFailed)?;
        let image = self
            .backend
            .read_image(&file)
            .map_err(Error::AttachFailed)?;
        let offset = elf::resolve_symbol_offset(&image, symbol).inspect_err(|err| {
            debug!("speed_bump: cannot resolve {}:{}: {}", path, symbol, err);
        })?;
        drop(image);

        let mut slots = self.slots.lock();
        self.check_insertable(&slots, path, symbol)?;

        let target = Arc::new(Target::new(
            TargetKey::new(path, symbol),
            offset,
            delay_ns,
            pid_filter.unwrap_or(0),
        ));

        // Hits arriving as soon as attach returns must already count.
        target.set_attached(true);
        let consumer = ProbeConsumer::new(target.clone(), self.control.clone());
        let handle = match self.backend.attach(&file, offset, consumer) {
            Ok(handle) => handle,
            Err(err) => {
                target.set_attached(false);
                warn!(
                    "speed_bump: attach {}:{} at {:#x} failed: {:?}",
                    path, symbol, offset, err
                );
                return Err(Error::AttachFailed(err));
            }
        };

        slots.push(Slot { target, handle });

        match pid_filter {
            Some(pid) => info!(
                "speed_bump: added target {}:{} delay={} ns pid={}",
                path, symbol, delay_ns, pid
            ),
            None => info!(
                "speed_bump: added target {}:{} delay={} ns",
                path, symbol, delay_ns
            ),
        }
        Ok(())
    }

    /// Detach and drop one target.
    pub fn remove(&self, path: &str, symbol: &str) -> Result<(), Error> {
        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .position(|slot| slot.target.key().is(path, symbol))
            .ok_or(Error::NotFound)?;

        let slot = slots.remove(index);
        self.release(slot);
        info!("speed_bump: removed target {}:{}", path, symbol);
        Ok(())
    }

    /// Detach and drop every target. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let mut slots = self.slots.lock();
        let removed = slots.len();
        for slot in slots.drain(..) {
            self.release(slot);
        }
        info!("speed_bump: removed all {} targets", removed);
        removed
    }

    /// Change the delay, and the PID filter if one is given, of a live target.
    ///
    /// The attachment is left alone; handlers pick up the new values on
    /// their next hit.
    pub fn update(
        &self,
        path: &str,
        symbol: &str,
        delay_ns: u64,
        pid_filter: Option<u32>,
    ) -> Result<(), Error> {
        self.check_delay(delay_ns)?;

        let slots = self.slots.lock();
        let slot = slots
            .iter()
            .find(|slot| slot.target.key().is(path, symbol))
            .ok_or(Error::NotFound)?;

        slot.target.set_delay_ns(delay_ns);
        if let Some(pid) = pid_filter {
            slot.target.set_pid_filter(pid);
        }
        info!(
            "speed_bump: updated target {}:{} delay={} ns",
            path, symbol, delay_ns
        );
        Ok(())
    }

    /// Apply a parsed protocol command.
    ///
    /// Returns the number of targets affected.
    pub fn execute(&self, command: Command) -> Result<usize, Error> {
        match command {
            Command::Add(spec) => {
                let delay_ns = spec.delay_ns.unwrap_or_else(|| self.default_delay_ns());
                self.add(&spec.key.path, &spec.key.symbol, delay_ns, spec.pid_filter)
                    .map(|()| 1)
            }
            Command::Remove(key) => self.remove(&key.path, &key.symbol).map(|()| 1),
            Command::RemoveAll => Ok(self.remove_all()),
            Command::Update(spec) => {
                let delay_ns = spec.delay_ns.unwrap_or_else(|| self.default_delay_ns());
                self.update(&spec.key.path, &spec.key.symbol, delay_ns, spec.pid_filter)
                    .map(|()| 1)
            }
        }
    }

    /// Snapshot of all targets, in insertion order.
    pub fn list(&self) -> Vec<TargetInfo> {
        self.slots
            .lock()
            .iter()
            .map(|slot| slot.target.info())
            .collect()
    }

    /// Targets whose key matches a `PATH:SYMBOL` pattern.
    pub fn list_matching(&self, pattern: &str) -> Vec<TargetInfo> {
        self.slots
            .lock()
            .iter()
            .filter(|slot| pattern::matches(pattern, slot.target.path(), slot.target.symbol()))
            .map(|slot| slot.target.info())
            .collect()
    }

    pub fn lookup(&self, path: &str, symbol: &str) -> Option<TargetInfo> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.target.key().is(path, symbol))
            .map(|slot| slot.target.info())
    }

    /// Number of live targets.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            enabled: self.control.is_enabled(),
            targets: self.len(),
            total_hits: self.control.total_hits(),
            total_delay_ns: self.control.total_delay_ns(),
        }
    }

    /// Zero per-target and aggregate counters.
    pub fn reset_stats(&self) {
        let slots = self.slots.lock();
        for slot in slots.iter() {
            slot.target.reset_stats();
        }
        self.control.reset();
    }

    /// Disable all handlers and force-detach every target.
    pub fn shutdown(&self) {
        self.control.set_enabled(false);
        let removed = self.remove_all();
        info!("speed_bump: shut down ({} targets released)", removed);
    }

    fn release(&self, slot: Slot<B::Handle>) {
        let Slot { target, handle } = slot;
        target.set_attached(false);
        self.backend.detach(handle);
        trace!(
            "speed_bump: detached {} (hits={})",
            target.key(),
            target.hit_count()
        );
    }

    fn check_insertable(
        &self,
        slots: &[Slot<B::Handle>],
        path: &str,
        symbol: &str,
    ) -> Result<(), Error> {
        if slots.iter().any(|slot| slot.target.key().is(path, symbol)) {
            return Err(Error::AlreadyExists);
        }
        if slots.len() >= self.config.max_targets {
            return Err(Error::CapacityExceeded);
        }
        Ok(())
    }

    fn check_delay(&self, delay_ns: u64) -> Result<(), Error> {
        if delay_ns > self.config.max_delay_ns {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }
}

impl<B: ProbeBackend> Drop for Registry<B> {
    fn drop(&mut self) {
        if !self.slots.get_mut().is_empty() {
            self.shutdown();
        }
    }
}
