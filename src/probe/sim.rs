//! In-memory probe backend.
//!
//! Serves binaries from a path → bytes map, keeps a parent-PID table for
//! process-tree checks, and fires consumers when [`SimulatedBackend::trigger`]
//! is called. Used by the test suite and by harnesses that want to drive the
//! registry without a kernel.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use axerrno::{AxError, AxResult};
use spin::{Mutex, RwLock};

use super::{ProbeBackend, ProcessTree};
use crate::target::{FireOutcome, ProbeConsumer};

/// Opened binary.
#[derive(Debug, Clone)]
pub struct SimFile {
    path: String,
}

/// Live attachment.
#[derive(Debug)]
pub struct SimHandle {
    id: u64,
}

struct Attachment {
    path: String,
    offset: u64,
    consumer: ProbeConsumer,
}

/// Simulated probe subsystem.
pub struct SimulatedBackend {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    /// pid -> parent pid
    parents: RwLock<BTreeMap<u32, u32>>,
    /// Readers are in-flight triggers; detach takes the write side.
    attachments: RwLock<BTreeMap<u64, Attachment>>,
    next_id: AtomicU64,
    fail_next_attach: Mutex<Option<AxError>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            parents: RwLock::new(BTreeMap::new()),
            attachments: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            fail_next_attach: Mutex::new(None),
        }
    }

    /// Make `image` available at `path`.
    pub fn insert_file(&self, path: &str, image: Vec<u8>) {
        self.files.write().insert(path.to_string(), image);
    }

    pub fn remove_file(&self, path: &str) {
        self.files.write().remove(path);
    }

    /// Record `parent` as the parent of `pid`.
    pub fn set_parent(&self, pid: u32, parent: u32) {
        self.parents.write().insert(pid, parent);
    }

    /// Make the next `attach` fail with `err`.
    pub fn fail_next_attach(&self, err: AxError) {
        *self.fail_next_attach.lock() = Some(err);
    }

    /// Number of armed probes.
    pub fn attachment_count(&self) -> usize {
        self.attachments.read().len()
    }

    /// Whether a probe is armed at `path` + `offset`.
    pub fn is_armed(&self, path: &str, offset: u64) -> bool {
        self.attachments
            .read()
            .values()
            .any(|a| a.path == path && a.offset == offset)
    }

    /// Simulate process `pid` executing `path` at `offset`.
    ///
    /// Returns what each armed probe at that location did.
    pub fn trigger(&self, path: &str, offset: u64, pid: u32) -> Vec<FireOutcome> {
        let attachments = self.attachments.read();
        attachments
            .values()
            .filter(|a| a.path == path && a.offset == offset)
            .map(|a| a.consumer.fire(pid, self))
            .collect()
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTree for SimulatedBackend {
    fn is_descendant(&self, pid: u32, ancestor: u32) -> bool {
        let parents = self.parents.read();
        let mut current = pid;
        // A well-formed tree is at most parents.len() deep.
        for _ in 0..=parents.len() {
            if current == ancestor {
                return true;
            }
            match parents.get(&current) {
                Some(&parent) if parent != current => current = parent,
                _ => return false,
            }
        }
        false
    }
}

impl ProbeBackend for SimulatedBackend {
    type File = SimFile;
    type Handle = SimHandle;

    fn open(&self, path: &str) -> AxResult<SimFile> {
        if !self.files.read().contains_key(path) {
            return axerrno::ax_err!(NotFound, "sim: no such file");
        }
        Ok(SimFile {
            path: path.to_string(),
        })
    }

    fn read_image(&self, file: &SimFile) -> AxResult<Vec<u8>> {
        match self.files.read().get(&file.path) {
            Some(image) => Ok(image.clone()),
            None => axerrno::ax_err!(NotFound, "sim: file vanished"),
        }
    }

    fn attach(&self, file: &SimFile, offset: u64, consumer: ProbeConsumer) -> AxResult<SimHandle> {
        if let Some(err) = self.fail_next_attach.lock().take() {
            return Err(err);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.attachments.write().insert(
            id,
            Attachment {
                path: file.path.clone(),
                offset,
                consumer,
            },
        );
        trace!("sim: armed {}+{:#x} (id={})", file.path, offset, id);
        Ok(SimHandle { id })
    }

    fn detach(&self, handle: SimHandle) {
        // Write lock waits for every trigger currently holding the read side.
        if self.attachments.write().remove(&handle.id).is_some() {
            trace!("sim: disarmed id={}", handle.id);
        }
    }
}
