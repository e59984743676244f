//! Probe subsystem seam.
//!
//! The registry never traps execution itself. It resolves an offset and asks
//! a [`ProbeBackend`] to arm a breakpoint there; the backend calls
//! [`ProbeConsumer::fire`](crate::target::ProbeConsumer::fire) every time the
//! breakpoint is hit.
//!
//! Backend contract:
//! - `attach` must not call the consumer before it returns successfully.
//! - `detach` must not return while any `fire` for that handle is still
//!   running, and must never call it afterwards.
//! - `fire` runs in trap context: it must be passed a [`ProcessTree`] that
//!   answers without sleeping.

use alloc::vec::Vec;

use axerrno::AxResult;

use crate::target::ProbeConsumer;

#[cfg(feature = "sim")]
pub mod sim;

/// Process ancestry query supplied by the probe subsystem.
pub trait ProcessTree {
    /// Whether `pid` is `ancestor` or one of its descendants.
    fn is_descendant(&self, pid: u32, ancestor: u32) -> bool;
}

/// A mechanism able to trap execution at a file offset of a binary.
pub trait ProbeBackend: ProcessTree + Send + Sync {
    /// An open reference to the binary (inode, file, ...).
    type File;
    /// A live attachment; released through [`ProbeBackend::detach`].
    type Handle: Send;

    /// Look up the binary at `path`.
    fn open(&self, path: &str) -> AxResult<Self::File>;

    /// Read the whole binary for symbol resolution.
    fn read_image(&self, file: &Self::File) -> AxResult<Vec<u8>>;

    /// Arm a probe at `offset` that calls `consumer` on every hit.
    fn attach(&self, file: &Self::File, offset: u64, consumer: ProbeConsumer)
    -> AxResult<Self::Handle>;

    /// Disarm a probe, waiting out in-flight triggers.
    fn detach(&self, handle: Self::Handle);
}
