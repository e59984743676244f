//! Error taxonomy shared by the parser, registry and control plane.
//!
//! Every error maps to a Linux errno so protocol clients can tell the
//! failures apart.

use axerrno::{AxError, LinuxError};

use crate::elf::ResolveError;

/// Errors reported to the issuer of a control-plane operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed command, bad symbol start character, non-absolute path.
    #[error("invalid format")]
    InvalidArgument,
    /// Path or symbol exceeds its bound.
    #[error("path or symbol name too long")]
    NameTooLong,
    /// Delay exceeds the configured maximum.
    #[error("delay value out of range")]
    OutOfRange,
    /// No such target.
    #[error("target not found")]
    NotFound,
    /// A target with the same path and symbol is already registered.
    #[error("target already exists")]
    AlreadyExists,
    /// The registry is full.
    #[error("maximum target limit reached")]
    CapacityExceeded,
    /// The symbol could not be turned into an attach offset.
    #[error("symbol resolution failed: {0}")]
    ResolutionFailed(ResolveError),
    /// The file exists but is not a 64-bit ELF image.
    #[error("not a valid ELF file: {0}")]
    NotExecutable(ResolveError),
    /// The probe backend refused to open or attach.
    #[error("attach failed: {0:?}")]
    AttachFailed(AxError),
    /// Endpoint does not support the requested access mode.
    #[error("permission denied")]
    PermissionDenied,
}

impl Error {
    /// The errno surfaced to the caller.
    pub fn errno(&self) -> LinuxError {
        match self {
            Self::InvalidArgument => LinuxError::EINVAL,
            Self::NameTooLong => LinuxError::ENAMETOOLONG,
            Self::OutOfRange => LinuxError::ERANGE,
            Self::NotFound | Self::ResolutionFailed(_) => LinuxError::ENOENT,
            Self::AlreadyExists => LinuxError::EEXIST,
            Self::CapacityExceeded => LinuxError::ENOSPC,
            Self::NotExecutable(_) => LinuxError::ENOEXEC,
            Self::AttachFailed(err) => backend_errno(*err),
            Self::PermissionDenied => LinuxError::EACCES,
        }
    }

    /// Negative errno, as returned from a failed control-file write.
    pub fn code(&self) -> i32 {
        -self.errno().code()
    }
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        if err.is_format_error() {
            Self::NotExecutable(err)
        } else {
            Self::ResolutionFailed(err)
        }
    }
}

fn backend_errno(err: AxError) -> LinuxError {
    match err {
        AxError::NotFound => LinuxError::ENOENT,
        AxError::PermissionDenied => LinuxError::EACCES,
        AxError::InvalidInput => LinuxError::EINVAL,
        AxError::InvalidData => LinuxError::ENOEXEC,
        AxError::NoMemory => LinuxError::ENOMEM,
        AxError::ResourceBusy => LinuxError::EBUSY,
        AxError::AlreadyExists => LinuxError::EEXIST,
        AxError::Unsupported => LinuxError::ENOSYS,
        _ => LinuxError::EIO,
    }
}
