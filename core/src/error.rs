//! Internal error taxonomy and its mapping to POSIX errno values.
//!
//! Grounded on the envelope described in spec.md §7. The teacher repo
//! (`AlexFerroni02-rust-remote-fs`) propagates raw `reqwest::Error` up to
//! the FUSE layer and maps everything to `EIO`; this core instead keeps
//! the richer taxonomy the spec calls for so that callers can distinguish
//! transient-and-retryable failures from permanent ones.

use thiserror::Error;

/// One kind of failure the core can produce, independent of how it is
/// eventually reported to the kernel.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An RPC failed with a status the backend identifies as recoverable
    /// by reconnecting (`Backend::is_read_msg_error`).
    #[error("transient wire error")]
    TransientWire,

    /// The backend reports the object does not exist.
    #[error("not found")]
    NotFound,

    /// A collection removal was attempted on a non-empty collection.
    #[error("not empty")]
    NotEmpty,

    /// The pool could not produce a usable connection after one retry.
    #[error("could not acquire a connection")]
    AcquireFailure,

    /// A path helper was given a buffer too small to hold its output.
    #[error("buffer too small")]
    BufferTooSmall,

    /// The RPC returned a status whose low bits encode a POSIX errno.
    #[error("backend errno {0}")]
    BackendErrno(i32),

    /// Authentication failure or malformed configuration. Startup only.
    #[error("fatal: {0}")]
    Fatal(String),

    /// An `ioctl` command number this core does not recognize.
    #[error("invalid argument")]
    InvalidArgument,
}

impl CoreError {
    /// Maps this error to a negative POSIX errno, the return convention
    /// used throughout the FS operation layer (spec.md §6).
    pub fn to_errno(&self) -> i32 {
        match self {
            CoreError::TransientWire => -libc::ENOENT,
            CoreError::NotFound => -libc::ENOENT,
            CoreError::NotEmpty => -libc::ENOTEMPTY,
            CoreError::AcquireFailure => -libc::EIO,
            CoreError::BufferTooSmall => -libc::ENOBUFS,
            CoreError::BackendErrno(code) => -code.abs(),
            CoreError::Fatal(_) => -libc::EIO,
            CoreError::InvalidArgument => -libc::EINVAL,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
