//! Error types shared by every storage backend and driver
//!
//! The error type is a flat, `Copy` enum so it can cross the boundary
//! between drivers, backends, the router and the run loop without any
//! allocation.

use core::fmt;

/// Failure kinds reported by drivers, backends and the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Selected backend is not usable right now
    NotReady,
    /// Name does not exist on the backend
    NotFound,
    /// Backend forbids overwriting an existing name
    AlreadyExists,
    /// Name fails router validation
    InvalidName,
    /// Allocation (sectors or FAT clusters) cannot be met
    NoSpace,
    /// Medium reported a read/write failure
    IoError,
    /// Blocking operation exceeded its explicit budget
    Timeout,
    /// Integrity check failed (size complement, bounds)
    Corruption,
    /// A concurrent operation is already in progress
    Busy,
    /// Operation is not meaningful on this backend
    Unsupported,
    /// Caller's buffer cannot hold the value
    BufferTooSmall,
    /// Framing, timing or signaling violation on the wire
    ProtocolError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "backend not ready"),
            Self::NotFound => write!(f, "file not found"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::InvalidName => write!(f, "invalid filename"),
            Self::NoSpace => write!(f, "no space available"),
            Self::IoError => write!(f, "I/O error"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Corruption => write!(f, "integrity check failed"),
            Self::Busy => write!(f, "operation already in progress"),
            Self::Unsupported => write!(f, "operation not supported"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::ProtocolError => write!(f, "protocol violation"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}

/// Result type alias using [`ErrorKind`]
pub type Result<T> = core::result::Result<T, ErrorKind>;
