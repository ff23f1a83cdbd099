//! Host-side error type

use thiserror::Error;

/// Errors the companion tool reports
#[derive(Debug, Error)]
pub enum HostError {
    /// Local filesystem or stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port failure
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Failure reported by the device-side protocol code
    #[error("device error: {0}")]
    Device(#[from] scopebridge_core::ErrorKind),

    /// Malformed or unexpected framing
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, HostError>;
