//! Uniform storage interface over the three backing media

pub mod hex;
mod router;
mod sd;

pub use hex::{ByteLink, HexStream};
pub use router::{RouterStats, StorageRouter};
pub use sd::{CardSocket, FatVolume, SdBackend};

use core::fmt;

use crate::config::FILENAME_LEN;
use crate::error::Result;

/// Identity of a storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// FAT volume on the SD card
    Sd,
    /// Flat filesystem on the SPI NOR chip
    Nor,
    /// Hex-framed stream to a host
    Hex,
    /// Resolve to the best available backend
    Auto,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sd => write!(f, "SD"),
            Self::Nor => write!(f, "NOR"),
            Self::Hex => write!(f, "HEX"),
            Self::Auto => write!(f, "AUTO"),
        }
    }
}

/// A filename in a fixed slot, zero padded
///
/// Valid names are shorter than the slot, so there is always at least
/// one terminating zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileName {
    bytes: [u8; FILENAME_LEN],
}

impl FileName {
    /// Build from raw bytes, truncating to the slot limit
    pub fn from_bytes(src: &[u8]) -> Self {
        let mut bytes = [0u8; FILENAME_LEN];
        let n = core::cmp::min(src.len(), FILENAME_LEN - 1);
        bytes[..n].copy_from_slice(&src[..n]);
        Self { bytes }
    }

    /// Build from a string slice, truncating to the slot limit
    pub fn from_str(name: &str) -> Self {
        Self::from_bytes(name.as_bytes())
    }

    /// Name as a string slice
    pub fn as_str(&self) -> &str {
        let len = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILENAME_LEN);
        core::str::from_utf8(&self.bytes[..len]).unwrap_or("")
    }

    /// True for the all-zero slot
    pub fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router-level filename validation
///
/// Non-empty, strictly shorter than the slot, no control bytes, none
/// of the characters FAT and common hosts reject.
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= FILENAME_LEN {
        return false;
    }
    bytes.iter().all(|&b| {
        b >= 0x20
            && !matches!(
                b,
                b'/' | b'\\' | b':' | b'*' | b'?' | b'"' | b'<' | b'>' | b'|'
            )
    })
}

/// Operations every backing medium provides
///
/// Backends that cannot honor an operation report `Unsupported`
/// rather than pretending; the router never converts an error into a
/// success.
pub trait StorageBackend {
    /// Which backend this is
    fn kind(&self) -> StorageKind;

    /// Short human label for status lines
    fn label(&self) -> &'static str;

    /// True when the medium can accept operations right now
    fn is_ready(&self) -> bool;

    /// Periodic housekeeping: re-probe media, pick up card changes
    fn update(&mut self) -> Result<()>;

    /// Store a whole file, replacing any previous content
    fn write(&mut self, name: &str, data: &[u8]) -> Result<usize>;

    /// Read up to `dst.len()` bytes of a file
    fn read(&mut self, name: &str, dst: &mut [u8]) -> Result<usize>;

    /// Remove a file
    fn delete(&mut self, name: &str) -> Result<()>;

    /// True if the name exists
    fn exists(&mut self, name: &str) -> bool;

    /// Size of a file in bytes
    fn size(&mut self, name: &str) -> Result<u32>;

    /// Fill `out` with existing names; returns how many were written
    fn list(&mut self, out: &mut [FileName]) -> usize;

    /// Re-initialize the medium, where that is meaningful
    fn format(&mut self) -> Result<()>;

    /// (available, total) bytes
    fn space(&self) -> (u32, u32);
}
