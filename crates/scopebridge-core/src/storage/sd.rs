//! SD card backend: a FAT library behind a socket with presence and
//! write-protect switches
//!
//! The FAT implementation itself lives behind [`FatVolume`]; this
//! backend folds the card-detect and write-protect lines into
//! readiness and re-probes the socket once per `update` tick. Card
//! changes are therefore noticed between operations, never during
//! one.

use crate::error::{ErrorKind, Result};
use crate::storage::{FileName, StorageBackend, StorageKind};

/// The backing FAT16/FAT32 library
///
/// Only root-directory access is required; the bridge never creates
/// subdirectories.
pub trait FatVolume {
    /// Mount the volume; fails if no usable filesystem is found
    fn mount(&mut self) -> Result<()>;

    /// Drop the mount state after the card goes away
    fn unmount(&mut self);

    /// True while mounted
    fn is_mounted(&self) -> bool;

    /// Create or replace a file in the root directory
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<usize>;

    /// Read up to `dst.len()` bytes of a file
    fn read_file(&mut self, name: &str, dst: &mut [u8]) -> Result<usize>;

    /// Remove a file
    fn delete_file(&mut self, name: &str) -> Result<()>;

    /// True if the file exists in the root directory
    fn file_exists(&mut self, name: &str) -> bool;

    /// File size in bytes
    fn file_size(&mut self, name: &str) -> Result<u32>;

    /// Enumerate root-directory entries into `out`
    fn list_root(&mut self, out: &mut [FileName]) -> usize;

    /// (available, total) bytes on the volume
    fn space(&self) -> (u32, u32);
}

/// Card-detect and write-protect switches on the SD socket
pub trait CardSocket {
    /// True while a card is seated (detect line is active low at the
    /// pin; implementations report the folded boolean)
    fn card_present(&mut self) -> bool;

    /// True while the write-protect tab is set
    fn write_protected(&mut self) -> bool;
}

/// SD storage backend
pub struct SdBackend<V, S> {
    volume: V,
    socket: S,
    card_present: bool,
    write_protected: bool,
}

impl<V: FatVolume, S: CardSocket> SdBackend<V, S> {
    /// Wrap a volume and its socket; the first `update` tick probes
    /// the hardware
    pub fn new(volume: V, socket: S) -> Self {
        Self {
            volume,
            socket,
            card_present: false,
            write_protected: false,
        }
    }

    /// Last probed write-protect state
    pub fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    /// Last probed card presence
    pub fn is_card_present(&self) -> bool {
        self.card_present
    }
}

impl<V: FatVolume, S: CardSocket> StorageBackend for SdBackend<V, S> {
    fn kind(&self) -> StorageKind {
        StorageKind::Sd
    }

    fn label(&self) -> &'static str {
        "SD"
    }

    fn is_ready(&self) -> bool {
        self.volume.is_mounted() && self.card_present && !self.write_protected
    }

    fn update(&mut self) -> Result<()> {
        let present = self.socket.card_present();
        self.write_protected = self.socket.write_protected();

        if present && !self.card_present {
            log::info!("SD card inserted");
        }
        if !present && self.card_present {
            log::info!("SD card removed");
            self.volume.unmount();
        }
        self.card_present = present;

        if present && !self.volume.is_mounted() {
            if let Err(e) = self.volume.mount() {
                log::warn!("SD mount failed: {}", e);
            }
        }
        Ok(())
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        if !self.is_ready() {
            return Err(ErrorKind::NotReady);
        }
        self.volume.write_file(name, data)
    }

    fn read(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        if !self.volume.is_mounted() || !self.card_present {
            return Err(ErrorKind::NotReady);
        }
        self.volume.read_file(name, dst)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(ErrorKind::NotReady);
        }
        self.volume.delete_file(name)
    }

    fn exists(&mut self, name: &str) -> bool {
        self.volume.is_mounted() && self.card_present && self.volume.file_exists(name)
    }

    fn size(&mut self, name: &str) -> Result<u32> {
        if !self.volume.is_mounted() || !self.card_present {
            return Err(ErrorKind::NotReady);
        }
        self.volume.file_size(name)
    }

    fn list(&mut self, out: &mut [FileName]) -> usize {
        if !self.volume.is_mounted() || !self.card_present {
            return 0;
        }
        self.volume.list_root(out)
    }

    /// Formatting a card in the field is refused; use a host.
    fn format(&mut self) -> Result<()> {
        Err(ErrorKind::Unsupported)
    }

    fn space(&self) -> (u32, u32) {
        if !self.volume.is_mounted() {
            return (0, 0);
        }
        self.volume.space()
    }
}
