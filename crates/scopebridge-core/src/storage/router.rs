//! Uniform file operations over the three backends
//!
//! The router owns one backend of each kind statically and dispatches
//! on the selected [`StorageKind`]; the only indirection is a
//! `&mut dyn StorageBackend` borrowed for the length of one call.
//!
//! Selection policy: `Auto` resolves SD, then NOR, then HEX, with SD
//! as the stable default when nothing is ready. A manual selection
//! sticks until its backend goes not-ready, at which point the router
//! falls back to the auto policy. Re-evaluation happens only when the
//! current backend drops, so a re-inserted card does not disturb a
//! running capture.

use core::fmt::Write as _;

use crate::config::{FILENAME_LEN, TRANSFER_BUF_LEN};
use crate::error::{ErrorKind, Result};
use crate::storage::{is_valid_name, FileName, StorageBackend, StorageKind};

/// Running totals kept by the router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Files successfully written
    pub files_written: u32,
    /// Bytes successfully written
    pub bytes_written: u32,
    /// Files successfully read
    pub files_read: u32,
    /// Bytes successfully read
    pub bytes_read: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Auto,
    Manual(StorageKind),
}

/// Storage router over SD, NOR and HEX backends
pub struct StorageRouter<SD, NOR, HEX> {
    sd: SD,
    nor: NOR,
    hex: HEX,
    selection: Selection,
    selected: StorageKind,
    stats: RouterStats,
    name_counter: u16,
    transfer_buf: [u8; TRANSFER_BUF_LEN],
}

impl<SD, NOR, HEX> StorageRouter<SD, NOR, HEX>
where
    SD: StorageBackend,
    NOR: StorageBackend,
    HEX: StorageBackend,
{
    /// Take ownership of the three backends; selection starts in auto
    /// mode with SD as the stable default
    pub fn new(sd: SD, nor: NOR, hex: HEX) -> Self {
        Self {
            sd,
            nor,
            hex,
            selection: Selection::Auto,
            selected: StorageKind::Sd,
            stats: RouterStats::default(),
            name_counter: 0,
            transfer_buf: [0; TRANSFER_BUF_LEN],
        }
    }

    /// Tick every backend and maintain the selection
    ///
    /// Backend errors are reported to the caller but never stop the
    /// remaining backends from being ticked.
    pub fn update(&mut self) -> Result<()> {
        let mut result = Ok(());
        for kind in [StorageKind::Sd, StorageKind::Nor, StorageKind::Hex] {
            if let Err(e) = self.backend_mut(kind).update() {
                log::warn!("{} update failed: {}", kind, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if !self.backend_mut(self.selected).is_ready() {
            if let Selection::Manual(kind) = self.selection {
                log::info!("{} went away, reverting to auto selection", kind);
                self.selection = Selection::Auto;
            }
            let next = self.resolve_auto();
            if next != self.selected {
                log::info!("storage fail-over: {} -> {}", self.selected, next);
                self.selected = next;
            }
        }
        result
    }

    /// Select a backend, or return to auto policy
    ///
    /// A concrete kind succeeds only if that backend is ready.
    pub fn select(&mut self, kind: StorageKind) -> bool {
        match kind {
            StorageKind::Auto => {
                self.selection = Selection::Auto;
                self.selected = self.resolve_auto();
                true
            }
            concrete => {
                if self.backend_mut(concrete).is_ready() {
                    self.selection = Selection::Manual(concrete);
                    self.selected = concrete;
                    true
                } else {
                    log::warn!("cannot select {}: not ready", concrete);
                    false
                }
            }
        }
    }

    /// The concrete backend operations go to right now
    pub fn selected(&self) -> StorageKind {
        self.selected
    }

    /// Write a whole file to the selected backend
    ///
    /// If the selected backend dropped out since the last tick the
    /// auto policy runs once; `NotReady` comes back only when nothing
    /// usable remains.
    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        if !is_valid_name(name) {
            return Err(ErrorKind::InvalidName);
        }
        if !self.backend_mut(self.selected).is_ready() {
            let next = self.resolve_auto();
            if !self.backend_mut(next).is_ready() {
                return Err(ErrorKind::NotReady);
            }
            log::info!("storage fail-over on write: {} -> {}", self.selected, next);
            self.selection = Selection::Auto;
            self.selected = next;
        }
        let written = self.backend_mut(self.selected).write(name, data)?;
        self.stats.files_written += 1;
        self.stats.bytes_written = self.stats.bytes_written.wrapping_add(written as u32);
        Ok(written)
    }

    /// Write under a generated `{prefix}_{counter:04}{ext}` name
    ///
    /// The counter is process-local and strictly increasing. The
    /// generated name is reported through `out_name` when given.
    pub fn write_auto(
        &mut self,
        prefix: &str,
        ext: &str,
        data: &[u8],
        out_name: Option<&mut FileName>,
    ) -> Result<usize> {
        let name = self.generate_name(prefix, ext)?;
        if let Some(out) = out_name {
            *out = name;
        }
        self.write(name.as_str(), data)
    }

    /// Read a file from the selected backend
    pub fn read(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        if !is_valid_name(name) {
            return Err(ErrorKind::InvalidName);
        }
        if !self.backend_mut(self.selected).is_ready() {
            return Err(ErrorKind::NotReady);
        }
        let n = self.backend_mut(self.selected).read(name, dst)?;
        self.stats.files_read += 1;
        self.stats.bytes_read = self.stats.bytes_read.wrapping_add(n as u32);
        Ok(n)
    }

    /// True if `name` exists on the selected backend
    pub fn exists(&mut self, name: &str) -> bool {
        self.backend_mut(self.selected).exists(name)
    }

    /// Size of `name` on the selected backend
    pub fn size(&mut self, name: &str) -> Result<u32> {
        self.backend_mut(self.selected).size(name)
    }

    /// List the selected backend into `out`
    pub fn list(&mut self, out: &mut [FileName]) -> usize {
        self.backend_mut(self.selected).list(out)
    }

    /// Delete `name` on the selected backend
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if !is_valid_name(name) {
            return Err(ErrorKind::InvalidName);
        }
        self.backend_mut(self.selected).delete(name)
    }

    /// Format the selected backend
    pub fn format(&mut self) -> Result<()> {
        self.backend_mut(self.selected).format()
    }

    /// Copy a file between two concrete backends
    ///
    /// The content streams through the router's fixed transfer
    /// buffer; a source larger than the buffer is rejected with
    /// `BufferTooSmall` since the flat filesystem cannot append.
    pub fn copy(&mut self, name: &str, from: StorageKind, to: StorageKind) -> Result<()> {
        if !is_valid_name(name) {
            return Err(ErrorKind::InvalidName);
        }
        if from == to || from == StorageKind::Auto || to == StorageKind::Auto {
            return Err(ErrorKind::Unsupported);
        }

        let Self {
            sd,
            nor,
            hex,
            transfer_buf,
            ..
        } = self;

        let len = {
            let src: &mut dyn StorageBackend = match from {
                StorageKind::Sd => &mut *sd,
                StorageKind::Nor => &mut *nor,
                StorageKind::Hex => &mut *hex,
                StorageKind::Auto => unreachable!(),
            };
            if !src.is_ready() {
                return Err(ErrorKind::NotReady);
            }
            if !src.exists(name) {
                return Err(ErrorKind::NotFound);
            }
            let size = src.size(name)?;
            if size as usize > transfer_buf.len() {
                log::warn!("copy of '{}' ({} bytes) exceeds transfer buffer", name, size);
                return Err(ErrorKind::BufferTooSmall);
            }
            src.read(name, &mut transfer_buf[..size as usize])?
        };

        let dst: &mut dyn StorageBackend = match to {
            StorageKind::Sd => &mut *sd,
            StorageKind::Nor => &mut *nor,
            StorageKind::Hex => &mut *hex,
            StorageKind::Auto => unreachable!(),
        };
        if !dst.is_ready() {
            return Err(ErrorKind::NotReady);
        }
        let written = dst.write(name, &transfer_buf[..len])?;
        if written != len {
            return Err(ErrorKind::IoError);
        }
        log::debug!("copied '{}' ({} bytes): {} -> {}", name, len, from, to);
        Ok(())
    }

    /// (available, total) bytes on the selected backend
    pub fn space(&self) -> (u32, u32) {
        self.backend_ref(self.selected).space()
    }

    /// Round-trip a canned 32-byte pattern through the selected
    /// backend; true only on byte-for-byte equality
    pub fn test_write(&mut self) -> bool {
        const TEST_NAME: &str = "test.dat";
        let mut pattern = [0u8; 32];
        for (i, byte) in pattern.iter_mut().enumerate() {
            *byte = 0xA5u8.wrapping_add(i as u8);
        }

        let ok = match self.write(TEST_NAME, &pattern) {
            Ok(n) if n == pattern.len() => {
                let mut readback = [0u8; 32];
                matches!(self.read(TEST_NAME, &mut readback), Ok(n) if n == pattern.len())
                    && readback == pattern
            }
            _ => false,
        };
        let _ = self.delete(TEST_NAME);
        log::debug!("storage self-test: {}", if ok { "pass" } else { "FAIL" });
        ok
    }

    /// Running totals
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Zero the running totals
    pub fn reset_stats(&mut self) {
        self.stats = RouterStats::default();
    }

    /// Borrow a specific backend, bypassing selection
    pub fn backend_mut(&mut self, kind: StorageKind) -> &mut dyn StorageBackend {
        match kind {
            StorageKind::Sd => &mut self.sd,
            StorageKind::Nor => &mut self.nor,
            StorageKind::Hex => &mut self.hex,
            StorageKind::Auto => self.backend_mut(self.selected),
        }
    }

    fn backend_ref(&self, kind: StorageKind) -> &dyn StorageBackend {
        match kind {
            StorageKind::Sd => &self.sd,
            StorageKind::Nor => &self.nor,
            StorageKind::Hex => &self.hex,
            StorageKind::Auto => self.backend_ref(self.selected),
        }
    }

    fn resolve_auto(&mut self) -> StorageKind {
        if self.sd.is_ready() {
            StorageKind::Sd
        } else if self.nor.is_ready() {
            StorageKind::Nor
        } else if self.hex.is_ready() {
            StorageKind::Hex
        } else {
            StorageKind::Sd
        }
    }

    fn generate_name(&mut self, prefix: &str, ext: &str) -> Result<FileName> {
        // Counter width plus separator: "_NNNN".
        if prefix.len() + 5 + ext.len() >= FILENAME_LEN {
            return Err(ErrorKind::InvalidName);
        }
        self.name_counter = self.name_counter.wrapping_add(1);

        let mut writer = NameWriter::default();
        let _ = write!(writer, "{}_{:04}{}", prefix, self.name_counter, ext);
        let name = FileName::from_bytes(writer.as_bytes());
        if !is_valid_name(name.as_str()) {
            return Err(ErrorKind::InvalidName);
        }
        Ok(name)
    }
}

#[derive(Default)]
struct NameWriter {
    buf: [u8; FILENAME_LEN],
    len: usize,
}

impl NameWriter {
    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl core::fmt::Write for NameWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let room = self.buf.len() - self.len;
        let n = core::cmp::min(room, s.len());
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        if n < s.len() {
            Err(core::fmt::Error)
        } else {
            Ok(())
        }
    }
}
