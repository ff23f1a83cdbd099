//! Flat filesystem over the NOR chip
//!
//! Sector 0 holds a fixed directory of 32-byte slots; sectors 1..
//! hold file data as contiguous, sector-aligned extents. There are no
//! directories, no renames and no partial overwrite: a file is
//! written once, read whole, and deleted by marking its slot.
//!
//! Each slot stores the file size twice, once complemented, as a
//! cheap corruption guard. Space behind deleted files is reclaimed
//! only by defragmentation or a format; allocation always proceeds
//! from the high-water mark.
//!
//! On-flash slot layout, little-endian, 32 bytes:
//!
//! ```text
//! offset  0..16  name, zero padded
//! offset 16..20  start_sector
//! offset 20..24  size
//! offset 24..28  size_complement (== !size)
//! offset 28      status: 0xFF empty, 0xAA active, 0x55 deleted
//! offset 29..32  zero padding
//! ```

use crate::config::{
    DATA_START_SECTOR, DIRECTORY_SECTOR, FILENAME_LEN, MAX_FILES, PAGE_SIZE, SECTOR_SIZE,
    TOTAL_SECTORS,
};
use crate::error::{ErrorKind, Result};
use crate::nor::bus::SpiBus;
use crate::nor::driver::NorFlash;
use crate::storage::{FileName, StorageBackend, StorageKind};

/// Size of one directory slot on flash
pub const ENTRY_LEN: usize = 32;

/// Slot has never been used since the last format
pub const STATUS_EMPTY: u8 = 0xFF;
/// Slot describes a live file
pub const STATUS_ACTIVE: u8 = 0xAA;
/// Slot's file was deleted; its extent is reclaimable
pub const STATUS_DELETED: u8 = 0x55;

const ENTRIES_PER_PAGE: usize = PAGE_SIZE / ENTRY_LEN;
const DIR_PAGES: usize = MAX_FILES / ENTRIES_PER_PAGE;

/// One directory slot, mirrored in RAM
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    /// File name, zero padded
    pub name: [u8; FILENAME_LEN],
    /// First sector of the extent
    pub start_sector: u32,
    /// File size in bytes
    pub size: u32,
    /// Bitwise complement of `size`
    pub size_complement: u32,
    /// One of the `STATUS_*` values
    pub status: u8,
}

impl DirEntry {
    /// An unused slot
    pub const fn empty() -> Self {
        Self {
            name: [0; FILENAME_LEN],
            start_sector: 0,
            size: 0,
            size_complement: 0,
            status: STATUS_EMPTY,
        }
    }

    /// Serialize to the normative on-flash layout
    pub fn to_bytes(&self) -> [u8; ENTRY_LEN] {
        let mut out = [0u8; ENTRY_LEN];
        out[..FILENAME_LEN].copy_from_slice(&self.name);
        out[16..20].copy_from_slice(&self.start_sector.to_le_bytes());
        out[20..24].copy_from_slice(&self.size.to_le_bytes());
        out[24..28].copy_from_slice(&self.size_complement.to_le_bytes());
        out[28] = self.status;
        out
    }

    /// Deserialize from the on-flash layout
    ///
    /// `raw` must be at least [`ENTRY_LEN`] bytes.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut name = [0u8; FILENAME_LEN];
        name.copy_from_slice(&raw[..FILENAME_LEN]);
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Self {
            name,
            start_sector: word(16),
            size: word(20),
            size_complement: word(24),
            status: raw[28],
        }
    }

    /// Name bytes up to the first zero
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILENAME_LEN);
        &self.name[..len]
    }

    /// Name as UTF-8, or a placeholder if the slot holds garbage
    pub fn name_str(&self) -> &str {
        core::str::from_utf8(self.name_bytes()).unwrap_or("(invalid)")
    }

    /// Sectors the extent occupies
    pub fn sector_count(&self) -> u32 {
        sectors_for(self.size)
    }

    /// Integrity check for an ACTIVE slot: complement, name, bounds
    pub fn is_valid(&self) -> bool {
        self.size ^ self.size_complement == 0xFFFF_FFFF
            && !self.name_bytes().is_empty()
            && self.start_sector >= DATA_START_SECTOR
            && self.start_sector + self.sector_count() <= TOTAL_SECTORS
    }

    fn matches_name(&self, name: &str) -> bool {
        self.status == STATUS_ACTIVE && self.name_bytes().eq_ignore_ascii_case(name.as_bytes())
    }
}

fn sectors_for(size: u32) -> u32 {
    (size + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32
}

/// Flat filesystem state: directory mirror plus allocation high-water
/// mark
pub struct FlatFs<B> {
    flash: NorFlash<B>,
    dir: [DirEntry; MAX_FILES],
    next_free_sector: u32,
    active_count: u32,
    deleted_count: u32,
    mounted: bool,
    /// Mirror differs from the medium (mount demoted a bad slot)
    dirty: bool,
    page_buf: [u8; PAGE_SIZE],
}

impl<B: SpiBus> FlatFs<B> {
    /// Wrap a flash driver; nothing is touched until `mount`
    pub fn new(flash: NorFlash<B>) -> Self {
        Self {
            flash,
            dir: [DirEntry::empty(); MAX_FILES],
            next_free_sector: DATA_START_SECTOR,
            active_count: 0,
            deleted_count: 0,
            mounted: false,
            dirty: false,
            page_buf: [0; PAGE_SIZE],
        }
    }

    /// Probe the chip and load the directory into RAM
    ///
    /// ACTIVE slots failing the integrity check are demoted to
    /// DELETED in the mirror only; `fsck` writes the repairs back.
    /// Fails with `NotReady` when no chip answers and `IoError` when
    /// the directory sector cannot be read.
    pub fn mount(&mut self) -> Result<()> {
        let id = self.flash.probe()?;
        if !id.is_present() {
            self.mounted = false;
            return Err(ErrorKind::NotReady);
        }

        for page in 0..DIR_PAGES {
            self.flash
                .read((page * PAGE_SIZE) as u32, &mut self.page_buf)?;
            for i in 0..ENTRIES_PER_PAGE {
                let off = i * ENTRY_LEN;
                self.dir[page * ENTRIES_PER_PAGE + i] =
                    DirEntry::from_bytes(&self.page_buf[off..off + ENTRY_LEN]);
            }
        }

        self.active_count = 0;
        self.deleted_count = 0;
        self.next_free_sector = DATA_START_SECTOR;
        self.dirty = false;

        for entry in self.dir.iter_mut() {
            match entry.status {
                STATUS_ACTIVE => {
                    if entry.is_valid() {
                        self.active_count += 1;
                        let end = entry.start_sector + entry.sector_count();
                        if end > self.next_free_sector {
                            self.next_free_sector = end;
                        }
                    } else {
                        log::warn!("demoting corrupt slot '{}'", entry.name_str());
                        entry.status = STATUS_DELETED;
                        self.deleted_count += 1;
                        self.dirty = true;
                    }
                }
                STATUS_DELETED => self.deleted_count += 1,
                _ => {}
            }
        }

        self.mounted = true;
        log::info!(
            "flatfs mounted: {} files, {} deleted, next free sector {}",
            self.active_count,
            self.deleted_count,
            self.next_free_sector
        );
        Ok(())
    }

    /// Erase the directory sector and start empty
    ///
    /// Data sectors are left alone; they are erased again right
    /// before reuse.
    pub fn format(&mut self) -> Result<()> {
        self.flash.erase_sector(DIRECTORY_SECTOR)?;
        // An erased sector reads back as all-EMPTY slots, so no
        // program pass is needed.
        self.dir = [DirEntry::empty(); MAX_FILES];
        self.next_free_sector = DATA_START_SECTOR;
        self.active_count = 0;
        self.deleted_count = 0;
        self.dirty = false;
        self.mounted = true;
        log::info!("flatfs formatted");
        Ok(())
    }

    /// Write a whole file in one call
    ///
    /// An existing file of the same name (case-insensitive) is
    /// deleted first. Returns the number of bytes written.
    pub fn create_write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        if !self.mounted {
            return Err(ErrorKind::NotReady);
        }
        let name_bytes = name.as_bytes();
        if name_bytes.is_empty() || name_bytes.len() >= FILENAME_LEN {
            return Err(ErrorKind::InvalidName);
        }

        if self.find(name).is_some() {
            self.delete(name)?;
        }

        let slot = match self.dir.iter().position(|e| e.status != STATUS_ACTIVE) {
            Some(i) => i,
            None => {
                log::warn!("directory full");
                return Err(ErrorKind::NoSpace);
            }
        };

        let sectors = sectors_for(data.len() as u32);
        if self.next_free_sector + sectors > TOTAL_SECTORS {
            if !self.defragment() || self.next_free_sector + sectors > TOTAL_SECTORS {
                return Err(ErrorKind::NoSpace);
            }
        }

        let start = self.next_free_sector;
        self.next_free_sector += sectors;

        if let Err(e) = self.write_extent(start, data) {
            log::warn!("extent write failed: {}", e);
            self.next_free_sector = start;
            return Err(ErrorKind::IoError);
        }

        let mut entry = DirEntry::empty();
        entry.name[..name_bytes.len()].copy_from_slice(name_bytes);
        entry.start_sector = start;
        entry.size = data.len() as u32;
        entry.size_complement = !(data.len() as u32);
        entry.status = STATUS_ACTIVE;
        self.dir[slot] = entry;

        if let Err(e) = self.save_directory() {
            log::warn!("directory update failed: {}", e);
            self.dir[slot] = DirEntry::empty();
            self.next_free_sector = start;
            return Err(ErrorKind::IoError);
        }

        self.active_count += 1;
        log::debug!("wrote '{}' ({} bytes) at sector {}", name, data.len(), start);
        Ok(data.len())
    }

    /// Read up to `dst.len()` bytes of a file
    pub fn read(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        if !self.mounted {
            return Err(ErrorKind::NotReady);
        }
        let entry = match self.find(name) {
            Some(i) => self.dir[i],
            None => return Err(ErrorKind::NotFound),
        };
        // The mirror was validated at mount; a slot failing here went
        // bad in RAM afterwards.
        if !entry.is_valid() {
            log::warn!("slot for '{}' failed its integrity check", name);
            return Err(ErrorKind::Corruption);
        }
        let n = core::cmp::min(entry.size as usize, dst.len());
        if n > 0 {
            self.flash
                .read(entry.start_sector * SECTOR_SIZE as u32, &mut dst[..n])?;
        }
        Ok(n)
    }

    /// Mark a file deleted and persist the directory
    ///
    /// The extent is not erased; its space comes back only through
    /// defragmentation or a format.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if !self.mounted {
            return Err(ErrorKind::NotReady);
        }
        let slot = match self.find(name) {
            Some(i) => i,
            None => return Err(ErrorKind::NotFound),
        };
        self.dir[slot].status = STATUS_DELETED;
        if let Err(e) = self.save_directory() {
            self.dir[slot].status = STATUS_ACTIVE;
            return Err(e);
        }
        self.active_count = self.active_count.saturating_sub(1);
        self.deleted_count += 1;
        log::debug!("deleted '{}'", name);
        Ok(())
    }

    /// True if an ACTIVE file of this name exists (case-insensitive)
    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Size of a file in bytes
    pub fn size(&self, name: &str) -> Result<u32> {
        match self.find(name) {
            Some(i) => Ok(self.dir[i].size),
            None => Err(ErrorKind::NotFound),
        }
    }

    /// Fill `out` with the names of ACTIVE files, in slot order
    pub fn list(&self, out: &mut [FileName]) -> usize {
        let mut n = 0;
        for entry in self.dir.iter() {
            if n == out.len() {
                break;
            }
            if entry.status == STATUS_ACTIVE {
                out[n] = FileName::from_bytes(entry.name_bytes());
                n += 1;
            }
        }
        n
    }

    /// Re-run the mount-time integrity check over the mirror
    ///
    /// Demotes invalid ACTIVE slots and persists the directory if the
    /// mirror differs from the medium. Returns true when no repair
    /// was needed.
    pub fn fsck(&mut self) -> bool {
        if !self.mounted {
            return false;
        }
        let mut changed = self.dirty;
        for entry in self.dir.iter_mut() {
            if entry.status == STATUS_ACTIVE && !entry.is_valid() {
                log::warn!("fsck: demoting corrupt slot '{}'", entry.name_str());
                entry.status = STATUS_DELETED;
                self.active_count = self.active_count.saturating_sub(1);
                self.deleted_count += 1;
                changed = true;
            }
        }
        if changed {
            if self.save_directory().is_ok() {
                self.dirty = false;
            }
        }
        !changed
    }

    /// Compact ACTIVE extents toward low sectors
    ///
    /// Not implemented; allocation simply fails with `NoSpace` once
    /// the tail is exhausted.
    pub fn defragment(&mut self) -> bool {
        log::debug!("defragmentation not implemented");
        false
    }

    /// (available, total) data bytes
    pub fn space(&self) -> (u32, u32) {
        let free_sectors = TOTAL_SECTORS.saturating_sub(self.next_free_sector);
        (
            free_sectors * SECTOR_SIZE as u32,
            (TOTAL_SECTORS - 1) * SECTOR_SIZE as u32,
        )
    }

    /// Live and deleted slot counts
    pub fn counts(&self) -> (u32, u32) {
        (self.active_count, self.deleted_count)
    }

    /// Whether `mount` or `format` has succeeded
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// The directory mirror, for diagnostics
    pub fn entries(&self) -> &[DirEntry] {
        &self.dir
    }

    /// Direct access to the underlying driver
    pub fn flash_mut(&mut self) -> &mut NorFlash<B> {
        &mut self.flash
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.dir.iter().position(|e| e.matches_name(name))
    }

    /// Erase each sector of the extent just before its pages are
    /// programmed.
    fn write_extent(&mut self, start: u32, data: &[u8]) -> Result<()> {
        let sectors = sectors_for(data.len() as u32);
        for s in 0..sectors {
            self.flash.erase_sector(start + s)?;
            let base = s as usize * SECTOR_SIZE;
            let end = core::cmp::min(base + SECTOR_SIZE, data.len());
            let mut off = base;
            while off < end {
                let chunk = core::cmp::min(PAGE_SIZE, end - off);
                let addr = (start + s) * SECTOR_SIZE as u32 + (off - base) as u32;
                self.flash.write_page(addr, &data[off..off + chunk])?;
                off += chunk;
            }
        }
        Ok(())
    }

    fn save_directory(&mut self) -> Result<()> {
        self.flash.erase_sector(DIRECTORY_SECTOR)?;
        for page in 0..DIR_PAGES {
            for i in 0..ENTRIES_PER_PAGE {
                let off = i * ENTRY_LEN;
                let bytes = self.dir[page * ENTRIES_PER_PAGE + i].to_bytes();
                self.page_buf[off..off + ENTRY_LEN].copy_from_slice(&bytes);
            }
            self.flash
                .write_page((page * PAGE_SIZE) as u32, &self.page_buf)?;
        }
        Ok(())
    }
}

impl<B: SpiBus> StorageBackend for FlatFs<B> {
    fn kind(&self) -> StorageKind {
        StorageKind::Nor
    }

    fn label(&self) -> &'static str {
        "NOR"
    }

    fn is_ready(&self) -> bool {
        self.mounted
    }

    fn update(&mut self) -> Result<()> {
        if !self.mounted {
            match self.mount() {
                Ok(()) => {}
                // No chip fitted; nothing to report.
                Err(ErrorKind::NotReady) => {}
                Err(e) => {
                    log::warn!("mount failed ({}), formatting", e);
                    self.format()?;
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        self.create_write(name, data)
    }

    fn read(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        FlatFs::read(self, name, dst)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        FlatFs::delete(self, name)
    }

    fn exists(&mut self, name: &str) -> bool {
        FlatFs::exists(self, name)
    }

    fn size(&mut self, name: &str) -> Result<u32> {
        FlatFs::size(self, name)
    }

    fn list(&mut self, out: &mut [FileName]) -> usize {
        FlatFs::list(self, out)
    }

    fn format(&mut self) -> Result<()> {
        FlatFs::format(self)
    }

    fn space(&self) -> (u32, u32) {
        FlatFs::space(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_roundtrips_through_flash_layout() {
        let mut entry = DirEntry::empty();
        entry.name[..8].copy_from_slice(b"wave.bin");
        entry.start_sector = 17;
        entry.size = 5000;
        entry.size_complement = !5000u32;
        entry.status = STATUS_ACTIVE;

        let raw = entry.to_bytes();
        let back = DirEntry::from_bytes(&raw);
        assert_eq!(back.name_bytes(), b"wave.bin");
        assert_eq!(back.start_sector, 17);
        assert_eq!(back.size, 5000);
        assert_eq!(back.size_complement, !5000u32);
        assert_eq!(back.status, STATUS_ACTIVE);
    }

    #[test]
    fn entry_layout_is_normative() {
        let mut entry = DirEntry::empty();
        entry.name[..4].copy_from_slice(b"a.db");
        entry.start_sector = 0x0102_0304;
        entry.size = 0x1122_3344;
        entry.size_complement = !0x1122_3344u32;
        entry.status = STATUS_ACTIVE;

        let raw = entry.to_bytes();
        assert_eq!(&raw[..4], b"a.db");
        assert!(raw[4..16].iter().all(|&b| b == 0));
        // Little-endian words at fixed offsets.
        assert_eq!(&raw[16..20], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&raw[20..24], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(&raw[24..28], &[0xBB, 0xCC, 0xDD, 0xEE]);
        assert_eq!(raw[28], 0xAA);
        assert_eq!(&raw[29..32], &[0, 0, 0]);
    }

    #[test]
    fn complement_check_rejects_mismatch() {
        let mut entry = DirEntry::empty();
        entry.name[..1].copy_from_slice(b"x");
        entry.start_sector = DATA_START_SECTOR;
        entry.size = 100;
        entry.size_complement = !100u32;
        entry.status = STATUS_ACTIVE;
        assert!(entry.is_valid());

        entry.size_complement ^= 1;
        assert!(!entry.is_valid());
    }

    #[test]
    fn bounds_check_rejects_overhang() {
        let mut entry = DirEntry::empty();
        entry.name[..1].copy_from_slice(b"x");
        entry.size = 2 * SECTOR_SIZE as u32;
        entry.size_complement = !entry.size;
        entry.status = STATUS_ACTIVE;

        entry.start_sector = TOTAL_SECTORS - 2;
        assert!(entry.is_valid());
        entry.start_sector = TOTAL_SECTORS - 1;
        assert!(!entry.is_valid());
        entry.start_sector = 0;
        assert!(!entry.is_valid());
    }

    #[test]
    fn sector_math_rounds_up() {
        assert_eq!(sectors_for(0), 0);
        assert_eq!(sectors_for(1), 1);
        assert_eq!(sectors_for(SECTOR_SIZE as u32), 1);
        assert_eq!(sectors_for(SECTOR_SIZE as u32 + 1), 2);
        assert_eq!(sectors_for(16 * 1024 * 1024), 4096);
    }
}
