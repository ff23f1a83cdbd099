//! Ejectable SD card with an in-memory FAT root directory
//!
//! Implements both seams of the SD backend: the FAT library and the
//! socket switches. Pass the same handle (cloned) for both. File
//! names compare case-insensitively, as they do on a FAT volume.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use scopebridge_core::error::{ErrorKind, Result};
use scopebridge_core::storage::{CardSocket, FatVolume, FileName};

const CARD_BYTES: u32 = 2 * 1024 * 1024;

struct CardState {
    /// Keyed by lower-cased name; value keeps the original name
    files: BTreeMap<String, (String, Vec<u8>)>,
    mounted: bool,
    present: bool,
    write_protected: bool,
    fail_mount: bool,
}

/// Cloneable handle to a simulated SD card
#[derive(Clone)]
pub struct SimCard {
    state: Rc<RefCell<CardState>>,
}

impl Default for SimCard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCard {
    /// A seated, writable, empty card
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(CardState {
                files: BTreeMap::new(),
                mounted: false,
                present: true,
                write_protected: false,
                fail_mount: false,
            })),
        }
    }

    /// Pull the card out of the socket
    pub fn eject(&self) {
        self.state.borrow_mut().present = false;
    }

    /// Seat the card
    pub fn insert(&self) {
        self.state.borrow_mut().present = true;
    }

    /// Flip the write-protect tab
    pub fn set_write_protected(&self, on: bool) {
        self.state.borrow_mut().write_protected = on;
    }

    /// Make every mount attempt fail
    pub fn set_fail_mount(&self, on: bool) {
        self.state.borrow_mut().fail_mount = on;
    }

    /// Number of files on the card
    pub fn file_count(&self) -> usize {
        self.state.borrow().files.len()
    }
}

impl FatVolume for SimCard {
    fn mount(&mut self) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if !s.present || s.fail_mount {
            return Err(ErrorKind::NotReady);
        }
        s.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        self.state.borrow_mut().mounted = false;
    }

    fn is_mounted(&self) -> bool {
        let s = self.state.borrow();
        s.mounted && s.present
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        let mut s = self.state.borrow_mut();
        if !s.mounted {
            return Err(ErrorKind::NotReady);
        }
        s.files
            .insert(name.to_lowercase(), (name.to_string(), data.to_vec()));
        Ok(data.len())
    }

    fn read_file(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        let s = self.state.borrow();
        match s.files.get(&name.to_lowercase()) {
            Some((_, data)) => {
                let n = data.len().min(dst.len());
                dst[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            None => Err(ErrorKind::NotFound),
        }
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        let mut s = self.state.borrow_mut();
        match s.files.remove(&name.to_lowercase()) {
            Some(_) => Ok(()),
            None => Err(ErrorKind::NotFound),
        }
    }

    fn file_exists(&mut self, name: &str) -> bool {
        self.state.borrow().files.contains_key(&name.to_lowercase())
    }

    fn file_size(&mut self, name: &str) -> Result<u32> {
        let s = self.state.borrow();
        match s.files.get(&name.to_lowercase()) {
            Some((_, data)) => Ok(data.len() as u32),
            None => Err(ErrorKind::NotFound),
        }
    }

    fn list_root(&mut self, out: &mut [FileName]) -> usize {
        let s = self.state.borrow();
        let mut n = 0;
        for (_, (name, _)) in s.files.iter() {
            if n == out.len() {
                break;
            }
            out[n] = FileName::from_str(name);
            n += 1;
        }
        n
    }

    fn space(&self) -> (u32, u32) {
        let used: usize = self
            .state
            .borrow()
            .files
            .values()
            .map(|(_, data)| data.len())
            .sum();
        (CARD_BYTES.saturating_sub(used as u32), CARD_BYTES)
    }
}

impl CardSocket for SimCard {
    fn card_present(&mut self) -> bool {
        self.state.borrow().present
    }

    fn write_protected(&mut self) -> bool {
        self.state.borrow().write_protected
    }
}
