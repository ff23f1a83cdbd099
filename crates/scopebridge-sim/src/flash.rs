//! In-memory W25Q128 emulation
//!
//! Behaves like the real part where the driver can tell: programming
//! only clears bits, erase sets a whole sector to 0xFF, and nothing
//! writes without a preceding Write Enable. Completion is instant, so
//! the driver's status polling sees an idle chip on the first read.

use std::cell::RefCell;
use std::rc::Rc;

use scopebridge_core::config::{FLASH_SIZE, PAGE_SIZE, SECTOR_SIZE};
use scopebridge_core::error::{ErrorKind, Result};
use scopebridge_core::nor::{opcodes, SpiBus, SpiCommand};

struct FlashState {
    data: Vec<u8>,
    manufacturer_id: u8,
    device_id: u16,
    write_enabled: bool,
    /// Countdown error injection: when it reaches zero, the next
    /// program or erase fails.
    fail_writes_after: Option<u32>,
    programs: u32,
    erases: u32,
}

/// Cloneable handle to an emulated flash chip
#[derive(Clone)]
pub struct MemFlash {
    state: Rc<RefCell<FlashState>>,
}

impl Default for MemFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFlash {
    /// A blank (all 0xFF) 16 MiB chip answering as a W25Q128
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(FlashState {
                data: vec![0xFF; FLASH_SIZE],
                manufacturer_id: 0xEF,
                device_id: 0x4018,
                write_enabled: false,
                fail_writes_after: None,
                programs: 0,
                erases: 0,
            })),
        }
    }

    /// A chip that answers with the given JEDEC bytes; id 0x00/0x0000
    /// or 0xFF/0xFFFF simulates an empty footprint
    pub fn with_id(manufacturer_id: u8, device_id: u16) -> Self {
        let flash = Self::new();
        {
            let mut s = flash.state.borrow_mut();
            s.manufacturer_id = manufacturer_id;
            s.device_id = device_id;
        }
        flash
    }

    /// Copy out a region of the array
    pub fn snapshot(&self, addr: usize, len: usize) -> Vec<u8> {
        self.state.borrow().data[addr..addr + len].to_vec()
    }

    /// Patch the array directly, bypassing program semantics
    pub fn patch(&self, addr: usize, bytes: &[u8]) {
        self.state.borrow_mut().data[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// Make the n-th future program/erase fail with an I/O error
    pub fn fail_writes_after(&self, n: u32) {
        self.state.borrow_mut().fail_writes_after = Some(n);
    }

    /// Remove any pending write-failure injection
    pub fn clear_write_failures(&self) {
        self.state.borrow_mut().fail_writes_after = None;
    }

    /// Counters: (page programs, sector/chip erases)
    pub fn op_counts(&self) -> (u32, u32) {
        let s = self.state.borrow();
        (s.programs, s.erases)
    }

    fn take_write_budget(s: &mut FlashState) -> Result<()> {
        if let Some(left) = s.fail_writes_after.as_mut() {
            if *left == 0 {
                return Err(ErrorKind::IoError);
            }
            *left -= 1;
        }
        Ok(())
    }
}

impl SpiBus for MemFlash {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let mut s = self.state.borrow_mut();
        match cmd.opcode {
            opcodes::RDID => {
                if cmd.read_buf.len() >= 3 {
                    cmd.read_buf[0] = s.manufacturer_id;
                    cmd.read_buf[1] = (s.device_id >> 8) as u8;
                    cmd.read_buf[2] = s.device_id as u8;
                }
                Ok(())
            }

            opcodes::RDSR => {
                if !cmd.read_buf.is_empty() {
                    // Operations complete instantly, so WIP is never
                    // observed set.
                    cmd.read_buf[0] = if s.write_enabled { opcodes::SR1_WEL } else { 0 };
                }
                Ok(())
            }

            opcodes::WREN => {
                s.write_enabled = true;
                Ok(())
            }

            opcodes::READ => {
                let addr = cmd.address.unwrap_or(0) as usize;
                let len = cmd.read_buf.len();
                if addr + len > s.data.len() {
                    return Err(ErrorKind::IoError);
                }
                cmd.read_buf.copy_from_slice(&s.data[addr..addr + len]);
                Ok(())
            }

            opcodes::PP => {
                if !s.write_enabled {
                    return Err(ErrorKind::IoError);
                }
                Self::take_write_budget(&mut s)?;
                let addr = cmd.address.unwrap_or(0) as usize;
                if cmd.write_data.len() > PAGE_SIZE || addr + cmd.write_data.len() > s.data.len() {
                    return Err(ErrorKind::IoError);
                }
                // Programming can only clear bits.
                for (i, &byte) in cmd.write_data.iter().enumerate() {
                    s.data[addr + i] &= byte;
                }
                s.write_enabled = false;
                s.programs += 1;
                Ok(())
            }

            opcodes::SE => {
                if !s.write_enabled {
                    return Err(ErrorKind::IoError);
                }
                Self::take_write_budget(&mut s)?;
                let addr = cmd.address.unwrap_or(0) as usize & !(SECTOR_SIZE - 1);
                if addr + SECTOR_SIZE > s.data.len() {
                    return Err(ErrorKind::IoError);
                }
                s.data[addr..addr + SECTOR_SIZE].fill(0xFF);
                s.write_enabled = false;
                s.erases += 1;
                Ok(())
            }

            opcodes::CE => {
                if !s.write_enabled {
                    return Err(ErrorKind::IoError);
                }
                Self::take_write_budget(&mut s)?;
                s.data.fill(0xFF);
                s.write_enabled = false;
                s.erases += 1;
                Ok(())
            }

            _ => Err(ErrorKind::Unsupported),
        }
    }

    fn delay_us(&mut self, _us: u32) {
        // Nothing to wait for in memory.
    }
}
