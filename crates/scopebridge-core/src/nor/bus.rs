//! SPI transaction seam
//!
//! The flash driver describes every chip access as a [`SpiCommand`]
//! and hands it to a [`SpiBus`] implementation. Commands borrow their
//! buffers, so a transaction never allocates.

use crate::error::Result;

/// A single SPI flash transaction
///
/// The optional address is always sent as three bytes, most
/// significant first, matching the 16 MiB parts this device carries.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,
    /// 24-bit address, if the command takes one
    pub address: Option<u32>,
    /// Data clocked out after opcode and address
    pub write_data: &'a [u8],
    /// Buffer filled from the bus after the header
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Command with no address or data (e.g. WREN)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Register read with no address (e.g. RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Addressed read (e.g. READ)
    pub fn read(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Addressed write (e.g. PAGE_PROGRAM)
    pub fn write(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Addressed command with no data phase (e.g. SECTOR_ERASE)
    pub fn erase(opcode: u8, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            write_data: &[],
            read_buf: &mut [],
        }
    }
}

/// Chip-select-framed SPI master
///
/// `execute` runs the whole transaction under one chip-select
/// assertion: opcode, optional address, write phase, read phase. The
/// select line must be released on every exit path, including errors.
pub trait SpiBus {
    /// Execute a single transaction
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Busy-delay between status polls
    fn delay_us(&mut self, us: u32);
}
