//! Low-level W25Q128-class flash operations
//!
//! Program and erase follow the usual sequence: Write Enable, the
//! addressed command, then polling the status register until the
//! write-in-progress bit clears. Polling sleeps one cooperative tick
//! between reads and gives up at the per-operation timeout; a timeout
//! is a hard error with no automatic retry.

use crate::config::{
    CHIP_ERASE_TIMEOUT_US, FLASH_POLL_US, FLASH_SIZE, PAGE_PROGRAM_TIMEOUT_US, PAGE_SIZE,
    SECTOR_ERASE_TIMEOUT_US, SECTOR_SIZE, TOTAL_SECTORS,
};
use crate::error::{ErrorKind, Result};
use crate::nor::bus::{SpiBus, SpiCommand};
use crate::nor::opcodes;

/// JEDEC identification bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JedecId {
    /// Manufacturer byte (0xEF for Winbond)
    pub manufacturer: u8,
    /// Device id, memory type in the high byte
    pub device: u16,
}

impl JedecId {
    /// The three id bytes as one value, manufacturer highest
    pub fn raw(self) -> u32 {
        ((self.manufacturer as u32) << 16) | self.device as u32
    }

    /// False when the bus read floating low or high, meaning no chip
    /// answered
    pub fn is_present(self) -> bool {
        let raw = self.raw();
        raw != 0x00_0000 && raw != 0xFF_FFFF
    }
}

/// Synchronous driver for a 16 MiB SPI NOR chip
pub struct NorFlash<B> {
    bus: B,
}

impl<B: SpiBus> NorFlash<B> {
    /// Wrap a bus; no chip access happens until `probe`
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Read the JEDEC id. Presence is the caller's call: `0x000000`
    /// and `0xFFFFFF` mean nothing answered.
    pub fn probe(&mut self) -> Result<JedecId> {
        let mut id = [0u8; 3];
        let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut id);
        self.bus.execute(&mut cmd)?;
        let jedec = JedecId {
            manufacturer: id[0],
            device: ((id[1] as u16) << 8) | id[2] as u16,
        };
        log::debug!("flash probe: jedec {:06x}", jedec.raw());
        Ok(jedec)
    }

    /// Read `buf.len()` bytes starting at `addr`
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if addr as usize + buf.len() > FLASH_SIZE {
            return Err(ErrorKind::IoError);
        }
        let mut cmd = SpiCommand::read(opcodes::READ, addr, buf);
        self.bus.execute(&mut cmd)
    }

    /// Program up to one page
    ///
    /// `data` must fit within the page containing `addr`; crossing a
    /// page boundary would wrap inside the chip, so it is rejected.
    pub fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() || data.len() > PAGE_SIZE {
            return Err(ErrorKind::IoError);
        }
        if addr as usize % PAGE_SIZE + data.len() > PAGE_SIZE {
            log::warn!("page program would cross a page boundary at {:#x}", addr);
            return Err(ErrorKind::IoError);
        }
        if addr as usize + data.len() > FLASH_SIZE {
            return Err(ErrorKind::IoError);
        }

        self.write_enable()?;
        let mut cmd = SpiCommand::write(opcodes::PP, addr, data);
        self.bus.execute(&mut cmd)?;
        self.wait_ready(FLASH_POLL_US, PAGE_PROGRAM_TIMEOUT_US)
    }

    /// Erase one 4 KiB sector to 0xFF
    pub fn erase_sector(&mut self, sector: u32) -> Result<()> {
        if sector >= TOTAL_SECTORS {
            return Err(ErrorKind::IoError);
        }
        self.write_enable()?;
        let mut cmd = SpiCommand::erase(opcodes::SE, sector * SECTOR_SIZE as u32);
        self.bus.execute(&mut cmd)?;
        self.wait_ready(FLASH_POLL_US, SECTOR_ERASE_TIMEOUT_US)
    }

    /// Erase the entire chip with the default budget
    pub fn erase_chip(&mut self) -> Result<()> {
        self.erase_chip_with_timeout(CHIP_ERASE_TIMEOUT_US)
    }

    /// Erase the entire chip, bounded by `timeout_us`
    pub fn erase_chip_with_timeout(&mut self, timeout_us: u32) -> Result<()> {
        self.write_enable()?;
        let mut cmd = SpiCommand::simple(opcodes::CE);
        self.bus.execute(&mut cmd)?;
        self.wait_ready(FLASH_POLL_US, timeout_us)
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> Result<u8> {
        let mut status = [0u8; 1];
        let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut status);
        self.bus.execute(&mut cmd)?;
        Ok(status[0])
    }

    /// True while a program or erase is running inside the chip
    pub fn is_busy(&mut self) -> Result<bool> {
        Ok(self.read_status()? & opcodes::SR1_WIP != 0)
    }

    /// Poll the write-in-progress bit until it clears
    ///
    /// Sleeps `poll_us` between reads. On expiry the chip is left
    /// untouched, so the caller's next operation may safely retry.
    pub fn wait_ready(&mut self, poll_us: u32, timeout_us: u32) -> Result<()> {
        let max_polls = if poll_us > 0 { timeout_us / poll_us } else { timeout_us };
        for _ in 0..=max_polls {
            if !self.is_busy()? {
                return Ok(());
            }
            if poll_us > 0 {
                self.bus.delay_us(poll_us);
            }
        }
        log::warn!("flash wait_ready timed out after {} us", timeout_us);
        Err(ErrorKind::Timeout)
    }

    fn write_enable(&mut self) -> Result<()> {
        let mut cmd = SpiCommand::simple(opcodes::WREN);
        self.bus.execute(&mut cmd)
    }
}
