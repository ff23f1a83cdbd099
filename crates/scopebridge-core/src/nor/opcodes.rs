//! W25Q128-class SPI flash opcodes
//!
//! Only the commands the bridge actually issues are listed; the chip
//! understands many more.

/// Write Enable - required before any program/erase operation
pub const WREN: u8 = 0x06;
/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;
/// Read Data, 3-byte address
pub const READ: u8 = 0x03;
/// Page Program, 3-byte address
pub const PP: u8 = 0x02;
/// Sector Erase, 4 KiB
pub const SE: u8 = 0x20;
/// Chip Erase
pub const CE: u8 = 0xC7;

/// Status Register 1: Write In Progress
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
