//! Compile-time device configuration
//!
//! Every buffer in the system is sized here, at compile time. The
//! timing figures come from the IEEE-1284 SPP handshake the TDS2024
//! expects and from the W25Q128 datasheet limits.

// ============================================================================
// Capture path
// ============================================================================

/// Capacity of the strobe-interrupt byte queue
pub const RX_QUEUE_LEN: usize = 96;

/// Largest chunk the run loop drains from the queue per tick
pub const DRAIN_CHUNK: usize = 256;

/// Hardware settle time between strobe edge and data-bus sample (µs)
pub const DATA_SETTLE_US: u32 = 5;

/// Width of the nACK low pulse (µs)
pub const ACK_PULSE_US: u32 = 20;

// ============================================================================
// Filenames and directory
// ============================================================================

/// Fixed filename slot length, terminator included
pub const FILENAME_LEN: usize = 16;

/// Number of slots in the flat-filesystem directory
pub const MAX_FILES: usize = 64;

// ============================================================================
// NOR flash geometry (W25Q128-class, 16 MiB)
// ============================================================================

/// Largest programmable unit
pub const PAGE_SIZE: usize = 256;

/// Smallest erasable unit
pub const SECTOR_SIZE: usize = 4096;

/// Total addressable flash
pub const FLASH_SIZE: usize = 16 * 1024 * 1024;

/// Number of erase sectors on the chip
pub const TOTAL_SECTORS: u32 = (FLASH_SIZE / SECTOR_SIZE) as u32;

/// Sector holding the flat-filesystem directory
pub const DIRECTORY_SECTOR: u32 = 0;

/// First sector available for file extents
pub const DATA_START_SECTOR: u32 = 1;

// ============================================================================
// Flash operation budgets
// ============================================================================

/// Poll interval while waiting on the write-in-progress bit (µs).
/// One cooperative tick, so the task yields between polls.
pub const FLASH_POLL_US: u32 = 1_000;

/// Page program timeout (µs)
pub const PAGE_PROGRAM_TIMEOUT_US: u32 = 1_000_000;

/// Sector erase timeout (µs); a 4 KiB erase can realistically take ~3 s
pub const SECTOR_ERASE_TIMEOUT_US: u32 = 5_000_000;

/// Chip erase timeout (µs)
pub const CHIP_ERASE_TIMEOUT_US: u32 = 100_000_000;

// ============================================================================
// Hex stream framing
// ============================================================================

/// Default payload bytes per hex line
pub const HEX_LINE_STRIDE: usize = 32;

/// Hard upper bound on the line stride
pub const HEX_LINE_STRIDE_MAX: usize = 64;

/// A space is emitted after every this many payload bytes
pub const HEX_GROUP: usize = 8;

/// Progress pings are emitted every this many payload bytes (debug only)
pub const HEX_PROGRESS_INTERVAL: usize = 1024;

/// Receive-side line accumulator length
pub const HEX_LINE_BUF_LEN: usize = 256;

/// Default receive timeout when the hex stream is driven as a backend (ms)
pub const HEX_RECEIVE_TIMEOUT_MS: u32 = 5_000;

/// Reference serial rate (8N1, no flow control)
pub const SERIAL_BAUD: u32 = 115_200;

// ============================================================================
// Router
// ============================================================================

/// Fixed transfer buffer for cross-medium copies
pub const TRANSFER_BUF_LEN: usize = 512;

// ============================================================================
// Run loop cadence
// ============================================================================

/// Cooperative tick length (µs)
pub const TICK_DELAY_US: u32 = 1_000;

/// Status snapshot period (ms)
pub const STATUS_PERIOD_MS: u32 = 5_000;

/// Overflow surfacing period (ms)
pub const OVERFLOW_PERIOD_MS: u32 = 5_000;

/// Free-memory sampling period (ms)
pub const MEMORY_PERIOD_MS: u32 = 10_000;

/// Low-memory water mark (bytes)
pub const LOW_MEMORY_WATER: u32 = 1_024;

/// Consecutive failed update ticks before the error indication latches
pub const ERROR_STREAK_LIMIT: u32 = 10;
