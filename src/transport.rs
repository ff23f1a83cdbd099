//! Serial transport and host clock
//!
//! Opens the port 8N1 with no hardware flow control, matching the
//! device. The transport implements the core's `ByteLink`, so the
//! device-side framing code runs unchanged on the host when sending.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use scopebridge_core::clock::Clock;
use scopebridge_core::error::ErrorKind;
use scopebridge_core::storage::ByteLink;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::Result;

/// Poll granularity for non-blocking reads
const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port at the given baud rate, 8N1, no flow
    /// control
    pub fn open(device: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;

        log::info!("opened {} at {} baud", device, baud);
        Ok(Self { port })
    }
}

impl ByteLink for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> scopebridge_core::Result<()> {
        self.port.write_all(data).map_err(|e| {
            log::debug!("serial write failed: {}", e);
            ErrorKind::IoError
        })
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => None,
            Err(e) => {
                log::debug!("serial read failed: {}", e);
                None
            }
        }
    }

    fn flush(&mut self) -> scopebridge_core::Result<()> {
        self.port.flush().map_err(|_| ErrorKind::IoError)
    }
}

/// Wall clock over `std::time`
#[derive(Clone, Copy)]
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    /// A clock starting now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    fn now_us(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }

    fn delay_us(&self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}
