//! Board wiring: the core's hardware traits over embassy-rp
//!
//! | Signal        | Pin   |
//! |---------------|-------|
//! | D0..D7        | GP0-7 |
//! | nSTROBE       | GP8   |
//! | BUSY          | GP9   |
//! | nACK          | GP10  |
//! | nERROR        | GP11  |
//! | SELECT        | GP12  |
//! | PAPER_OUT     | GP13  |
//! | nAUTOFEED     | GP14  |
//! | nINIT         | GP15  |
//! | nSELECT_IN    | GP22  |
//! | SPI0 SCK/MOSI/MISO | GP18/GP19/GP16 |
//! | Flash CS      | GP17  |
//! | UART0 TX/RX   | GP20/GP21 |

use embassy_rp::gpio::{Flex, Input, Output};
use embassy_rp::peripherals::{SPI0, UART0};
use embassy_rp::spi::{self, Spi};
use embassy_rp::uart::{self, Uart};
use embassy_time::{block_for, Duration, Instant};

use scopebridge_core::clock::Clock;
use scopebridge_core::error::ErrorKind;
use scopebridge_core::port::{ControlLines, PortPins};
use scopebridge_core::storage::ByteLink;
use scopebridge_core::nor::{SpiBus, SpiCommand};

/// Wall clock over the embassy time driver
#[derive(Clone, Copy)]
pub struct BoardClock;

impl Clock for BoardClock {
    fn now_ms(&self) -> u32 {
        Instant::now().as_millis() as u32
    }

    fn now_us(&self) -> u32 {
        Instant::now().as_micros() as u32
    }

    fn delay_us(&self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }
}

/// Parallel port pins
pub struct BoardPort {
    pub data: [Flex<'static>; 8],
    pub busy: Output<'static>,
    pub ack: Output<'static>,
    pub error: Output<'static>,
    pub select: Output<'static>,
    pub paper_out: Output<'static>,
    pub autofeed: Input<'static>,
    pub init: Input<'static>,
    pub select_in: Input<'static>,
}

impl PortPins for BoardPort {
    fn read_data(&mut self) -> u8 {
        let mut value = 0u8;
        for (bit, pin) in self.data.iter_mut().enumerate() {
            if pin.is_high() {
                value |= 1 << bit;
            }
        }
        value
    }

    fn set_busy(&mut self, level: bool) {
        set_level(&mut self.busy, level);
    }

    fn set_ack(&mut self, level: bool) {
        set_level(&mut self.ack, level);
    }

    fn set_error(&mut self, level: bool) {
        set_level(&mut self.error, level);
    }

    fn set_select(&mut self, level: bool) {
        set_level(&mut self.select, level);
    }

    fn set_paper_out(&mut self, level: bool) {
        set_level(&mut self.paper_out, level);
    }

    fn read_control(&mut self) -> ControlLines {
        let mut lines = ControlLines::empty();
        lines.set(ControlLines::BUSY, self.busy.is_set_high());
        lines.set(ControlLines::ACK, self.ack.is_set_high());
        lines.set(ControlLines::ERROR, self.error.is_set_high());
        lines.set(ControlLines::SELECT, self.select.is_set_high());
        lines.set(ControlLines::PAPER_OUT, self.paper_out.is_set_high());
        lines.set(ControlLines::AUTOFEED, self.autofeed.is_high());
        lines.set(ControlLines::INIT, self.init.is_high());
        lines.set(ControlLines::SELECT_IN, self.select_in.is_high());
        lines
    }

    fn drive_data(&mut self, value: u8) {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            pin.set_as_output();
            if value & (1 << bit) != 0 {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
    }

    fn release_data(&mut self) {
        for pin in self.data.iter_mut() {
            pin.set_as_input();
        }
    }

    fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }
}

fn set_level(pin: &mut Output<'static>, level: bool) {
    if level {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

/// Blocking SPI bus to the W25Q128, chip select included
pub struct FlashBus {
    pub spi: Spi<'static, SPI0, spi::Blocking>,
    pub cs: Output<'static>,
}

impl FlashBus {
    fn transaction(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), spi::Error> {
        self.spi.blocking_write(&[cmd.opcode])?;
        if let Some(addr) = cmd.address {
            self.spi
                .blocking_write(&[(addr >> 16) as u8, (addr >> 8) as u8, addr as u8])?;
        }
        if !cmd.write_data.is_empty() {
            self.spi.blocking_write(cmd.write_data)?;
        }
        if !cmd.read_buf.is_empty() {
            self.spi.blocking_read(cmd.read_buf)?;
        }
        Ok(())
    }
}

impl SpiBus for FlashBus {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> scopebridge_core::Result<()> {
        self.cs.set_low();
        let result = self.transaction(cmd);
        // The select line is released on every path, errors included.
        self.cs.set_high();
        result.map_err(|_| ErrorKind::IoError)
    }

    fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }
}

/// UART0 as the hex stream link
pub struct UartLink {
    pub uart: Uart<'static, UART0, uart::Blocking>,
}

impl ByteLink for UartLink {
    fn write_all(&mut self, data: &[u8]) -> scopebridge_core::Result<()> {
        self.uart
            .blocking_write(data)
            .map_err(|_| ErrorKind::IoError)
    }

    fn read_byte(&mut self) -> Option<u8> {
        // TODO: route UART RX through a buffered reader so host-to-
        // device hex transfers work without the companion CLI.
        None
    }

    fn flush(&mut self) -> scopebridge_core::Result<()> {
        self.uart
            .blocking_flush()
            .map_err(|_| ErrorKind::IoError)
    }
}

/// No SD socket is fitted on this board revision
pub struct NoCard;

impl scopebridge_core::storage::FatVolume for NoCard {
    fn mount(&mut self) -> scopebridge_core::Result<()> {
        Err(ErrorKind::NotReady)
    }

    fn unmount(&mut self) {}

    fn is_mounted(&self) -> bool {
        false
    }

    fn write_file(&mut self, _: &str, _: &[u8]) -> scopebridge_core::Result<usize> {
        Err(ErrorKind::NotReady)
    }

    fn read_file(&mut self, _: &str, _: &mut [u8]) -> scopebridge_core::Result<usize> {
        Err(ErrorKind::NotReady)
    }

    fn delete_file(&mut self, _: &str) -> scopebridge_core::Result<()> {
        Err(ErrorKind::NotReady)
    }

    fn file_exists(&mut self, _: &str) -> bool {
        false
    }

    fn file_size(&mut self, _: &str) -> scopebridge_core::Result<u32> {
        Err(ErrorKind::NotReady)
    }

    fn list_root(&mut self, _: &mut [scopebridge_core::storage::FileName]) -> usize {
        0
    }

    fn space(&self) -> (u32, u32) {
        (0, 0)
    }
}

impl scopebridge_core::storage::CardSocket for NoCard {
    fn card_present(&mut self) -> bool {
        false
    }

    fn write_protected(&mut self) -> bool {
        false
    }
}
