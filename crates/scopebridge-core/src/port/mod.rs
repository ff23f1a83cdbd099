//! IEEE-1284 SPP ingress
//!
//! The parallel port is the device's only data source. This module
//! defines the pin-level seam ([`PortPins`]) and the interrupt-driven
//! receiver built on top of it.

mod receiver;

pub use receiver::{ParallelReceiver, ReceiverStats};

use bitflags::bitflags;

bitflags! {
    /// Instantaneous levels of the port's control and status lines
    ///
    /// A set bit means the line is electrically high. The active-low
    /// lines (`nACK`, `nERROR`, the monitored inputs) therefore read
    /// as *set* when inactive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlLines: u8 {
        /// BUSY output, active high
        const BUSY      = 1 << 0;
        /// nACK output, active low
        const ACK       = 1 << 1;
        /// nERROR output, active low
        const ERROR     = 1 << 2;
        /// SELECT output, held high in SPP mode
        const SELECT    = 1 << 3;
        /// PAPER_OUT output, held low in SPP mode
        const PAPER_OUT = 1 << 4;
        /// nAUTOFEED input, monitored only
        const AUTOFEED  = 1 << 5;
        /// nINIT input, monitored only
        const INIT      = 1 << 6;
        /// nSELECT_IN input, monitored only
        const SELECT_IN = 1 << 7;
    }
}

/// Pin-level access to the parallel port
///
/// One implementation drives real GPIO; the test double records every
/// transition. Data-bus direction control exists solely for the
/// loopback self-test, which runs only while no peripheral is
/// attached.
pub trait PortPins {
    /// Sample the eight data lines, D0 in bit 0
    fn read_data(&mut self) -> u8;

    /// Drive the BUSY line
    fn set_busy(&mut self, level: bool);

    /// Drive the nACK line (true = high = inactive)
    fn set_ack(&mut self, level: bool);

    /// Drive the nERROR line (true = high = no error)
    fn set_error(&mut self, level: bool);

    /// Drive the SELECT line
    fn set_select(&mut self, level: bool);

    /// Drive the PAPER_OUT line
    fn set_paper_out(&mut self, level: bool);

    /// Read back the current levels of every control/status line
    fn read_control(&mut self) -> ControlLines;

    /// Switch the data bus to output and drive a value (self-test only)
    fn drive_data(&mut self, value: u8);

    /// Return the data bus to its normal input direction
    fn release_data(&mut self);

    /// Short busy-delay, used for the settle and acknowledge holds
    fn delay_us(&mut self, us: u32);
}
