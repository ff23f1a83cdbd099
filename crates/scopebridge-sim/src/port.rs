//! Parallel-port peer and pin recorder
//!
//! One handle goes into the receiver as its [`PortPins`]; the test
//! keeps a clone and plays the peer: put a byte on the bus, fire the
//! strobe (by calling the receiver's interrupt handler), and check
//! that BUSY and nACK moved the way the wire expects.

use std::cell::RefCell;
use std::rc::Rc;

use scopebridge_core::port::{ControlLines, PortPins};

use crate::clock::SimClock;

#[derive(Default)]
struct PortState {
    /// Value the peer drives on D0..D7
    bus: u8,
    /// Loopback value while the device drives the bus itself
    driven: Option<u8>,
    busy: bool,
    ack: bool,
    error: bool,
    select: bool,
    paper_out: bool,
    /// Falling edges seen on nACK
    ack_pulses: u32,
    /// Rising edges seen on BUSY
    busy_assertions: u32,
}

/// Cloneable handle to the simulated port wiring
#[derive(Clone)]
pub struct SimPort {
    state: Rc<RefCell<PortState>>,
    clock: SimClock,
}

impl SimPort {
    /// Wire a port; pin delays advance the given clock
    pub fn new(clock: SimClock) -> Self {
        Self {
            state: Rc::new(RefCell::new(PortState {
                ack: true,
                error: true,
                select: true,
                ..PortState::default()
            })),
            clock,
        }
    }

    /// Peer side: put a byte on the data lines
    pub fn peer_write(&self, byte: u8) {
        self.state.borrow_mut().bus = byte;
    }

    /// Peer side: current BUSY level
    pub fn busy_level(&self) -> bool {
        self.state.borrow().busy
    }

    /// Complete handshakes observed (nACK falling edges)
    pub fn ack_pulses(&self) -> u32 {
        self.state.borrow().ack_pulses
    }

    /// Times BUSY went high
    pub fn busy_assertions(&self) -> u32 {
        self.state.borrow().busy_assertions
    }
}

impl PortPins for SimPort {
    fn read_data(&mut self) -> u8 {
        let s = self.state.borrow();
        s.driven.unwrap_or(s.bus)
    }

    fn set_busy(&mut self, level: bool) {
        let mut s = self.state.borrow_mut();
        if level && !s.busy {
            s.busy_assertions += 1;
        }
        s.busy = level;
    }

    fn set_ack(&mut self, level: bool) {
        let mut s = self.state.borrow_mut();
        if !level && s.ack {
            s.ack_pulses += 1;
        }
        s.ack = level;
    }

    fn set_error(&mut self, level: bool) {
        self.state.borrow_mut().error = level;
    }

    fn set_select(&mut self, level: bool) {
        self.state.borrow_mut().select = level;
    }

    fn set_paper_out(&mut self, level: bool) {
        self.state.borrow_mut().paper_out = level;
    }

    fn read_control(&mut self) -> ControlLines {
        let s = self.state.borrow();
        let mut lines = ControlLines::empty();
        lines.set(ControlLines::BUSY, s.busy);
        lines.set(ControlLines::ACK, s.ack);
        lines.set(ControlLines::ERROR, s.error);
        lines.set(ControlLines::SELECT, s.select);
        lines.set(ControlLines::PAPER_OUT, s.paper_out);
        // Monitored inputs idle high with no peer driving them.
        lines.set(ControlLines::AUTOFEED, true);
        lines.set(ControlLines::INIT, true);
        lines.set(ControlLines::SELECT_IN, true);
        lines
    }

    fn drive_data(&mut self, value: u8) {
        self.state.borrow_mut().driven = Some(value);
    }

    fn release_data(&mut self) {
        self.state.borrow_mut().driven = None;
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.advance_us(us as u64);
    }
}
