//! Controllable time source

use std::cell::Cell;
use std::rc::Rc;

use scopebridge_core::clock::Clock;

/// Simulated clock
///
/// Time advances only through `advance_us` or when a component calls
/// `delay_us`, which makes timeout paths deterministic.
#[derive(Clone, Default)]
pub struct SimClock {
    micros: Rc<Cell<u64>>,
}

impl SimClock {
    /// A clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance_us(&self, us: u64) {
        self.micros.set(self.micros.get() + us);
    }

    /// Move time forward in milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1_000);
    }

    /// Total simulated microseconds since start
    pub fn elapsed_us(&self) -> u64 {
        self.micros.get()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        (self.micros.get() / 1_000) as u32
    }

    fn now_us(&self) -> u32 {
        self.micros.get() as u32
    }

    fn delay_us(&self, us: u32) {
        self.advance_us(us as u64);
    }
}
