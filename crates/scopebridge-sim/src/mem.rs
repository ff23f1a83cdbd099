//! Controllable free-memory gauge

use std::cell::Cell;
use std::rc::Rc;

use scopebridge_core::runloop::MemGauge;

/// Memory gauge returning a settable figure
#[derive(Clone)]
pub struct FixedMemGauge {
    free: Rc<Cell<u32>>,
}

impl FixedMemGauge {
    /// A gauge reporting `free` bytes
    pub fn new(free: u32) -> Self {
        Self {
            free: Rc::new(Cell::new(free)),
        }
    }

    /// Change the reported figure
    pub fn set_free(&self, free: u32) {
        self.free.set(free);
    }
}

impl MemGauge for FixedMemGauge {
    fn free_bytes(&self) -> u32 {
        self.free.get()
    }
}
