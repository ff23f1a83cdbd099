//! Scriptable serial link
//!
//! Output is captured for transcript assertions; input is fed by the
//! test and consumed a byte at a time, the way the real UART hands
//! bytes to the receiver.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use scopebridge_core::error::Result;
use scopebridge_core::storage::ByteLink;

#[derive(Default)]
struct LinkState {
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    ready: bool,
}

/// Cloneable handle to a simulated byte link
#[derive(Clone)]
pub struct SimLink {
    state: Rc<RefCell<LinkState>>,
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLink {
    /// A ready link with empty buffers
    pub fn new() -> Self {
        let link = Self {
            state: Rc::new(RefCell::new(LinkState::default())),
        };
        link.set_ready(true);
        link
    }

    /// Script bytes for the device to receive
    pub fn feed(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Script a CRLF-terminated line
    pub fn feed_line(&self, line: &str) {
        self.feed(line.as_bytes());
        self.feed(b"\r\n");
    }

    /// Take everything the device transmitted so far
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.borrow_mut().tx)
    }

    /// The transmitted bytes as text, for transcript assertions
    pub fn take_transcript(&self) -> String {
        String::from_utf8(self.take_tx()).expect("transcript is ASCII")
    }

    /// Flip link readiness
    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }
}

impl ByteLink for SimLink {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.state.borrow_mut().tx.extend_from_slice(data);
        Ok(())
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.state.borrow_mut().rx.pop_front()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }
}
