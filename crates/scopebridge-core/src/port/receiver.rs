//! Interrupt-driven SPP byte receiver
//!
//! One strobe edge means one byte. The handshake is driven entirely
//! from [`ParallelReceiver::handle_interrupt`]:
//!
//! ```text
//! nSTROBE falling -> BUSY high -> settle -> sample D0..D7 -> enqueue
//!                 -> nACK low, hold, nACK high -> BUSY low
//! ```
//!
//! BUSY is released only after the byte is enqueued and nACK has
//! returned high, so the peer can never clock a byte the receiver has
//! not accounted for. On a full queue the byte is dropped and counted;
//! the handshake still completes so the peer never stalls.
//!
//! Everything the handler touches besides the pins is an atomic cell,
//! which keeps the task-side accessors callable without masking the
//! interrupt. Only the multi-field statistics snapshot takes a short
//! critical section.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::clock::Clock;
use crate::config::{ACK_PULSE_US, DATA_SETTLE_US, RX_QUEUE_LEN};
use crate::port::{ControlLines, PortPins};
use crate::queue::ByteQueue;

/// Snapshot of receiver statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Bytes successfully enqueued
    pub bytes_total: u32,
    /// Bytes dropped against a full queue
    pub overflows: u32,
    /// Strobe interrupts serviced
    pub interrupts_total: u32,
    /// Worst-case handler work time, hardware holds excluded (µs)
    pub isr_max_us: u16,
    /// Smoothed handler work time (µs)
    pub isr_ewma_us: u16,
}

/// Statistics cells written by the interrupt handler
///
/// Individual fields are updated with relaxed atomics; a consistent
/// multi-field view is taken under a critical section that masks the
/// strobe interrupt for a few loads only, so a concurrent byte is at
/// most delayed behind BUSY, never dropped.
#[derive(Default)]
struct StatsCell {
    bytes_total: AtomicU32,
    overflows: AtomicU32,
    interrupts_total: AtomicU32,
    isr_max_us: AtomicU16,
    isr_ewma_us: AtomicU16,
}

impl StatsCell {
    fn snapshot(&self) -> ReceiverStats {
        critical_section::with(|_| ReceiverStats {
            bytes_total: self.bytes_total.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            interrupts_total: self.interrupts_total.load(Ordering::Relaxed),
            isr_max_us: self.isr_max_us.load(Ordering::Relaxed),
            isr_ewma_us: self.isr_ewma_us.load(Ordering::Relaxed),
        })
    }

    fn reset(&self) {
        self.bytes_total.store(0, Ordering::Relaxed);
        self.overflows.store(0, Ordering::Relaxed);
        self.interrupts_total.store(0, Ordering::Relaxed);
        self.isr_max_us.store(0, Ordering::Relaxed);
        self.isr_ewma_us.store(0, Ordering::Relaxed);
    }
}

/// IEEE-1284 SPP receiver
///
/// `handle_interrupt` is the producer and must be called from the
/// strobe edge handler only; every other method belongs to the task.
pub struct ParallelReceiver<P, C, const N: usize = RX_QUEUE_LEN> {
    pins: P,
    clock: C,
    queue: ByteQueue<N>,
    stats: StatsCell,
    enabled: AtomicBool,
}

impl<P: PortPins, C: Clock, const N: usize> ParallelReceiver<P, C, N> {
    /// Take ownership of the port pins and drive them to the idle SPP
    /// state: not busy, acknowledge inactive, no error, selected,
    /// paper present.
    pub fn new(mut pins: P, clock: C) -> Self {
        pins.set_busy(false);
        pins.set_ack(true);
        pins.set_error(true);
        pins.set_select(true);
        pins.set_paper_out(false);

        Self {
            pins,
            clock,
            queue: ByteQueue::new(),
            stats: StatsCell::default(),
            enabled: AtomicBool::new(true),
        }
    }

    /// Service one strobe edge; interrupt context only
    pub fn handle_interrupt(&mut self) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }

        let start = self.clock.now_us();

        self.pins.set_busy(true);
        self.pins.delay_us(DATA_SETTLE_US);
        let byte = self.pins.read_data();

        if self.queue.try_push(byte) {
            self.stats.bytes_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.overflows.fetch_add(1, Ordering::Relaxed);
        }

        self.pins.set_ack(false);
        self.pins.delay_us(ACK_PULSE_US);
        self.pins.set_ack(true);
        self.pins.set_busy(false);

        self.stats.interrupts_total.fetch_add(1, Ordering::Relaxed);

        // Track work time with the two deliberate holds taken out.
        let elapsed = self.clock.now_us().wrapping_sub(start);
        let work = elapsed.saturating_sub(DATA_SETTLE_US + ACK_PULSE_US);
        let work = core::cmp::min(work, u16::MAX as u32) as u16;
        if work > self.stats.isr_max_us.load(Ordering::Relaxed) {
            self.stats.isr_max_us.store(work, Ordering::Relaxed);
        }
        let ewma = self.stats.isr_ewma_us.load(Ordering::Relaxed);
        self.stats
            .isr_ewma_us
            .store((ewma + work) / 2, Ordering::Relaxed);
    }

    /// Enable or disable capture; while disabled, strobes are ignored
    pub fn enable(&mut self, on: bool) {
        self.enabled.store(on, Ordering::Relaxed);
    }

    /// True if strobes are currently being serviced
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Bytes waiting in the queue
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    /// Pop up to `max` captured bytes into `dst`
    pub fn read(&mut self, dst: &mut [u8], max: usize) -> usize {
        self.queue.drain(dst, max)
    }

    /// Look at the oldest captured byte without consuming it
    pub fn peek(&self) -> Option<u8> {
        self.queue.peek()
    }

    /// Discard everything queued; the strobe interrupt is masked
    /// while the producer index is reset
    pub fn clear(&mut self) {
        critical_section::with(|_| self.queue.clear());
    }

    /// True if at least one byte was dropped since the last clear
    pub fn had_overflow(&self) -> bool {
        self.queue.overflowed()
    }

    /// Reset the latched overflow flag
    pub fn clear_overflow(&mut self) {
        self.queue.clear_overflow();
    }

    /// Queue occupancy, 0..=100
    pub fn utilization_pct(&self) -> u8 {
        self.queue.utilization_pct()
    }

    /// Consistent statistics snapshot
    pub fn stats(&self) -> ReceiverStats {
        self.stats.snapshot()
    }

    /// Zero every counter
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Exercise the output drivers and read them back
    ///
    /// The data bus is checked as a drive-then-read loopback, which is
    /// only meaningful while no peripheral holds the lines. All lines
    /// are restored to their idle state afterwards.
    pub fn self_test_signals(&mut self) -> bool {
        let mut pass = true;

        self.pins.set_busy(true);
        self.pins.delay_us(DATA_SETTLE_US);
        pass &= self.pins.read_control().contains(ControlLines::BUSY);
        self.pins.set_busy(false);
        self.pins.delay_us(DATA_SETTLE_US);
        pass &= !self.pins.read_control().contains(ControlLines::BUSY);

        self.pins.set_ack(false);
        self.pins.delay_us(ACK_PULSE_US);
        pass &= !self.pins.read_control().contains(ControlLines::ACK);
        self.pins.set_ack(true);

        self.pins.set_error(false);
        self.pins.delay_us(DATA_SETTLE_US);
        pass &= !self.pins.read_control().contains(ControlLines::ERROR);
        self.pins.set_error(true);
        self.pins.delay_us(DATA_SETTLE_US);
        pass &= self.pins.read_control().contains(ControlLines::ERROR);

        for pattern in [0x55u8, 0xAA, 0x00, 0xFF] {
            self.pins.drive_data(pattern);
            self.pins.delay_us(DATA_SETTLE_US);
            pass &= self.pins.read_data() == pattern;
        }
        self.pins.release_data();

        log::debug!("port signal self-test: {}", if pass { "pass" } else { "FAIL" });
        pass
    }

    /// Count strobe interrupts over `duration_ms`
    pub fn test_capture(&mut self, duration_ms: u32) -> u32 {
        let before = self.stats.interrupts_total.load(Ordering::Relaxed);
        let t0 = self.clock.now_ms();
        while self.clock.now_ms().wrapping_sub(t0) < duration_ms {
            self.clock.delay_us(crate::config::TICK_DELAY_US);
        }
        self.stats
            .interrupts_total
            .load(Ordering::Relaxed)
            .wrapping_sub(before)
    }
}
