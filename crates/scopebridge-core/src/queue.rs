//! Lock-free single-producer / single-consumer byte ring
//!
//! The producer is the strobe interrupt handler; the consumer is the
//! run loop. Each side owns exactly one index: the producer writes
//! `head`, the consumer writes `tail`, and the shared `count` is the
//! only cell both touch. Release/acquire ordering on `count` makes
//! the byte written at `head` visible before the consumer can observe
//! the incremented length.
//!
//! A push against a full ring latches the overflow flag and drops the
//! byte; the consumer learns of the loss from the flag, never by
//! recovering the byte.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Fixed-capacity SPSC byte queue
///
/// `N` is the capacity in bytes; a power of two keeps the index
/// wrap-around cheap but is not required.
pub struct ByteQueue<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    /// Producer-owned write index
    head: AtomicUsize,
    /// Consumer-owned read index
    tail: AtomicUsize,
    /// Number of occupied slots; the only cell written by both roles
    count: AtomicUsize,
    overflow: AtomicBool,
}

// Safety: interior mutability is confined to disjoint slots. The
// producer writes buf[head] strictly before publishing it through the
// release increment of `count`; the consumer reads buf[tail] only
// after an acquire load of `count` observed the slot occupied.
unsafe impl<const N: usize> Sync for ByteQueue<N> {}

impl<const N: usize> ByteQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
        }
    }

    /// Append one byte; producer role only
    ///
    /// Returns false and latches the overflow flag when the queue is
    /// full. Callable from interrupt context.
    pub fn try_push(&self, byte: u8) -> bool {
        // A stale count can only over-estimate occupancy here, so the
        // check errs toward reporting full.
        if self.count.load(Ordering::Acquire) >= N {
            self.overflow.store(true, Ordering::Release);
            return false;
        }

        let head = self.head.load(Ordering::Relaxed);
        // Safety: sole producer; the slot at `head` is unoccupied.
        unsafe {
            (*self.buf.get())[head] = byte;
        }
        self.head.store((head + 1) % N, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
        true
    }

    /// Remove and return the oldest byte; consumer role only
    pub fn try_pop(&self) -> Option<u8> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }

        let tail = self.tail.load(Ordering::Relaxed);
        // Safety: sole consumer; the occupied slot was published by
        // the producer's release increment.
        let byte = unsafe { (*self.buf.get())[tail] };
        self.tail.store((tail + 1) % N, Ordering::Relaxed);
        self.count.fetch_sub(1, Ordering::Release);
        Some(byte)
    }

    /// Pop up to `max` bytes into `dst`; consumer role only
    pub fn drain(&self, dst: &mut [u8], max: usize) -> usize {
        let limit = core::cmp::min(max, dst.len());
        let mut n = 0;
        while n < limit {
            match self.try_pop() {
                Some(byte) => {
                    dst[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Copy the oldest byte without removing it; consumer role only
    pub fn peek(&self) -> Option<u8> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }
        let tail = self.tail.load(Ordering::Relaxed);
        // Safety: sole consumer, slot occupied (see try_pop).
        Some(unsafe { (*self.buf.get())[tail] })
    }

    /// Number of bytes currently queued
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a push would be dropped
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Total capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Occupancy as a percentage, 0..=100
    pub fn utilization_pct(&self) -> u8 {
        ((self.len() * 100) / N) as u8
    }

    /// True if a byte has been dropped since the last clear
    pub fn overflowed(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    /// Reset the latched overflow flag
    pub fn clear_overflow(&self) {
        self.overflow.store(false, Ordering::Release);
    }

    /// Reset to empty
    ///
    /// Touches the producer index, so the producer must be quiescent:
    /// callers mask the strobe interrupt around this.
    pub fn clear(&self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.overflow.store(false, Ordering::Release);
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
