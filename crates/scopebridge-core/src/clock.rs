//! Time source abstraction
//!
//! The device has no operating system; everything that needs wall
//! time, a microsecond delay or a cooperative yield goes through this
//! trait. Implementations are expected to be cheap to clone so the
//! receiver and the run loop can each hold one.

/// Monotonic time and busy-delay provider
///
/// Both counters wrap; durations must be computed with
/// `wrapping_sub`, which gives the right answer across a single wrap.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch
    fn now_ms(&self) -> u32;

    /// Microseconds since an arbitrary epoch
    fn now_us(&self) -> u32;

    /// Block for the given number of microseconds
    fn delay_us(&self, us: u32);

    /// Block for the given number of milliseconds
    fn delay_ms(&self, ms: u32) {
        self.delay_us(ms.saturating_mul(1_000));
    }
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }

    fn now_us(&self) -> u32 {
        (**self).now_us()
    }

    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }
}
