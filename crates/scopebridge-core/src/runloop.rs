//! Cooperative run loop
//!
//! A single task drives everything outside the strobe interrupt.
//! Each tick: let the storage stack advance, drain captured bytes
//! into a freshly named file, and on their own cadences emit a status
//! snapshot, surface a latched overflow, and sample free memory.
//!
//! The loop never panics. Errors become observer notifications; a
//! persistent run of failing update ticks latches the error
//! indication, as does a low-memory observation, and the device keeps
//! limping along rather than dying silently.

use crate::clock::Clock;
use crate::config::{
    DRAIN_CHUNK, ERROR_STREAK_LIMIT, LOW_MEMORY_WATER, MEMORY_PERIOD_MS, OVERFLOW_PERIOD_MS,
    STATUS_PERIOD_MS, TICK_DELAY_US,
};
use crate::error::ErrorKind;
use crate::port::{ParallelReceiver, PortPins};
use crate::storage::{FileName, StorageBackend, StorageRouter};

/// Periodic status figures handed to the observer
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSnapshot {
    /// Bytes captured since boot
    pub bytes_total: u32,
    /// Bytes dropped against a full queue since boot
    pub overflows: u32,
    /// Capture queue occupancy, 0..=100
    pub buffer_utilization_pct: u8,
    /// Free data memory in bytes
    pub free_memory: u32,
}

/// Sink for everything the operator should see
///
/// The concrete observer (display, LED, log) lives outside the core.
pub trait Observer {
    /// A capture was persisted under `name`
    fn on_file_captured(&mut self, name: &str, bytes: usize);

    /// Something went wrong; `detail` says where
    fn on_error(&mut self, kind: ErrorKind, detail: &str);

    /// Periodic health figures
    fn on_status_tick(&mut self, snapshot: &StatusSnapshot);
}

/// Free-memory probe
///
/// Implemented per platform (stack watermark, static allocator
/// headroom); the simulator reports a configurable figure.
pub trait MemGauge {
    /// Currently free data memory in bytes
    fn free_bytes(&self) -> u32;
}

/// Cadence and naming knobs for the run loop
#[derive(Debug, Clone, Copy)]
pub struct RunLoopConfig {
    /// Prefix for generated capture names
    pub capture_prefix: &'static str,
    /// Extension for generated capture names (may be empty)
    pub capture_ext: &'static str,
    /// Status snapshot period (ms)
    pub status_period_ms: u32,
    /// Overflow surfacing period (ms)
    pub overflow_period_ms: u32,
    /// Free-memory sampling period (ms)
    pub memory_period_ms: u32,
    /// Low-memory water mark (bytes)
    pub low_memory_water: u32,
    /// Failing update ticks before the error indication latches
    pub error_streak_limit: u32,
    /// Cooperative yield per tick (µs)
    pub tick_delay_us: u32,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            capture_prefix: "data",
            capture_ext: ".bin",
            status_period_ms: STATUS_PERIOD_MS,
            overflow_period_ms: OVERFLOW_PERIOD_MS,
            memory_period_ms: MEMORY_PERIOD_MS,
            low_memory_water: LOW_MEMORY_WATER,
            error_streak_limit: ERROR_STREAK_LIMIT,
            tick_delay_us: TICK_DELAY_US,
        }
    }
}

/// The cooperative scheduler tying receiver, router and observer
/// together
pub struct RunLoop<P, C, SD, NOR, HEX, O, M, const N: usize> {
    receiver: ParallelReceiver<P, C, N>,
    router: StorageRouter<SD, NOR, HEX>,
    observer: O,
    mem: M,
    clock: C,
    cfg: RunLoopConfig,
    last_status_ms: u32,
    last_overflow_ms: u32,
    last_memory_ms: u32,
    error_streak: u32,
    error_latched: bool,
    drain_buf: [u8; DRAIN_CHUNK],
}

impl<P, C, SD, NOR, HEX, O, M, const N: usize> RunLoop<P, C, SD, NOR, HEX, O, M, N>
where
    P: PortPins,
    C: Clock,
    SD: StorageBackend,
    NOR: StorageBackend,
    HEX: StorageBackend,
    O: Observer,
    M: MemGauge,
{
    /// Assemble the loop from already-constructed components
    pub fn new(
        receiver: ParallelReceiver<P, C, N>,
        router: StorageRouter<SD, NOR, HEX>,
        observer: O,
        mem: M,
        clock: C,
        cfg: RunLoopConfig,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            receiver,
            router,
            observer,
            mem,
            clock,
            cfg,
            last_status_ms: now,
            last_overflow_ms: now,
            last_memory_ms: now,
            error_streak: 0,
            error_latched: false,
            drain_buf: [0; DRAIN_CHUNK],
        }
    }

    /// One pass of the cooperative schedule
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();

        // 1. Let the storage stack advance.
        match self.router.update() {
            Ok(()) => self.error_streak = 0,
            Err(e) => {
                log::warn!("component update failed: {}", e);
                self.observer.on_error(e, "storage update failed");
                self.error_streak += 1;
                if self.error_streak >= self.cfg.error_streak_limit && !self.error_latched {
                    self.error_latched = true;
                    self.observer.on_error(e, "persistent errors, error indication latched");
                }
            }
        }

        // 2. Drain captured bytes into a new file. A partial write is
        //    reported, not retried; the bytes are not re-queued.
        if self.receiver.available() > 0 {
            let n = self.receiver.read(&mut self.drain_buf, DRAIN_CHUNK);
            if n > 0 {
                let mut name = FileName::default();
                match self.router.write_auto(
                    self.cfg.capture_prefix,
                    self.cfg.capture_ext,
                    &self.drain_buf[..n],
                    Some(&mut name),
                ) {
                    Ok(written) if written == n => {
                        log::info!("captured {} bytes to '{}'", written, name);
                        self.observer.on_file_captured(name.as_str(), written);
                    }
                    Ok(written) => {
                        log::warn!("partial capture write: {} of {} bytes", written, n);
                        self.observer.on_error(ErrorKind::IoError, "partial capture write");
                    }
                    Err(e) => {
                        log::warn!("capture write failed: {}", e);
                        self.observer.on_error(e, "capture write failed");
                    }
                }
            }
        }

        // 3. Periodic status snapshot.
        if now.wrapping_sub(self.last_status_ms) >= self.cfg.status_period_ms {
            self.last_status_ms = now;
            let stats = self.receiver.stats();
            let snapshot = StatusSnapshot {
                bytes_total: stats.bytes_total,
                overflows: stats.overflows,
                buffer_utilization_pct: self.receiver.utilization_pct(),
                free_memory: self.mem.free_bytes(),
            };
            self.observer.on_status_tick(&snapshot);
        }

        // 4. Surface a latched overflow at most once per period.
        if now.wrapping_sub(self.last_overflow_ms) >= self.cfg.overflow_period_ms {
            self.last_overflow_ms = now;
            if self.receiver.had_overflow() {
                self.receiver.clear_overflow();
                self.observer
                    .on_error(ErrorKind::NoSpace, "capture buffer overflow");
            }
        }

        // 5. Free-memory watermark.
        if now.wrapping_sub(self.last_memory_ms) >= self.cfg.memory_period_ms {
            self.last_memory_ms = now;
            let free = self.mem.free_bytes();
            if free < self.cfg.low_memory_water {
                log::warn!("low memory: {} bytes free", free);
                self.observer.on_error(ErrorKind::NoSpace, "low memory");
                self.error_latched = true;
            }
        }

        // 6. Yield.
        self.clock.delay_us(self.cfg.tick_delay_us);
    }

    /// Run a bounded number of ticks (test harnesses, soak runs)
    pub fn run_for(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Run forever
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
        }
    }

    /// True once the error indication has latched
    pub fn error_latched(&self) -> bool {
        self.error_latched
    }

    /// Access the receiver (operator surface, interrupt wiring)
    pub fn receiver_mut(&mut self) -> &mut ParallelReceiver<P, C, N> {
        &mut self.receiver
    }

    /// Access the router (operator surface)
    pub fn router_mut(&mut self) -> &mut StorageRouter<SD, NOR, HEX> {
        &mut self.router
    }

    /// Access the observer
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
}
