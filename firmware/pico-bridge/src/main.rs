//! scopebridge firmware for the Raspberry Pi Pico
//!
//! Composition root on real hardware: every component is constructed
//! once at startup, the receiver is parked in a critical-section cell
//! shared with the strobe handler, and only then is the strobe edge
//! armed. The strobe task runs on an interrupt executor so it
//! preempts the storage task the way a bare ISR would.

#![no_std]
#![no_main]

mod hw;

use core::cell::RefCell;

use critical_section::Mutex;
use defmt::{info, warn};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::gpio::{Flex, Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::spi::{self, Spi};
use embassy_rp::uart::{self, Uart};
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

use scopebridge_core::config::{DRAIN_CHUNK, STATUS_PERIOD_MS};
use scopebridge_core::nor::{FlatFs, NorFlash};
use scopebridge_core::port::ParallelReceiver;
use scopebridge_core::storage::{FileName, HexStream, SdBackend, StorageRouter};

use crate::hw::{BoardClock, BoardPort, FlashBus, NoCard, UartLink};

type Receiver = ParallelReceiver<BoardPort, BoardClock>;

/// Receiver shared between the strobe handler and the storage task.
/// Initialized before the strobe edge is armed.
static RECEIVER: Mutex<RefCell<Option<Receiver>>> = Mutex::new(RefCell::new(None));

static EXECUTOR_HI: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HI.on_interrupt()
}

fn with_receiver<R>(f: impl FnOnce(&mut Receiver) -> R) -> Option<R> {
    critical_section::with(|cs| RECEIVER.borrow(cs).borrow_mut().as_mut().map(f))
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    info!("scopebridge starting");

    // ---- Parallel port ----
    let data = [
        Flex::new(p.PIN_0),
        Flex::new(p.PIN_1),
        Flex::new(p.PIN_2),
        Flex::new(p.PIN_3),
        Flex::new(p.PIN_4),
        Flex::new(p.PIN_5),
        Flex::new(p.PIN_6),
        Flex::new(p.PIN_7),
    ];
    let mut port = BoardPort {
        data,
        busy: Output::new(p.PIN_9, Level::Low),
        ack: Output::new(p.PIN_10, Level::High),
        error: Output::new(p.PIN_11, Level::High),
        select: Output::new(p.PIN_12, Level::High),
        paper_out: Output::new(p.PIN_13, Level::Low),
        autofeed: Input::new(p.PIN_14, Pull::Up),
        init: Input::new(p.PIN_15, Pull::Up),
        select_in: Input::new(p.PIN_22, Pull::Up),
    };
    for pin in port.data.iter_mut() {
        pin.set_as_input();
    }
    let strobe = Input::new(p.PIN_8, Pull::Up);

    // ---- SPI NOR flash ----
    let mut spi_config = spi::Config::default();
    spi_config.frequency = 4_000_000;
    let flash_spi: Spi<'static, _, spi::Blocking> =
        Spi::new_blocking(p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, spi_config);
    let flash_cs = Output::new(p.PIN_17, Level::High);
    let bus = FlashBus {
        spi: flash_spi,
        cs: flash_cs,
    };

    // ---- UART hex link ----
    let uart = Uart::new_blocking(p.UART0, p.PIN_20, p.PIN_21, uart::Config::default());
    let link = UartLink { uart };

    // ---- Storage stack ----
    let mut nor = FlatFs::new(NorFlash::new(bus));
    match nor.mount() {
        Ok(()) => info!("NOR mounted, {} files", nor.counts().0),
        Err(e) => {
            warn!("NOR mount failed ({}), formatting", defmt::Debug2Format(&e));
            if let Err(e) = nor.format() {
                warn!("NOR format failed: {}", defmt::Debug2Format(&e));
            }
        }
    }
    let sd = SdBackend::new(NoCard, NoCard);
    let hex = HexStream::new(link, BoardClock);
    let mut router = StorageRouter::new(sd, nor, hex);
    router.update().ok();
    info!(
        "storage ready, selected {}",
        defmt::Display2Format(&router.selected())
    );

    // ---- Receiver, shared with the strobe handler ----
    let receiver = ParallelReceiver::new(port, BoardClock);
    critical_section::with(|cs| {
        *RECEIVER.borrow(cs).borrow_mut() = Some(receiver);
    });

    // Strobe servicing preempts storage I/O.
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let hi = EXECUTOR_HI.start(interrupt::SWI_IRQ_1);
    hi.must_spawn(strobe_task(strobe));

    spawner.must_spawn(storage_task(router));

    info!("scopebridge ready for capture");
}

/// Waits for strobe edges and runs the byte handshake
#[embassy_executor::task]
async fn strobe_task(mut strobe: Input<'static>) {
    loop {
        strobe.wait_for_falling_edge().await;
        with_receiver(|rx| rx.handle_interrupt());
    }
}

/// Cooperative storage loop: drain captures, log status
#[embassy_executor::task]
async fn storage_task(
    mut router: StorageRouter<
        SdBackend<NoCard, NoCard>,
        FlatFs<FlashBus>,
        HexStream<UartLink, BoardClock>,
    >,
) {
    let mut drain_buf = [0u8; DRAIN_CHUNK];
    let mut last_status = embassy_time::Instant::now();

    loop {
        if let Err(e) = router.update() {
            warn!("storage update failed: {}", defmt::Debug2Format(&e));
        }

        let n = with_receiver(|rx| rx.read(&mut drain_buf, DRAIN_CHUNK)).unwrap_or(0);
        if n > 0 {
            let mut name = FileName::default();
            match router.write_auto("data", ".bin", &drain_buf[..n], Some(&mut name)) {
                Ok(written) => info!("captured {} bytes to {}", written, name.as_str()),
                Err(e) => warn!("capture write failed: {}", defmt::Debug2Format(&e)),
            }
        }

        if last_status.elapsed().as_millis() as u32 >= STATUS_PERIOD_MS {
            last_status = embassy_time::Instant::now();
            if let Some(stats) = with_receiver(|rx| rx.stats()) {
                info!(
                    "status: {} bytes, {} overflows, isr max {} us, backend {}",
                    stats.bytes_total,
                    stats.overflows,
                    stats.isr_max_us,
                    defmt::Display2Format(&router.selected())
                );
            }
            if with_receiver(|rx| {
                let latched = rx.had_overflow();
                if latched {
                    rx.clear_overflow();
                }
                latched
            })
            .unwrap_or(false)
            {
                warn!("capture buffer overflow");
            }
        }

        Timer::after_millis(1).await;
    }
}
