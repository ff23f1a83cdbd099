//! End-to-end scenarios through the cooperative run loop

use scopebridge_core::error::{ErrorKind, Result};
use scopebridge_core::nor::{FlatFs, NorFlash};
use scopebridge_core::port::ParallelReceiver;
use scopebridge_core::runloop::{RunLoop, RunLoopConfig};
use scopebridge_core::storage::{
    FileName, HexStream, SdBackend, StorageBackend, StorageKind, StorageRouter,
};
use scopebridge_sim::{
    FixedMemGauge, MemFlash, RecordingObserver, SimCard, SimClock, SimLink, SimPort,
};

struct Rig {
    runloop: RunLoop<
        SimPort,
        SimClock,
        SdBackend<SimCard, SimCard>,
        FlatFs<MemFlash>,
        HexStream<SimLink, SimClock>,
        RecordingObserver,
        FixedMemGauge,
        8,
    >,
    port: SimPort,
    card: SimCard,
    clock: SimClock,
    observer: RecordingObserver,
    mem: FixedMemGauge,
}

fn make_rig(cfg: RunLoopConfig) -> Rig {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let card = SimCard::new();
    let flash = MemFlash::new();
    let link = SimLink::new();
    let observer = RecordingObserver::new();
    let mem = FixedMemGauge::new(4_096);

    let receiver: ParallelReceiver<_, _, 8> = ParallelReceiver::new(port.clone(), clock.clone());
    let mut nor = FlatFs::new(NorFlash::new(flash.clone()));
    nor.format().expect("format");
    let sd = SdBackend::new(card.clone(), card.clone());
    let hex = HexStream::new(link.clone(), clock.clone());
    let router = StorageRouter::new(sd, nor, hex);

    let runloop = RunLoop::new(
        receiver,
        router,
        observer.clone(),
        mem.clone(),
        clock.clone(),
        cfg,
    );

    Rig {
        runloop,
        port,
        card,
        clock,
        observer,
        mem,
    }
}

fn strobe(rig: &mut Rig, byte: u8) {
    rig.port.peer_write(byte);
    rig.runloop.receiver_mut().handle_interrupt();
}

#[test]
fn capture_lands_on_nor_when_selected() {
    // SD absent, NOR formatted, operator selects NOR, names carry no
    // extension.
    let cfg = RunLoopConfig {
        capture_prefix: "data",
        capture_ext: "",
        ..RunLoopConfig::default()
    };
    let mut rig = make_rig(cfg);
    rig.card.eject();
    rig.runloop.router_mut().update().unwrap();
    assert!(rig.runloop.router_mut().select(StorageKind::Nor));

    for byte in [0x48, 0x69, 0x0A] {
        strobe(&mut rig, byte);
    }
    rig.runloop.tick();

    let mut names = [FileName::default(); 8];
    let router = rig.runloop.router_mut();
    assert_eq!(router.list(&mut names), 1);
    assert_eq!(names[0].as_str(), "data_0001");
    assert_eq!(router.size("data_0001").unwrap(), 3);

    let mut out = [0u8; 8];
    assert_eq!(router.read("data_0001", &mut out).unwrap(), 3);
    assert_eq!(&out[..3], &[0x48, 0x69, 0x0A]);

    assert_eq!(rig.observer.captured_files(), vec!["data_0001".to_string()]);
}

#[test]
fn each_drain_becomes_its_own_file() {
    let mut rig = make_rig(RunLoopConfig::default());
    rig.runloop.router_mut().update().unwrap();

    strobe(&mut rig, 0x01);
    rig.runloop.tick();
    strobe(&mut rig, 0x02);
    strobe(&mut rig, 0x03);
    rig.runloop.tick();

    assert_eq!(
        rig.observer.captured_files(),
        vec!["data_0001.bin".to_string(), "data_0002.bin".to_string()]
    );
    // Default selection wrote to the card.
    assert_eq!(rig.card.file_count(), 2);
}

#[test]
fn status_snapshot_every_five_seconds() {
    let mut rig = make_rig(RunLoopConfig::default());
    rig.runloop.tick();
    assert!(rig.observer.status_ticks().is_empty());

    strobe(&mut rig, 0xAA);
    rig.clock.advance_ms(5_000);
    rig.runloop.tick();

    let ticks = rig.observer.status_ticks();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].bytes_total, 1);
    assert_eq!(ticks[0].overflows, 0);
    assert_eq!(ticks[0].free_memory, 4_096);

    // The next snapshot needs another full period.
    rig.runloop.tick();
    assert_eq!(rig.observer.status_ticks().len(), 1);
    rig.clock.advance_ms(5_000);
    rig.runloop.tick();
    assert_eq!(rig.observer.status_ticks().len(), 2);
}

#[test]
fn overflow_is_surfaced_once_per_period() {
    let mut rig = make_rig(RunLoopConfig::default());

    // Queue capacity is 8; 10 strobes without a drain overflow it.
    for i in 0..10u8 {
        strobe(&mut rig, i);
    }

    rig.clock.advance_ms(5_000);
    rig.runloop.tick();

    let overflows: Vec<_> = rig
        .observer
        .errors()
        .into_iter()
        .filter(|(_, d)| d == "capture buffer overflow")
        .collect();
    assert_eq!(overflows.len(), 1);
    assert_eq!(overflows[0].0, ErrorKind::NoSpace);

    // Cleared now; the next period reports nothing new.
    rig.clock.advance_ms(5_000);
    rig.runloop.tick();
    let overflows: Vec<_> = rig
        .observer
        .errors()
        .into_iter()
        .filter(|(_, d)| d == "capture buffer overflow")
        .collect();
    assert_eq!(overflows.len(), 1);
}

#[test]
fn low_memory_latches_the_error_indication() {
    let mut rig = make_rig(RunLoopConfig::default());
    rig.runloop.tick();
    assert!(!rig.runloop.error_latched());

    rig.mem.set_free(512);
    rig.clock.advance_ms(10_000);
    rig.runloop.tick();

    assert!(rig.runloop.error_latched());
    assert!(rig
        .observer
        .errors()
        .iter()
        .any(|(k, d)| *k == ErrorKind::NoSpace && d == "low memory"));
}

/// Backend whose update always fails, for the persistent-error path
struct BrokenBackend;

impl StorageBackend for BrokenBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Sd
    }
    fn label(&self) -> &'static str {
        "BROKEN"
    }
    fn is_ready(&self) -> bool {
        false
    }
    fn update(&mut self) -> Result<()> {
        Err(ErrorKind::IoError)
    }
    fn write(&mut self, _: &str, _: &[u8]) -> Result<usize> {
        Err(ErrorKind::NotReady)
    }
    fn read(&mut self, _: &str, _: &mut [u8]) -> Result<usize> {
        Err(ErrorKind::NotReady)
    }
    fn delete(&mut self, _: &str) -> Result<()> {
        Err(ErrorKind::NotReady)
    }
    fn exists(&mut self, _: &str) -> bool {
        false
    }
    fn size(&mut self, _: &str) -> Result<u32> {
        Err(ErrorKind::NotReady)
    }
    fn list(&mut self, _: &mut [FileName]) -> usize {
        0
    }
    fn format(&mut self) -> Result<()> {
        Err(ErrorKind::NotReady)
    }
    fn space(&self) -> (u32, u32) {
        (0, 0)
    }
}

#[test]
fn persistent_update_errors_latch_the_indication() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let flash = MemFlash::new();
    let link = SimLink::new();
    let observer = RecordingObserver::new();
    let mem = FixedMemGauge::new(4_096);

    let receiver: ParallelReceiver<_, _, 8> = ParallelReceiver::new(port, clock.clone());
    let mut nor = FlatFs::new(NorFlash::new(flash));
    nor.format().unwrap();
    let hex = HexStream::new(link, clock.clone());
    let router = StorageRouter::new(BrokenBackend, nor, hex);

    let mut runloop = RunLoop::new(
        receiver,
        router,
        observer.clone(),
        mem,
        clock,
        RunLoopConfig::default(),
    );

    runloop.run_for(9);
    assert!(!runloop.error_latched());
    runloop.run_for(1);
    assert!(runloop.error_latched());

    assert!(observer
        .errors()
        .iter()
        .any(|(_, d)| d.contains("persistent errors")));

    // Capture still routes to the surviving backend.
    assert_eq!(runloop.router_mut().selected(), StorageKind::Nor);
}

#[test]
fn failover_mid_capture_keeps_writing() {
    let mut rig = make_rig(RunLoopConfig::default());
    rig.runloop.router_mut().update().unwrap();
    assert_eq!(rig.runloop.router_mut().selected(), StorageKind::Sd);

    strobe(&mut rig, 0x11);
    rig.runloop.tick();
    assert_eq!(rig.card.file_count(), 1);

    rig.card.eject();
    strobe(&mut rig, 0x22);
    rig.runloop.tick();

    // The second capture went to the NOR after fail-over.
    assert_eq!(rig.runloop.router_mut().selected(), StorageKind::Nor);
    assert_eq!(rig.card.file_count(), 1);
    assert_eq!(rig.observer.captured_files().len(), 2);

    let router = rig.runloop.router_mut();
    assert!(router.exists("data_0002.bin"));
}
