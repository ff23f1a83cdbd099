//! Parallel receiver behavior against the simulated port peer
//!
//! The tests play the host side of the wire: put a byte on the bus,
//! fire the strobe, and watch the handshake and the queue.

use scopebridge_core::port::ParallelReceiver;
use scopebridge_sim::{SimClock, SimPort};

fn strobe(port: &SimPort, rx: &mut ParallelReceiver<SimPort, SimClock, 16>, byte: u8) {
    port.peer_write(byte);
    rx.handle_interrupt();
}

#[test]
fn bytes_arrive_in_order() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock);

    let payload = [0x48u8, 0x69, 0x0A];
    for &b in &payload {
        strobe(&port, &mut rx, b);
    }

    assert_eq!(rx.available(), 3);
    assert_eq!(rx.peek(), Some(0x48));

    let mut out = [0u8; 16];
    let n = rx.read(&mut out, 16);
    assert_eq!(n, 3);
    assert_eq!(&out[..3], &payload);
    assert_eq!(rx.available(), 0);
}

#[test]
fn full_drain_yields_longest_prefix_on_overflow() {
    // Capacity 16, peer sends 20 bytes back to back.
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock.clone());

    for i in 0..20u8 {
        strobe(&port, &mut rx, i);
        clock.advance_us(30);
    }

    let stats = rx.stats();
    assert_eq!(stats.interrupts_total, 20);
    assert_eq!(stats.bytes_total, 16);
    assert_eq!(stats.overflows, 4);

    // Every single strobe received a complete handshake.
    assert_eq!(port.ack_pulses(), 20);
    assert_eq!(port.busy_assertions(), 20);
    assert!(!port.busy_level());

    // The drain yields exactly the prefix that fit.
    let mut out = [0u8; 32];
    let n = rx.read(&mut out, 32);
    assert_eq!(n, 16);
    for (i, &b) in out[..16].iter().enumerate() {
        assert_eq!(b, i as u8);
    }

    // Overflow is observable exactly once.
    assert!(rx.had_overflow());
    rx.clear_overflow();
    assert!(!rx.had_overflow());
}

#[test]
fn isr_work_fits_the_budget() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock);

    for i in 0..16u8 {
        strobe(&port, &mut rx, i);
    }

    // The simulated pins consume exactly the mandated holds, so the
    // residual work figure must sit inside the 2 us budget.
    let stats = rx.stats();
    assert!(stats.isr_max_us <= 2, "isr_max_us = {}", stats.isr_max_us);
}

#[test]
fn disabled_receiver_ignores_strobes() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock);

    rx.enable(false);
    assert!(!rx.is_enabled());
    strobe(&port, &mut rx, 0xAB);

    assert_eq!(rx.available(), 0);
    assert_eq!(rx.stats().interrupts_total, 0);
    assert_eq!(port.ack_pulses(), 0);

    rx.enable(true);
    strobe(&port, &mut rx, 0xAB);
    assert_eq!(rx.available(), 1);
}

#[test]
fn clear_discards_pending_bytes() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock);

    for i in 0..5u8 {
        strobe(&port, &mut rx, i);
    }
    assert_eq!(rx.available(), 5);
    rx.clear();
    assert_eq!(rx.available(), 0);
    assert_eq!(rx.peek(), None);

    // Stats survive a queue clear.
    assert_eq!(rx.stats().bytes_total, 5);
}

#[test]
fn signal_self_test_passes_on_healthy_wiring() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock);

    assert!(rx.self_test_signals());

    // Lines are back in their idle state afterwards.
    assert!(!port.busy_level());
}

#[test]
fn test_capture_counts_only_the_window() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock.clone());

    strobe(&port, &mut rx, 1);
    strobe(&port, &mut rx, 2);

    // No peer during the window; the call must still terminate.
    let seen = rx.test_capture(50);
    assert_eq!(seen, 0);
    assert!(clock.elapsed_us() >= 50_000);
}

#[test]
fn utilization_reflects_queue_depth() {
    let clock = SimClock::new();
    let port = SimPort::new(clock.clone());
    let mut rx: ParallelReceiver<_, _, 16> = ParallelReceiver::new(port.clone(), clock);

    assert_eq!(rx.utilization_pct(), 0);
    for i in 0..8u8 {
        strobe(&port, &mut rx, i);
    }
    assert_eq!(rx.utilization_pct(), 50);
}
