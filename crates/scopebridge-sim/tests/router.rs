//! Router selection policy, fail-over, copy and self-test

use scopebridge_core::error::ErrorKind;
use scopebridge_core::nor::{FlatFs, NorFlash};
use scopebridge_core::storage::{
    FileName, HexStream, SdBackend, StorageKind, StorageRouter,
};
use scopebridge_sim::{MemFlash, SimCard, SimClock, SimLink};

type TestRouter =
    StorageRouter<SdBackend<SimCard, SimCard>, FlatFs<MemFlash>, HexStream<SimLink, SimClock>>;

fn make_router() -> (TestRouter, SimCard, MemFlash, SimLink, SimClock) {
    let clock = SimClock::new();
    let card = SimCard::new();
    let flash = MemFlash::new();
    let link = SimLink::new();

    let mut nor = FlatFs::new(NorFlash::new(flash.clone()));
    nor.format().expect("format");
    let sd = SdBackend::new(card.clone(), card.clone());
    let hex = HexStream::new(link.clone(), clock.clone());

    let mut router = StorageRouter::new(sd, nor, hex);
    router.update().expect("first tick");
    (router, card, flash, link, clock)
}

#[test]
fn auto_prefers_sd_then_nor_then_hex() {
    let (mut router, card, _, link, _) = make_router();
    assert_eq!(router.selected(), StorageKind::Sd);

    card.eject();
    router.update().unwrap();
    assert_eq!(router.selected(), StorageKind::Nor);

    // With the NOR gone too (simulated by selecting HEX readiness
    // order directly), auto falls through to HEX.
    link.set_ready(true);
    assert!(router.select(StorageKind::Hex));
    assert_eq!(router.selected(), StorageKind::Hex);
}

#[test]
fn ejecting_the_card_fails_over_and_reinsertion_does_not_disturb() {
    let (mut router, card, _, _, _) = make_router();
    assert_eq!(router.selected(), StorageKind::Sd);
    router.write("before.bin", &[1, 2]).unwrap();
    assert_eq!(card.file_count(), 1);

    // Card leaves mid-run; the next tick switches to NOR.
    card.eject();
    router.update().unwrap();
    assert_eq!(router.selected(), StorageKind::Nor);

    router.write("after.bin", &[3, 4]).unwrap();
    assert_eq!(card.file_count(), 1);
    assert!(router.exists("after.bin"));

    // Re-inserting the card does not disturb the running capture.
    card.insert();
    router.update().unwrap();
    assert_eq!(router.selected(), StorageKind::Nor);

    // The operator can ask for a re-evaluation.
    assert!(router.select(StorageKind::Auto));
    assert_eq!(router.selected(), StorageKind::Sd);
}

#[test]
fn manual_selection_sticks_until_its_backend_drops() {
    let (mut router, card, _, _, _) = make_router();
    assert!(router.select(StorageKind::Sd));
    router.update().unwrap();
    assert_eq!(router.selected(), StorageKind::Sd);

    card.eject();
    router.update().unwrap();
    // Manual choice lost with its backend; auto picked NOR.
    assert_eq!(router.selected(), StorageKind::Nor);

    card.insert();
    router.update().unwrap();
    assert_eq!(router.selected(), StorageKind::Nor);
}

#[test]
fn selecting_an_unready_backend_fails() {
    let (mut router, card, _, _, _) = make_router();
    card.eject();
    router.update().unwrap();
    assert!(!router.select(StorageKind::Sd));
    assert_eq!(router.selected(), StorageKind::Nor);
}

#[test]
fn select_is_idempotent() {
    let (mut router, _, _, _, _) = make_router();
    assert!(router.select(StorageKind::Nor));
    let first = router.selected();
    assert!(router.select(StorageKind::Nor));
    assert_eq!(router.selected(), first);
    assert_eq!(first, StorageKind::Nor);
}

#[test]
fn write_validates_names() {
    let (mut router, _, _, _, _) = make_router();
    for bad in ["", "a/b", "a\\b", "a:b", "a*b", "a?b", "a\"b", "a<b", "a>b", "a|b"] {
        assert_eq!(router.write(bad, &[1]), Err(ErrorKind::InvalidName), "{bad:?}");
    }
    assert_eq!(
        router.write("name_is_much_too_long", &[1]),
        Err(ErrorKind::InvalidName)
    );
}

#[test]
fn write_auto_generates_increasing_names() {
    let (mut router, _, _, _, _) = make_router();
    router.select(StorageKind::Nor);

    let mut first = FileName::default();
    let mut second = FileName::default();
    router
        .write_auto("cap", ".bin", &[1], Some(&mut first))
        .unwrap();
    router
        .write_auto("cap", ".bin", &[2], Some(&mut second))
        .unwrap();

    assert_eq!(first.as_str(), "cap_0001.bin");
    assert_eq!(second.as_str(), "cap_0002.bin");
    assert!(router.exists("cap_0001.bin"));
}

#[test]
fn write_auto_rejects_oversized_patterns() {
    let (mut router, _, _, _, _) = make_router();
    assert_eq!(
        router.write_auto("much_too_long", ".bin", &[1], None),
        Err(ErrorKind::InvalidName)
    );
}

#[test]
fn copy_streams_a_file_from_nor_to_the_hex_link() {
    let (mut router, _, _, link, _) = make_router();
    router.select(StorageKind::Nor);
    router.write("A", &[0x10, 0x20, 0x30]).unwrap();

    router.copy("A", StorageKind::Nor, StorageKind::Hex).unwrap();
    assert_eq!(
        link.take_transcript(),
        "BEGIN:A\r\nSIZE:3\r\n102030\r\nEND:A\r\n"
    );
}

#[test]
fn copy_preserves_content_between_media() {
    let (mut router, _, _, _, _) = make_router();
    router.select(StorageKind::Nor);
    let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
    router.write("wave.bin", &payload).unwrap();

    router
        .copy("wave.bin", StorageKind::Nor, StorageKind::Sd)
        .unwrap();

    router.select(StorageKind::Sd);
    let mut out = vec![0u8; 512];
    let n = router.read("wave.bin", &mut out).unwrap();
    assert_eq!(n, 300);
    assert_eq!(&out[..300], &payload[..]);
}

#[test]
fn copy_rejects_sources_larger_than_the_transfer_buffer() {
    let (mut router, _, _, _, _) = make_router();
    router.select(StorageKind::Nor);
    router.write("big.bin", &vec![0u8; 600]).unwrap();
    assert_eq!(
        router.copy("big.bin", StorageKind::Nor, StorageKind::Sd),
        Err(ErrorKind::BufferTooSmall)
    );
}

#[test]
fn copy_rejects_degenerate_requests() {
    let (mut router, _, _, _, _) = make_router();
    assert_eq!(
        router.copy("a", StorageKind::Nor, StorageKind::Nor),
        Err(ErrorKind::Unsupported)
    );
    assert_eq!(
        router.copy("a", StorageKind::Auto, StorageKind::Nor),
        Err(ErrorKind::Unsupported)
    );
    assert_eq!(
        router.copy("missing", StorageKind::Nor, StorageKind::Sd),
        Err(ErrorKind::NotFound)
    );
}

#[test]
fn test_write_roundtrips_on_real_media_only() {
    let (mut router, _, _, _, _) = make_router();

    router.select(StorageKind::Sd);
    assert!(router.test_write());
    assert!(!router.exists("test.dat"));

    router.select(StorageKind::Nor);
    assert!(router.test_write());
    assert!(!router.exists("test.dat"));

    // A stream cannot read its test pattern back.
    router.select(StorageKind::Hex);
    assert!(!router.test_write());
}

#[test]
fn sd_format_is_refused() {
    let (mut router, _, _, _, _) = make_router();
    router.select(StorageKind::Sd);
    assert_eq!(router.format(), Err(ErrorKind::Unsupported));
}

#[test]
fn write_protected_card_is_not_ready() {
    let (mut router, card, _, _, _) = make_router();
    card.set_write_protected(true);
    router.update().unwrap();
    // Readiness folds write protect, so auto moved off the card.
    assert_eq!(router.selected(), StorageKind::Nor);

    card.set_write_protected(false);
    router.update().unwrap();
    assert_eq!(router.selected(), StorageKind::Nor);
}

#[test]
fn stats_accumulate() {
    let (mut router, _, _, _, _) = make_router();
    router.select(StorageKind::Nor);
    router.write("a.bin", &[0u8; 10]).unwrap();
    router.write("b.bin", &[0u8; 20]).unwrap();
    let mut out = [0u8; 32];
    router.read("a.bin", &mut out).unwrap();

    let stats = router.stats();
    assert_eq!(stats.files_written, 2);
    assert_eq!(stats.bytes_written, 30);
    assert_eq!(stats.files_read, 1);
    assert_eq!(stats.bytes_read, 10);

    router.reset_stats();
    assert_eq!(router.stats().files_written, 0);
}

#[test]
fn space_reports_the_selected_backend() {
    let (mut router, _, _, _, _) = make_router();
    router.select(StorageKind::Nor);
    let (avail, total) = router.space();
    assert!(avail > 0);
    assert!(total >= avail);

    router.select(StorageKind::Hex);
    assert_eq!(router.space(), (u32::MAX, u32::MAX));
}
