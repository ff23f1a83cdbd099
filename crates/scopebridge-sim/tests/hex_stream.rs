//! Hex framing wire behavior, transcript-exact where it matters

use scopebridge_core::storage::HexStream;
use scopebridge_sim::{SimClock, SimLink};

fn fresh() -> (HexStream<SimLink, SimClock>, SimLink, SimClock) {
    let clock = SimClock::new();
    let link = SimLink::new();
    let stream = HexStream::new(link.clone(), clock.clone());
    (stream, link, clock)
}

#[test]
fn short_file_transcript_is_exact() {
    let (mut stream, link, _) = fresh();
    assert_eq!(stream.write("A", &[0x10, 0x20, 0x30]).unwrap(), 3);
    assert_eq!(
        link.take_transcript(),
        "BEGIN:A\r\nSIZE:3\r\n102030\r\nEND:A\r\n"
    );
}

#[test]
fn group_space_after_every_eight_bytes() {
    let (mut stream, link, _) = fresh();
    let data: Vec<u8> = (0..16).collect();
    stream.write("g", &data).unwrap();

    let transcript = link.take_transcript();
    assert!(
        transcript.contains("0001020304050607 08090A0B0C0D0E0F\r\n"),
        "transcript: {transcript:?}"
    );
    // No trailing space at the line end.
    assert!(!transcript.contains(" \r\n"));
}

#[test]
fn stride_splits_lines() {
    let (mut stream, link, _) = fresh();
    stream.set_line_stride(8);
    assert_eq!(stream.line_stride(), 8);

    let data: Vec<u8> = (0..16).collect();
    stream.write("s", &data).unwrap();

    assert_eq!(
        link.take_transcript(),
        "BEGIN:s\r\nSIZE:16\r\n0001020304050607\r\n08090A0B0C0D0E0F\r\nEND:s\r\n"
    );
}

#[test]
fn stride_is_clamped() {
    let (mut stream, _, _) = fresh();
    stream.set_line_stride(0);
    assert_eq!(stream.line_stride(), 1);
    stream.set_line_stride(1000);
    assert_eq!(stream.line_stride(), 64);
}

#[test]
fn write_then_receive_roundtrips() {
    let (mut stream, link, _) = fresh();
    let data: Vec<u8> = (0..100u32).map(|i| (i * 13) as u8).collect();
    assert_eq!(stream.write("loop.bin", &data).unwrap(), 100);

    // Loop the transcript back into the receive side.
    let wire = link.take_tx();
    link.feed(&wire);

    let mut out = vec![0u8; 256];
    let n = stream.receive(&mut out, 1_000);
    assert_eq!(n, 100);
    assert_eq!(&out[..100], &data[..]);
}

#[test]
fn receive_ignores_framing_lines() {
    let (mut stream, link, _) = fresh();
    link.feed_line("BEGIN:X");
    link.feed_line("SIZE:4");
    link.feed_line("DEAD BEEF");
    link.feed_line("END:X");

    let mut out = [0u8; 4];
    let n = stream.receive(&mut out, 1_000);
    assert_eq!(n, 4);
    assert_eq!(out, [0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn receive_accepts_lower_case_and_address_prefixes() {
    let (mut stream, link, _) = fresh();
    link.feed_line("BEGIN:y");
    link.feed_line("SIZE:6");
    link.feed_line("00000000: c0ffee");
    link.feed_line("00000003: 102030");
    link.feed_line("END:y");

    let mut out = [0u8; 8];
    let n = stream.receive(&mut out, 1_000);
    assert_eq!(n, 6);
    assert_eq!(&out[..6], &[0xC0, 0xFF, 0xEE, 0x10, 0x20, 0x30]);
}

#[test]
fn abort_line_terminates_the_transfer() {
    let (mut stream, link, _) = fresh();
    link.feed_line("BEGIN:z");
    link.feed_line("AABB");
    link.feed_line("ABORT:cable pulled");
    link.feed_line("CCDD");
    link.feed_line("END:z");

    let mut out = [0u8; 8];
    let n = stream.receive(&mut out, 1_000);
    assert_eq!(n, 2);
    assert_eq!(&out[..2], &[0xAA, 0xBB]);
}

#[test]
fn receive_times_out_on_a_silent_link() {
    let (mut stream, _, clock) = fresh();
    let mut out = [0u8; 8];
    let n = stream.receive(&mut out, 50);
    assert_eq!(n, 0);
    assert!(clock.elapsed_us() >= 50_000);
}

#[test]
fn progress_pings_appear_each_kib_when_debug_is_on() {
    let (mut stream, link, _) = fresh();
    stream.set_debug(true);
    let data = vec![0x11u8; 2148];
    stream.write("big", &data).unwrap();

    let transcript = link.take_transcript();
    assert!(transcript.contains("PROGRESS:big:1024/2148 (47%)\r\n"));
    assert!(transcript.contains("PROGRESS:big:2048/2148 (95%)\r\n"));

    // Never after the footer.
    let end = transcript.find("END:big").unwrap();
    assert!(transcript[end..].find("PROGRESS").is_none());
}

#[test]
fn no_progress_pings_by_default() {
    let (mut stream, link, _) = fresh();
    stream.write("quiet", &vec![0u8; 4096]).unwrap();
    assert!(!link.take_transcript().contains("PROGRESS"));
}

#[test]
fn stats_track_outbound_transfers() {
    let (mut stream, _, _) = fresh();
    assert_eq!(stream.stats(), (0, 0));
    stream.write("a", &[1, 2, 3]).unwrap();
    stream.write("b", &[4]).unwrap();
    assert_eq!(stream.stats(), (2, 4));

    stream.reset_stats();
    assert_eq!(stream.stats(), (0, 0));
}
