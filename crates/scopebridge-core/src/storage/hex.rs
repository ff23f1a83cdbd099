//! Hex-framed file streaming over a byte link
//!
//! Ad-hoc export path to an engineering host. Files travel as
//! CRLF-terminated ASCII lines:
//!
//! ```text
//! BEGIN:<name>
//! SIZE:<decimal bytes>
//! <hex pairs, a space after every 8 bytes>
//! END:<name>
//! ```
//!
//! `BEGIN:`, `SIZE:`, `END:`, `PROGRESS:` and `ABORT:` are the
//! reserved prefixes; a conformant writer emits nothing else. Hex is
//! emitted upper-case and accepted in either case. Line pacing is the
//! only flow control on the link.

use crate::clock::Clock;
use crate::config::{
    HEX_GROUP, HEX_LINE_BUF_LEN, HEX_LINE_STRIDE, HEX_LINE_STRIDE_MAX, HEX_PROGRESS_INTERVAL,
    HEX_RECEIVE_TIMEOUT_MS, TICK_DELAY_US,
};
use crate::error::{ErrorKind, Result};
use crate::storage::{FileName, StorageBackend, StorageKind};

/// Byte-level serial link
///
/// `read_byte` must not block; the receiver paces itself with the
/// clock between polls.
pub trait ByteLink {
    /// Queue bytes for transmission
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// One received byte, if any is pending
    fn read_byte(&mut self) -> Option<u8>;

    /// Push any buffered output onto the wire
    fn flush(&mut self) -> Result<()>;

    /// True while the link can accept output
    fn is_ready(&self) -> bool {
        true
    }
}

/// Upper-case hex for one byte
pub fn encode_pair(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [
        DIGITS[(byte >> 4) as usize],
        DIGITS[(byte & 0x0F) as usize],
    ]
}

fn decode_nibble(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// One byte from two hex digits, either case
pub fn decode_pair(hi: u8, lo: u8) -> Option<u8> {
    Some((decode_nibble(hi)? << 4) | decode_nibble(lo)?)
}

/// Classification of one received line
#[derive(Debug, PartialEq, Eq)]
pub enum FrameLine<'a> {
    /// `BEGIN:<name>`
    Begin(&'a [u8]),
    /// `SIZE:<decimal>`
    Size(&'a [u8]),
    /// `PROGRESS:...`, informational
    Progress,
    /// `END:<name>`
    End(&'a [u8]),
    /// `ABORT:<reason>`, terminates a transfer
    Abort(&'a [u8]),
    /// Anything else is payload
    Data(&'a [u8]),
}

/// Classify a line against the reserved prefixes
pub fn classify_line(line: &[u8]) -> FrameLine<'_> {
    fn strip<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
        line.strip_prefix(prefix)
    }
    if let Some(rest) = strip(line, b"BEGIN:") {
        FrameLine::Begin(rest)
    } else if let Some(rest) = strip(line, b"SIZE:") {
        FrameLine::Size(rest)
    } else if strip(line, b"PROGRESS:").is_some() {
        FrameLine::Progress
    } else if let Some(rest) = strip(line, b"END:") {
        FrameLine::End(rest)
    } else if let Some(rest) = strip(line, b"ABORT:") {
        FrameLine::Abort(rest)
    } else {
        FrameLine::Data(line)
    }
}

/// Decode the hex pairs of one payload line into `dst`
///
/// An optional `<hex-addr>: ` prefix is skipped. Single spaces
/// between pairs are separators; decoding stops at the first
/// character that is neither a hex digit nor a space, and when `dst`
/// is full. Returns the number of bytes produced.
pub fn decode_data_line(line: &[u8], dst: &mut [u8]) -> usize {
    let mut pos = 0;

    // A leading run of hex digits followed by ':' is an address
    // prefix, not payload.
    if let Some(colon) = line.iter().position(|&b| b == b':') {
        if colon > 0 && line[..colon].iter().all(|&b| decode_nibble(b).is_some()) {
            pos = colon + 1;
            if line.get(pos) == Some(&b' ') {
                pos += 1;
            }
        }
    }

    let mut n = 0;
    while n < dst.len() {
        while line.get(pos) == Some(&b' ') {
            pos += 1;
        }
        let (hi, lo) = match (line.get(pos), line.get(pos + 1)) {
            (Some(&hi), Some(&lo)) => (hi, lo),
            _ => break,
        };
        match decode_pair(hi, lo) {
            Some(byte) => {
                dst[n] = byte;
                n += 1;
                pos += 2;
            }
            None => break,
        }
    }
    n
}

fn fmt_u32(buf: &mut [u8; 10], mut value: u32) -> &[u8] {
    if value == 0 {
        buf[0] = b'0';
        return &buf[..1];
    }
    let mut i = buf.len();
    while value > 0 {
        i -= 1;
        buf[i] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    &buf[i..]
}

/// Hex-framed streaming backend
pub struct HexStream<L, C> {
    link: L,
    clock: C,
    stride: usize,
    debug: bool,
    transfer_active: bool,
    files_sent: u32,
    bytes_sent: u32,
}

impl<L: ByteLink, C: Clock> HexStream<L, C> {
    /// Wrap a link with the default line stride
    pub fn new(link: L, clock: C) -> Self {
        Self {
            link,
            clock,
            stride: HEX_LINE_STRIDE,
            debug: false,
            transfer_active: false,
            files_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Stream a whole file out; fails `Busy` during another transfer
    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        if self.transfer_active {
            return Err(ErrorKind::Busy);
        }
        self.transfer_active = true;
        let result = self.stream_out(name, data);
        self.transfer_active = false;
        if let Ok(sent) = result {
            self.files_sent += 1;
            self.bytes_sent = self.bytes_sent.wrapping_add(sent as u32);
        }
        result
    }

    fn stream_out(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        let mut num = [0u8; 10];

        self.link.write_all(b"BEGIN:")?;
        self.link.write_all(name.as_bytes())?;
        self.link.write_all(b"\r\n")?;
        self.link.write_all(b"SIZE:")?;
        self.link.write_all(fmt_u32(&mut num, data.len() as u32))?;
        self.link.write_all(b"\r\n")?;

        let mut line = [0u8; HEX_LINE_BUF_LEN];
        let mut sent = 0usize;
        for chunk in data.chunks(self.stride) {
            let mut n = 0;
            for (i, &byte) in chunk.iter().enumerate() {
                let pair = encode_pair(byte);
                line[n] = pair[0];
                line[n + 1] = pair[1];
                n += 2;
                if (i + 1) % HEX_GROUP == 0 && i + 1 < chunk.len() {
                    line[n] = b' ';
                    n += 1;
                }
            }
            line[n] = b'\r';
            line[n + 1] = b'\n';
            n += 2;
            self.link.write_all(&line[..n])?;

            sent += chunk.len();
            if self.debug && sent % HEX_PROGRESS_INTERVAL == 0 && sent < data.len() {
                self.emit_progress(name, sent, data.len())?;
            }
        }

        self.link.write_all(b"END:")?;
        self.link.write_all(name.as_bytes())?;
        self.link.write_all(b"\r\n")?;
        self.link.flush()?;
        Ok(sent)
    }

    fn emit_progress(&mut self, name: &str, done: usize, total: usize) -> Result<()> {
        let mut num = [0u8; 10];
        let pct = if total > 0 { done * 100 / total } else { 0 };
        self.link.write_all(b"PROGRESS:")?;
        self.link.write_all(name.as_bytes())?;
        self.link.write_all(b":")?;
        self.link.write_all(fmt_u32(&mut num, done as u32))?;
        self.link.write_all(b"/")?;
        self.link.write_all(fmt_u32(&mut num, total as u32))?;
        self.link.write_all(b" (")?;
        self.link.write_all(fmt_u32(&mut num, pct as u32))?;
        self.link.write_all(b"%)\r\n")?;
        Ok(())
    }

    /// Reassemble a file framed by the peer
    ///
    /// Reads lines until `END:` is seen, the timeout elapses or `dst`
    /// fills. `BEGIN:`, `SIZE:` and `PROGRESS:` lines are ignored; an
    /// `ABORT:` line terminates the transfer. Returns bytes decoded.
    pub fn receive(&mut self, dst: &mut [u8], timeout_ms: u32) -> usize {
        let t0 = self.clock.now_ms();
        let mut line = [0u8; HEX_LINE_BUF_LEN];
        let mut line_len = 0usize;
        let mut got = 0usize;

        while self.clock.now_ms().wrapping_sub(t0) < timeout_ms {
            let byte = match self.link.read_byte() {
                Some(b) => b,
                None => {
                    self.clock.delay_us(TICK_DELAY_US);
                    continue;
                }
            };

            if byte != b'\r' && byte != b'\n' {
                if line_len < line.len() {
                    line[line_len] = byte;
                    line_len += 1;
                }
                continue;
            }
            if line_len == 0 {
                continue;
            }

            let full = &line[..line_len];
            match classify_line(full) {
                FrameLine::End(_) => return got,
                FrameLine::Abort(_) => {
                    log::warn!("transfer aborted by peer");
                    return got;
                }
                FrameLine::Begin(_) | FrameLine::Size(_) | FrameLine::Progress => {}
                FrameLine::Data(data) => {
                    got += decode_data_line(data, &mut dst[got..]);
                    if got >= dst.len() {
                        return got;
                    }
                }
            }
            line_len = 0;
        }
        got
    }

    /// Signal an abort to the peer and drop any transfer state
    pub fn abort(&mut self) {
        if self.transfer_active {
            self.transfer_active = false;
            let _ = self.link.write_all(b"ABORT:Transfer aborted\r\n");
            let _ = self.link.flush();
        }
    }

    /// (files, bytes) streamed out so far
    pub fn stats(&self) -> (u32, u32) {
        (self.files_sent, self.bytes_sent)
    }

    /// Zero the transfer statistics
    pub fn reset_stats(&mut self) {
        self.files_sent = 0;
        self.bytes_sent = 0;
    }

    /// Set payload bytes per line, clamped to 1..=64
    pub fn set_line_stride(&mut self, stride: usize) {
        self.stride = stride.clamp(1, HEX_LINE_STRIDE_MAX);
    }

    /// Current payload bytes per line
    pub fn line_stride(&self) -> usize {
        self.stride
    }

    /// Enable progress pings
    pub fn set_debug(&mut self, on: bool) {
        self.debug = on;
    }

    /// True while a write is streaming
    pub fn is_transfer_active(&self) -> bool {
        self.transfer_active
    }

    /// Access the underlying link
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

impl<L: ByteLink, C: Clock> StorageBackend for HexStream<L, C> {
    fn kind(&self) -> StorageKind {
        StorageKind::Hex
    }

    fn label(&self) -> &'static str {
        "HEX"
    }

    fn is_ready(&self) -> bool {
        self.link.is_ready()
    }

    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<usize> {
        HexStream::write(self, name, data)
    }

    fn read(&mut self, name: &str, dst: &mut [u8]) -> Result<usize> {
        let _ = name; // a stream has no directory to look the name up in
        Ok(self.receive(dst, HEX_RECEIVE_TIMEOUT_MS))
    }

    fn delete(&mut self, _name: &str) -> Result<()> {
        Err(ErrorKind::Unsupported)
    }

    fn exists(&mut self, _name: &str) -> bool {
        false
    }

    fn size(&mut self, _name: &str) -> Result<u32> {
        Ok(0)
    }

    fn list(&mut self, _out: &mut [FileName]) -> usize {
        0
    }

    /// On a stream, "format" just clears the statistics.
    fn format(&mut self) -> Result<()> {
        self.reset_stats();
        Ok(())
    }

    fn space(&self) -> (u32, u32) {
        (u32::MAX, u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_codec() {
        assert_eq!(encode_pair(0x00), *b"00");
        assert_eq!(encode_pair(0xA5), *b"A5");
        assert_eq!(encode_pair(0xFF), *b"FF");
        assert_eq!(decode_pair(b'D', b'E'), Some(0xDE));
        assert_eq!(decode_pair(b'd', b'e'), Some(0xDE));
        assert_eq!(decode_pair(b'0', b'9'), Some(0x09));
        assert_eq!(decode_pair(b'G', b'0'), None);
    }

    #[test]
    fn data_line_with_group_spaces() {
        let mut out = [0u8; 8];
        let n = decode_data_line(b"DEAD BEEF", &mut out);
        assert_eq!(n, 4);
        assert_eq!(&out[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn data_line_with_address_prefix() {
        let mut out = [0u8; 8];
        let n = decode_data_line(b"00000010: A1B2C3", &mut out);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[0xA1, 0xB2, 0xC3]);
    }

    #[test]
    fn data_line_stops_at_junk() {
        let mut out = [0u8; 8];
        let n = decode_data_line(b"A1B2zzC3", &mut out);
        assert_eq!(n, 2);
        assert_eq!(&out[..2], &[0xA1, 0xB2]);
    }

    #[test]
    fn data_line_respects_dst_capacity() {
        let mut out = [0u8; 2];
        let n = decode_data_line(b"A1B2C3D4", &mut out);
        assert_eq!(n, 2);
        assert_eq!(out, [0xA1, 0xB2]);
    }

    #[test]
    fn line_classification() {
        assert_eq!(classify_line(b"BEGIN:cap.bin"), FrameLine::Begin(b"cap.bin"));
        assert_eq!(classify_line(b"SIZE:300"), FrameLine::Size(b"300"));
        assert_eq!(classify_line(b"END:cap.bin"), FrameLine::End(b"cap.bin"));
        assert_eq!(classify_line(b"ABORT:oops"), FrameLine::Abort(b"oops"));
        assert_eq!(classify_line(b"PROGRESS:f:1/2 (50%)"), FrameLine::Progress);
        assert_eq!(classify_line(b"A1B2"), FrameLine::Data(b"A1B2"));
    }

    #[test]
    fn decimal_formatting() {
        let mut buf = [0u8; 10];
        assert_eq!(fmt_u32(&mut buf, 0), b"0");
        let mut buf = [0u8; 10];
        assert_eq!(fmt_u32(&mut buf, 3), b"3");
        let mut buf = [0u8; 10];
        assert_eq!(fmt_u32(&mut buf, 4096), b"4096");
        let mut buf = [0u8; 10];
        assert_eq!(fmt_u32(&mut buf, u32::MAX), b"4294967295");
    }
}
