//! Decode a saved session log offline

use std::fs;
use std::path::Path;

use scopebridge_core::storage::hex::{classify_line, decode_data_line, FrameLine};

use crate::error::Result;

/// Decode the first framed file found in `input` and write its bytes
/// to `output`
///
/// A bare hex dump with no framing lines decodes too; everything up
/// to the first `END:` (or the end of the log) counts.
pub fn run_decode(input: &Path, output: &Path) -> Result<()> {
    let log_bytes = fs::read(input)?;

    let mut decoded: Vec<u8> = Vec::new();
    let mut name: Option<String> = None;
    let mut decode_buf = [0u8; 256];

    for line in log_bytes
        .split(|&b| b == b'\r' || b == b'\n')
        .filter(|l| !l.is_empty())
    {
        match classify_line(line) {
            FrameLine::Begin(n) => {
                name = Some(String::from_utf8_lossy(n).into_owned());
                decoded.clear();
            }
            FrameLine::Size(_) | FrameLine::Progress => {}
            FrameLine::Data(data) => {
                let n = decode_data_line(data, &mut decode_buf);
                decoded.extend_from_slice(&decode_buf[..n]);
            }
            FrameLine::End(_) => break,
            FrameLine::Abort(reason) => {
                log::warn!(
                    "log contains an abort: {}",
                    String::from_utf8_lossy(reason)
                );
                break;
            }
        }
    }

    fs::write(output, &decoded)?;
    match name {
        Some(name) => println!(
            "decoded '{}': {} bytes -> {}",
            name,
            decoded.len(),
            output.display()
        ),
        None => println!("decoded {} bytes -> {}", decoded.len(), output.display()),
    }
    Ok(())
}
