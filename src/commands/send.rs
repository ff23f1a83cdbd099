//! Frame a local file and send it to the device

use std::fs;
use std::path::Path;

use scopebridge_core::storage::{is_valid_name, HexStream};

use crate::error::{HostError, Result};
use crate::transport::{SerialTransport, StdClock};

/// Send `input` over the serial link using the device's own framing
pub fn run_send(
    port: &str,
    baud: u32,
    input: &Path,
    name: Option<&str>,
    stride: Option<usize>,
) -> Result<()> {
    let data = fs::read(input)?;

    let name = match name {
        Some(n) => n.to_string(),
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file.bin".to_string()),
    };
    if !is_valid_name(&name) {
        return Err(HostError::Protocol(format!(
            "'{}' is not a valid transfer name (try --name)",
            name
        )));
    }

    let transport = SerialTransport::open(port, baud)?;
    let mut stream = HexStream::new(transport, StdClock::new());
    if let Some(k) = stride {
        stream.set_line_stride(k);
    }

    let sent = stream.write(&name, &data)?;
    println!("sent {} bytes as '{}'", sent, name);
    Ok(())
}
