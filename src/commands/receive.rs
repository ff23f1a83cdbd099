//! Receive framed files from the device

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use scopebridge_core::storage::hex::{classify_line, decode_data_line, FrameLine};
use scopebridge_core::storage::ByteLink;

use crate::error::{HostError, Result};
use crate::transport::SerialTransport;

/// One file being reassembled
struct Incoming {
    name: String,
    data: Vec<u8>,
    progress: ProgressBar,
}

impl Incoming {
    fn start(name: &str) -> Self {
        let progress = ProgressBar::new_spinner();
        progress.set_message(name.to_string());
        Self {
            name: name.to_string(),
            data: Vec::new(),
            progress,
        }
    }

    fn announce_size(&mut self, size: u64) {
        let bar = ProgressBar::new(size);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes}")
                .expect("static template"),
        );
        bar.set_message(self.name.clone());
        self.progress = bar;
    }
}

/// Listen on the serial port and store every framed file under `dir`
pub fn run_receive(port: &str, baud: u32, dir: &Path, once: bool) -> Result<()> {
    let mut transport = SerialTransport::open(port, baud)?;
    fs::create_dir_all(dir)?;

    log::info!("waiting for transfers (Ctrl-C to stop)");

    let mut line: Vec<u8> = Vec::with_capacity(256);
    let mut incoming: Option<Incoming> = None;
    let mut decode_buf = [0u8; 256];

    loop {
        let byte = match transport.read_byte() {
            Some(b) => b,
            None => continue, // the port timeout paces this loop
        };

        if byte != b'\r' && byte != b'\n' {
            line.push(byte);
            continue;
        }
        if line.is_empty() {
            continue;
        }

        match classify_line(&line) {
            FrameLine::Begin(name) => {
                let name = String::from_utf8_lossy(name).into_owned();
                log::info!("incoming file '{}'", name);
                incoming = Some(Incoming::start(&name));
            }
            FrameLine::Size(digits) => {
                if let Some(file) = incoming.as_mut() {
                    if let Ok(size) = std::str::from_utf8(digits)
                        .map_err(|_| ())
                        .and_then(|s| s.parse::<u64>().map_err(|_| ()))
                    {
                        file.announce_size(size);
                    }
                }
            }
            FrameLine::Progress => {}
            FrameLine::Data(data) => {
                if let Some(file) = incoming.as_mut() {
                    let n = decode_data_line(data, &mut decode_buf);
                    file.data.extend_from_slice(&decode_buf[..n]);
                    file.progress.inc(n as u64);
                }
            }
            FrameLine::End(name) => {
                let file = incoming.take().ok_or_else(|| {
                    HostError::Protocol("END without a matching BEGIN".into())
                })?;
                let end_name = String::from_utf8_lossy(name);
                if end_name != file.name {
                    log::warn!("END names '{}', expected '{}'", end_name, file.name);
                }

                let path = dir.join(sanitize(&file.name));
                fs::write(&path, &file.data)?;
                file.progress.finish_and_clear();
                println!("received {} ({} bytes)", path.display(), file.data.len());

                if once {
                    return Ok(());
                }
            }
            FrameLine::Abort(reason) => {
                log::warn!("device aborted: {}", String::from_utf8_lossy(reason));
                if let Some(file) = incoming.take() {
                    file.progress.abandon();
                }
            }
        }
        line.clear();
    }
}

/// Keep received names from escaping the target directory
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('.') {
        format!("file_{}", cleaned)
    } else {
        cleaned
    }
}
