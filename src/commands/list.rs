//! Serial port enumeration

use crate::error::Result;

/// Print every serial port the OS knows about
pub fn list_ports() -> Result<()> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                println!(
                    "{}  (USB {:04x}:{:04x}{})",
                    port.port_name,
                    usb.vid,
                    usb.pid,
                    usb.product
                        .map(|p| format!(", {}", p))
                        .unwrap_or_default()
                );
            }
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}
