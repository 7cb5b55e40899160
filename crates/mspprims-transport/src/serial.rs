use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::MspStream;

/// How long a serial read waits before re-checking the close flag.
pub const SERIAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Open a serial device at `baud`, 8N1, no flow control.
pub fn open_serial(path: &str, baud: u32) -> Result<MspStream> {
    let port = serialport::new(path, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(SERIAL_POLL_INTERVAL)
        .open()
        .map_err(|source| TransportError::Open {
            path: path.to_string(),
            source,
        })?;

    debug!(path, baud, "opened serial port");
    Ok(MspStream::from_serial(port))
}

/// A serial device found on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device name to pass as a target (`/dev/ttyACM0`, `COM3`).
    pub name: String,
    /// Bus the device hangs off: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// Product string reported by USB devices.
    pub product: Option<String>,
}

/// Enumerate serial devices.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    let mut out: Vec<PortInfo> = ports
        .into_iter()
        .map(|info| {
            let (kind, product) = match info.port_type {
                SerialPortType::UsbPort(usb) => ("usb", usb.product),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: info.port_name,
                kind,
                product,
            }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}
