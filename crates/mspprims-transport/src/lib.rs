//! Duplex byte-stream transport for talking MSP to a flight controller.
//!
//! A controller is reached either over a serial line (USB CDC, UART bridge,
//! Bluetooth RFCOMM) or over TCP (SITL, WiFi/serial bridges). Both are
//! exposed through the single [`MspStream`] type so the layers above never
//! care which one they are driving.
//!
//! This is the lowest layer of mspprims. Everything else builds on top of
//! [`MspStream`] and the [`Target`] address parser.

pub mod error;
pub mod serial;
pub mod stream;
pub mod target;
pub mod tcp;

pub use error::{Result, TransportError};
pub use serial::{list_ports, open_serial, PortInfo, SERIAL_POLL_INTERVAL};
pub use stream::{MspStream, StreamCloser};
pub use target::Target;
pub use tcp::connect_tcp;

/// Open the transport described by `target`.
///
/// `baud` is only consulted for serial targets.
pub fn open(target: &Target, baud: u32) -> Result<MspStream> {
    match target {
        Target::Tcp { host, port } => connect_tcp(host, port),
        Target::Serial { path } => open_serial(path, baud),
    }
}
