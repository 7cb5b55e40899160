use std::net::TcpStream;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::MspStream;
use crate::target::authority;

/// Connect to a controller (or serial bridge) listening on TCP (blocking).
pub fn connect_tcp(host: &str, port: &str) -> Result<MspStream> {
    let addr = authority(host, port);
    let port_num: u16 = port.parse().map_err(|_| TransportError::Connect {
        addr: addr.clone(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid port '{port}'"),
        ),
    })?;

    let stream = TcpStream::connect((host, port_num)).map_err(|source| TransportError::Connect {
        addr: addr.clone(),
        source,
    })?;
    // Requests are a handful of bytes; don't let Nagle hold them back.
    stream.set_nodelay(true)?;

    debug!(%addr, "connected to tcp endpoint");
    Ok(MspStream::from_tcp(stream))
}
