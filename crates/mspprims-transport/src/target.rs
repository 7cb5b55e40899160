use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Device path prefix used by Linux Bluetooth serial links.
const RFCOMM_PREFIX: &str = "/dev/rfcomm";

/// Where a controller lives.
///
/// An address that splits into a non-empty host and a non-empty port is a
/// TCP endpoint; anything else is taken to be a serial device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `host:port` (or `[v6-host]:port`).
    Tcp { host: String, port: String },
    /// Serial device path, e.g. `/dev/ttyACM0` or `COM3`.
    Serial { path: String },
}

impl Target {
    /// Classify an address string.
    pub fn parse(addr: &str) -> Self {
        match split_host_port(addr) {
            Some((host, port)) if !host.is_empty() && !port.is_empty() => Target::Tcp {
                host: host.to_string(),
                port: port.to_string(),
            },
            _ => Target::Serial {
                path: addr.to_string(),
            },
        }
    }

    /// True for Bluetooth RFCOMM device nodes, which need time to bring the
    /// link up after open.
    pub fn is_rfcomm(&self) -> bool {
        matches!(self, Target::Serial { path } if path.starts_with(RFCOMM_PREFIX))
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, Target::Tcp { .. })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Target::Tcp { .. } => "tcp",
            Target::Serial { .. } => "serial",
        }
    }
}

impl FromStr for Target {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Tcp { host, port } => f.write_str(&authority(host, port)),
            Target::Serial { path } => f.write_str(path),
        }
    }
}

/// Join host and port, bracketing IPv6 literals.
pub(crate) fn authority(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Split `host:port` / `[host]:port`. Returns `None` when the string does
/// not have that shape (no colon, too many colons, stray brackets).
fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        if host.contains('[') || port.contains([':', '[', ']']) {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.split_once(':')?;
    if port.contains(':') || host.contains(['[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some((host, port))
}
