use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serialport::SerialPort;
use tracing::debug;

use crate::error::Result;

/// A connected controller stream. Implements Read + Write.
///
/// Handles obtained through [`MspStream::try_clone`] share one close flag, so
/// closing any of them ends the stream for all: pending and later reads
/// report end-of-stream (`Ok(0)`) and writes fail with `BrokenPipe`.
pub struct MspStream {
    inner: MspStreamInner,
    closed: Arc<AtomicBool>,
}

enum MspStreamInner {
    Tcp(TcpStream),
    Serial(Box<dyn SerialPort>),
}

impl Read for MspStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.is_closed() {
                return Ok(0);
            }

            let result = match &mut self.inner {
                MspStreamInner::Tcp(stream) => stream.read(buf),
                MspStreamInner::Serial(port) => port.read(buf),
            };

            match result {
                // Serial reads poll so that a close from another handle is
                // noticed; an idle line is not an error.
                Err(err)
                    if err.kind() == ErrorKind::TimedOut
                        && matches!(self.inner, MspStreamInner::Serial(_)) =>
                {
                    continue
                }
                // A shutdown racing an in-flight read surfaces as end-of-stream.
                Err(_) if self.is_closed() => return Ok(0),
                other => return other,
            }
        }
    }
}

impl Write for MspStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.is_closed() {
            return Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "stream has been closed",
            ));
        }
        match &mut self.inner {
            MspStreamInner::Tcp(stream) => stream.write(buf),
            MspStreamInner::Serial(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        match &mut self.inner {
            MspStreamInner::Tcp(stream) => stream.flush(),
            MspStreamInner::Serial(port) => port.flush(),
        }
    }
}

impl MspStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: MspStreamInner::Tcp(stream),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn from_serial(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: MspStreamInner::Serial(port),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create another handle onto the same connection.
    ///
    /// Used to give the reader its own handle while writes go through the
    /// first handle; the two directions never contend.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            MspStreamInner::Tcp(stream) => MspStreamInner::Tcp(stream.try_clone()?),
            MspStreamInner::Serial(port) => {
                MspStreamInner::Serial(port.try_clone().map_err(std::io::Error::from)?)
            }
        };
        Ok(Self {
            inner,
            closed: Arc::clone(&self.closed),
        })
    }

    /// Close the stream. Calling this more than once is a no-op.
    pub fn close(&self) -> Result<()> {
        let tcp = match &self.inner {
            MspStreamInner::Tcp(stream) => Some(stream),
            MspStreamInner::Serial(_) => None,
        };
        close_once(&self.closed, tcp, self.transport_name())
    }

    /// A handle that can close this stream from any thread.
    pub fn closer(&self) -> Result<StreamCloser> {
        let tcp = match &self.inner {
            MspStreamInner::Tcp(stream) => Some(Arc::new(stream.try_clone()?)),
            MspStreamInner::Serial(_) => None,
        };
        Ok(StreamCloser {
            closed: Arc::clone(&self.closed),
            tcp,
            transport: self.transport_name(),
        })
    }

    /// Whether [`close`](Self::close) has been called on any handle.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            MspStreamInner::Tcp(_) => "tcp",
            MspStreamInner::Serial(_) => "serial",
        }
    }
}

/// Closes an [`MspStream`] without owning it.
///
/// Unlike the stream itself this is `Send + Sync` for every transport, so it
/// can be handed to signal handlers and other threads.
#[derive(Debug, Clone)]
pub struct StreamCloser {
    closed: Arc<AtomicBool>,
    tcp: Option<Arc<TcpStream>>,
    transport: &'static str,
}

impl StreamCloser {
    /// Close the stream. Calling this more than once is a no-op.
    pub fn close(&self) -> Result<()> {
        close_once(&self.closed, self.tcp.as_deref(), self.transport)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn close_once(
    closed: &AtomicBool,
    tcp: Option<&TcpStream>,
    transport: &'static str,
) -> Result<()> {
    if closed.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    if let Some(stream) = tcp {
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotConnected => {}
            Err(err) => return Err(err.into()),
        }
    }

    debug!(transport, "stream closed");
    Ok(())
}

impl std::fmt::Debug for MspStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("MspStream");
        dbg.field("type", &self.transport_name());
        match &self.inner {
            MspStreamInner::Tcp(stream) => {
                dbg.field("peer", &stream.peer_addr().ok());
            }
            MspStreamInner::Serial(port) => {
                dbg.field("name", &port.name());
            }
        }
        dbg.field("closed", &self.is_closed()).finish()
    }
}
