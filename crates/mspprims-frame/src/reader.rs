use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::codec::{MspDecoder, MspMessage};
use crate::error::{FrameError, Result};

/// Controllers send small frames; a short read buffer keeps latency low on
/// serial links without starving TCP.
const READ_CHUNK_SIZE: usize = 512;

/// Reads complete MSP messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete,
/// checksum-verified messages.
pub struct MessageReader<T> {
    inner: T,
    decoder: MspDecoder,
    pending: VecDeque<MspMessage>,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            decoder: MspDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Messages decoded from one chunk are handed out in arrival order before
    /// the stream is read again. Returns `Err(FrameError::ConnectionClosed)`
    /// when EOF is reached.
    pub fn read_message(&mut self) -> Result<MspMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.pending.extend(self.decoder.feed(&chunk[..read]));
        }
    }

    /// The decoder driving this reader.
    pub fn decoder(&self) -> &MspDecoder {
        &self.decoder
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
