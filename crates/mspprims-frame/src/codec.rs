use bytes::{BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::checksum::{crc8_dvb_s2, xor_update};
use crate::command::CLOSED;
use crate::error::{FrameError, Result};

/// Every frame starts with this byte.
pub const SYNC: u8 = b'$';

/// v1 frame overhead: `$`, `M`, direction, length, command, checksum.
pub const V1_OVERHEAD: usize = 6;

/// Largest payload a v1 length byte can describe.
pub const MAX_V1_PAYLOAD: usize = u8::MAX as usize;

/// Which framing dialect a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MspVersion {
    /// `$M`: 8-bit length/command, XOR checksum.
    V1,
    /// `$X`: 16-bit little-endian command/length, CRC-8/DVB-S2.
    V2,
}

/// A complete, checksum-verified message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspMessage {
    /// Dialect of the frame this message came from.
    pub version: MspVersion,
    /// `>` frames are responses; `!` frames are not.
    pub is_response: bool,
    /// Command ID. v1 frames only ever produce 0-255.
    pub command: u16,
    /// Exactly as many bytes as the frame's length field declared.
    pub payload: Bytes,
}

impl MspMessage {
    /// Create a new message.
    pub fn new(
        version: MspVersion,
        is_response: bool,
        command: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            version,
            is_response,
            command,
            payload: payload.into(),
        }
    }

    /// The end-of-stream marker a session emits once its transport is gone.
    pub fn closed() -> Self {
        Self::new(MspVersion::V1, false, CLOSED, Bytes::new())
    }

    /// Whether this is the end-of-stream marker.
    ///
    /// v2 frames can legitimately carry command 0xFFFF; only a v1 message
    /// with that command, which no frame can produce, is the marker.
    pub fn is_closed(&self) -> bool {
        self.version == MspVersion::V1 && self.command == CLOSED && self.payload.is_empty()
    }
}

/// An outbound v1 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspRequest {
    pub command: u8,
    pub payload: Bytes,
}

impl MspRequest {
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// A request with no payload, which is what every query looks like.
    pub fn query(command: u8) -> Self {
        Self::new(command, Bytes::new())
    }
}

/// Encode a v1 request frame.
///
/// Wire format:
/// ```text
/// ┌─────┬─────┬─────┬──────────┬─────────┬─────────────┬──────────┐
/// │ '$' │ 'M' │ '<' │ len (u8) │ cmd (u8)│ payload[len]│ checksum │
/// └─────┴─────┴─────┴──────────┴─────────┴─────────────┴──────────┘
/// ```
/// `checksum` is the XOR of the length, command and payload bytes.
pub fn encode_message(command: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_V1_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_V1_PAYLOAD,
        });
    }
    let len = payload.len() as u8;

    dst.reserve(V1_OVERHEAD + payload.len());
    dst.put_slice(&[SYNC, b'M', b'<', len, command]);
    dst.put_slice(payload);
    dst.put_u8(xor_update(len ^ command, payload));
    Ok(())
}

/// Encode a v1 request frame into a fresh buffer.
pub fn encode(command: u8, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(V1_OVERHEAD + payload.len());
    encode_message(command, payload, &mut buf)?;
    Ok(buf.freeze())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Idle,
    AwaitFormat,
    AwaitDirection,
    Length,
    Command,
    Data,
    Checksum,
    V2Direction,
    V2Flags,
    V2CommandLo,
    V2CommandHi,
    V2LengthLo,
    V2LengthHi,
    V2Data,
    V2Checksum,
}

/// Byte-at-a-time MSP decoder.
///
/// Holds whatever part of a frame has arrived so far, so input may be split
/// at any byte boundary across calls. Nothing about a partial frame is
/// observable from outside.
///
/// Only the idle state reacts to `$`: a frame cut short by line noise is not
/// abandoned when the next frame's sync byte shows up. The truncated frame
/// swallows bytes until its declared length is met, fails its checksum, and
/// decoding resynchronises on the `$` after that.
#[derive(Debug)]
pub struct MspDecoder {
    state: DecodeState,
    version: MspVersion,
    is_response: bool,
    command: u16,
    length: usize,
    checksum: u8,
    payload: BytesMut,
    checksum_errors: u64,
}

impl Default for MspDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MspDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Idle,
            version: MspVersion::V1,
            is_response: false,
            command: 0,
            length: 0,
            checksum: 0,
            payload: BytesMut::new(),
            checksum_errors: 0,
        }
    }

    /// Consume `bytes` in order, returning every message they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<MspMessage> {
        bytes.iter().filter_map(|&b| self.push_byte(b)).collect()
    }

    /// Consume one byte. Returns a message when `byte` was the checksum of a
    /// valid frame.
    pub fn push_byte(&mut self, byte: u8) -> Option<MspMessage> {
        use DecodeState::*;

        let state = self.state;
        self.state = match state {
            Idle => {
                if byte != SYNC {
                    return None;
                }
                self.start();
                AwaitFormat
            }
            AwaitFormat => match byte {
                b'M' => {
                    self.version = MspVersion::V1;
                    AwaitDirection
                }
                b'X' => {
                    self.version = MspVersion::V2;
                    V2Direction
                }
                _ => Idle,
            },
            AwaitDirection | V2Direction => {
                let next = if state == AwaitDirection {
                    Length
                } else {
                    V2Flags
                };
                match byte {
                    b'>' => {
                        self.is_response = true;
                        next
                    }
                    // `<` is the host's own direction; echoed requests are
                    // not messages.
                    b'!' => {
                        self.is_response = false;
                        next
                    }
                    _ => Idle,
                }
            }

            Length => {
                self.length = usize::from(byte);
                self.checksum = byte;
                Command
            }
            Command => {
                self.command = u16::from(byte);
                self.checksum ^= byte;
                self.begin_payload(Data, Checksum)
            }
            Data => {
                self.payload.put_u8(byte);
                self.checksum ^= byte;
                if self.payload.len() == self.length {
                    Checksum
                } else {
                    Data
                }
            }

            V2Flags => {
                // The flags byte carries no meaning for us beyond seeding the CRC.
                self.checksum = crc8_dvb_s2(0, byte);
                V2CommandLo
            }
            V2CommandLo => {
                self.checksum = crc8_dvb_s2(self.checksum, byte);
                self.command = u16::from(byte);
                V2CommandHi
            }
            V2CommandHi => {
                self.checksum = crc8_dvb_s2(self.checksum, byte);
                self.command |= u16::from(byte) << 8;
                V2LengthLo
            }
            V2LengthLo => {
                self.checksum = crc8_dvb_s2(self.checksum, byte);
                self.length = usize::from(byte);
                V2LengthHi
            }
            V2LengthHi => {
                self.checksum = crc8_dvb_s2(self.checksum, byte);
                self.length |= usize::from(byte) << 8;
                self.begin_payload(V2Data, V2Checksum)
            }
            V2Data => {
                self.checksum = crc8_dvb_s2(self.checksum, byte);
                self.payload.put_u8(byte);
                if self.payload.len() == self.length {
                    V2Checksum
                } else {
                    V2Data
                }
            }

            Checksum | V2Checksum => return self.finish(byte),
        };
        None
    }

    /// Drop any partial frame and wait for the next `$`.
    pub fn reset(&mut self) {
        self.state = DecodeState::Idle;
        self.start();
    }

    /// True when no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Idle
    }

    /// Number of frames discarded for a bad checksum since creation.
    pub fn checksum_errors(&self) -> u64 {
        self.checksum_errors
    }

    fn start(&mut self) {
        self.is_response = false;
        self.command = 0;
        self.length = 0;
        self.checksum = 0;
        self.payload.clear();
    }

    fn begin_payload(&mut self, data: DecodeState, checksum: DecodeState) -> DecodeState {
        if self.length == 0 {
            checksum
        } else {
            self.payload = BytesMut::with_capacity(self.length);
            data
        }
    }

    fn finish(&mut self, received: u8) -> Option<MspMessage> {
        self.state = DecodeState::Idle;

        if received != self.checksum {
            self.checksum_errors += 1;
            warn!(
                command = self.command,
                version = ?self.version,
                expected = self.checksum,
                received,
                "checksum mismatch; dropping message"
            );
            self.payload.clear();
            return None;
        }

        let message = MspMessage {
            version: self.version,
            is_response: self.is_response,
            command: self.command,
            payload: std::mem::take(&mut self.payload).freeze(),
        };
        trace!(
            command = message.command,
            len = message.payload.len(),
            "decoded message"
        );
        Some(message)
    }
}
