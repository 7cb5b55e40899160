//! MSP message framing.
//!
//! Reconstructs discrete messages from an arbitrarily fragmented byte
//! stream. Two dialects share the stream:
//! - v1 (`$M`): 8-bit length and command, XOR checksum
//! - v2 (`$X`): flags byte, 16-bit little-endian command and length,
//!   CRC-8/DVB-S2 checksum
//!
//! Only validated messages ever leave the decoder; corrupt frames are
//! dropped and decoding carries on at the next `$`.

pub mod checksum;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::MspCodec;
pub use checksum::{crc8_dvb_s2, crc8_dvb_s2_update, xor_update};
pub use codec::{
    encode, encode_message, MspDecoder, MspMessage, MspRequest, MspVersion, MAX_V1_PAYLOAD,
    V1_OVERHEAD,
};
pub use command::{command_name, CLOSED, DEBUG_MSG, FC_VARIANT, FC_VERSION, REBOOT};
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;
