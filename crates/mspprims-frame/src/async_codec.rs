//! `tokio_util::codec` adapter so the same decoder drives async streams.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_message, MspDecoder, MspMessage, MspRequest};
use crate::error::FrameError;

/// MSP codec for `Framed`/`FramedRead`/`FramedWrite`.
///
/// Decodes both dialects; encodes v1 requests.
#[derive(Debug, Default)]
pub struct MspCodec {
    decoder: MspDecoder,
}

impl MspCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The decoder behind this codec.
    pub fn decoder(&self) -> &MspDecoder {
        &self.decoder
    }
}

impl Decoder for MspCodec {
    type Item = MspMessage;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        for i in 0..src.len() {
            if let Some(message) = self.decoder.push_byte(src[i]) {
                src.advance(i + 1);
                return Ok(Some(message));
            }
        }
        // Every byte is now held by the decoder state.
        src.clear();
        Ok(None)
    }
}

impl Encoder<MspRequest> for MspCodec {
    type Error = FrameError;

    fn encode(&mut self, item: MspRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_message(item.command, item.payload.as_ref(), dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::checksum::xor_update;
    use crate::command::{FC_VARIANT, REBOOT};

    fn response(command: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u8;
        let mut frame = vec![b'$', b'M', b'>', len, command];
        frame.extend_from_slice(payload);
        frame.push(xor_update(len ^ command, payload));
        frame
    }

    #[test]
    fn decode_leaves_following_bytes_in_buffer() {
        let mut wire = response(2, b"INAV");
        wire.extend_from_slice(b"$M>");
        let mut buf = BytesMut::from(wire.as_slice());
        let mut codec = MspCodec::new();

        let message = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(message.command, 2);
        assert_eq!(buf.as_ref(), b"$M>");

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
        assert!(!codec.decoder().is_idle());
    }

    #[tokio::test]
    async fn framed_read_yields_messages() {
        let mut wire = response(2, b"INAV");
        wire.extend(response(3, &[7, 1, 0]));

        let mut framed = FramedRead::new(wire.as_slice(), MspCodec::new());

        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"INAV");
        assert_eq!(second.payload.as_ref(), &[7, 1, 0]);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_encodes_requests() {
        let mut framed = FramedWrite::new(Vec::new(), MspCodec::new());

        framed.send(MspRequest::query(REBOOT)).await.unwrap();
        framed.send(MspRequest::query(FC_VARIANT)).await.unwrap();

        let wire = framed.into_inner();
        assert_eq!(
            wire,
            vec![b'$', b'M', b'<', 0, 68, 68, b'$', b'M', b'<', 0, 2, 2]
        );
    }
}
