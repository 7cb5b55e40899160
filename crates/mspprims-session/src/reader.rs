//! The per-session background reader.

use std::io::Read;

use crossbeam_channel::Sender;
use mspprims_frame::{FrameError, MessageReader, MspMessage};
use mspprims_transport::MspStream;
use tracing::{debug, warn};

/// A byte source the reader shuts down once it stops decoding.
pub(crate) trait ReaderSource: Read {
    fn close_source(&self) -> mspprims_transport::Result<()>;
}

impl ReaderSource for MspStream {
    fn close_source(&self) -> mspprims_transport::Result<()> {
        self.close()
    }
}

/// Decode and deliver until the stream ends.
///
/// Owns the decoder for the whole session. Every verified message is pushed
/// in arrival order; when the stream reports EOF or an error the stream is
/// closed, a single [`MspMessage::closed`] marker is pushed, and the sender
/// is dropped so receivers see the channel disconnect after the marker.
pub(crate) fn run_reader<S: ReaderSource>(
    mut reader: MessageReader<S>,
    tx: Sender<MspMessage>,
) {
    loop {
        match reader.read_message() {
            Ok(message) => {
                if tx.send(message).is_err() {
                    debug!("all receivers dropped; stopping reader");
                    break;
                }
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("stream reached end-of-file");
                break;
            }
            Err(err) => {
                warn!(error = %err, "read failed");
                break;
            }
        }
    }

    if let Err(err) = reader.get_ref().close_source() {
        debug!(error = %err, "close after read loop failed");
    }
    let _ = tx.send(MspMessage::closed());
    debug!(
        checksum_errors = reader.decoder().checksum_errors(),
        "reader stopped"
    );
}
