use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use mspprims_frame::{MessageReader, MessageWriter, MspMessage, FC_VARIANT, FC_VERSION, REBOOT};
use mspprims_transport::{MspStream, StreamCloser, Target};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::reader::run_reader;

/// A live connection to a controller.
///
/// A dedicated `msp-reader` thread owns the read half and the decoder;
/// requests are written from whichever thread holds the session. Dropping
/// the session closes the transport.
pub struct Session {
    target: Target,
    writer: MessageWriter<MspStream>,
    closer: SessionCloser,
    messages: Receiver<MspMessage>,
    reader: Option<JoinHandle<()>>,
}

/// Closes a [`Session`] from any thread (signal handlers, watchdogs).
#[derive(Debug, Clone)]
pub struct SessionCloser {
    stream: StreamCloser,
}

impl SessionCloser {
    /// Close the underlying transport. The reader then emits the closed
    /// marker and exits. Calling this more than once is a no-op.
    pub fn close(&self) {
        if let Err(err) = self.stream.close() {
            debug!(error = %err, "transport close reported an error");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }
}

impl Session {
    /// Open a session to `addr` (`host:port` or a serial device path).
    pub fn open(addr: &str, config: SessionConfig) -> Result<Self> {
        Self::open_target(&Target::parse(addr), config)
    }

    /// Open a session to an already-parsed target.
    ///
    /// Any failure to open the transport is returned before the reader
    /// thread is started.
    pub fn open_target(target: &Target, config: SessionConfig) -> Result<Self> {
        let stream = mspprims_transport::open(target, config.baud)?;
        let reader_stream = stream.try_clone()?;
        let closer = SessionCloser {
            stream: stream.closer()?,
        };

        let (tx, rx) = unbounded();
        let reader = thread::Builder::new()
            .name("msp-reader".to_string())
            .spawn(move || run_reader(MessageReader::new(reader_stream), tx))
            .map_err(SessionError::Spawn)?;

        if target.is_rfcomm() && !config.rfcomm_settle.is_zero() {
            debug!(settle = ?config.rfcomm_settle, "waiting for rfcomm link");
            thread::sleep(config.rfcomm_settle);
        }

        info!(
            %target,
            transport = target.transport_name(),
            "opened controller session"
        );

        let mut session = Self {
            target: target.clone(),
            writer: MessageWriter::new(stream),
            closer,
            messages: rx,
            reader: Some(reader),
        };

        if config.handshake {
            // On failure the session is dropped, which closes the transport.
            session.query_variant()?;
        }

        Ok(session)
    }

    /// Where this session is connected.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// A receiver for decoded messages.
    ///
    /// Receivers are cheap clones of one FIFO queue: each message is handed
    /// to exactly one receiver. The final message is always the closed
    /// marker (see [`MspMessage::is_closed`]); after it the channel reports
    /// disconnection.
    pub fn messages(&self) -> Receiver<MspMessage> {
        self.messages.clone()
    }

    /// Send a v1 request.
    pub fn send(&mut self, command: u8, payload: &[u8]) -> Result<()> {
        self.writer.send(command, payload)?;
        Ok(())
    }

    /// Ask the controller to reboot.
    pub fn reboot(&mut self) -> Result<()> {
        self.send(REBOOT, &[])
    }

    /// Ask for the firmware version.
    pub fn query_version(&mut self) -> Result<()> {
        self.send(FC_VERSION, &[])
    }

    /// Ask for the firmware variant.
    pub fn query_variant(&mut self) -> Result<()> {
        self.send(FC_VARIANT, &[])
    }

    /// A handle that can close this session from another thread.
    pub fn closer(&self) -> SessionCloser {
        self.closer.clone()
    }

    /// Close the transport. Calling this more than once is a no-op.
    pub fn close(&self) {
        self.closer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Close the session and wait for the reader thread to finish.
    pub fn shutdown(mut self) {
        self.close();
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("reader thread panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    use crossbeam_channel::RecvTimeoutError;
    use mspprims_frame::{xor_update, MspVersion};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn fake_controller() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("listener has address").to_string();
        (listener, addr)
    }

    fn response(command: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u8;
        let mut frame = vec![b'$', b'M', b'>', len, command];
        frame.extend_from_slice(payload);
        frame.push(xor_update(len ^ command, payload));
        frame
    }

    fn read_request(stream: &mut TcpStream) -> [u8; 6] {
        let mut buf = [0u8; 6];
        stream.read_exact(&mut buf).expect("request should arrive");
        buf
    }

    fn quiet() -> SessionConfig {
        SessionConfig::default().with_handshake(false)
    }

    #[test]
    fn open_sends_variant_query() {
        let (listener, addr) = fake_controller();

        let session = Session::open(&addr, SessionConfig::default()).expect("session should open");
        let (mut controller, _) = listener.accept().expect("controller should accept");

        assert_eq!(read_request(&mut controller), *b"$M<\x00\x02\x02");
        assert!(session.target().is_tcp());
    }

    #[test]
    fn query_helpers_write_fixed_frames() {
        let (listener, addr) = fake_controller();
        let mut session = Session::open(&addr, quiet()).expect("session should open");
        let (mut controller, _) = listener.accept().expect("controller should accept");

        session.query_version().unwrap();
        assert_eq!(read_request(&mut controller), *b"$M<\x00\x03\x03");

        session.query_variant().unwrap();
        assert_eq!(read_request(&mut controller), *b"$M<\x00\x02\x02");

        session.reboot().unwrap();
        assert_eq!(read_request(&mut controller), [0x24, 0x4D, 0x3C, 0x00, 0x44, 0x44]);
    }

    #[test]
    fn delivers_messages_in_arrival_order() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let (mut controller, _) = listener.accept().expect("controller should accept");
        let rx = session.messages();

        let mut wire = response(2, b"INAV");
        wire.extend(response(3, &[7, 1, 0]));
        // Split mid-frame to exercise reassembly across reads.
        controller.write_all(&wire[..5]).unwrap();
        controller.flush().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        controller.write_all(&wire[5..]).unwrap();

        let first = rx.recv_timeout(WAIT).unwrap();
        let second = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            first,
            MspMessage::new(MspVersion::V1, true, 2, &b"INAV"[..])
        );
        assert_eq!(second.command, 3);
        assert_eq!(second.payload.as_ref(), &[7, 1, 0]);
    }

    #[test]
    fn corrupt_frame_does_not_end_session() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let (mut controller, _) = listener.accept().expect("controller should accept");
        let rx = session.messages();

        let mut bad = response(2, b"BTFL");
        *bad.last_mut().unwrap() ^= 0x01;
        controller.write_all(&bad).unwrap();
        controller.write_all(&response(3, &[2, 5, 0])).unwrap();

        let message = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(message.command, 3);
        assert!(!session.is_closed());
    }

    #[test]
    fn peer_hangup_yields_single_closed_marker() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let (mut controller, _) = listener.accept().expect("controller should accept");
        let rx = session.messages();

        controller.write_all(&response(2, b"INAV")).unwrap();
        drop(controller);

        assert_eq!(rx.recv_timeout(WAIT).unwrap().command, 2);
        let marker = rx.recv_timeout(WAIT).unwrap();
        assert!(marker.is_closed());
        assert_eq!(marker.command, 0xFFFF);
        assert!(matches!(
            rx.recv_timeout(WAIT),
            Err(RecvTimeoutError::Disconnected)
        ));
        assert!(session.is_closed());
    }

    #[test]
    fn close_is_idempotent_and_ends_stream() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let _controller = listener.accept().expect("controller should accept");
        let rx = session.messages();

        session.close();
        session.close();

        assert!(rx.recv_timeout(WAIT).unwrap().is_closed());
        assert!(matches!(
            rx.recv_timeout(WAIT),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn closer_from_another_thread() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let _controller = listener.accept().expect("controller should accept");
        let rx = session.messages();

        let closer = session.closer();
        std::thread::spawn(move || closer.close()).join().unwrap();

        assert!(rx.recv_timeout(WAIT).unwrap().is_closed());
        assert!(session.is_closed());
    }

    #[test]
    fn send_after_close_fails() {
        let (listener, addr) = fake_controller();
        let mut session = Session::open(&addr, quiet()).expect("session should open");
        let _controller = listener.accept().expect("controller should accept");

        session.close();
        let err = session.reboot().unwrap_err();
        assert!(matches!(err, SessionError::Frame(_)));
    }

    #[test]
    fn shutdown_joins_reader() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let _controller = listener.accept().expect("controller should accept");
        let rx = session.messages();

        session.shutdown();

        assert!(rx.try_recv().unwrap().is_closed());
    }

    #[test]
    fn extra_receivers_share_the_queue() {
        let (listener, addr) = fake_controller();
        let session = Session::open(&addr, quiet()).expect("session should open");
        let (mut controller, _) = listener.accept().expect("controller should accept");
        let first = session.messages();
        let second = session.messages();

        controller.write_all(&response(2, b"INAV")).unwrap();

        let message = second.recv_timeout(WAIT).unwrap();
        assert_eq!(message.command, 2);
        assert!(first.try_recv().is_err());
    }

    #[test]
    fn open_failure_is_reported_synchronously() {
        let (listener, addr) = fake_controller();
        drop(listener);

        let err = Session::open(&addr, quiet()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(mspprims_transport::TransportError::Connect { .. })
        ));
    }

    #[test]
    fn missing_serial_device_is_reported() {
        let err = Session::open("/dev/mspprims-missing-device", quiet()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(mspprims_transport::TransportError::Open { .. })
        ));
    }
}
