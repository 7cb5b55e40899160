//! MSP flight-controller communication.
//!
//! mspprims turns a serial device or TCP bridge into a stream of
//! checksum-verified MultiWii Serial Protocol messages, and sends the
//! handful of legacy requests a ground station needs.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial and TCP byte streams with cross-thread close
//! - [`frame`]: v1/v2 frame decoding, v1 request encoding, blocking reader/writer
//! - [`session`]: background decoding and message delivery (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use mspprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mspprims_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use mspprims_session::*;
}
