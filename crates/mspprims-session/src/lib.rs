//! MSP controller sessions.
//!
//! This is the "just works" layer. Point a [`Session`] at a serial device or
//! a `host:port`, and every verified message the controller sends shows up
//! on a channel while requests go out on the same connection.

pub mod config;
pub mod error;
mod reader;
pub mod session;

pub use config::{SessionConfig, DEFAULT_BAUD, RFCOMM_SETTLE};
pub use error::{Result, SessionError};
pub use session::{Session, SessionCloser};

/// Delivery channel types, re-exported so consumers need not depend on
/// `crossbeam-channel` directly.
pub use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
