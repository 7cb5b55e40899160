use std::time::{Duration, Instant};

use mspprims_frame::{command_name, MspMessage};
use mspprims_session::{Receiver, RecvTimeoutError};
use tracing::trace;

use crate::exit::{CliError, CliResult, FAILURE, TIMEOUT, USAGE};

pub trait ResponseReceiver {
    fn recv_until(&self, deadline: Instant) -> Result<MspMessage, RecvTimeoutError>;
}

impl ResponseReceiver for Receiver<MspMessage> {
    fn recv_until(&self, deadline: Instant) -> Result<MspMessage, RecvTimeoutError> {
        self.recv_deadline(deadline)
    }
}

/// Wait for one response to each of `commands`.
///
/// Results come back in the order of `commands`, whatever order the
/// controller answered in. Unrelated traffic is skipped; a repeated
/// response keeps the first copy.
pub fn collect_responses<R: ResponseReceiver>(
    receiver: &R,
    commands: &[u16],
    timeout: Duration,
) -> CliResult<Vec<MspMessage>> {
    let deadline = Instant::now()
        .checked_add(timeout)
        .ok_or_else(|| CliError::new(USAGE, format!("timeout {timeout:?} is too large")))?;
    let mut found: Vec<Option<MspMessage>> = vec![None; commands.len()];

    while found.iter().any(Option::is_none) {
        let message = match receiver.recv_until(deadline) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no response after {timeout:?}"),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(FAILURE, "connection closed before response"))
            }
        };

        if message.is_closed() {
            return Err(CliError::new(FAILURE, "connection closed before response"));
        }
        if !message.is_response {
            continue;
        }

        match commands.iter().position(|&cmd| cmd == message.command) {
            Some(idx) if found[idx].is_none() => found[idx] = Some(message),
            _ => trace!(
                command = message.command,
                name = command_name(message.command),
                "skipping unrelated message"
            ),
        }
    }

    Ok(found.into_iter().flatten().collect())
}
