use std::time::{Duration, Instant};

use mspprims_frame::{MspMessage, FC_VARIANT, FC_VERSION};
use mspprims_session::{Session, SessionError};
use mspprims_transport::TransportError;
use serde::Serialize;

use crate::cmd::wait::collect_responses;
use crate::cmd::{parse_duration, ConnectArgs, InfoArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{hex_string, print_fields, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    target: String,
    transport: &'static str,
    variant: String,
    version: String,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let start = Instant::now();

    let mut session = connect_with_timeout(&args.connect, timeout)?;
    let messages = session.messages();

    if args.connect.no_handshake {
        session
            .query_variant()
            .map_err(|err| session_error("query failed", err))?;
    }
    session
        .query_version()
        .map_err(|err| session_error("query failed", err))?;

    let remaining = timeout.saturating_sub(start.elapsed());
    let replies = collect_responses(
        &messages,
        &[u16::from(FC_VARIANT), u16::from(FC_VERSION)],
        remaining.max(Duration::from_millis(1)),
    )?;

    let out = InfoOutput {
        target: args.connect.target.clone(),
        transport: session.target().transport_name(),
        variant: variant_string(&replies[0]),
        version: version_string(&replies[1]),
    };
    session.shutdown();

    let fields = [
        ("target", out.target.clone()),
        ("transport", out.transport.to_string()),
        ("variant", out.variant.clone()),
        ("version", out.version.clone()),
    ];
    print_fields(&out, &fields, format);
    Ok(SUCCESS)
}

/// Retry refused connections until `timeout`, for bridges that are still
/// starting up.
fn connect_with_timeout(connect: &ConnectArgs, timeout: Duration) -> CliResult<Session> {
    let start = Instant::now();
    loop {
        match Session::open(&connect.target, connect.session_config()) {
            Ok(session) => return Ok(session),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(session_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &SessionError) -> bool {
    match err {
        SessionError::Transport(TransportError::Connect { source, .. }) => {
            source.kind() == std::io::ErrorKind::ConnectionRefused
        }
        _ => false,
    }
}

/// Variant replies are a four-character identifier such as `INAV`.
fn variant_string(message: &MspMessage) -> String {
    let text: String = String::from_utf8_lossy(message.payload.as_ref())
        .trim_end_matches('\0')
        .to_string();
    if text.chars().all(|c| c.is_ascii_graphic()) && !text.is_empty() {
        text
    } else {
        hex_string(message.payload.as_ref())
    }
}

/// Version replies are major, minor, patch bytes.
fn version_string(message: &MspMessage) -> String {
    match message.payload.as_ref() {
        [major, minor, patch, ..] => format!("{major}.{minor}.{patch}"),
        other => hex_string(other),
    }
}
