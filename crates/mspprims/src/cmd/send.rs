use std::fs;

use mspprims_frame::MAX_V1_PAYLOAD;
use tracing::debug;

use crate::cmd::wait::collect_responses;
use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let mut session = args.connect.open()?;
    let messages = session.messages();

    session
        .send(args.command, &payload)
        .map_err(|err| session_error("send failed", err))?;
    debug!(command = args.command, len = payload.len(), "request sent");

    if args.wait {
        let response = collect_responses(&messages, &[u16::from(args.command)], wait_timeout)?;
        for message in &response {
            print_message(message, &args.connect.target, format);
        }
    }

    session.shutdown();
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    let payload = if let Some(data) = &args.data {
        data.as_bytes().to_vec()
    } else if let Some(hex) = &args.hex {
        parse_hex(hex)?
    } else if let Some(path) = &args.file {
        fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?
    } else {
        Vec::new()
    };

    if payload.len() > MAX_V1_PAYLOAD {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "payload is {} bytes; requests carry at most {MAX_V1_PAYLOAD}",
                payload.len()
            ),
        ));
    }
    Ok(payload)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
        .collect();

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::new(USAGE, format!("--hex is not valid hex: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            "--hex needs an even number of hex digits",
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("--hex is not valid hex: {input}")))
        })
        .collect()
}
