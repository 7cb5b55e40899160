use mspprims_frame::{command_name, DEBUG_MSG};
use mspprims_session::SessionCloser;
use tracing::{debug, info};

use crate::cmd::MonitorArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{debug_text, print_message, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.open()?;
    let messages = session.messages();
    install_ctrlc_handler(session.closer())?;

    let mut printed = 0usize;

    // The closed marker is always the last message, so this loop ends on
    // hangup, Ctrl-C and read errors alike.
    for message in messages.iter() {
        if message.is_closed() {
            info!("connection closed");
            break;
        }

        if let Some(commands) = &args.commands {
            if !commands.contains(&message.command) {
                continue;
            }
        }

        if message.command == u16::from(DEBUG_MSG) {
            debug!(text = %debug_text(message.payload.as_ref()), "controller debug");
        } else {
            debug!(
                command = message.command,
                name = command_name(message.command),
                len = message.payload.len(),
                "message"
            );
        }

        print_message(&message, &args.connect.target, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    session.shutdown();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(closer: SessionCloser) -> CliResult<()> {
    ctrlc::set_handler(move || closer.close())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
