use serde::Serialize;
use tracing::info;

use crate::cmd::RebootArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

#[derive(Serialize)]
struct RebootOutput<'a> {
    target: &'a str,
    command: &'static str,
    sent: bool,
}

pub fn run(args: RebootArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.connect.open()?;
    session
        .reboot()
        .map_err(|err| session_error("reboot failed", err))?;
    info!(addr = %session.target(), "reboot requested");
    session.shutdown();

    let out = RebootOutput {
        target: &args.connect.target,
        command: "REBOOT",
        sent: true,
    };
    let fields = [
        ("target", out.target.to_string()),
        ("command", out.command.to_string()),
        ("sent", out.sent.to_string()),
    ];
    print_fields(&out, &fields, format);
    Ok(SUCCESS)
}
