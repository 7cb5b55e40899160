use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use mspprims_session::{Session, SessionConfig, DEFAULT_BAUD};

use crate::exit::{session_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod monitor;
pub mod ports;
pub mod reboot;
pub mod send;
pub mod version;
pub mod wait;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every message the controller sends.
    Monitor(MonitorArgs),
    /// Send a single request.
    Send(SendArgs),
    /// Query firmware variant and version.
    Info(InfoArgs),
    /// Reboot the controller.
    Reboot(RebootArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Reboot(args) => reboot::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to reach the controller.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Serial device path or host:port of a TCP bridge.
    pub target: String,
    /// Serial baud rate (ignored for TCP).
    #[arg(long, env = "MSPPRIMS_BAUD", default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// Skip the FC_VARIANT request normally sent on connect.
    #[arg(long)]
    pub no_handshake: bool,
}

impl ConnectArgs {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_baud(self.baud)
            .with_handshake(!self.no_handshake)
    }

    pub fn open(&self) -> CliResult<Session> {
        Session::open(&self.target, self.session_config())
            .map_err(|err| session_error("connect failed", err))
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Only print these command IDs (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub commands: Option<Vec<u16>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Command ID to send.
    #[arg(long, short = 'c')]
    pub command: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex payload (e.g. "01 02 ff" or "0102ff").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Wait for the response to this command and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Time allowed for connecting and for both replies (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct RebootArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
