#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use mspprims_frame::{xor_update, DEBUG_MSG, FC_VARIANT, FC_VERSION, REBOOT};

/// What the fake controller does once a client connects.
#[derive(Default, Clone)]
struct Script {
    /// Frames pushed as soon as the client connects.
    greeting: Vec<Vec<u8>>,
    /// Reply payload per request command.
    replies: Vec<(u8, Vec<u8>)>,
    /// Close the connection right after the greeting.
    hang_up: bool,
}

fn response(command: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u8;
    let mut frame = vec![b'$', b'M', b'>', len, command];
    frame.extend_from_slice(payload);
    frame.push(xor_update(len ^ command, payload));
    frame
}

fn read_request(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).ok()?;
    assert_eq!(&header[..3], b"$M<", "requests are v1 frames");
    let mut rest = vec![0u8; header[3] as usize + 1];
    stream.read_exact(&mut rest).ok()?;
    let checksum = rest.pop()?;
    assert_eq!(checksum, xor_update(header[3] ^ header[4], &rest));
    Some((header[4], rest))
}

/// Start a one-shot controller on a loopback port; every request it
/// receives is forwarded on the returned channel.
fn spawn_controller(script: Script) -> (String, mpsc::Receiver<(u8, Vec<u8>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener has address").to_string();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(_) => return,
        };
        for frame in &script.greeting {
            if stream.write_all(frame).is_err() {
                return;
            }
        }
        if script.hang_up {
            return;
        }
        while let Some((command, payload)) = read_request(&mut stream) {
            if let Some((_, reply)) = script.replies.iter().find(|(cmd, _)| *cmd == command) {
                if stream.write_all(&response(command, reply)).is_err() {
                    return;
                }
            }
            if tx.send((command, payload)).is_err() {
                return;
            }
        }
    });

    (addr, rx)
}

fn mspprims(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mspprims"))
        .args(["--log-level", "off", "--format", "json"])
        .args(args)
        .env_remove("MSPPRIMS_BAUD")
        .env_remove("MSPPRIMS_LOG_LEVEL")
        .output()
        .expect("mspprims should run")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be json"))
        .collect()
}

fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener has address").to_string();
    drop(listener);
    addr
}

#[test]
fn info_reports_variant_and_version() {
    let (addr, requests) = spawn_controller(Script {
        replies: vec![(FC_VARIANT, b"INAV".to_vec()), (FC_VERSION, vec![7, 1, 0])],
        ..Script::default()
    });

    let output = mspprims(&["info", &addr, "--timeout", "3s"]);

    assert!(output.status.success(), "{output:?}");
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["variant"], "INAV");
    assert_eq!(lines[0]["version"], "7.1.0");
    assert_eq!(lines[0]["transport"], "tcp");

    let first = requests.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(first, (FC_VARIANT, Vec::new()));
}

#[test]
fn send_wait_prints_matching_response() {
    let (addr, requests) = spawn_controller(Script {
        replies: vec![(100, vec![1, 2, 3])],
        ..Script::default()
    });

    let output = mspprims(&[
        "send",
        &addr,
        "--no-handshake",
        "--command",
        "100",
        "--hex",
        "aa bb",
        "--wait",
        "--wait-timeout",
        "3s",
    ]);

    assert!(output.status.success(), "{output:?}");
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["command"], 100);
    assert_eq!(lines[0]["response"], true);
    assert_eq!(lines[0]["payload"], "01 02 03");

    let request = requests.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(request, (100, vec![0xaa, 0xbb]));
}

#[test]
fn reboot_sends_reboot_request() {
    let (addr, requests) = spawn_controller(Script::default());

    let output = mspprims(&["reboot", &addr, "--no-handshake"]);

    assert!(output.status.success(), "{output:?}");
    let request = requests.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(request, (REBOOT, Vec::new()));
    assert_eq!(json_lines(&output)[0]["sent"], true);
}

#[test]
fn monitor_prints_debug_text_and_stops_at_count() {
    let (addr, _requests) = spawn_controller(Script {
        greeting: vec![
            response(DEBUG_MSG, b"gyro calibrated\0"),
            response(FC_VERSION, &[7, 1, 0]),
            response(FC_VARIANT, b"INAV"),
        ],
        ..Script::default()
    });

    let output = mspprims(&["monitor", &addr, "--no-handshake", "--count", "2"]);

    assert!(output.status.success(), "{output:?}");
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["command_name"], "DEBUG_MSG");
    assert_eq!(lines[0]["payload"], "gyro calibrated");
    assert_eq!(lines[1]["command"], 3);
    assert_eq!(lines[1]["payload"], "07 01 00");
}

#[test]
fn monitor_filters_and_exits_on_hangup() {
    let (addr, _requests) = spawn_controller(Script {
        greeting: vec![
            response(DEBUG_MSG, b"boot\0"),
            response(FC_VARIANT, b"BTFL"),
        ],
        hang_up: true,
        ..Script::default()
    });

    let output = mspprims(&["monitor", &addr, "--no-handshake", "--commands", "2"]);

    assert!(output.status.success(), "{output:?}");
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["command_name"], "FC_VARIANT");
}

#[test]
fn refused_connection_exits_3() {
    let addr = closed_port();
    let output = mspprims(&["send", &addr, "--command", "2"]);
    assert_eq!(output.status.code(), Some(3), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn silent_controller_info_exits_124() {
    let (addr, _requests) = spawn_controller(Script::default());
    let output = mspprims(&["info", &addr, "--timeout", "500ms"]);
    assert_eq!(output.status.code(), Some(124), "{output:?}");
}

#[test]
fn invalid_hex_exits_64() {
    let output = mspprims(&["send", "127.0.0.1:1", "--command", "1", "--hex", "xyz"]);
    assert_eq!(output.status.code(), Some(64), "{output:?}");
}

#[test]
fn oversized_payload_exits_60() {
    let data = "x".repeat(300);
    let output = mspprims(&["send", "127.0.0.1:1", "--command", "1", "--data", &data]);
    assert_eq!(output.status.code(), Some(60), "{output:?}");
}

#[test]
fn version_prints_name() {
    let output = mspprims(&["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("mspprims "));
}
