use std::fs;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use samanvay_cli::{run, Cli, CliError};

fn write_config(tag: &str, yaml: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "samanvay-cli-{tag}-{}.yaml",
        std::process::id()
    ));
    fs::write(&path, yaml).expect("config should write");
    path
}

#[test]
fn validate_config_accepts_a_field_deployment() {
    let path = write_config(
        "valid",
        "server:\n  endpoint: https://ops.example\ntransport:\n  live_addr: 127.0.0.1:9100\n",
    );
    let cli = Cli::try_parse_from([
        "samanvay",
        "validate-config",
        "--input",
        path.to_str().expect("utf-8 path"),
    ])
    .expect("arguments should parse");

    let outcome = run(cli);
    let _ = fs::remove_file(&path);
    outcome.expect("config should validate");
}

#[test]
fn startup_checks_reject_a_frame_limit_below_one_message() {
    let path = write_config("frame", "transport:\n  max_frame_bytes: 512\n");
    let cli = Cli::try_parse_from([
        "samanvay",
        "validate-config",
        "--input",
        path.to_str().expect("utf-8 path"),
    ])
    .expect("arguments should parse");

    let outcome = run(cli);
    let _ = fs::remove_file(&path);
    let error = outcome.expect_err("tiny frame limit should fail");
    assert_eq!(error.exit_code(), 2);
    assert!(error.to_string().contains("max_frame_bytes"), "{error}");
}

#[test]
fn chat_delivers_one_frame_to_the_live_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
    let addr = listener.local_addr().expect("local addr");
    let path = write_config("chat", &format!("transport:\n  live_addr: {addr}\n"));

    let peer = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept should work");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("timeout should set");
        let mut line = String::new();
        BufReader::new(stream)
            .read_line(&mut line)
            .expect("frame should arrive");
        line
    });

    let cli = Cli::try_parse_from([
        "samanvay",
        "chat",
        "--text",
        "convoy moving",
        "--config",
        path.to_str().expect("utf-8 path"),
    ])
    .expect("arguments should parse");
    let outcome = run(cli);
    let _ = fs::remove_file(&path);
    outcome.expect("chat should send");

    let frame = peer.join().expect("peer thread");
    assert_eq!(frame.trim_end(), r#"{"event":"message","data":"convoy moving"}"#);
}

#[test]
fn chat_gives_up_when_the_channel_never_connects() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
        listener.local_addr().expect("local addr")
    };
    let path = write_config(
        "offline",
        &format!("transport:\n  live_addr: {addr}\n  connect_timeout: 200ms\n"),
    );

    let cli = Cli::try_parse_from([
        "samanvay",
        "chat",
        "--text",
        "anyone?",
        "--wait-secs",
        "1",
        "--config",
        path.to_str().expect("utf-8 path"),
    ])
    .expect("arguments should parse");
    let outcome = run(cli);
    let _ = fs::remove_file(&path);

    assert!(matches!(outcome, Err(CliError::NotConnected { .. })));
}
