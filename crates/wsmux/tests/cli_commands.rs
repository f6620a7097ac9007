#![cfg(feature = "cli")]

use std::net::SocketAddr;
use std::process::{Command, Output};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// One-connection server: greets with CONNECTION_INFO, acknowledges every
/// request and follows each acknowledgement with `pushes` EVENT frames.
async fn scripted_server(pushes: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake");
        let hello = json!([1, 4, 0, {
            "dt": "CONNECTION_INFO",
            "data": { "clientId": 7, "instance": { "name": "simulator" } }
        }]);
        ws.send(Message::Text(hello.to_string())).await.expect("send");

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let frame: Value = serde_json::from_str(&text).expect("request json");
            let sequence = frame[2].as_u64().expect("sequence");
            let reply = json!([1, 2, sequence, {}]);
            ws.send(Message::Text(reply.to_string())).await.expect("send");
            for n in 0..pushes {
                let push = json!([1, 4, 0, {
                    "dt": "EVENT",
                    "data": { "source": "test", "message": format!("event {n}") }
                }]);
                ws.send(Message::Text(push.to_string())).await.expect("send");
            }
        }
    });

    addr
}

async fn run_cli(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_wsmux"))
            .env_remove("WSMUX_URL")
            .env_remove("WSMUX_INSTANCE")
            .args(&args)
            .output()
            .expect("wsmux should run")
    })
    .await
    .expect("join")
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn info_prints_connection_info() {
    let addr = scripted_server(0).await;
    let url = format!("ws://{addr}/_websocket/simulator");

    let output = run_cli(args(&[
        "--log-level",
        "error",
        "--format",
        "json",
        "info",
        &url,
        "--timeout",
        "5s",
    ]))
    .await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: Value = serde_json::from_slice(&output.stdout).expect("info should emit json");
    assert_eq!(payload["client_id"], 7);
    assert_eq!(payload["instance"], "simulator");
    assert_eq!(payload["connected"], true);
}

#[tokio::test]
async fn subscribe_prints_requested_number_of_events() {
    let addr = scripted_server(3).await;
    let url = format!("ws://{addr}/_websocket");

    let output = run_cli(args(&[
        "--log-level",
        "error",
        "--format",
        "json",
        "subscribe",
        &url,
        "--topic",
        "events",
        "--count",
        "2",
    ]))
    .await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["tag"], "EVENT");
    assert_eq!(lines[0]["data"]["message"], "event 0");
    assert_eq!(lines[1]["data"]["message"], "event 1");
}

#[tokio::test]
async fn connect_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let output = run_cli(args(&[
        "--log-level",
        "error",
        "info",
        &format!("ws://{addr}/_websocket"),
    ]))
    .await;
    assert_eq!(output.status.code(), Some(3));
}

#[tokio::test]
async fn missing_stream_name_is_a_usage_error() {
    let output = run_cli(args(&[
        "subscribe",
        "http://localhost:8090/",
        "--topic",
        "stream",
    ]))
    .await;
    assert_eq!(output.status.code(), Some(64));
}

#[tokio::test]
async fn version_reports_package_version() {
    let output = run_cli(args(&["version"])).await;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("wsmux {}", env!("CARGO_PKG_VERSION")));
}
