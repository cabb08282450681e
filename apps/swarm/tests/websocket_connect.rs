use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Router;
use swarm_core::session::{Session, TickContext};
use swarm_core::transport::websocket::config::WebSocketConfig;
use swarm_core::transport::websocket::WebSocketConnector;
use swarm_payloads::{StockPayloads, FRAME_MAGIC, KIND_PROBE_ACK, KIND_REPORT};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

async fn handle_socket(mut socket: WebSocket, frames: mpsc::UnboundedSender<Vec<u8>>) {
    // Probe the device's settings right after the handshake, the way the
    // real server does.
    let _ = socket.send(Message::Text("settings_probes?id=7".into())).await;

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Binary(data) = message {
            let _ = frames.send(data);
        }
    }
}

#[tokio::test]
async fn handshake_carries_device_headers_and_payloads_flow() {
    let (header_tx, mut header_rx) = mpsc::unbounded_channel::<(String, String)>();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let app = Router::new().route(
        "/socket-units-server/",
        get(move |upgrade: WebSocketUpgrade, headers: HeaderMap| {
            let header_tx = header_tx.clone();
            let frame_tx = frame_tx.clone();
            async move {
                let device = headers
                    .get("deviceid")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                let firmware = headers
                    .get("fw")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                let _ = header_tx.send((device, firmware));
                upgrade.on_upgrade(move |socket| handle_socket(socket, frame_tx))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let connector = WebSocketConnector::new(WebSocketConfig {
        host: "127.0.0.1".into(),
        port: addr.port(),
        path: "/socket-units-server/".into(),
        addr,
        firmware: "1.0.0".into(),
    });

    let ctx = TickContext {
        connector: Arc::new(connector),
        provider: Arc::new(StockPayloads::new(false)),
        send_events: false,
        handshake_deadline: Duration::from_millis(8000),
        send_deadline: Duration::from_millis(5000),
    };

    let mut session = Session::new(
        "00c0ffee42".into(),
        Duration::from_millis(200),
        Duration::from_millis(50),
    );

    // First tick establishes the connection.
    session.tick(&ctx).await.unwrap();
    assert!(session.is_connected());

    let (device, firmware) = timeout(Duration::from_secs(2), header_rx.recv())
        .await
        .expect("handshake not seen by server")
        .unwrap();
    assert_eq!(device, "00c0ffee42");
    assert_eq!(firmware, "1.0.0");

    // Give the background reader time to stage the probe responses.
    sleep(Duration::from_millis(100)).await;

    // Next tick dispatches the staged probe acks plus the main report.
    session.tick(&ctx).await.unwrap();

    let mut frames = Vec::new();
    for _ in 0..3 {
        let frame = timeout(Duration::from_secs(2), frame_rx.recv())
            .await
            .expect("frame not received by server")
            .unwrap();
        frames.push(frame);
    }

    assert!(frames.iter().all(|f| f[0] == FRAME_MAGIC));
    assert_eq!(frames[0][1], KIND_PROBE_ACK);
    assert_eq!(frames[1][1], KIND_PROBE_ACK);
    assert_eq!(frames[2][1], KIND_REPORT);
}
