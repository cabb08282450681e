//! WebSocket implementation of the transport traits, over
//! `tokio-tungstenite`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async, WebSocketStream};
use tracing::{debug, warn};

use super::{Connector, PendingHandshake, Transport, TransportError};

pub mod config;
use config::WebSocketConfig;

pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn dial(&self, device_id: &str) -> Result<Box<dyn PendingHandshake>, TransportError> {
        let request = self.config.client_request(device_id)?;
        let stream = TcpStream::connect(self.config.addr)
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        Ok(Box::new(PendingWebSocket { request, stream }))
    }
}

struct PendingWebSocket {
    request: Request<()>,
    stream: TcpStream,
}

#[async_trait]
impl PendingHandshake for PendingWebSocket {
    async fn handshake(self: Box<Self>) -> Result<Arc<dyn Transport>, TransportError> {
        let PendingWebSocket { request, stream } = *self;
        let (ws, _response) = client_async(request, stream)
            .await
            .map_err(|err| TransportError::Handshake(err.to_string()))?;
        Ok(WebSocketTransport::spawn(ws))
    }
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// A negotiated connection. Sends go straight to the sink so the caller's
/// deadline bounds the actual network write; inbound messages are pumped
/// into a channel by a dedicated task that also tracks the open flag.
pub struct WebSocketTransport {
    sink: AsyncMutex<WsSink>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Bytes>>,
    open: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl WebSocketTransport {
    fn spawn(ws: WebSocketStream<TcpStream>) -> Arc<dyn Transport> {
        let (sink, stream) = ws.split();
        let (tx_in, rx_in) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let pump = tokio::spawn(pump_inbound(stream, tx_in, open.clone()));

        Arc::new(Self {
            sink: AsyncMutex::new(sink),
            inbound: AsyncMutex::new(rx_in),
            open,
            pump,
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let mut sink = self.sink.lock().await;
        sink.send(Message::Binary(data.to_vec())).await.map_err(|err| {
            self.open.store(false, Ordering::Release);
            TransportError::Send(err.to_string())
        })
    }

    async fn recv(&self) -> Option<Bytes> {
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Release);
        let mut sink = self.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        self.pump.abort();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_inbound(
    mut stream: SplitStream<WebSocketStream<TcpStream>>,
    tx_in: mpsc::UnboundedSender<Bytes>,
    open: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                if tx_in.send(Bytes::from(data)).is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                if tx_in.send(Bytes::from(text.into_bytes())).is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                debug!(?frame, "server closed the connection");
                break;
            }
            Err(err) => {
                warn!(error = %err, "websocket read error");
                break;
            }
            _ => {} // Ping/Pong are handled by the library.
        }
    }
    open.store(false, Ordering::Release);
}
