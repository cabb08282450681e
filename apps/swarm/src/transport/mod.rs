//! Message-oriented connections to the target server.
//!
//! The wire protocol (framing, handshake bytes) belongs to the underlying
//! library; the fleet core only sees these traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod mock;
pub mod websocket;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("handshake deadline exceeded")]
    HandshakeTimeout,
    #[error("send failed: {0}")]
    Send(String),
    #[error("transport closed")]
    Closed,
}

/// One live connection. Owned exclusively by a session and replaced, never
/// repaired, on reconnect.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one outbound binary message.
    async fn send(&self, data: Bytes) -> Result<(), TransportError>;

    /// Next inbound message; `None` once the connection is closed.
    async fn recv(&self) -> Option<Bytes>;

    fn is_open(&self) -> bool;

    /// Tear the connection down and stop its pump task.
    async fn close(&self);
}

/// Dials the server on behalf of one device.
///
/// Dialing and handshaking are split so the caller can put its own deadline
/// on the handshake while the dial inherits the primitive's behavior.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, device_id: &str) -> Result<Box<dyn PendingHandshake>, TransportError>;
}

/// A dialed but not yet negotiated connection.
#[async_trait]
pub trait PendingHandshake: Send {
    /// Upgrade the raw stream into a message-oriented connection.
    async fn handshake(self: Box<Self>) -> Result<Arc<dyn Transport>, TransportError>;
}
