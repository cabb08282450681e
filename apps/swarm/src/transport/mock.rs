//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::{Connector, PendingHandshake, Transport, TransportError};

/// Outcome of one dial attempt.
#[derive(Clone, Copy, Debug)]
pub enum DialOutcome {
    Accept,
    Refuse,
    /// The handshake never completes inside any deadline.
    Stall,
}

pub struct MockConnector {
    script: Mutex<VecDeque<DialOutcome>>,
    fallback: DialOutcome,
    attempts: AtomicUsize,
    transports: Arc<Mutex<Vec<Arc<MockTransport>>>>,
}

impl MockConnector {
    pub fn new(fallback: DialOutcome) -> Arc<Self> {
        Self::with_script(Vec::new(), fallback)
    }

    /// Successive dial attempts consume `script`, then fall back.
    pub fn with_script(script: Vec<DialOutcome>, fallback: DialOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            attempts: AtomicUsize::new(0),
            transports: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every transport handed out so far, oldest first.
    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.transports.lock().clone()
    }

    pub fn last_transport(&self) -> Option<Arc<MockTransport>> {
        self.transports.lock().last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(&self, _device_id: &str) -> Result<Box<dyn PendingHandshake>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.fallback);
        match outcome {
            DialOutcome::Refuse => Err(TransportError::Connect("connection refused".into())),
            outcome => Ok(Box::new(MockPending {
                outcome,
                registry: self.transports.clone(),
            })),
        }
    }
}

struct MockPending {
    outcome: DialOutcome,
    registry: Arc<Mutex<Vec<Arc<MockTransport>>>>,
}

#[async_trait]
impl PendingHandshake for MockPending {
    async fn handshake(self: Box<Self>) -> Result<Arc<dyn Transport>, TransportError> {
        if let DialOutcome::Stall = self.outcome {
            return std::future::pending().await;
        }
        let transport = MockTransport::open();
        self.registry.lock().push(transport.clone());
        Ok(transport)
    }
}

pub struct MockTransport {
    open: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<Bytes>>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl MockTransport {
    pub fn open() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            open: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: AsyncMutex::new(rx),
        })
    }

    /// Push a server-originated message.
    pub fn push_inbound(&self, data: Bytes) {
        if let Some(tx) = self.inbound_tx.lock().as_ref() {
            let _ = tx.send(data);
        }
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Simulate the server dropping the connection: readers see end of
    /// stream, senders see a closed transport.
    pub fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.inbound_tx.lock().take();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("simulated send failure".into()));
        }
        self.sent.lock().push(data);
        Ok(())
    }

    async fn recv(&self) -> Option<Bytes> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.drop_connection();
    }
}
