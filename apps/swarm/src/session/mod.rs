//! One simulated device: its connection state machine and the data that
//! crosses between its scheduler and its background reader.

pub mod gate;
pub mod reader;
pub mod slot;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use bytes::Bytes;
use swarm_payloads::{PayloadProvider, EVENT_REQUEST, MAIN_REQUEST};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::deadline;
use crate::transport::{Connector, Transport, TransportError};
use gate::IntervalGate;
use slot::{SlotReceiver, SlotSender};

/// Collaborators and policy shared by every session in the fleet.
pub struct TickContext {
    pub connector: Arc<dyn Connector>,
    pub provider: Arc<dyn PayloadProvider>,
    /// Send an event payload on each dispatch.
    pub send_events: bool,
    pub handshake_deadline: Duration,
    pub send_deadline: Duration,
}

/// The live half of a connected session.
struct Link {
    transport: Arc<dyn Transport>,
    reader: JoinHandle<()>,
}

enum LifecycleState {
    Disconnected,
    Connecting,
    Connected(Link),
}

pub struct Session {
    device_id: String,
    state: LifecycleState,
    reconnect: IntervalGate,
    dispatch: IntervalGate,
    staged_tx: SlotSender<Vec<Bytes>>,
    staged_rx: SlotReceiver<Vec<Bytes>>,
}

impl Session {
    pub fn new(
        device_id: String,
        reconnect_interval: Duration,
        dispatch_interval: Duration,
    ) -> Self {
        let (staged_tx, staged_rx) = slot::channel();
        Self {
            device_id,
            state: LifecycleState::Disconnected,
            reconnect: IntervalGate::new(reconnect_interval),
            dispatch: IntervalGate::new(dispatch_interval),
            staged_tx,
            staged_rx,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, LifecycleState::Connected(_))
    }

    /// One lifecycle step, driven only by the owning scheduler.
    pub async fn tick(&mut self, ctx: &TickContext) -> Result<()> {
        // A link whose transport went away is torn down before anything else.
        let lost = match &self.state {
            LifecycleState::Connected(link) => !link.transport.is_open(),
            _ => false,
        };
        if lost {
            warn!(device_id = %self.device_id, "connection lost");
            self.teardown().await;
        }

        if !self.is_connected() {
            if self.reconnect.fire(Instant::now()) {
                if let Err(err) = self.establish(ctx).await {
                    warn!(device_id = %self.device_id, error = %err, "connect failed");
                }
            }
            return Ok(());
        }

        if !self.dispatch.fire(Instant::now()) {
            return Ok(());
        }

        self.dispatch_payloads(ctx).await;
        Ok(())
    }

    async fn establish(&mut self, ctx: &TickContext) -> Result<(), TransportError> {
        self.state = LifecycleState::Connecting;
        debug!(device_id = %self.device_id, "connecting");

        match self.negotiate(ctx).await {
            Ok(link) => {
                info!(device_id = %self.device_id, "session connected");
                self.state = LifecycleState::Connected(link);
                Ok(())
            }
            Err(err) => {
                self.state = LifecycleState::Disconnected;
                Err(err)
            }
        }
    }

    /// Dial (inheriting the primitive's own timeout), then handshake under
    /// the configured deadline, then start this link's reader.
    async fn negotiate(&self, ctx: &TickContext) -> Result<Link, TransportError> {
        let pending = ctx.connector.dial(&self.device_id).await?;

        let transport =
            match deadline::bounded("handshake", ctx.handshake_deadline, pending.handshake()).await
            {
                Some(result) => result?,
                None => return Err(TransportError::HandshakeTimeout),
            };

        let reader = reader::spawn(
            self.device_id.clone(),
            transport.clone(),
            ctx.provider.clone(),
            self.staged_tx.clone(),
        );

        Ok(Link { transport, reader })
    }

    /// Drop the link and stop its reader. The reader is awaited so at most
    /// one is ever alive per session.
    async fn teardown(&mut self) {
        if let LifecycleState::Connected(link) =
            std::mem::replace(&mut self.state, LifecycleState::Disconnected)
        {
            link.transport.close().await;
            link.reader.abort();
            let _ = link.reader.await;
        }
    }

    async fn dispatch_payloads(&mut self, ctx: &TickContext) {
        if let Some(batch) = self.staged_rx.take() {
            debug!(device_id = %self.device_id, buffers = batch.len(), "sending staged payload");
            self.send_batch(ctx, batch).await;
        }

        if ctx.send_events {
            if let Some(batch) = ctx.provider.payloads_for(EVENT_REQUEST) {
                self.send_batch(ctx, batch).await;
            }
        }

        if let Some(batch) = ctx.provider.payloads_for(MAIN_REQUEST) {
            self.send_batch(ctx, batch).await;
        }
    }

    /// Best-effort delivery: failures and overruns are logged and the link
    /// stays up. Only connect/handshake failures and a closed transport
    /// change state.
    async fn send_batch(&self, ctx: &TickContext, batch: Vec<Bytes>) {
        let LifecycleState::Connected(link) = &self.state else {
            return;
        };
        for buffer in batch {
            match deadline::bounded("send", ctx.send_deadline, link.transport.send(buffer)).await {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    warn!(device_id = %self.device_id, error = %err, "send failed");
                }
                None => {} // overrun already logged by the deadline guard
            }
        }
    }
}
