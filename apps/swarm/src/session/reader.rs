//! Per-session background reader.

use std::sync::Arc;

use bytes::Bytes;
use swarm_payloads::PayloadProvider;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::session::slot::SlotSender;
use crate::transport::Transport;

/// Drain inbound messages for one connected session.
///
/// Each message is handed to the payload provider as a derived request;
/// any buffers it returns are staged for the session's next dispatch,
/// displacing an unconsumed batch. The task lives exactly as long as the
/// connection: it exits when the transport reports end of stream, and the
/// session aborts and awaits it before starting a replacement.
pub fn spawn(
    device_id: String,
    transport: Arc<dyn Transport>,
    provider: Arc<dyn PayloadProvider>,
    staged: SlotSender<Vec<Bytes>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = transport.recv().await {
            trace!(device_id = %device_id, bytes = message.len(), "inbound message");
            let request = String::from_utf8_lossy(&message);
            if let Some(batch) = provider.payloads_for(&request) {
                if staged.send(batch).is_some() {
                    debug!(device_id = %device_id, "displaced an unconsumed staged batch");
                }
            }
        }
        debug!(device_id = %device_id, "transport closed, reader exiting");
    })
}
