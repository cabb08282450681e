//! Payload tables for the simulated device fleet.
//!
//! The fleet core asks a [`PayloadProvider`] for outbound buffers by request
//! tag and sends whatever comes back; it never inspects the bytes itself.
//! [`StockPayloads`] is the stock table: steady-state reports, event reports,
//! and responses derived from server messages, with an optional malformed
//! frame appended to every batch for server robustness testing.

use bytes::{BufMut, Bytes, BytesMut};

/// Request tag for the steady-state report sent on every dispatch.
pub const MAIN_REQUEST: &str = "main_payload";
/// Request tag for the optional event report.
pub const EVENT_REQUEST: &str = "event";

/// First byte of every well-formed frame.
pub const FRAME_MAGIC: u8 = 0xA5;
pub const KIND_REPORT: u8 = 0x01;
pub const KIND_EVENT: u8 = 0x02;
pub const KIND_PROBE_ACK: u8 = 0x03;

/// Maps a request tag to zero-or-more outbound buffers.
///
/// Tags are either one of the fixed request constants or the raw text of a
/// server message, in which case the returned buffers are the derived
/// response to stage for the next dispatch.
pub trait PayloadProvider: Send + Sync {
    fn payloads_for(&self, request: &str) -> Option<Vec<Bytes>>;
}

/// Frame layout: magic, kind, little-endian body length, body.
fn frame(kind: u8, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + body.len());
    buf.put_u8(FRAME_MAGIC);
    buf.put_u8(kind);
    buf.put_u16_le(body.len() as u16);
    buf.put_slice(body);
    buf.freeze()
}

/// Header promises more body bytes than follow; servers must reject it.
fn truncated_frame() -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u8(FRAME_MAGIC);
    buf.put_u8(KIND_REPORT);
    buf.put_u16_le(64);
    buf.freeze()
}

/// The stock payload table.
pub struct StockPayloads {
    include_bad: bool,
}

impl StockPayloads {
    pub fn new(include_bad: bool) -> Self {
        Self { include_bad }
    }

    fn finish(&self, mut batch: Vec<Bytes>) -> Option<Vec<Bytes>> {
        if self.include_bad {
            batch.push(truncated_frame());
        }
        Some(batch)
    }
}

impl PayloadProvider for StockPayloads {
    fn payloads_for(&self, request: &str) -> Option<Vec<Bytes>> {
        if request == MAIN_REQUEST {
            self.finish(vec![frame(KIND_REPORT, b"status=ok;battery=97;rssi=-61")])
        } else if request == EVENT_REQUEST {
            self.finish(vec![frame(KIND_EVENT, b"event=door;state=open")])
        } else if request.contains("settings_probes") {
            // Servers probe device settings after the handshake; answer with
            // both probe acknowledgements.
            self.finish(vec![
                frame(KIND_PROBE_ACK, b"probe=1;accepted"),
                frame(KIND_PROBE_ACK, b"probe=2;accepted"),
            ])
        } else {
            None
        }
    }
}
