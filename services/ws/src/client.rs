//! Connected client handle
//!
//! Every websocket connection owns one bounded outbound queue drained by a
//! single writer task. The registries hold `Client` handles and push
//! envelopes into the queue; a slow consumer loses messages rather than
//! stalling the matcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// Process-local connection identifier.
pub type ClientId = u64;

/// Depth of each connection's outbound queue.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Event inside a channel envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// The wire envelope: `{channel, event: {type, hash?, payload}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    pub channel: String,
    pub event: WsEvent,
}

/// Handle to one connected client.
#[derive(Debug, Clone)]
pub struct Client {
    id: ClientId,
    outbound: mpsc::Sender<WsMessage>,
}

impl Client {
    pub fn new(id: ClientId, outbound: mpsc::Sender<WsMessage>) -> Self {
        Client { id, outbound }
    }

    /// Create a client together with the receiving half of its queue, which
    /// the connection's writer task drains.
    pub fn with_queue(id: ClientId) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        (Client::new(id, tx), rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Whether the connection's writer task is still draining the queue.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue an envelope for this client. Messages to a full or closed queue
    /// are dropped.
    pub fn send_message(&self, channel: &str, event_type: &str, payload: impl Serialize) {
        self.send_event(channel, event_type, None, payload)
    }

    pub fn send_event(
        &self,
        channel: &str,
        event_type: &str,
        hash: Option<String>,
        payload: impl Serialize,
    ) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(client = self.id, error = %e, "unserializable websocket payload");
                return;
            }
        };
        let msg = WsMessage {
            channel: channel.to_string(),
            event: WsEvent { event_type: event_type.to_string(), hash, payload },
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = self.outbound.try_send(msg) {
            warn!(client = self.id, channel, "outbound queue full, dropping message");
        }
    }
}
