use tokio::sync::mpsc;
use tracing::warn;

use crate::chat::events::{ChatMessage, ClientEvent, ServerEvent};

/// Everything the channel surfaces to the application: connection lifecycle
/// plus the inbound service events.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection is established.
    Up,
    /// An established connection dropped.
    Down { reason: Option<String> },
    /// A connection attempt failed; retry is automatic.
    ConnectFailed { error: String },
    /// An event from the service.
    Event(ServerEvent),
}

/// Thin emit surface over the realtime channel. Cloneable and
/// fire-and-forget: emits never fail from the caller's perspective, and
/// anything sent while the channel is down is dropped, not queued.
#[derive(Clone)]
pub struct ChannelSender {
    outbound: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSender {
    pub fn new(outbound: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { outbound }
    }

    fn emit(&self, event: ClientEvent) {
        if self.outbound.send(event).is_err() {
            warn!("realtime channel is gone, dropping outbound event");
        }
    }

    pub fn emit_join(&self, room_id: &str, user_id: &str) {
        self.emit(ClientEvent::JoinRoom {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        });
    }

    pub fn emit_leave(&self, room_id: &str, user_id: &str) {
        self.emit(ClientEvent::LeaveRoom {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        });
    }

    pub fn emit_send(&self, message: ChatMessage) {
        self.emit(ClientEvent::SendMessage { message });
    }

    pub fn emit_history_request(&self, room_id: &str) {
        self.emit(ClientEvent::GetChatHistory {
            room_id: room_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_helpers_produce_wire_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = ChannelSender::new(tx);

        sender.emit_join("global", "u1");
        sender.emit_history_request("global");
        sender.emit_leave("global", "u1");

        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::JoinRoom { room_id, .. } if room_id == "global"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::GetChatHistory { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::LeaveRoom { user_id, .. } if user_id == "u1"
        ));
    }

    #[test]
    fn test_emit_after_channel_gone_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sender = ChannelSender::new(tx);
        sender.emit_join("global", "u1");
    }
}
