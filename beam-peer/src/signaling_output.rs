use async_trait::async_trait;
use beam_core::{ClientId, RoomId, SignalMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// Outbound control plane. Whatever carries messages to the coordinator
/// (usually a WebSocket pump) implements this.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_signal(&self, msg: SignalMessage);

    async fn send_offer(&self, room_id: &RoomId, peer_id: &ClientId, offer: Value) {
        self.send_signal(SignalMessage::offer(room_id, peer_id, offer))
            .await;
    }

    async fn send_answer(&self, room_id: &RoomId, peer_id: &ClientId, answer: Value) {
        self.send_signal(SignalMessage::answer(room_id, peer_id, answer))
            .await;
    }

    async fn send_ice(&self, room_id: &RoomId, peer_id: &ClientId, candidate: Value) {
        self.send_signal(SignalMessage::ice_candidate(room_id, peer_id, candidate))
            .await;
    }
}

#[async_trait]
impl SignalingOutput for mpsc::UnboundedSender<SignalMessage> {
    async fn send_signal(&self, msg: SignalMessage) {
        if let Err(e) = self.send(msg) {
            warn!("Signaling channel closed, dropping {}", e.0.kind());
        }
    }
}
