use crate::transport::DataChannel;
use beam_core::ClientId;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

/// Callbacks from a peer transport, funnelled into the engine's event loop.
pub enum TransportEvent {
    DataChannelReady(ClientId, Arc<dyn DataChannel>),
    Disconnected(ClientId),
    Message(ClientId, Bytes),
    CandidateGenerated(ClientId, Value),
}

impl TransportEvent {
    pub fn peer_id(&self) -> &ClientId {
        match self {
            TransportEvent::DataChannelReady(peer, _)
            | TransportEvent::Disconnected(peer)
            | TransportEvent::Message(peer, _)
            | TransportEvent::CandidateGenerated(peer, _) => peer,
        }
    }
}
