mod connection_wrapper;
mod transport_config;
mod transport_event;

pub use connection_wrapper::{WebRtcConnector, WebRtcTransport};
pub use transport_config::TransportConfig;
pub use transport_event::TransportEvent;

use anyhow::Result;
use async_trait::async_trait;
use beam_core::{ClientId, Role};
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

/// The negotiating half of a connection to one remote peer. Descriptions and
/// candidates are opaque JSON values passed through the coordinator.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<Value>;

    /// Installs a remote offer, then creates and installs the local answer.
    async fn accept_offer(&self, offer: Value) -> Result<Value>;

    async fn apply_answer(&self, answer: Value) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: Value) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds transports. Every transport reports through `events`, tagged with the
/// remote peer's id.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        local: &ClientId,
        peer: &ClientId,
        role: Role,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}

/// An established, ordered, reliable message channel to a peer.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    fn is_open(&self) -> bool;

    /// Bytes queued locally but not yet handed to the network.
    async fn buffered_amount(&self) -> usize;

    async fn send(&self, frame: Bytes) -> Result<()>;
}
