//! Client side of beam: one `PeerSession` per remote peer, driven by a
//! `PeerEngine` actor, with chunked file transfer over the resulting channel.

pub mod config;
pub mod engine;
pub mod session;
pub mod signaling_output;
pub mod transfer;
pub mod transport;

pub use config::{EngineConfig, PacingConfig};
pub use engine::{PeerEngine, PeerEngineHandle, PeerEvent, PeerInfo};
pub use session::PeerSession;
pub use signaling_output::SignalingOutput;
pub use transfer::{OutgoingFile, ReceiveOutcome, ReceivedFile, TransferReceiver};
pub use transport::{
    DataChannel, PeerTransport, TransportConfig, TransportConnector, TransportEvent,
    WebRtcConnector,
};
