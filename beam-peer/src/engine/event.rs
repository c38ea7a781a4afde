use crate::transfer::ReceivedFile;
use beam_core::{ClientId, Role, RoomId, SessionState, Transfer};

/// What the engine reports to the embedding application.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// The coordinator accepted our join.
    Joined {
        room_id: RoomId,
        client_id: ClientId,
        peer_count: usize,
    },
    PeerDiscovered {
        peer_id: ClientId,
        role: Role,
    },
    SessionChanged {
        peer_id: ClientId,
        state: SessionState,
    },
    PeerLeft {
        peer_id: ClientId,
    },
    /// Progress or terminal status of a transfer in either direction.
    Transfer {
        peer_id: ClientId,
        transfer: Transfer,
    },
    FileReceived {
        peer_id: ClientId,
        file: ReceivedFile,
    },
    /// An `error` message from the coordinator.
    ServerError {
        message: String,
    },
}
