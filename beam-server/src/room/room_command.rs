use crate::room::ClientHandle;
use crate::signaling::{JoinOutcome, LeaveOutcome, RelayOutcome};
use beam_core::{ClientId, SignalMessage};
use tokio::sync::oneshot;

/// Commands a room actor processes one at a time.
/// Every membership change for a room goes through its queue.
#[derive(Debug)]
pub enum RoomCommand {
    /// Register a new member, announce it, and hand back the snapshot.
    Join {
        handle: ClientHandle,
        reply: oneshot::Sender<JoinOutcome>,
    },

    /// Remove a member and announce the departure. Unknown ids are a no-op.
    Leave {
        client_id: ClientId,
        reply: oneshot::Sender<LeaveOutcome>,
    },

    /// Forward an offer/answer/ice-candidate to one member, stamping `from`.
    Relay {
        from: ClientId,
        to: ClientId,
        message: SignalMessage,
        reply: oneshot::Sender<RelayOutcome>,
    },

    /// Best-effort fan-out to every open member except `exclude`.
    Broadcast {
        message: SignalMessage,
        exclude: Option<ClientId>,
        reply: oneshot::Sender<usize>,
    },

    /// Current member ids.
    Members {
        reply: oneshot::Sender<Vec<ClientId>>,
    },
}
