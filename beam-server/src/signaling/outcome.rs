use beam_core::{BeamError, ClientId, RoomId};

/// Result of a successful join: the identity issued to the caller and the
/// members that were already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    pub client_id: ClientId,
    pub existing_peers: Vec<ClientId>,
    /// Member count including the caller.
    pub room_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The client was removed; `remaining` members are left. Zero means the
    /// room was deleted.
    Left { remaining: usize },
    /// The client was not a member. Nothing changed.
    NotMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// Room or target absent. The sender is never told.
    DroppedNotFound,
    /// `to` or `roomId` missing.
    DroppedMalformed,
}

/// What the coordinator did with one inbound control frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Joined(JoinOutcome),
    Relayed(RelayOutcome),
    /// The frame was refused. Only validation failures are reported back to
    /// the client; parse failures are logged and dropped.
    Rejected(BeamError),
    /// A well-formed message the coordinator does not act on.
    Ignored,
}
