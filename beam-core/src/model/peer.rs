use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const CLIENT_ID_LEN: usize = 13;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity the coordinator assigns to a connected client.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    /// Random 13-character base-36 token. Uniqueness against live ids is the
    /// registry's job; this only draws the candidate.
    pub fn generate() -> Self {
        let mut seed = Uuid::new_v4().as_u128();
        let mut id = String::with_capacity(CLIENT_ID_LEN);
        for _ in 0..CLIENT_ID_LEN {
            id.push(BASE36[(seed % 36) as usize] as char);
            seed /= 36;
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a peer pair sends the first offer.
///
/// A client that learns about a peer from the `existing-peers` snapshot is the
/// initiator; a client told about a newcomer through `peer-joined` is the
/// responder. The role is fixed at discovery and never re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Offering,
    AwaitingAnswer,
    Answering,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Offering => "offering",
            SessionState::AwaitingAnswer => "awaiting-answer",
            SessionState::Answering => "answering",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
