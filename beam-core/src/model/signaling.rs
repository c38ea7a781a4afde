use crate::model::peer::ClientId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_owned()],
            username: None,
            credential: None,
        }
    }
}

/// Control-plane messages exchanged between a client and the coordinator.
///
/// `offer`, `answer` and `ice-candidate` carry an opaque payload that the
/// coordinator forwards verbatim. `from` is injected on relay and ignored when
/// a client sets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        room_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Joined {
        room_id: RoomId,
        client_id: ClientId,
        peer_count: usize,
    },

    ExistingPeers { peers: Vec<ClientId> },

    #[serde(rename_all = "camelCase")]
    PeerJoined { peer_id: ClientId },

    #[serde(rename_all = "camelCase")]
    PeerLeft { peer_id: ClientId },

    #[serde(rename_all = "camelCase")]
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ClientId>,
        #[serde(default)]
        offer: Value,
    },

    #[serde(rename_all = "camelCase")]
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ClientId>,
        #[serde(default)]
        answer: Value,
    },

    #[serde(rename_all = "camelCase")]
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ClientId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ClientId>,
        #[serde(default)]
        candidate: Value,
    },

    Error { message: String },
}

impl SignalMessage {
    pub fn join(room_id: &RoomId) -> Self {
        SignalMessage::Join {
            room_id: Some(room_id.0.clone()),
        }
    }

    pub fn offer(room_id: &RoomId, to: &ClientId, offer: Value) -> Self {
        SignalMessage::Offer {
            room_id: Some(room_id.clone()),
            to: Some(to.clone()),
            from: None,
            offer,
        }
    }

    pub fn answer(room_id: &RoomId, to: &ClientId, answer: Value) -> Self {
        SignalMessage::Answer {
            room_id: Some(room_id.clone()),
            to: Some(to.clone()),
            from: None,
            answer,
        }
    }

    pub fn ice_candidate(room_id: &RoomId, to: &ClientId, candidate: Value) -> Self {
        SignalMessage::IceCandidate {
            room_id: Some(room_id.clone()),
            to: Some(to.clone()),
            from: None,
            candidate,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SignalMessage::Error {
            message: message.into(),
        }
    }

    /// Wire tag, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::Join { .. } => "join",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::ExistingPeers { .. } => "existing-peers",
            SignalMessage::PeerJoined { .. } => "peer-joined",
            SignalMessage::PeerLeft { .. } => "peer-left",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
            SignalMessage::Error { .. } => "error",
        }
    }

    pub fn is_relay(&self) -> bool {
        matches!(
            self,
            SignalMessage::Offer { .. }
                | SignalMessage::Answer { .. }
                | SignalMessage::IceCandidate { .. }
        )
    }

    /// `(roomId, to)` of a relay message. `None` for every other kind.
    pub fn relay_route(&self) -> Option<(Option<&RoomId>, Option<&ClientId>)> {
        match self {
            SignalMessage::Offer { room_id, to, .. }
            | SignalMessage::Answer { room_id, to, .. }
            | SignalMessage::IceCandidate { room_id, to, .. } => {
                Some((room_id.as_ref(), to.as_ref()))
            }
            _ => None,
        }
    }

    /// Sender id injected by the coordinator on a relayed message.
    pub fn from(&self) -> Option<&ClientId> {
        match self {
            SignalMessage::Offer { from, .. }
            | SignalMessage::Answer { from, .. }
            | SignalMessage::IceCandidate { from, .. } => from.as_ref(),
            _ => None,
        }
    }

    /// Overwrites `from` on relay kinds; other kinds are returned untouched.
    pub fn with_from(mut self, sender: &ClientId) -> Self {
        match &mut self {
            SignalMessage::Offer { from, .. }
            | SignalMessage::Answer { from, .. }
            | SignalMessage::IceCandidate { from, .. } => *from = Some(sender.clone()),
            _ => {}
        }
        self
    }
}
