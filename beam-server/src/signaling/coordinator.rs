use crate::room::{ClientConnection, RoomRegistry};
use crate::signaling::{Dispatch, JoinOutcome, LeaveOutcome, RelayOutcome};
use beam_core::{BeamError, ClientId, Result, RoomId, SignalMessage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Room membership held by one socket after a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub client_id: ClientId,
}

/// Per-socket state the coordinator threads through `dispatch`.
#[derive(Debug)]
pub struct ClientSession {
    connection: ClientConnection,
    membership: Option<Membership>,
}

impl ClientSession {
    pub fn new(connection: ClientConnection) -> Self {
        Self {
            connection,
            membership: None,
        }
    }

    pub fn connection(&self) -> &ClientConnection {
        &self.connection
    }

    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }
}

/// Processes join/leave and relays negotiation messages between members of the
/// same room. Payloads are never inspected.
#[derive(Clone)]
pub struct Coordinator {
    registry: Arc<RoomRegistry>,
}

impl Coordinator {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Joins `connection` to `room_id`. A missing or empty room id is answered
    /// with an `error` message and leaves every room untouched.
    pub async fn join(
        &self,
        room_id: Option<&str>,
        connection: &ClientConnection,
    ) -> Result<JoinOutcome> {
        let Some(room_id) = room_id.filter(|id| !id.is_empty()) else {
            connection.send(SignalMessage::error("Room ID required"));
            return Err(BeamError::Validation("Room ID required".into()));
        };

        let outcome = self
            .registry
            .join(&RoomId::from(room_id), connection.clone())
            .await;
        Ok(outcome)
    }

    /// Forwards an offer, answer or ice-candidate to its `to` target, stamped
    /// with `from`. Absent rooms and targets are dropped without telling the
    /// sender.
    pub async fn relay(&self, from: &ClientId, message: SignalMessage) -> RelayOutcome {
        let Some((Some(room_id), Some(to))) = message.relay_route() else {
            warn!(
                "Dropping {} from {}: missing roomId or to",
                message.kind(),
                from
            );
            return RelayOutcome::DroppedMalformed;
        };

        let (room_id, to) = (room_id.clone(), to.clone());
        self.registry.relay(&room_id, from, &to, message).await
    }

    pub async fn leave(&self, room_id: &RoomId, client_id: &ClientId) -> LeaveOutcome {
        self.registry.leave(room_id, client_id).await
    }

    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        message: SignalMessage,
        exclude: Option<&ClientId>,
    ) -> usize {
        self.registry.broadcast(room_id, message, exclude).await
    }

    /// Handles one text frame from a client socket.
    pub async fn dispatch(&self, session: &mut ClientSession, text: &str) -> Dispatch {
        let message = match serde_json::from_str::<SignalMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid SignalMessage: {}", e);
                return Dispatch::Rejected(BeamError::Protocol(e.to_string()));
            }
        };

        match message {
            SignalMessage::Join { room_id } => {
                if room_id.as_deref().is_some_and(|id| !id.is_empty()) {
                    self.disconnect(session).await;
                }

                match self.join(room_id.as_deref(), &session.connection).await {
                    Ok(outcome) => {
                        session.membership = Some(Membership {
                            room_id: outcome.room_id.clone(),
                            client_id: outcome.client_id.clone(),
                        });
                        Dispatch::Joined(outcome)
                    }
                    Err(e) => Dispatch::Rejected(e),
                }
            }

            message if message.is_relay() => {
                let Some(membership) = &session.membership else {
                    debug!("Dropping {} from a socket that never joined", message.kind());
                    return Dispatch::Relayed(RelayOutcome::DroppedNotFound);
                };
                let from = membership.client_id.clone();
                Dispatch::Relayed(self.relay(&from, message).await)
            }

            other => {
                debug!("Ignoring client-sent {}", other.kind());
                Dispatch::Ignored
            }
        }
    }

    /// Leaves whatever room the session is in. Idempotent.
    pub async fn disconnect(&self, session: &mut ClientSession) -> LeaveOutcome {
        let Some(membership) = session.membership.take() else {
            return LeaveOutcome::NotMember;
        };

        info!(
            "Client {} leaving room {}",
            membership.client_id, membership.room_id
        );
        self.leave(&membership.room_id, &membership.client_id).await
    }
}
