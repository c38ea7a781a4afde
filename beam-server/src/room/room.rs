use crate::room::client_handle::ClientHandle;
use crate::room::room_command::RoomCommand;
use crate::signaling::{JoinOutcome, LeaveOutcome, RelayOutcome};
use beam_core::{ClientId, RoomId, SignalMessage};
use std::collections::HashMap;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Room actor. Owns the membership of one room and applies every mutation to it
/// in arrival order, so concurrent joins and leaves on the same room never race.
///
/// The actor stops (and closes its queue) as soon as the last member leaves;
/// the registry then treats the room as absent.
pub struct Room {
    id: RoomId,
    members: HashMap<ClientId, ClientHandle>,
    command_rx: mpsc::Receiver<RoomCommand>,
}

impl Room {
    pub fn new(id: RoomId, command_rx: mpsc::Receiver<RoomCommand>) -> Self {
        Self {
            id,
            members: HashMap::new(),
            command_rx,
        }
    }

    /// Main loop. Must be driven by `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Room {} event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            if self.handle_command(cmd).is_break() {
                break;
            }
        }

        info!("Room {} event loop finished", self.id);
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join { handle, reply } => {
                let outcome = self.join(handle);
                let _ = reply.send(outcome);
            }

            RoomCommand::Leave { client_id, reply } => {
                let outcome = self.leave(&client_id);

                if self.members.is_empty() {
                    // Close before replying so the registry sees a closed queue
                    // by the time the caller learns the room emptied.
                    self.command_rx.close();
                    let _ = reply.send(outcome);
                    info!("Removed empty room: {}", self.id);
                    return ControlFlow::Break(());
                }

                let _ = reply.send(outcome);
            }

            RoomCommand::Relay {
                from,
                to,
                message,
                reply,
            } => {
                let outcome = self.relay(&from, &to, message);
                let _ = reply.send(outcome);
            }

            RoomCommand::Broadcast {
                message,
                exclude,
                reply,
            } => {
                let delivered = self.broadcast(&message, exclude.as_ref());
                let _ = reply.send(delivered);
            }

            RoomCommand::Members { reply } => {
                let _ = reply.send(self.members.keys().cloned().collect());
            }
        }

        ControlFlow::Continue(())
    }

    fn join(&mut self, handle: ClientHandle) -> JoinOutcome {
        let client_id = handle.id.clone();
        let connection = handle.connection.clone();
        let existing_peers: Vec<ClientId> = self.members.keys().cloned().collect();

        connection.send(SignalMessage::Joined {
            room_id: self.id.clone(),
            client_id: client_id.clone(),
            peer_count: existing_peers.len(),
        });

        self.members.insert(client_id.clone(), handle);
        info!(
            "Client {} joined room {} ({} total)",
            client_id,
            self.id,
            self.members.len()
        );

        self.broadcast(
            &SignalMessage::PeerJoined {
                peer_id: client_id.clone(),
            },
            Some(&client_id),
        );

        if !existing_peers.is_empty() {
            connection.send(SignalMessage::ExistingPeers {
                peers: existing_peers.clone(),
            });
        }

        JoinOutcome {
            room_id: self.id.clone(),
            client_id,
            existing_peers,
            room_size: self.members.len(),
        }
    }

    fn leave(&mut self, client_id: &ClientId) -> LeaveOutcome {
        if self.members.remove(client_id).is_none() {
            debug!("Leave for unknown client {} in room {}", client_id, self.id);
            return LeaveOutcome::NotMember;
        }

        info!(
            "Client {} left room {} ({} remaining)",
            client_id,
            self.id,
            self.members.len()
        );

        self.broadcast(
            &SignalMessage::PeerLeft {
                peer_id: client_id.clone(),
            },
            None,
        );

        LeaveOutcome::Left {
            remaining: self.members.len(),
        }
    }

    fn relay(&self, from: &ClientId, to: &ClientId, message: SignalMessage) -> RelayOutcome {
        let Some(target) = self.members.get(to) else {
            debug!(
                "Target client {} not found in room {}, dropping {}",
                to,
                self.id,
                message.kind()
            );
            return RelayOutcome::DroppedNotFound;
        };

        let kind = message.kind();
        if !target.connection.send(message.with_from(from)) {
            warn!("Target client {} in room {} has a closed connection", to, self.id);
            return RelayOutcome::DroppedNotFound;
        }

        debug!("Relayed {} from {} to {} in room {}", kind, from, to, self.id);
        RelayOutcome::Delivered
    }

    fn broadcast(&self, message: &SignalMessage, exclude: Option<&ClientId>) -> usize {
        self.members
            .values()
            .filter(|member| Some(&member.id) != exclude)
            .filter(|member| member.connection.is_open())
            .filter(|member| member.connection.send(message.clone()))
            .count()
    }
}
