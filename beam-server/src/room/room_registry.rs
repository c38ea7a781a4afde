use crate::room::{ClientConnection, ClientHandle, Room, RoomCommand};
use crate::signaling::{JoinOutcome, LeaveOutcome, RelayOutcome};
use beam_core::{ClientId, RoomId, SignalMessage};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const ROOM_QUEUE_DEPTH: usize = 100;

/// In-memory table of rooms. Each room is an actor reached through its command
/// queue; a room whose queue is closed no longer exists.
///
/// Rooms are independent and run in parallel. Nothing survives a restart.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, mpsc::Sender<RoomCommand>>,
    live_clients: DashSet<ClientId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            live_clients: DashSet::new(),
        }
    }

    /// Draws a client id that no connected client currently holds.
    pub fn issue_client_id(&self) -> ClientId {
        loop {
            let id = ClientId::generate();
            if self.live_clients.insert(id.clone()) {
                return id;
            }
            warn!("Client id collision on {}, re-rolling", id);
        }
    }

    /// Registers `connection` in `room_id`, creating the room if needed.
    pub async fn join(&self, room_id: &RoomId, connection: ClientConnection) -> JoinOutcome {
        let client_id = self.issue_client_id();

        loop {
            let tx = self.room_sender(room_id);
            let (reply, reply_rx) = oneshot::channel();
            let handle = ClientHandle::new(client_id.clone(), connection.clone());

            if tx.send(RoomCommand::Join { handle, reply }).await.is_err() {
                self.forget_if_closed(room_id);
                continue;
            }

            match reply_rx.await {
                Ok(outcome) => return outcome,
                Err(_) => {
                    // The room emptied and shut down with our join still queued.
                    debug!("Room {} closed during join, retrying", room_id);
                    self.forget_if_closed(room_id);
                }
            }
        }
    }

    /// Removes `client_id` from `room_id`. Safe to call for clients that never
    /// joined or already left.
    pub async fn leave(&self, room_id: &RoomId, client_id: &ClientId) -> LeaveOutcome {
        let outcome = match self.live_room_sender(room_id) {
            Some(tx) => {
                let (reply, reply_rx) = oneshot::channel();
                let cmd = RoomCommand::Leave {
                    client_id: client_id.clone(),
                    reply,
                };
                match tx.send(cmd).await {
                    Ok(()) => reply_rx.await.unwrap_or(LeaveOutcome::NotMember),
                    Err(_) => LeaveOutcome::NotMember,
                }
            }
            None => LeaveOutcome::NotMember,
        };

        if matches!(outcome, LeaveOutcome::Left { remaining: 0 }) {
            self.forget_if_closed(room_id);
        }

        self.live_clients.remove(client_id);
        outcome
    }

    /// Hands `message` to `to` inside `room_id`, stamped with `from`.
    pub async fn relay(
        &self,
        room_id: &RoomId,
        from: &ClientId,
        to: &ClientId,
        message: SignalMessage,
    ) -> RelayOutcome {
        let Some(tx) = self.live_room_sender(room_id) else {
            debug!("Room {} not found, dropping {}", room_id, message.kind());
            return RelayOutcome::DroppedNotFound;
        };

        let (reply, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::Relay {
            from: from.clone(),
            to: to.clone(),
            message,
            reply,
        };

        if tx.send(cmd).await.is_err() {
            return RelayOutcome::DroppedNotFound;
        }
        reply_rx.await.unwrap_or(RelayOutcome::DroppedNotFound)
    }

    /// Fans `message` out to every open member of `room_id` except `exclude`.
    /// Returns the number of members it was queued for.
    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        message: SignalMessage,
        exclude: Option<&ClientId>,
    ) -> usize {
        let Some(tx) = self.live_room_sender(room_id) else {
            return 0;
        };

        let (reply, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::Broadcast {
            message,
            exclude: exclude.cloned(),
            reply,
        };

        if tx.send(cmd).await.is_err() {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    /// Member ids of `room_id`, or `None` when the room does not exist.
    pub async fn members(&self, room_id: &RoomId) -> Option<Vec<ClientId>> {
        let tx = self.live_room_sender(room_id)?;
        let (reply, reply_rx) = oneshot::channel();
        tx.send(RoomCommand::Members { reply }).await.ok()?;
        reply_rx.await.ok()
    }

    pub fn room_count(&self) -> usize {
        self.rooms
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .count()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.live_room_sender(room_id).is_some()
    }

    fn live_room_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms
            .get(room_id)
            .map(|sender| sender.clone())
            .filter(|sender| !sender.is_closed())
    }

    fn room_sender(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                let tx = Self::spawn_room(room_id);
                entry.insert(tx.clone());
                tx
            }
            Entry::Vacant(entry) => {
                let tx = Self::spawn_room(room_id);
                entry.insert(tx.clone());
                tx
            }
        }
    }

    fn spawn_room(room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        info!("Creating new room: {}", room_id);
        let (tx, rx) = mpsc::channel(ROOM_QUEUE_DEPTH);
        tokio::spawn(Room::new(room_id.clone(), rx).run());
        tx
    }

    fn forget_if_closed(&self, room_id: &RoomId) {
        self.rooms.remove_if(room_id, |_, sender| sender.is_closed());
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
