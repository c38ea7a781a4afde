use crate::config::EngineConfig;
use crate::engine::PeerEvent;
use crate::engine::handle::{EngineCommand, PeerEngineHandle, PeerInfo};
use crate::session::PeerSession;
use crate::signaling_output::SignalingOutput;
use crate::transfer::{self, OutgoingFile, ReceiveOutcome, TransferReceiver};
use crate::transport::{TransportConnector, TransportEvent};
use beam_core::{
    BeamError, ClientId, Result, Role, RoomId, SessionState, SignalMessage, Transfer, TransferId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const COMMAND_QUEUE_DEPTH: usize = 32;
const TRANSPORT_QUEUE_DEPTH: usize = 256;
const IDLE_TICK: Duration = Duration::from_secs(3600);

struct Outbound {
    task: JoinHandle<()>,
    snapshot: watch::Receiver<Transfer>,
}

impl Outbound {
    fn is_active(&self) -> bool {
        !self.task.is_finished() && !self.snapshot.borrow().is_terminal()
    }
}

struct PeerSlot {
    session: PeerSession,
    receiver: TransferReceiver,
    outbound: Option<Outbound>,
    reported_state: SessionState,
}

enum Teardown {
    Close(&'static str),
    Fail(&'static str),
}

impl Teardown {
    fn reason(&self) -> &'static str {
        match self {
            Teardown::Close(reason) | Teardown::Fail(reason) => reason,
        }
    }
}

/// Client-side actor for one room. Owns every `PeerSession`, routes control
/// messages from the coordinator and transport callbacks to them, and runs
/// one outbound transfer per open peer.
pub struct PeerEngine {
    room_id: RoomId,
    config: EngineConfig,
    local_id: Option<ClientId>,
    connector: Arc<dyn TransportConnector>,
    signaling: Arc<dyn SignalingOutput>,
    signal_rx: mpsc::UnboundedReceiver<SignalMessage>,
    command_rx: mpsc::Receiver<EngineCommand>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    events: mpsc::UnboundedSender<PeerEvent>,
    peers: HashMap<ClientId, PeerSlot>,
}

impl PeerEngine {
    /// `signaling` carries our messages to the coordinator; `signal_rx`
    /// yields the coordinator's messages to us.
    pub fn new(
        room_id: RoomId,
        connector: Arc<dyn TransportConnector>,
        signaling: Arc<dyn SignalingOutput>,
        signal_rx: mpsc::UnboundedReceiver<SignalMessage>,
        config: EngineConfig,
    ) -> (Self, PeerEngineHandle, mpsc::UnboundedReceiver<PeerEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_QUEUE_DEPTH);
        let (events, events_rx) = mpsc::unbounded_channel();

        let engine = Self {
            room_id,
            config,
            local_id: None,
            connector,
            signaling,
            signal_rx,
            command_rx,
            transport_tx,
            transport_rx,
            events,
            peers: HashMap::new(),
        };

        (engine, PeerEngineHandle::new(command_tx), events_rx)
    }

    /// Main loop. Joins the room, then runs until shutdown or until the
    /// signaling channel closes. Must be driven by `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Peer engine for room {} started", self.room_id);
        self.signaling
            .send_signal(SignalMessage::join(&self.room_id))
            .await;

        loop {
            let deadline = self.next_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + IDLE_TICK);

            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                signal = self.signal_rx.recv() => match signal {
                    Some(msg) => self.handle_signal(msg).await,
                    None => {
                        warn!("Signaling channel closed");
                        break;
                    }
                },

                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event).await;
                }

                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    self.expire_sessions().await;
                }
            }
        }

        let peers: Vec<ClientId> = self.peers.keys().cloned().collect();
        for peer_id in peers {
            self.teardown(&peer_id, Teardown::Close("engine shut down"))
                .await;
        }
        info!("Peer engine for room {} stopped", self.room_id);
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::SendFile {
                peer_id,
                file,
                reply,
            } => {
                let _ = reply.send(self.start_transfer(&peer_id, file));
            }

            EngineCommand::Peers { reply } => {
                let peers = self
                    .peers
                    .iter()
                    .map(|(peer_id, slot)| PeerInfo {
                        peer_id: peer_id.clone(),
                        role: slot.session.role(),
                        state: slot.session.state(),
                        sending: slot.outbound.as_ref().is_some_and(Outbound::is_active),
                    })
                    .collect();
                let _ = reply.send(peers);
            }

            EngineCommand::ClosePeer { peer_id, reply } => {
                let existed = self.peers.contains_key(&peer_id);
                self.teardown(&peer_id, Teardown::Close("closed locally"))
                    .await;
                let _ = reply.send(existed);
            }

            EngineCommand::Shutdown => {}
        }
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        match msg {
            SignalMessage::Joined {
                room_id,
                client_id,
                peer_count,
            } => {
                info!(
                    "Joined room {} as {} ({} peers present)",
                    room_id, client_id, peer_count
                );
                self.local_id = Some(client_id.clone());
                self.emit(PeerEvent::Joined {
                    room_id,
                    client_id,
                    peer_count,
                });
            }

            SignalMessage::ExistingPeers { peers } => {
                for peer_id in peers {
                    self.discover(peer_id, Role::Initiator).await;
                }
            }

            SignalMessage::PeerJoined { peer_id } => {
                self.discover(peer_id, Role::Responder).await;
            }

            SignalMessage::PeerLeft { peer_id } => {
                info!("Peer {} left", peer_id);
                self.teardown(&peer_id, Teardown::Close("peer left")).await;
                self.emit(PeerEvent::PeerLeft { peer_id });
            }

            SignalMessage::Offer {
                from: Some(from),
                offer,
                ..
            } => {
                if !self.peers.contains_key(&from) {
                    self.discover(from.clone(), Role::Responder).await;
                }
                let result = match self.peers.get_mut(&from) {
                    Some(slot) => slot.session.on_offer(offer).await,
                    None => return,
                };
                self.after_step(&from, result).await;
            }

            SignalMessage::Answer {
                from: Some(from),
                answer,
                ..
            } => {
                let result = match self.peers.get_mut(&from) {
                    Some(slot) => slot.session.on_answer(answer).await,
                    None => {
                        debug!("Answer from unknown peer {}", from);
                        return;
                    }
                };
                self.after_step(&from, result).await;
            }

            SignalMessage::IceCandidate {
                from: Some(from),
                candidate,
                ..
            } => {
                let result = match self.peers.get_mut(&from) {
                    Some(slot) => slot.session.on_remote_candidate(candidate).await,
                    None => {
                        debug!("Candidate from unknown peer {}", from);
                        return;
                    }
                };
                self.after_step(&from, result).await;
            }

            SignalMessage::Error { message } => {
                warn!("Coordinator error: {}", message);
                self.emit(PeerEvent::ServerError { message });
            }

            other => debug!("Ignoring {} signal", other.kind()),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let peer_id = event.peer_id().clone();
        let Some(slot) = self.peers.get_mut(&peer_id) else {
            debug!("Transport event for unknown peer {}", peer_id);
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                slot.session.on_local_candidate(candidate).await;
            }

            TransportEvent::DataChannelReady(_, channel) => {
                let result = slot.session.on_channel_ready(channel);
                self.after_step(&peer_id, result).await;
            }

            TransportEvent::Message(_, frame) => {
                let outcome = slot.receiver.handle_frame(&frame);
                self.on_receive(&peer_id, outcome);
            }

            TransportEvent::Disconnected(_) => {
                self.teardown(&peer_id, Teardown::Fail("transport disconnected"))
                    .await;
            }
        }
    }

    async fn discover(&mut self, peer_id: ClientId, role: Role) {
        let Some(local_id) = self.local_id.clone() else {
            warn!("Peer {} announced before our join completed", peer_id);
            return;
        };
        if peer_id == local_id || self.peers.contains_key(&peer_id) {
            return;
        }

        let transport = match self
            .connector
            .connect(&local_id, &peer_id, role, self.transport_tx.clone())
            .await
        {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Failed to create transport for {}: {:#}", peer_id, e);
                return;
            }
        };

        let session = PeerSession::new(
            self.room_id.clone(),
            peer_id.clone(),
            role,
            transport,
            self.signaling.clone(),
            self.config.negotiation_timeout,
        );
        self.peers.insert(
            peer_id.clone(),
            PeerSlot {
                session,
                receiver: TransferReceiver::new(),
                outbound: None,
                reported_state: SessionState::Idle,
            },
        );

        info!("Discovered peer {} as {}", peer_id, role);
        self.emit(PeerEvent::PeerDiscovered {
            peer_id: peer_id.clone(),
            role,
        });

        if role == Role::Initiator {
            let result = match self.peers.get_mut(&peer_id) {
                Some(slot) => slot.session.start_offer().await,
                None => return,
            };
            self.after_step(&peer_id, result).await;
        }
    }

    /// Reports state changes after a session step and drops failed sessions.
    async fn after_step(&mut self, peer_id: &ClientId, result: Result<()>) {
        if let Err(e) = &result {
            warn!("Session step with {} rejected: {}", peer_id, e);
        }

        let Some(slot) = self.peers.get_mut(peer_id) else {
            return;
        };
        let state = slot.session.state();
        if state == slot.reported_state {
            return;
        }
        slot.reported_state = state;

        if state == SessionState::Failed {
            self.teardown(peer_id, Teardown::Fail("negotiation failed"))
                .await;
        } else {
            self.emit(PeerEvent::SessionChanged {
                peer_id: peer_id.clone(),
                state,
            });
        }
    }

    fn on_receive(&self, peer_id: &ClientId, outcome: ReceiveOutcome) {
        match outcome {
            ReceiveOutcome::Started(transfer)
            | ReceiveOutcome::Progress(transfer)
            | ReceiveOutcome::Failed(transfer) => {
                self.emit(PeerEvent::Transfer {
                    peer_id: peer_id.clone(),
                    transfer,
                });
            }
            ReceiveOutcome::Completed(transfer, file) => {
                self.emit(PeerEvent::Transfer {
                    peer_id: peer_id.clone(),
                    transfer,
                });
                self.emit(PeerEvent::FileReceived {
                    peer_id: peer_id.clone(),
                    file,
                });
            }
            ReceiveOutcome::Ignored(reason) => {
                debug!("Dropped frame from {}: {}", peer_id, reason);
            }
        }
    }

    fn start_transfer(&mut self, peer_id: &ClientId, file: OutgoingFile) -> Result<TransferId> {
        let slot = self
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| BeamError::NotFound(format!("peer {}", peer_id)))?;

        if slot.outbound.as_ref().is_some_and(Outbound::is_active) {
            return Err(BeamError::Busy(peer_id.clone()));
        }

        let outgoing = transfer::initiate(&slot.session, &file)?;
        let channel = slot.session.channel().ok_or_else(|| BeamError::NotReady {
            peer: peer_id.clone(),
            state: slot.session.state(),
        })?;

        let transfer_id = outgoing.id.clone();
        let (snapshot_tx, snapshot) = watch::channel(outgoing.clone());
        let events = self.events.clone();
        let pacing = self.config.pacing.clone();
        let peer = peer_id.clone();

        let task = tokio::spawn(async move {
            let mut record = outgoing;
            let report = |t: &Transfer| {
                snapshot_tx.send_replace(t.clone());
                let _ = events.send(PeerEvent::Transfer {
                    peer_id: peer.clone(),
                    transfer: t.clone(),
                });
            };
            let _ =
                transfer::run_sender(&mut record, &file, channel.as_ref(), &pacing, report).await;
        });

        slot.outbound = Some(Outbound { task, snapshot });
        Ok(transfer_id)
    }

    /// Removes the session with `peer_id`, aborting its sender task and
    /// failing every transfer still in flight with it. Idempotent.
    async fn teardown(&mut self, peer_id: &ClientId, how: Teardown) {
        let Some(mut slot) = self.peers.remove(peer_id) else {
            return;
        };
        let reason = how.reason();

        if let Some(outbound) = slot.outbound.take() {
            outbound.task.abort();
            let mut transfer = outbound.snapshot.borrow().clone();
            if !transfer.is_terminal() {
                transfer.fail(reason);
                self.emit(PeerEvent::Transfer {
                    peer_id: peer_id.clone(),
                    transfer,
                });
            }
        }

        for transfer in slot.receiver.abort_all(reason) {
            self.emit(PeerEvent::Transfer {
                peer_id: peer_id.clone(),
                transfer,
            });
        }

        match how {
            Teardown::Close(_) => slot.session.close().await,
            Teardown::Fail(reason) => slot.session.fail(reason).await,
        }

        debug!("Session with {} released ({})", peer_id, reason);
        self.emit(PeerEvent::SessionChanged {
            peer_id: peer_id.clone(),
            state: slot.session.state(),
        });
    }

    async fn expire_sessions(&mut self) {
        let now = Instant::now();
        let expired: Vec<ClientId> = self
            .peers
            .iter()
            .filter(|(_, slot)| slot.session.is_expired(now))
            .map(|(peer_id, _)| peer_id.clone())
            .collect();

        for peer_id in expired {
            warn!("Negotiation with {} timed out", peer_id);
            self.teardown(&peer_id, Teardown::Fail("negotiation timed out"))
                .await;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.peers
            .values()
            .filter_map(|slot| slot.session.deadline())
            .min()
    }

    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }
}
