use crate::signaling_output::SignalingOutput;
use crate::transport::{DataChannel, PeerTransport};
use beam_core::{BeamError, ClientId, Result, Role, RoomId, SessionState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Connection establishment with one remote peer.
///
/// ```text
/// initiator: Idle -> Offering -> AwaitingAnswer -> Connecting -> Open
/// responder: Idle -> Answering -> Connecting -> Open
/// ```
///
/// `Closed` and `Failed` are reachable from every non-terminal state. Remote
/// candidates that arrive before the remote description are queued; local
/// candidates discovered before the local description are held back.
pub struct PeerSession {
    room_id: RoomId,
    peer_id: ClientId,
    role: Role,
    state: SessionState,
    transport: Box<dyn PeerTransport>,
    signaling: Arc<dyn SignalingOutput>,
    local_description: Option<Value>,
    remote_description: Option<Value>,
    pending_candidates: Vec<Value>,
    held_local_candidates: Vec<Value>,
    channel: Option<Arc<dyn DataChannel>>,
    negotiation_timeout: Duration,
    deadline: Option<Instant>,
}

impl PeerSession {
    /// A responder's deadline starts now, so a peer that never sends its
    /// offer still expires. An initiator's starts with `start_offer`.
    pub fn new(
        room_id: RoomId,
        peer_id: ClientId,
        role: Role,
        transport: Box<dyn PeerTransport>,
        signaling: Arc<dyn SignalingOutput>,
        negotiation_timeout: Duration,
    ) -> Self {
        let deadline = match role {
            Role::Responder => Some(Instant::now() + negotiation_timeout),
            Role::Initiator => None,
        };
        Self {
            room_id,
            peer_id,
            role,
            state: SessionState::Idle,
            transport,
            signaling,
            local_description: None,
            remote_description: None,
            pending_candidates: Vec::new(),
            held_local_candidates: Vec::new(),
            channel: None,
            negotiation_timeout,
            deadline,
        }
    }

    pub fn peer_id(&self) -> &ClientId {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The usable channel. Present only while `Open`.
    pub fn channel(&self) -> Option<Arc<dyn DataChannel>> {
        self.channel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Initiator only: creates and relays the offer.
    pub async fn start_offer(&mut self) -> Result<()> {
        self.expect_state(SessionState::Idle, "start_offer")?;
        if self.role != Role::Initiator {
            return Err(BeamError::Protocol(format!(
                "responder for {} must not send an offer",
                self.peer_id
            )));
        }

        self.transition(SessionState::Offering);
        self.arm_deadline();

        let offer = match self.transport.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail_with(format!("create offer: {:#}", e)).await),
        };

        self.local_description = Some(offer.clone());
        self.signaling
            .send_offer(&self.room_id, &self.peer_id, offer)
            .await;
        self.flush_local_candidates().await;

        self.transition(SessionState::AwaitingAnswer);
        Ok(())
    }

    /// Applies a remote offer, then relays the answer.
    pub async fn on_offer(&mut self, offer: Value) -> Result<()> {
        self.expect_state(SessionState::Idle, "offer")?;
        if self.role != Role::Responder {
            return Err(BeamError::Protocol(format!(
                "unexpected offer from {}: we are its initiator",
                self.peer_id
            )));
        }

        self.transition(SessionState::Answering);
        self.arm_deadline();

        let answer = match self.transport.accept_offer(offer.clone()).await {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail_with(format!("accept offer: {:#}", e)).await),
        };

        self.remote_description = Some(offer);
        self.apply_pending_candidates().await;

        self.local_description = Some(answer.clone());
        self.signaling
            .send_answer(&self.room_id, &self.peer_id, answer)
            .await;
        self.flush_local_candidates().await;

        self.transition(SessionState::Connecting);
        Ok(())
    }

    pub async fn on_answer(&mut self, answer: Value) -> Result<()> {
        self.expect_state(SessionState::AwaitingAnswer, "answer")?;

        if let Err(e) = self.transport.apply_answer(answer.clone()).await {
            return Err(self.fail_with(format!("apply answer: {:#}", e)).await);
        }

        self.remote_description = Some(answer);
        self.apply_pending_candidates().await;

        self.transition(SessionState::Connecting);
        self.arm_deadline();
        Ok(())
    }

    /// Applies `candidate` now if the remote description is set, otherwise
    /// queues it. A candidate the transport refuses is logged and skipped.
    pub async fn on_remote_candidate(&mut self, candidate: Value) -> Result<()> {
        if self.state.is_terminal() {
            return Err(BeamError::Protocol(format!(
                "candidate for {} session with {}",
                self.state, self.peer_id
            )));
        }

        if self.remote_description.is_none() {
            debug!("Queueing early candidate from {}", self.peer_id);
            self.pending_candidates.push(candidate);
            return Ok(());
        }

        self.apply_candidate(candidate).await;
        Ok(())
    }

    /// Relays a locally discovered candidate, or holds it until the local
    /// description has been sent.
    pub async fn on_local_candidate(&mut self, candidate: Value) {
        if self.state.is_terminal() {
            return;
        }

        if self.local_description.is_none() {
            self.held_local_candidates.push(candidate);
            return;
        }

        self.signaling
            .send_ice(&self.room_id, &self.peer_id, candidate)
            .await;
    }

    pub fn on_channel_ready(&mut self, channel: Arc<dyn DataChannel>) -> Result<()> {
        self.expect_state(SessionState::Connecting, "channel ready")?;

        info!(
            "Channel '{}' to {} is open ({})",
            channel.label(),
            self.peer_id,
            self.role
        );
        self.channel = Some(channel);
        self.deadline = None;
        self.transition(SessionState::Open);
        Ok(())
    }

    /// Orderly shutdown. Idempotent.
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(SessionState::Closed);
        self.release().await;
    }

    /// Moves to `Failed` and releases the transport. Idempotent.
    pub async fn fail(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        warn!("Session with {} failed: {}", self.peer_id, reason);
        self.transition(SessionState::Failed);
        self.release().await;
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        !self.state.is_terminal() && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    async fn fail_with(&mut self, reason: String) -> BeamError {
        self.fail(&reason).await;
        BeamError::Transport(reason)
    }

    async fn release(&mut self) {
        self.deadline = None;
        self.channel = None;
        self.pending_candidates.clear();
        self.held_local_candidates.clear();

        if let Err(e) = self.transport.close().await {
            debug!("Closing transport to {}: {:#}", self.peer_id, e);
        }
    }

    async fn apply_pending_candidates(&mut self) {
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!(
                "Applying {} queued candidates from {}",
                pending.len(),
                self.peer_id
            );
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&self, candidate: Value) {
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!("Rejected candidate from {}: {:#}", self.peer_id, e);
        }
    }

    async fn flush_local_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.held_local_candidates) {
            self.signaling
                .send_ice(&self.room_id, &self.peer_id, candidate)
                .await;
        }
    }

    fn arm_deadline(&mut self) {
        self.deadline = Some(Instant::now() + self.negotiation_timeout);
    }

    fn expect_state(&self, expected: SessionState, step: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(BeamError::Protocol(format!(
            "{} with {} while {} (expected {})",
            step, self.peer_id, self.state, expected
        )))
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {} -> {}", self.peer_id, self.state, next);
        self.state = next;
    }
}
