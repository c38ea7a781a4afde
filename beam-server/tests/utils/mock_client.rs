use beam_core::{ClientId, RoomId, SignalMessage};
use beam_server::{
    ClientConnection, ClientSession, Coordinator, Dispatch, JoinOutcome, LeaveOutcome,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for an expected signal (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 1000;

/// A client driven straight through `Coordinator::dispatch`, with every
/// message the coordinator sends it captured on `rx`.
pub struct MockClient {
    pub session: ClientSession,
    rx: mpsc::UnboundedReceiver<SignalMessage>,
}

impl MockClient {
    pub fn new() -> Self {
        let (connection, rx) = ClientConnection::channel();
        Self {
            session: ClientSession::new(connection),
            rx,
        }
    }

    pub fn connection(&self) -> ClientConnection {
        self.session.connection().clone()
    }

    pub fn client_id(&self) -> ClientId {
        self.session
            .membership()
            .map(|m| m.client_id.clone())
            .expect("client has not joined")
    }

    pub async fn send(&mut self, coordinator: &Coordinator, message: &SignalMessage) -> Dispatch {
        let text = serde_json::to_string(message).expect("serialize signal");
        coordinator.dispatch(&mut self.session, &text).await
    }

    pub async fn send_raw(&mut self, coordinator: &Coordinator, text: &str) -> Dispatch {
        coordinator.dispatch(&mut self.session, text).await
    }

    /// Joins `room` and discards nothing; the caller inspects the replies.
    pub async fn join(&mut self, coordinator: &Coordinator, room: &str) -> JoinOutcome {
        match self.send(coordinator, &SignalMessage::join(&RoomId::from(room))).await {
            Dispatch::Joined(outcome) => outcome,
            other => panic!("join to {} failed: {:?}", room, other),
        }
    }

    pub async fn disconnect(&mut self, coordinator: &Coordinator) -> LeaveOutcome {
        coordinator.disconnect(&mut self.session).await
    }

    /// Next signal, failing the test if none arrives in time.
    pub async fn next(&mut self) -> SignalMessage {
        tokio::time::timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), self.rx.recv())
            .await
            .expect("timed out waiting for signal")
            .expect("signal channel closed")
    }

    pub fn try_next(&mut self) -> Option<SignalMessage> {
        self.rx.try_recv().ok()
    }

    /// Drains everything already queued.
    pub fn drain(&mut self) -> Vec<SignalMessage> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    pub fn assert_silent(&mut self) {
        let pending = self.drain();
        assert!(pending.is_empty(), "unexpected signals: {:?}", pending);
    }
}
