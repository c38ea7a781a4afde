use beam_core::{ClientId, RoomId, SessionState, SignalMessage};
use beam_peer::{EngineConfig, PeerEngine, PeerEngineHandle, PeerEvent, SignalingOutput};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{MockChannel, MockConnector, MockSignalingOutput, wait_for_event};

/// A `PeerEngine` for room `ROOM01` whose coordinator is played by the test.
pub struct Harness {
    pub connector: Arc<MockConnector>,
    pub signaling: MockSignalingOutput,
    pub signal_tx: mpsc::UnboundedSender<SignalMessage>,
    pub handle: PeerEngineHandle,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn start(config: EngineConfig) -> Self {
        let connector = MockConnector::new();
        let signaling = MockSignalingOutput::new();
        let output: Arc<dyn SignalingOutput> = Arc::new(signaling.clone());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let (engine, handle, events) = PeerEngine::new(
            RoomId::from("ROOM01"),
            connector.clone(),
            output,
            signal_rx,
            config,
        );

        Self {
            connector,
            signaling,
            signal_tx,
            handle,
            events,
            task: tokio::spawn(engine.run()),
        }
    }

    pub fn signal(&self, msg: SignalMessage) {
        self.signal_tx.send(msg).expect("engine gone");
    }

    /// Feeds the coordinator's join replies for a room holding `existing`.
    pub async fn join_as(&mut self, local: &str, existing: &[&str]) {
        self.signal(SignalMessage::Joined {
            room_id: RoomId::from("ROOM01"),
            client_id: ClientId::from(local),
            peer_count: existing.len(),
        });
        wait_for_event(&mut self.events, |e| matches!(e, PeerEvent::Joined { .. })).await;

        if !existing.is_empty() {
            self.signal(SignalMessage::ExistingPeers {
                peers: existing.iter().map(|p| ClientId::from(*p)).collect(),
            });
        }
    }

    pub async fn wait_for_state(&mut self, peer: &ClientId, state: SessionState) {
        wait_for_event(&mut self.events, |e| {
            matches!(
                e,
                PeerEvent::SessionChanged { peer_id, state: s } if peer_id == peer && *s == state
            )
        })
        .await;
    }

    /// Drives an initiator session with `peer` to `Open` over `channel`.
    pub async fn open_as_initiator(
        &mut self,
        peer: &ClientId,
        channel: MockChannel,
    ) -> Arc<MockChannel> {
        self.wait_for_state(peer, SessionState::AwaitingAnswer).await;
        self.signal(SignalMessage::Answer {
            room_id: Some(RoomId::from("ROOM01")),
            to: Some(ClientId::from("me")),
            from: Some(peer.clone()),
            answer: json!({ "type": "answer", "sdp": "mock" }),
        });
        self.wait_for_state(peer, SessionState::Connecting).await;

        let channel = Arc::new(channel);
        self.connector.open_channel(peer, channel.clone()).await;
        self.wait_for_state(peer, SessionState::Open).await;
        channel
    }

    pub async fn stop(self) {
        self.handle.shutdown().await;
        self.task.await.expect("engine panicked");
    }
}
