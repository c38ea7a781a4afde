pub mod engine_harness;

pub use engine_harness::*;
pub use loopback::*;
pub use mock_channel::*;
pub use mock_signaling::*;
pub use mock_transport::*;
pub use server_bridge::*;

use beam_core::{ClientId, Role, RoomId};
use beam_peer::{PeerEvent, PeerSession};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

/// Timeout for an expected engine event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 5000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

/// Skips events until one matches `predicate`.
pub async fn wait_for_event<F>(
    events: &mut mpsc::UnboundedReceiver<PeerEvent>,
    mut predicate: F,
) -> PeerEvent
where
    F: FnMut(&PeerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for engine event")
}

/// A responder session driven to `Open` over mocks.
pub async fn open_session(peer: &str) -> PeerSession {
    let mut session = PeerSession::new(
        RoomId::from("ROOM01"),
        ClientId::from(peer),
        Role::Responder,
        Box::new(MockTransport::new()),
        Arc::new(MockSignalingOutput::new()),
        Duration::from_secs(30),
    );
    session
        .on_offer(json!({ "type": "offer", "sdp": "mock" }))
        .await
        .expect("offer");
    session
        .on_channel_ready(Arc::new(MockChannel::new()))
        .expect("channel ready");
    session
}
