use beam_core::{ClientId, Role, RoomId, SessionState, SignalMessage};
use beam_peer::{EngineConfig, PeerEvent, TransportEvent};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::{Harness, MockChannel, init_tracing, wait_for_event};

#[tokio::test]
async fn test_existing_peers_are_offered_to() {
    init_tracing();

    let mut h = Harness::start(EngineConfig::default());
    let peer = ClientId::from("peer-b");
    h.join_as("me", &["peer-b"]).await;

    match wait_for_event(&mut h.events, |e| matches!(e, PeerEvent::PeerDiscovered { .. })).await {
        PeerEvent::PeerDiscovered { peer_id, role } => {
            assert_eq!(peer_id, peer);
            assert_eq!(role, Role::Initiator);
        }
        _ => unreachable!(),
    }

    let channel = h.open_as_initiator(&peer, MockChannel::new()).await;
    assert_eq!(channel.sent().len(), 0);

    let sent = h.signaling.sent().await;
    assert_eq!(sent[0].kind(), "join");
    assert_eq!(h.signaling.kinds_to(&peer).await, vec!["offer"]);

    let peers = h.handle.peers().await.unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].peer_id, peer);
    assert_eq!(peers[0].role, Role::Initiator);
    assert_eq!(peers[0].state, SessionState::Open);
    assert!(!peers[0].sending);

    h.stop().await;
}

#[tokio::test]
async fn test_newcomer_is_answered() {
    init_tracing();

    let mut h = Harness::start(EngineConfig::default());
    let peer = ClientId::from("peer-c");
    h.join_as("me", &[]).await;

    h.signal(SignalMessage::PeerJoined {
        peer_id: peer.clone(),
    });
    match wait_for_event(&mut h.events, |e| matches!(e, PeerEvent::PeerDiscovered { .. })).await {
        PeerEvent::PeerDiscovered { role, .. } => assert_eq!(role, Role::Responder),
        _ => unreachable!(),
    }

    // A responder never offers on its own.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.signaling.kinds_to(&peer).await.is_empty());

    h.signal(SignalMessage::Offer {
        room_id: Some(RoomId::from("ROOM01")),
        to: Some(ClientId::from("me")),
        from: Some(peer.clone()),
        offer: json!({ "type": "offer", "sdp": "mock" }),
    });
    h.wait_for_state(&peer, SessionState::Connecting).await;
    assert_eq!(h.signaling.kinds_to(&peer).await, vec!["answer"]);

    // Local candidates now flow to the peer.
    h.connector
        .fire(TransportEvent::CandidateGenerated(
            peer.clone(),
            json!({ "candidate": "host" }),
        ))
        .await;
    h.connector
        .open_channel(&peer, Arc::new(MockChannel::new()))
        .await;
    h.wait_for_state(&peer, SessionState::Open).await;
    assert_eq!(
        h.signaling.kinds_to(&peer).await,
        vec!["answer", "ice-candidate"]
    );

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stalled_negotiation_times_out() {
    init_tracing();

    let config = EngineConfig {
        negotiation_timeout: Duration::from_secs(2),
        ..EngineConfig::default()
    };
    let mut h = Harness::start(config);
    let peer = ClientId::from("peer-b");
    h.join_as("me", &["peer-b"]).await;
    h.wait_for_state(&peer, SessionState::AwaitingAnswer).await;

    // No answer ever arrives.
    h.wait_for_state(&peer, SessionState::Failed).await;
    assert!(h.handle.peers().await.unwrap().is_empty());

    let transport = h.connector.transport(&peer).await.unwrap();
    assert!(transport.log.lock().await.closed);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_newcomer_times_out() {
    init_tracing();

    let config = EngineConfig {
        negotiation_timeout: Duration::from_secs(2),
        ..EngineConfig::default()
    };
    let mut h = Harness::start(config);
    let peer = ClientId::from("peer-c");
    h.join_as("me", &[]).await;

    // The newcomer is announced but never sends its offer.
    h.signal(SignalMessage::PeerJoined {
        peer_id: peer.clone(),
    });
    h.wait_for_state(&peer, SessionState::Failed).await;
    assert!(h.handle.peers().await.unwrap().is_empty());
    assert!(h.signaling.kinds_to(&peer).await.is_empty());

    h.stop().await;
}

#[tokio::test]
async fn test_peer_left_closes_session() {
    init_tracing();

    let mut h = Harness::start(EngineConfig::default());
    let peer = ClientId::from("peer-b");
    h.join_as("me", &["peer-b"]).await;
    h.open_as_initiator(&peer, MockChannel::new()).await;

    h.signal(SignalMessage::PeerLeft {
        peer_id: peer.clone(),
    });
    h.wait_for_state(&peer, SessionState::Closed).await;
    match wait_for_event(&mut h.events, |e| matches!(e, PeerEvent::PeerLeft { .. })).await {
        PeerEvent::PeerLeft { peer_id } => assert_eq!(peer_id, peer),
        _ => unreachable!(),
    }
    assert!(h.handle.peers().await.unwrap().is_empty());

    // Late signals for the departed peer are dropped.
    h.signal(SignalMessage::IceCandidate {
        room_id: None,
        to: None,
        from: Some(peer.clone()),
        candidate: json!({ "candidate": "late" }),
    });
    assert!(h.handle.peers().await.unwrap().is_empty());

    h.stop().await;
}

#[tokio::test]
async fn test_transport_disconnect_fails_session() {
    init_tracing();

    let mut h = Harness::start(EngineConfig::default());
    let peer = ClientId::from("peer-b");
    h.join_as("me", &["peer-b"]).await;
    h.open_as_initiator(&peer, MockChannel::new()).await;

    h.connector
        .fire(TransportEvent::Disconnected(peer.clone()))
        .await;
    h.wait_for_state(&peer, SessionState::Failed).await;
    assert!(h.handle.peers().await.unwrap().is_empty());

    h.stop().await;
}

#[tokio::test]
async fn test_server_error_is_surfaced() {
    init_tracing();

    let mut h = Harness::start(EngineConfig::default());
    h.signal(SignalMessage::error("Room ID required"));

    match wait_for_event(&mut h.events, |e| matches!(e, PeerEvent::ServerError { .. })).await {
        PeerEvent::ServerError { message } => assert_eq!(message, "Room ID required"),
        _ => unreachable!(),
    }

    h.stop().await;
}

#[tokio::test]
async fn test_engine_stops_when_signaling_closes() {
    init_tracing();

    let h = Harness::start(EngineConfig::default());
    drop(h.signal_tx);

    h.task.await.expect("engine panicked");
    assert!(h.handle.peers().await.is_err());
}
