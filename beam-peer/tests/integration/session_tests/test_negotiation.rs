use beam_core::{ClientId, Role, RoomId, SessionState};
use beam_peer::PeerSession;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::{MockChannel, MockSignalingOutput, MockTransport, init_tracing};

fn new_session(
    role: Role,
    transport: MockTransport,
    signaling: &MockSignalingOutput,
) -> PeerSession {
    PeerSession::new(
        RoomId::from("ROOM01"),
        ClientId::from("peer-b"),
        role,
        Box::new(transport),
        Arc::new(signaling.clone()),
        Duration::from_secs(30),
    )
}

#[tokio::test]
async fn test_initiator_negotiation() {
    init_tracing();

    let signaling = MockSignalingOutput::new();
    let transport = MockTransport::new();
    let log = transport.log.clone();
    let peer = ClientId::from("peer-b");
    let mut session = new_session(Role::Initiator, transport, &signaling);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.deadline().is_none());

    // Discovered before the offer exists: held back.
    session.on_local_candidate(json!({ "candidate": "local-1" })).await;
    assert!(signaling.sent().await.is_empty());

    session.start_offer().await.expect("offer should be sent");
    assert_eq!(session.state(), SessionState::AwaitingAnswer);
    assert!(session.deadline().is_some());
    assert_eq!(signaling.kinds_to(&peer).await, vec!["offer", "ice-candidate"]);

    // After the offer, local candidates go straight out.
    session.on_local_candidate(json!({ "candidate": "local-2" })).await;
    assert_eq!(
        signaling.kinds_to(&peer).await,
        vec!["offer", "ice-candidate", "ice-candidate"]
    );

    // The responder's candidates can overtake its answer.
    session
        .on_remote_candidate(json!({ "candidate": "remote-1" }))
        .await
        .expect("early candidate is queued");
    assert_eq!(session.pending_candidate_count(), 1);
    assert!(log.lock().await.candidates.is_empty());

    session
        .on_answer(json!({ "type": "answer", "sdp": "x" }))
        .await
        .expect("answer should apply");
    assert_eq!(session.state(), SessionState::Connecting);
    assert_eq!(session.pending_candidate_count(), 0);
    assert_eq!(log.lock().await.candidates.len(), 1);

    session
        .on_remote_candidate(json!({ "candidate": "remote-2" }))
        .await
        .expect("late candidate applies directly");
    assert_eq!(log.lock().await.candidates.len(), 2);

    session
        .on_channel_ready(Arc::new(MockChannel::new()))
        .expect("channel ready while connecting");
    assert_eq!(session.state(), SessionState::Open);
    assert!(session.channel().is_some());
    assert!(session.deadline().is_none());
}

#[tokio::test]
async fn test_responder_negotiation() {
    init_tracing();

    let signaling = MockSignalingOutput::new();
    let transport = MockTransport::new();
    let log = transport.log.clone();
    let peer = ClientId::from("peer-b");
    let mut session = new_session(Role::Responder, transport, &signaling);

    session
        .on_remote_candidate(json!({ "candidate": "remote-1" }))
        .await
        .expect("candidate before offer is queued");
    assert_eq!(session.pending_candidate_count(), 1);

    session.on_local_candidate(json!({ "candidate": "local-1" })).await;

    session
        .on_offer(json!({ "type": "offer", "sdp": "x" }))
        .await
        .expect("offer should be answered");
    assert_eq!(session.state(), SessionState::Connecting);
    assert_eq!(session.pending_candidate_count(), 0);
    assert_eq!(log.lock().await.candidates.len(), 1);

    // Answer first, then the held candidate; never an offer.
    assert_eq!(signaling.kinds_to(&peer).await, vec!["answer", "ice-candidate"]);

    session
        .on_channel_ready(Arc::new(MockChannel::new()))
        .expect("channel ready while connecting");
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn test_roles_are_enforced() {
    init_tracing();

    let signaling = MockSignalingOutput::new();

    let mut responder = new_session(Role::Responder, MockTransport::new(), &signaling);
    assert!(responder.start_offer().await.is_err());
    assert_eq!(responder.state(), SessionState::Idle);

    let mut initiator = new_session(Role::Initiator, MockTransport::new(), &signaling);
    assert!(initiator.on_offer(json!({ "type": "offer" })).await.is_err());
    assert_eq!(initiator.state(), SessionState::Idle);

    // An answer before any offer went out is out of order.
    assert!(initiator.on_answer(json!({ "type": "answer" })).await.is_err());
    assert_eq!(initiator.state(), SessionState::Idle);

    assert!(signaling.sent().await.is_empty());
}

#[tokio::test]
async fn test_channel_ready_requires_connecting() {
    init_tracing();

    let signaling = MockSignalingOutput::new();
    let mut session = new_session(Role::Initiator, MockTransport::new(), &signaling);

    assert!(session.on_channel_ready(Arc::new(MockChannel::new())).is_err());
    assert_eq!(session.state(), SessionState::Idle);

    session.start_offer().await.unwrap();
    assert!(session.on_channel_ready(Arc::new(MockChannel::new())).is_err());
    assert_eq!(session.state(), SessionState::AwaitingAnswer);
    assert!(session.channel().is_none());
}
