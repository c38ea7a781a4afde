use beam_core::{BeamError, RoomId, SignalMessage};
use beam_server::{ClientConnection, Dispatch};

use crate::utils::{MockClient, init_tracing, new_coordinator};

#[tokio::test]
async fn test_garbage_frames_are_dropped() {
    init_tracing();

    let coordinator = new_coordinator();
    let mut client = MockClient::new();

    for frame in ["not json", "{}", r#"{"type":"bogus"}"#, r#"{"type":"join","roomId":7}"#] {
        let outcome = client.send_raw(&coordinator, frame).await;
        assert!(
            matches!(outcome, Dispatch::Rejected(BeamError::Protocol(_))),
            "{} -> {:?}",
            frame,
            outcome
        );
    }
    client.assert_silent();

    let joined = client.join(&coordinator, "AFTER1").await;
    assert_eq!(joined.room_size, 1);
}

#[tokio::test]
async fn test_malformed_frame_does_not_disturb_other_clients() {
    init_tracing();

    let coordinator = new_coordinator();
    let mut good = MockClient::new();
    let mut bad = MockClient::new();

    good.join(&coordinator, "CALM01").await;
    bad.join(&coordinator, "CALM01").await;
    good.drain();
    bad.drain();

    bad.send_raw(&coordinator, "{\"type\":\"answer\",").await;

    good.assert_silent();
    assert_eq!(
        coordinator
            .registry()
            .members(&RoomId::from("CALM01"))
            .await
            .map(|m| m.len()),
        Some(2)
    );
}

#[tokio::test]
async fn test_server_only_messages_are_ignored() {
    init_tracing();

    let coordinator = new_coordinator();
    let mut client = MockClient::new();
    client.join(&coordinator, "IGNR01").await;
    client.drain();

    let outcome = client
        .send(
            &coordinator,
            &SignalMessage::PeerLeft {
                peer_id: client.client_id(),
            },
        )
        .await;

    assert_eq!(outcome, Dispatch::Ignored);
    client.assert_silent();
}

#[tokio::test]
async fn test_broadcast_skips_closed_connections() {
    init_tracing();

    let coordinator = new_coordinator();
    let room = RoomId::from("BCAST1");
    let mut open = MockClient::new();
    open.join(&coordinator, "BCAST1").await;

    let (closed, rx) = ClientConnection::channel();
    coordinator.registry().join(&room, closed).await;
    drop(rx);
    open.drain();

    let delivered = coordinator
        .broadcast(&room, SignalMessage::error("maintenance"), None)
        .await;

    assert_eq!(delivered, 1);
    assert_eq!(open.next().await, SignalMessage::error("maintenance"));

    let excluded = coordinator
        .broadcast(&room, SignalMessage::error("again"), Some(&open.client_id()))
        .await;
    assert_eq!(excluded, 0);
}
