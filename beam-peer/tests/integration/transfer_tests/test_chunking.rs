use beam_core::{CHUNK_SIZE, DataMessage, TransferDirection, TransferStatus};
use beam_peer::transfer::{initiate, run_sender};
use beam_peer::{OutgoingFile, PacingConfig, ReceiveOutcome, TransferReceiver};
use bytes::Bytes;

use crate::utils::{MockChannel, init_tracing, open_session, payload};

#[tokio::test]
async fn test_frames_reassemble_into_original_file() {
    init_tracing();

    let session = open_session("peer-b").await;
    let data = payload(CHUNK_SIZE * 2 + 100);
    let file = OutgoingFile::new("notes.txt", "text/plain", Bytes::from(data.clone()));
    let channel = MockChannel::new();

    let mut transfer = initiate(&session, &file).expect("session is open");
    assert_eq!(transfer.direction, TransferDirection::Outgoing);
    assert_eq!(transfer.total_chunks, 3);
    assert_eq!(transfer.status, TransferStatus::Pending);

    let mut reported = Vec::new();
    run_sender(&mut transfer, &file, &channel, &PacingConfig::default(), |t| {
        reported.push((t.status, t.progress))
    })
    .await
    .expect("transfer should complete");

    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(transfer.bytes_moved, data.len() as u64);
    assert_eq!(reported.len(), 4);
    assert!(reported.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(reported[..2].iter().all(|(_, progress)| *progress < 100.0));
    assert_eq!(reported[3], (TransferStatus::Completed, 100.0));

    let frames = channel.sent();
    assert_eq!(frames.len(), 3);

    let mut receiver = TransferReceiver::new();
    let mut received = None;
    for (i, frame) in frames.iter().enumerate() {
        let DataMessage::FileChunk { chunk, metadata } = DataMessage::decode(frame).unwrap();
        assert_eq!(chunk.index, i as u32);
        assert_eq!(chunk.id, transfer.id);
        assert_eq!(chunk.is_last, i == 2);
        assert_eq!(metadata.is_some(), i == 0);
        if i < 2 {
            assert_eq!(chunk.data.len(), CHUNK_SIZE);
        }

        if let ReceiveOutcome::Completed(incoming, file) = receiver.handle_frame(frame) {
            assert_eq!(incoming.direction, TransferDirection::Incoming);
            assert_eq!(incoming.status, TransferStatus::Completed);
            received = Some(file);
        }
    }

    let received = received.expect("receiver should finish");
    assert_eq!(received.transfer_id, transfer.id);
    assert_eq!(received.metadata.name, "notes.txt");
    assert_eq!(received.metadata.mime_type, "text/plain");
    assert_eq!(received.data.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_zero_byte_file_is_one_empty_chunk() {
    init_tracing();

    let session = open_session("peer-b").await;
    let file = OutgoingFile::new("empty.bin", "application/octet-stream", Bytes::new());
    let channel = MockChannel::new();

    let mut transfer = initiate(&session, &file).unwrap();
    assert_eq!(transfer.total_chunks, 1);

    run_sender(&mut transfer, &file, &channel, &PacingConfig::default(), |_| {})
        .await
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(transfer.progress, 100.0);

    let frames = channel.sent();
    assert_eq!(frames.len(), 1);
    let DataMessage::FileChunk { chunk, metadata } = DataMessage::decode(&frames[0]).unwrap();
    assert!(chunk.is_last);
    assert!(chunk.data.is_empty());
    assert_eq!(metadata.map(|m| m.size), Some(0));

    let mut receiver = TransferReceiver::new();
    match receiver.handle_frame(&frames[0]) {
        ReceiveOutcome::Completed(_, file) => assert!(file.data.is_empty()),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_same_file_gets_distinct_transfer_ids() {
    let session = open_session("peer-b").await;
    let file = OutgoingFile::new("a.txt", "text/plain", Bytes::from_static(b"abc"));

    let first = initiate(&session, &file).unwrap();
    let second = initiate(&session, &file).unwrap();
    assert_ne!(first.id, second.id);
}
