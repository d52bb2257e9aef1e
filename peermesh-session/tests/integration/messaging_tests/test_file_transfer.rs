use bytes::Bytes;
use peermesh_core::{FILE_CHUNK_SIZE, FileReceiver, ReceivedFile};
use peermesh_session::LocalBus;

use crate::utils::{RecordedEvent, init_tracing, join_all, spawn_peer, wait_for_link};

const TRANSFER_TIMEOUT_MS: u64 = 10000;

#[tokio::test]
async fn test_file_is_announced_then_chunked() {
    init_tracing();

    let bus = LocalBus::new();
    let alice = spawn_peer(&bus, "alice").expect("Failed to spawn alice");
    let bob = spawn_peer(&bus, "bob").expect("Failed to spawn bob");
    join_all(&[&alice, &bob]).await.expect("Join failed");
    wait_for_link(&alice, &bob).await.expect("Link not established");

    let payload: Vec<u8> = (0..(FILE_CHUNK_SIZE * 3 + 123))
        .map(|i| (i % 253) as u8)
        .collect();
    let expected_chunks = payload.len().div_ceil(FILE_CHUNK_SIZE);

    assert!(
        alice
            .handle
            .send_file(&bob.id, "notes.bin", "application/octet-stream", Bytes::from(payload.clone()))
            .await
    );

    assert!(
        bob.recorder
            .wait_for(
                |events| events
                    .iter()
                    .filter(|e| matches!(e, RecordedEvent::Binary { .. }))
                    .count()
                    >= expected_chunks,
                TRANSFER_TIMEOUT_MS
            )
            .await,
        "all chunks should arrive"
    );

    // Replay what bob observed, in order, through the receiver.
    let mut receiver = FileReceiver::new();
    let mut completed: Option<ReceivedFile> = None;
    for event in bob.recorder.events() {
        match event {
            RecordedEvent::Message {
                peer_id,
                message: peermesh_core::ControlMessage::FileInfo(info),
            } => {
                assert!(receiver.announce(peer_id, info).is_none());
            }
            RecordedEvent::Binary { peer_id, data } => {
                if let Some(file) = receiver.receive_chunk(&peer_id, &data).unwrap() {
                    completed = Some(file);
                }
            }
            _ => {}
        }
    }

    let file = completed.expect("transfer should complete");
    assert_eq!(file.info.name, "notes.bin");
    assert_eq!(file.info.size, payload.len() as u64);
    assert_eq!(file.data.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_file_to_unconnected_peer_is_refused() {
    init_tracing();

    let bus = LocalBus::new();
    let alice = spawn_peer(&bus, "alice").expect("Failed to spawn alice");

    assert!(
        !alice
            .handle
            .send_file(&"nobody".into(), "a.txt", "text/plain", Bytes::from_static(b"abc"))
            .await
    );
}
