use std::time::Duration;

use peermesh_session::{ConnectionState, LocalBus};

use crate::utils::{
    MESSAGE_TIMEOUT_MS, TRANSPORT_FAILURE_TIMEOUT_MS, init_tracing, join_all, spawn_peer,
    wait_for_link, wait_for_removal,
};

#[tokio::test]
async fn test_remove_peer_emits_single_disconnect() {
    init_tracing();

    let bus = LocalBus::new();
    let alice = spawn_peer(&bus, "alice").expect("Failed to spawn alice");
    let bob = spawn_peer(&bus, "bob").expect("Failed to spawn bob");
    join_all(&[&alice, &bob]).await.expect("Join failed");
    wait_for_link(&alice, &bob).await.expect("Link not established");

    alice.handle.remove_peer(bob.id.clone()).await.unwrap();
    // Idempotent: the second removal finds nothing.
    alice.handle.remove_peer(bob.id.clone()).await.unwrap();

    assert!(
        alice
            .recorder
            .wait_for_disconnect(&bob.id, MESSAGE_TIMEOUT_MS)
            .await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(alice.recorder.disconnect_count(&bob.id), 1);
    assert!(alice.recorder.has_state(&bob.id, ConnectionState::Closed));
    assert_eq!(alice.handle.state(bob.id.clone()).await.unwrap(), None);
    assert!(!alice.handle.context().is_open(&bob.id));

    bob.handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_remote_leave_removes_session() {
    init_tracing();

    let bus = LocalBus::new();
    let alice = spawn_peer(&bus, "alice").expect("Failed to spawn alice");
    let bob = spawn_peer(&bus, "bob").expect("Failed to spawn bob");
    join_all(&[&alice, &bob]).await.expect("Join failed");
    wait_for_link(&alice, &bob).await.expect("Link not established");

    let dropped = bob.handle.leave().await.unwrap();
    assert_eq!(dropped, vec![alice.id.clone()]);
    assert!(bob.handle.peers().await.unwrap().is_empty());

    wait_for_removal(&alice.handle, &bob.id, MESSAGE_TIMEOUT_MS)
        .await
        .expect("alice should drop bob after his leave");
    tokio::time::sleep(Duration::from_millis(500)).await;

    // The leave signal and the closing transport must not double-report.
    assert_eq!(alice.recorder.disconnect_count(&bob.id), 1);
}

#[tokio::test]
async fn test_vanished_peer_is_evicted_by_transport() {
    init_tracing();

    let bus = LocalBus::new();
    let alice = spawn_peer(&bus, "alice").expect("Failed to spawn alice");
    let bob = spawn_peer(&bus, "bob").expect("Failed to spawn bob");
    join_all(&[&alice, &bob]).await.expect("Join failed");
    wait_for_link(&alice, &bob).await.expect("Link not established");

    // Cut bob off the bus and drop his mesh without a leave signal.
    bus.detach(&bob.id);
    let _ = bob.pump.await;
    drop(bob.handle);

    assert!(
        alice
            .recorder
            .wait_for_disconnect(&bob.id, TRANSPORT_FAILURE_TIMEOUT_MS)
            .await,
        "alice should notice bob's transport going away"
    );
    assert_eq!(alice.recorder.disconnect_count(&bob.id), 1);
    assert!(alice.handle.peers().await.unwrap().is_empty());
}
