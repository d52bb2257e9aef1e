use std::time::Duration;

use peermesh_core::{IceCandidate, PeerId, Signal, SignalMessage};
use peermesh_session::ConnectionState;

use crate::utils::{Outgoing, init_tracing, spawn_isolated, wait_for_removal, wait_for_state};

fn host_candidate() -> IceCandidate {
    IceCandidate {
        candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".into(),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    }
}

/// Lets the mesh loop drain everything queued so far.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_signals_for_unknown_peers_are_dropped() {
    init_tracing();

    let (alice, signaling, recorder) = spawn_isolated("alice").expect("Failed to spawn mesh");
    let ghost = PeerId::from("ghost");
    let me = PeerId::from("alice");

    alice
        .handle_signal(SignalMessage::directed(
            ghost.clone(),
            me.clone(),
            Signal::IceCandidate(host_candidate()),
        ))
        .await
        .unwrap();
    alice
        .handle_signal(SignalMessage::directed(
            ghost.clone(),
            me.clone(),
            Signal::Answer { sdp: "v=0".into() },
        ))
        .await
        .unwrap();
    settle().await;

    assert!(alice.peers().await.unwrap().is_empty());
    assert!(signaling.sent().is_empty());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_foreign_and_echoed_signals_are_ignored() {
    init_tracing();

    let (alice, signaling, _recorder) = spawn_isolated("alice").expect("Failed to spawn mesh");

    // Addressed to someone else.
    alice
        .handle_signal(SignalMessage::directed(
            PeerId::from("bob"),
            PeerId::from("carol"),
            Signal::Offer { sdp: "v=0".into() },
        ))
        .await
        .unwrap();
    // Our own join echoed back.
    alice
        .handle_signal(SignalMessage::broadcast(
            PeerId::from("alice"),
            Signal::Join {
                peer_id: PeerId::from("alice"),
            },
        ))
        .await
        .unwrap();
    settle().await;

    assert!(alice.peers().await.unwrap().is_empty());
    assert!(signaling.sent().is_empty());
}

#[tokio::test]
async fn test_join_creates_single_offer() {
    init_tracing();

    let (alice, signaling, recorder) = spawn_isolated("alice").expect("Failed to spawn mesh");
    let bob = PeerId::from("bob");
    let join = SignalMessage::broadcast(bob.clone(), Signal::Join { peer_id: bob.clone() });

    alice.handle_signal(join.clone()).await.unwrap();
    wait_for_state(&alice, &bob, ConnectionState::Connecting, 5000)
        .await
        .expect("Offerer session expected");

    // A repeated join while connecting is a no-op.
    alice.handle_signal(join).await.unwrap();
    // Candidates before the answer are held back, not rejected.
    alice
        .handle_signal(SignalMessage::directed(
            bob.clone(),
            PeerId::from("alice"),
            Signal::IceCandidate(host_candidate()),
        ))
        .await
        .unwrap();
    settle().await;

    let offers: Vec<_> = signaling
        .sent_to(&bob)
        .into_iter()
        .filter(|s| matches!(s, Signal::Offer { .. }))
        .collect();
    assert_eq!(offers.len(), 1);
    assert_eq!(alice.peers().await.unwrap(), vec![bob.clone()]);
    assert_eq!(recorder.disconnect_count(&bob), 0);
}

#[tokio::test]
async fn test_duplicate_offer_is_ignored() {
    init_tracing();

    // bob produces a real offer towards alice.
    let (bob, bob_signaling, _) = spawn_isolated("bob").expect("Failed to spawn bob");
    bob.create_peer_connection(PeerId::from("alice")).await.unwrap();
    settle().await;
    let offer = bob_signaling
        .sent()
        .into_iter()
        .find_map(|o| match o {
            Outgoing::Directed {
                signal: Signal::Offer { sdp },
                ..
            } => Some(sdp),
            _ => None,
        })
        .expect("bob should have offered");

    let (alice, signaling, _) = spawn_isolated("alice").expect("Failed to spawn alice");
    let message = SignalMessage::directed(
        PeerId::from("bob"),
        PeerId::from("alice"),
        Signal::Offer { sdp: offer },
    );
    alice.handle_signal(message.clone()).await.unwrap();
    alice.handle_signal(message).await.unwrap();
    settle().await;

    let answers = signaling
        .sent_to(&PeerId::from("bob"))
        .into_iter()
        .filter(|s| matches!(s, Signal::Answer { .. }))
        .count();
    assert_eq!(answers, 1);
    assert_eq!(
        alice.state(PeerId::from("bob")).await.unwrap(),
        Some(ConnectionState::Connecting)
    );
}

#[tokio::test]
async fn test_malformed_answer_tears_session_down() {
    init_tracing();

    let (alice, _signaling, recorder) = spawn_isolated("alice").expect("Failed to spawn mesh");
    let bob = PeerId::from("bob");

    alice.create_peer_connection(bob.clone()).await.unwrap();
    wait_for_state(&alice, &bob, ConnectionState::Connecting, 5000)
        .await
        .expect("Offerer session expected");

    alice
        .handle_signal(SignalMessage::directed(
            bob.clone(),
            PeerId::from("alice"),
            Signal::Answer {
                sdp: "this is not sdp".into(),
            },
        ))
        .await
        .unwrap();

    wait_for_removal(&alice, &bob, 5000)
        .await
        .expect("Session should be torn down");
    assert!(recorder.has_state(&bob, ConnectionState::Failed));
    assert_eq!(recorder.disconnect_count(&bob), 1);
}
