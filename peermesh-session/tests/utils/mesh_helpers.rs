use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::Level;

use peermesh_core::PeerId;
use peermesh_session::{ConnectionState, LocalBus, MeshBuilder, MeshHandle, TransportConfig};

use super::event_recorder::EventRecorder;
use super::recording_signaling::RecordingSignaling;

/// Timeout for offer/answer plus ICE over loopback (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 15000;

/// Timeout for the control channel to open after connecting (ms).
pub const DATA_CHANNEL_TIMEOUT_MS: u64 = 5000;

/// Timeout for delivery of data channel messages (ms).
pub const MESSAGE_TIMEOUT_MS: u64 = 5000;

/// Timeout for the transport to notice a vanished peer (ms).
pub const TRANSPORT_FAILURE_TIMEOUT_MS: u64 = 40000;

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One participant of a test mesh.
pub struct TestPeer {
    pub id: PeerId,
    pub handle: MeshHandle,
    pub recorder: EventRecorder,
    pub pump: JoinHandle<()>,
}

/// Attaches a mesh named `name` to the bus, using host candidates only.
pub fn spawn_peer(bus: &LocalBus, name: &str) -> Result<TestPeer> {
    let id = PeerId::from(name);
    let (endpoint, signals) = bus.attach_as(id.clone());
    let recorder = EventRecorder::new();

    let handle = recorder
        .attach(MeshBuilder::new(id.clone()).config(TransportConfig::local()))
        .spawn(Arc::new(endpoint))
        .context("Failed to spawn mesh")?;
    let pump = handle.forward_signals(signals);

    Ok(TestPeer {
        id,
        handle,
        recorder,
        pump,
    })
}

/// A mesh whose outgoing signals are captured rather than delivered.
pub fn spawn_isolated(name: &str) -> Result<(MeshHandle, RecordingSignaling, EventRecorder)> {
    let signaling = RecordingSignaling::new();
    let recorder = EventRecorder::new();

    let handle = recorder
        .attach(MeshBuilder::new(PeerId::from(name)).config(TransportConfig::local()))
        .spawn(Arc::new(signaling.clone()))
        .context("Failed to spawn mesh")?;

    Ok((handle, signaling, recorder))
}

/// Joins every peer in order. Each newcomer is offered to by everyone already present.
pub async fn join_all(peers: &[&TestPeer]) -> Result<()> {
    for peer in peers {
        peer.handle.join().await.context("Join failed")?;
        // Give the bus a moment so joins are seen in order.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

/// Waits until `handle` reports `state` for `peer_id`.
pub async fn wait_for_state(
    handle: &MeshHandle,
    peer_id: &PeerId,
    state: ConnectionState,
    timeout_ms: u64,
) -> Result<()> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if handle.state(peer_id.clone()).await? == Some(state) {
            return Ok(());
        }
        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for {} to reach {}", peer_id, state);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Waits until `handle` has no session for `peer_id`.
pub async fn wait_for_removal(handle: &MeshHandle, peer_id: &PeerId, timeout_ms: u64) -> Result<()> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if handle.state(peer_id.clone()).await?.is_none() {
            return Ok(());
        }
        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for {} to be removed", peer_id);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Waits until the control channel to `peer_id` is open for sending.
pub async fn wait_for_channel(handle: &MeshHandle, peer_id: &PeerId, timeout_ms: u64) -> Result<()> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let context = handle.context();

    while !context.is_open(peer_id) {
        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for channel to {}", peer_id);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

/// Waits for both directions of a pair to be connected with open channels.
pub async fn wait_for_link(a: &TestPeer, b: &TestPeer) -> Result<()> {
    wait_for_state(&a.handle, &b.id, ConnectionState::Connected, CONNECTION_TIMEOUT_MS).await?;
    wait_for_state(&b.handle, &a.id, ConnectionState::Connected, CONNECTION_TIMEOUT_MS).await?;
    wait_for_channel(&a.handle, &b.id, DATA_CHANNEL_TIMEOUT_MS).await?;
    wait_for_channel(&b.handle, &a.id, DATA_CHANNEL_TIMEOUT_MS).await?;
    Ok(())
}
