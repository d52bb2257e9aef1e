use async_trait::async_trait;
use peermesh_core::{PeerId, Signal};

/// Outbound side of the signaling bus as seen by the mesh.
///
/// Implementations stamp the local identity as `from`. Delivery is at most
/// once and failures are only logged; the mesh never waits on a reply.
#[async_trait]
pub trait SignalingOutput: Send + Sync + 'static {
    async fn send(&self, to: PeerId, signal: Signal);

    async fn broadcast(&self, signal: Signal);
}
