use crate::error::Result;
use crate::session::ConnectionState;
use peermesh_core::{ConnectionStats, PeerId, SignalMessage};
use tokio::sync::oneshot;

/// Requests handled by the mesh loop, one at a time.
pub(crate) enum MeshCommand {
    /// Announce ourselves on the signaling bus.
    Join,

    /// Become the offerer towards `peer_id`.
    Connect { peer_id: PeerId },

    /// An envelope delivered by the signaling bus.
    Signal(SignalMessage),

    RemovePeer {
        peer_id: PeerId,
    },

    /// Broadcast `leave` and close every session.
    Leave {
        done: oneshot::Sender<Vec<PeerId>>,
    },

    Stats {
        peer_id: PeerId,
        reply: oneshot::Sender<Result<ConnectionStats>>,
    },

    State {
        peer_id: PeerId,
        reply: oneshot::Sender<Option<ConnectionState>>,
    },

    Peers {
        reply: oneshot::Sender<Vec<PeerId>>,
    },
}
