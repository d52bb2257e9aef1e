use peermesh_core::PeerId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshError>;

/// Failures of the session manager. None of them outlives the peer they name.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The operation named a peer with no live session. Dropped and logged.
    #[error("no session for peer {0}")]
    UnknownPeer(PeerId),

    #[error("session for peer {0} already exists")]
    AlreadyExists(PeerId),

    /// An offer or answer arrived out of the expected order. The stale message is ignored.
    #[error("negotiation conflict with {peer_id}: {reason}")]
    NegotiationConflict {
        peer_id: PeerId,
        reason: &'static str,
    },

    /// The underlying peer connection failed. The session is torn down, never retried.
    #[error("transport failure for {peer_id}: {source:#}")]
    TransportFailure {
        peer_id: PeerId,
        #[source]
        source: anyhow::Error,
    },

    #[error("data channel to {0} is not open")]
    ChannelUnavailable(PeerId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("mesh session has shut down")]
    Shutdown,
}

impl MeshError {
    pub(crate) fn transport(peer_id: &PeerId, source: anyhow::Error) -> Self {
        Self::TransportFailure {
            peer_id: peer_id.clone(),
            source,
        }
    }

    pub(crate) fn conflict(peer_id: &PeerId, reason: &'static str) -> Self {
        Self::NegotiationConflict {
            peer_id: peer_id.clone(),
            reason,
        }
    }

    /// Whether the failure leaves the peer's connection unusable.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }
}
