use bytes::Bytes;
use peermesh_core::{IceCandidate, PeerId};
use std::sync::Arc;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_remote::TrackRemote;

/// Events that peer connection callbacks push into the mesh loop.
///
/// Every variant carries the `connection_id` of the connection that raised it,
/// so events from a replaced or closed connection can be recognised and dropped.
pub enum TransportEvent {
    StateChanged {
        peer_id: PeerId,
        connection_id: u64,
        state: RTCPeerConnectionState,
    },

    /// Local ICE candidate to forward to the remote peer.
    CandidateGenerated {
        peer_id: PeerId,
        connection_id: u64,
        candidate: IceCandidate,
    },

    /// The control channel reached the open state and can carry data.
    DataChannelOpen {
        peer_id: PeerId,
        connection_id: u64,
        channel: Arc<RTCDataChannel>,
    },

    Message {
        peer_id: PeerId,
        connection_id: u64,
        data: Bytes,
    },

    TrackReceived {
        peer_id: PeerId,
        connection_id: u64,
        track: Arc<TrackRemote>,
    },
}

impl TransportEvent {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::StateChanged { peer_id, .. }
            | Self::CandidateGenerated { peer_id, .. }
            | Self::DataChannelOpen { peer_id, .. }
            | Self::Message { peer_id, .. }
            | Self::TrackReceived { peer_id, .. } => peer_id,
        }
    }

    pub fn connection_id(&self) -> u64 {
        match self {
            Self::StateChanged { connection_id, .. }
            | Self::CandidateGenerated { connection_id, .. }
            | Self::DataChannelOpen { connection_id, .. }
            | Self::Message { connection_id, .. }
            | Self::TrackReceived { connection_id, .. } => *connection_id,
        }
    }
}
