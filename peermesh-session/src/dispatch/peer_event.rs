use crate::session::ConnectionState;
use bytes::Bytes;
use peermesh_core::{ControlMessage, IceCandidate, PeerId};
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Names listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    IceCandidate,
    ConnectionStateChange,
    RemoteTrack,
    DataChannelMessage,
    DataChannelBinary,
    PeerDisconnected,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::IceCandidate,
        EventKind::ConnectionStateChange,
        EventKind::RemoteTrack,
        EventKind::DataChannelMessage,
        EventKind::DataChannelBinary,
        EventKind::PeerDisconnected,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::IceCandidate => "iceCandidate",
            Self::ConnectionStateChange => "connectionStateChange",
            Self::RemoteTrack => "remoteTrack",
            Self::DataChannelMessage => "dataChannelMessage",
            Self::DataChannelBinary => "dataChannelBinary",
            Self::PeerDisconnected => "peerDisconnected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the mesh reports to the outside world.
#[derive(Clone)]
pub enum PeerEvent {
    /// A local candidate was produced for this peer and sent over signaling.
    IceCandidate {
        peer_id: PeerId,
        candidate: IceCandidate,
    },
    ConnectionStateChange {
        peer_id: PeerId,
        state: ConnectionState,
    },
    RemoteTrack {
        peer_id: PeerId,
        stream_id: String,
        track: Arc<TrackRemote>,
    },
    DataChannelMessage {
        peer_id: PeerId,
        message: ControlMessage,
    },
    /// A frame that did not parse as a control message, usually a file chunk.
    DataChannelBinary {
        peer_id: PeerId,
        data: Bytes,
    },
    PeerDisconnected {
        peer_id: PeerId,
    },
}

impl PeerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::IceCandidate { .. } => EventKind::IceCandidate,
            Self::ConnectionStateChange { .. } => EventKind::ConnectionStateChange,
            Self::RemoteTrack { .. } => EventKind::RemoteTrack,
            Self::DataChannelMessage { .. } => EventKind::DataChannelMessage,
            Self::DataChannelBinary { .. } => EventKind::DataChannelBinary,
            Self::PeerDisconnected { .. } => EventKind::PeerDisconnected,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::IceCandidate { peer_id, .. }
            | Self::ConnectionStateChange { peer_id, .. }
            | Self::RemoteTrack { peer_id, .. }
            | Self::DataChannelMessage { peer_id, .. }
            | Self::DataChannelBinary { peer_id, .. }
            | Self::PeerDisconnected { peer_id } => peer_id,
        }
    }
}

// TrackRemote has no Debug impl.
impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IceCandidate { peer_id, candidate } => f
                .debug_struct("IceCandidate")
                .field("peer_id", peer_id)
                .field("candidate", candidate)
                .finish(),
            Self::ConnectionStateChange { peer_id, state } => f
                .debug_struct("ConnectionStateChange")
                .field("peer_id", peer_id)
                .field("state", state)
                .finish(),
            Self::RemoteTrack {
                peer_id,
                stream_id,
                track,
            } => f
                .debug_struct("RemoteTrack")
                .field("peer_id", peer_id)
                .field("stream_id", stream_id)
                .field("track_id", &track.id())
                .finish(),
            Self::DataChannelMessage { peer_id, message } => f
                .debug_struct("DataChannelMessage")
                .field("peer_id", peer_id)
                .field("message", message)
                .finish(),
            Self::DataChannelBinary { peer_id, data } => f
                .debug_struct("DataChannelBinary")
                .field("peer_id", peer_id)
                .field("len", &data.len())
                .finish(),
            Self::PeerDisconnected { peer_id } => f
                .debug_struct("PeerDisconnected")
                .field("peer_id", peer_id)
                .finish(),
        }
    }
}
