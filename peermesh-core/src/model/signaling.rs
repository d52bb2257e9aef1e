use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// A trickled ICE candidate in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Typed payload of a signaling envelope. Serialized as `{"type": .., "payload": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Signal {
    /// Bus membership announcement; always broadcast.
    Join { peer_id: PeerId },
    /// Explicit departure; always broadcast.
    Leave { peer_id: PeerId },
    /// Identity assigned by the bus to a freshly connected participant.
    Welcome { peer_id: PeerId },
    /// ICE servers the bus wants participants to use.
    IceConfig { ice_servers: Vec<IceServerConfig> },
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate(IceCandidate),
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Join { .. } => "join",
            Signal::Leave { .. } => "leave",
            Signal::Welcome { .. } => "welcome",
            Signal::IceConfig { .. } => "ice-config",
            Signal::Offer { .. } => "offer",
            Signal::Answer { .. } => "answer",
            Signal::IceCandidate(_) => "ice-candidate",
        }
    }
}

/// Envelope exchanged over the signaling bus: `{type, from, to, payload}`.
///
/// `to = None` marks a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub from: PeerId,
    #[serde(default)]
    pub to: Option<PeerId>,
    #[serde(flatten)]
    pub signal: Signal,
}

impl SignalMessage {
    pub fn directed(from: PeerId, to: PeerId, signal: Signal) -> Self {
        Self {
            from,
            to: Some(to),
            signal,
        }
    }

    pub fn broadcast(from: PeerId, signal: Signal) -> Self {
        Self {
            from,
            to: None,
            signal,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    pub fn kind(&self) -> &'static str {
        self.signal.kind()
    }
}
