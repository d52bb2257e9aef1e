use dashmap::DashMap;
use peermesh_core::{IceServerConfig, PeerId, Signal, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct HubInner {
    peers: DashMap<PeerId, mpsc::UnboundedSender<String>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Routing table of the relay: one outbound queue per connected socket.
///
/// The hub assigns identities and stamps `from` on everything it forwards,
/// so a client can never speak for another peer.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

impl RelayHub {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                peers: DashMap::new(),
                ice_servers,
            }),
        }
    }

    /// Admits a new participant. The queue starts with `welcome` and `ice-config`.
    pub fn register(&self) -> (PeerId, mpsc::UnboundedReceiver<String>) {
        let peer_id = PeerId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.peers.insert(peer_id.clone(), tx);
        info!(
            "Registered {} ({} connected)",
            peer_id,
            self.inner.peers.len()
        );

        self.deliver(
            &peer_id,
            &SignalMessage::directed(
                peer_id.clone(),
                peer_id.clone(),
                Signal::Welcome {
                    peer_id: peer_id.clone(),
                },
            ),
        );
        self.deliver(
            &peer_id,
            &SignalMessage::directed(
                peer_id.clone(),
                peer_id.clone(),
                Signal::IceConfig {
                    ice_servers: self.inner.ice_servers.clone(),
                },
            ),
        );

        (peer_id, rx)
    }

    /// Drops the participant and tells everyone else it left.
    pub fn unregister(&self, peer_id: &PeerId) {
        if self.inner.peers.remove(peer_id).is_none() {
            return;
        }
        info!("Unregistered {}", peer_id);
        self.route(SignalMessage::broadcast(
            peer_id.clone(),
            Signal::Leave {
                peer_id: peer_id.clone(),
            },
        ));
    }

    /// Parses a client frame, stamps the sender and forwards it.
    pub fn handle_incoming(&self, from: &PeerId, raw: &str) -> serde_json::Result<usize> {
        let mut message: SignalMessage = serde_json::from_str(raw)?;
        if message.from != *from {
            debug!("Rewriting claimed sender {} to {}", message.from, from);
            message.from = from.clone();
        }

        let kind = message.kind();
        match &mut message.signal {
            // Bus-issued only.
            Signal::Welcome { .. } | Signal::IceConfig { .. } => {
                warn!("{} tried to send {}", from, kind);
                return Ok(0);
            }
            Signal::Join { peer_id } | Signal::Leave { peer_id } => *peer_id = from.clone(),
            _ => {}
        }

        Ok(self.route(message))
    }

    /// Returns the number of sockets the message was queued for.
    pub fn route(&self, message: SignalMessage) -> usize {
        match &message.to {
            Some(to) => usize::from(self.deliver(to, &message)),
            None => {
                let recipients: Vec<PeerId> = self
                    .inner
                    .peers
                    .iter()
                    .filter(|entry| *entry.key() != message.from)
                    .map(|entry| entry.key().clone())
                    .collect();
                recipients
                    .iter()
                    .filter(|peer_id| self.deliver(peer_id, &message))
                    .count()
            }
        }
    }

    fn deliver(&self, peer_id: &PeerId, message: &SignalMessage) -> bool {
        let Some(peer) = self.inner.peers.get(peer_id) else {
            debug!("Dropping {} for disconnected {}", message.kind(), peer_id);
            return false;
        };
        match serde_json::to_string(message) {
            Ok(json) => peer.send(json).is_ok(),
            Err(e) => {
                error!("Failed to serialize {} envelope: {}", message.kind(), e);
                false
            }
        }
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }
}
