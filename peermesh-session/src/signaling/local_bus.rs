use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use dashmap::DashMap;
use peermesh_core::{PeerId, Signal, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Endpoints = Arc<DashMap<PeerId, mpsc::UnboundedSender<SignalMessage>>>;

/// In-process signaling bus.
///
/// Routes envelopes by `to` between endpoints attached to the same bus;
/// `to = None` reaches every endpoint except the sender.
#[derive(Clone, Default)]
pub struct LocalBus {
    endpoints: Endpoints,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the bus under a freshly assigned id.
    pub fn attach(&self) -> (BusEndpoint, mpsc::UnboundedReceiver<SignalMessage>) {
        self.attach_as(PeerId::new())
    }

    pub fn attach_as(&self, peer_id: PeerId) -> (BusEndpoint, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.endpoints.insert(peer_id.clone(), tx).is_some() {
            warn!("Bus endpoint {} re-attached; previous receiver detached", peer_id);
        }

        let endpoint = BusEndpoint {
            local_id: peer_id,
            endpoints: Arc::clone(&self.endpoints),
        };
        (endpoint, rx)
    }

    pub fn detach(&self, peer_id: &PeerId) -> bool {
        self.endpoints.remove(peer_id).is_some()
    }

    pub fn members(&self) -> Vec<PeerId> {
        self.endpoints.iter().map(|e| e.key().clone()).collect()
    }

    /// Delivers an envelope as-is. Returns how many endpoints received it.
    pub fn route(&self, message: SignalMessage) -> usize {
        route(&self.endpoints, message)
    }
}

fn route(endpoints: &Endpoints, message: SignalMessage) -> usize {
    match message.to.clone() {
        Some(to) => {
            let Some(endpoint) = endpoints.get(&to) else {
                debug!("Dropping {} for unknown bus member {}", message.kind(), to);
                return 0;
            };
            usize::from(endpoint.send(message).is_ok())
        }
        None => {
            // Snapshot recipients so no map guard is held while sending.
            let recipients: Vec<_> = endpoints
                .iter()
                .filter(|e| *e.key() != message.from)
                .map(|e| e.value().clone())
                .collect();
            recipients
                .into_iter()
                .filter(|tx| tx.send(message.clone()).is_ok())
                .count()
        }
    }
}

/// One participant's handle on a [`LocalBus`].
#[derive(Clone)]
pub struct BusEndpoint {
    local_id: PeerId,
    endpoints: Endpoints,
}

impl BusEndpoint {
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }
}

#[async_trait]
impl SignalingOutput for BusEndpoint {
    async fn send(&self, to: PeerId, signal: Signal) {
        let message = SignalMessage::directed(self.local_id.clone(), to, signal);
        route(&self.endpoints, message);
    }

    async fn broadcast(&self, signal: Signal) {
        let message = SignalMessage::broadcast(self.local_id.clone(), signal);
        route(&self.endpoints, message);
    }
}
